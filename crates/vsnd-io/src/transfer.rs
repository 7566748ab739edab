//! Blocking frame transfer with xrun recovery.

use std::sync::Arc;

use vsnd_core::{StreamDirection, StreamParams};

use crate::device::{IoStatus, PcmDevice};
use crate::progress::ProgressState;
use crate::{Error, Result};

/// Moves interleaved frames between caller buffers and an open device.
///
/// Counts every transferred frame and every xrun in the shared
/// [`ProgressState`]. An xrun ends the call early: the device is recovered
/// and the frames moved so far are returned, so callers loop on the count.
pub struct TransferEngine {
    device: Box<dyn PcmDevice>,
    params: StreamParams,
    direction: StreamDirection,
    progress: Arc<ProgressState>,
}

impl TransferEngine {
    /// Wraps a configured device.
    pub fn new(
        device: Box<dyn PcmDevice>,
        params: StreamParams,
        direction: StreamDirection,
        progress: Arc<ProgressState>,
    ) -> Self {
        Self {
            device,
            params,
            direction,
            progress,
        }
    }

    /// Parameters the device was configured with.
    pub fn params(&self) -> &StreamParams {
        &self.params
    }

    /// Stream direction.
    pub fn direction(&self) -> StreamDirection {
        self.direction
    }

    /// The underlying device, for lifecycle calls.
    pub fn device_mut(&mut self) -> &mut dyn PcmDevice {
        self.device.as_mut()
    }

    /// Writes whole frames from `data`. Returns the number of frames written.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        let frame_bytes = self.check_aligned(data.len())?;
        let total = data.len() / frame_bytes;
        let mut done = 0;

        while done < total {
            let status = self
                .device
                .write_frames(&data[done * frame_bytes..])
                .map_err(|e| broken("write", e))?;
            match status {
                IoStatus::Transferred(0) => break,
                IoStatus::Transferred(n) => done += self.account(n, total - done),
                IoStatus::Xrun => {
                    self.recover_xrun(done)?;
                    break;
                }
            }
        }
        Ok(done)
    }

    /// Reads whole frames into `data`. Returns the number of frames read.
    pub fn read(&mut self, data: &mut [u8]) -> Result<usize> {
        let frame_bytes = self.check_aligned(data.len())?;
        let total = data.len() / frame_bytes;
        let mut done = 0;

        while done < total {
            let status = self
                .device
                .read_frames(&mut data[done * frame_bytes..])
                .map_err(|e| broken("read", e))?;
            match status {
                IoStatus::Transferred(0) => break,
                IoStatus::Transferred(n) => done += self.account(n, total - done),
                IoStatus::Xrun => {
                    self.recover_xrun(done)?;
                    break;
                }
            }
        }
        Ok(done)
    }

    fn check_aligned(&self, len: usize) -> Result<usize> {
        let frame_bytes = self.params.frame_bytes();
        if frame_bytes == 0 || len % frame_bytes != 0 {
            return Err(Error::InvalidBuffer { len, frame_bytes });
        }
        Ok(frame_bytes)
    }

    /// Publishes `frames` (capped at `remaining`) and the current delay.
    fn account(&mut self, frames: usize, remaining: usize) -> usize {
        let frames = frames.min(remaining);
        self.progress.record_transfer(frames as u64);
        match self.device.delay() {
            Ok(delay) => self.progress.set_delay(delay),
            Err(e) => tracing::trace!(error = %e, "delay unavailable"),
        }
        frames
    }

    fn recover_xrun(&mut self, done: usize) -> Result<()> {
        self.progress.record_xrun();
        tracing::warn!(
            direction = %self.direction,
            frames = done,
            "{} detected, recovering",
            match self.direction {
                StreamDirection::Playback => "underrun",
                StreamDirection::Capture => "overrun",
            }
        );
        self.device.recover().map_err(|e| {
            tracing::error!(error = %e, direction = %self.direction, "xrun recovery failed");
            Error::StreamBroken(format!("xrun recovery failed: {e}"))
        })
    }
}

fn broken(op: &str, err: Error) -> Error {
    match err {
        Error::StreamBroken(_) => err,
        other => Error::StreamBroken(format!("{op} failed: {other}")),
    }
}
