//! Stream lifecycle state machine.
//!
//! ```text
//!            open            start
//! Closed ──────────► Opened ───────► Running ◄──┐
//!   ▲                                 │   ▲      │ start
//!   │ close (any state)         pause │   │ resume
//!   │                                 ▼   │      │
//!   └──────────────────────────────── Paused     │
//!                                     │          │
//!          stop (Running/Paused), drain (Running)│
//!                                     ▼          │
//!                                  Stopped ──────┘
//! ```
//!
//! Operations called from a state where they are not valid fail with
//! [`Error::InvalidState`] and change nothing.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use vsnd_core::{StreamDirection, StreamParams};

use crate::device::PcmBackend;
use crate::progress::{
    DEFAULT_PROGRESS_INTERVAL, ProgressReporter, ProgressSnapshot, ProgressState, ProgressUpdate,
};
use crate::scheduler::Scheduler;
use crate::transfer::TransferEngine;
use crate::{Error, Result};

/// Lifecycle state of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StreamState {
    /// No device handle held.
    #[default]
    Closed,
    /// Device configured, clock not started.
    Opened,
    /// Frames are flowing.
    Running,
    /// Resources held, frame flow halted.
    Paused,
    /// Clock stopped; the stream can be started again.
    Stopped,
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Closed => "closed",
            Self::Opened => "opened",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        })
    }
}

/// Operations of a [`StreamController`], named in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum StreamOp {
    Open,
    Start,
    Stop,
    Pause,
    Resume,
    Drain,
    Read,
    Write,
}

impl fmt::Display for StreamOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Drain => "drain",
            Self::Read => "read",
            Self::Write => "write",
        })
    }
}

/// Owns one stream: its device handle, transfer engine and progress reporter.
///
/// All operations take `&mut self`, so a stream has exactly one driver at a
/// time. Dropping the controller closes the stream.
pub struct StreamController {
    backend: Arc<dyn PcmBackend>,
    device: String,
    direction: StreamDirection,
    state: StreamState,
    engine: Option<TransferEngine>,
    progress: Arc<ProgressState>,
    reporter: ProgressReporter,
}

impl StreamController {
    /// Create a closed stream for `device` on `backend`.
    pub fn new(
        backend: Arc<dyn PcmBackend>,
        device: impl Into<String>,
        direction: StreamDirection,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            backend,
            device: device.into(),
            direction,
            state: StreamState::Closed,
            engine: None,
            progress: Arc::new(ProgressState::new()),
            reporter: ProgressReporter::new(scheduler, DEFAULT_PROGRESS_INTERVAL),
        }
    }

    /// Sets the progress reporting interval (applies from the next start or resume).
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.reporter.set_interval(interval);
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Stream direction.
    pub fn direction(&self) -> StreamDirection {
        self.direction
    }

    /// Device name this stream opens.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Parameters of the open stream, if any.
    pub fn params(&self) -> Option<StreamParams> {
        self.engine.as_ref().map(|e| *e.params())
    }

    /// Current counters.
    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    /// Whether the progress reporter is armed.
    pub fn is_reporting(&self) -> bool {
        self.reporter.is_armed()
    }

    /// Installs the progress callback. It runs on the scheduler's context.
    pub fn set_progress_callback<F>(&mut self, callback: F)
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.reporter.set_callback(Some(Arc::new(callback)));
    }

    /// Removes the progress callback.
    pub fn clear_progress_callback(&mut self) {
        self.reporter.set_callback(None);
    }

    /// Opens and configures the device with concrete `params`.
    ///
    /// The hardware decides whether `params` are acceptable; a rejection
    /// fails with [`Error::UnsupportedParams`] and the stream stays closed.
    pub fn open(&mut self, params: StreamParams) -> Result<()> {
        self.require(StreamOp::Open, &[StreamState::Closed])?;

        let mut device = self.backend.open_device(&self.device, self.direction)?;
        if let Err(e) = device.configure(&params) {
            tracing::info!(device = %self.device, %params, error = %e, "open rejected");
            return Err(match e {
                Error::UnsupportedParams(_) => e,
                other => Error::UnsupportedParams(other.to_string()),
            });
        }

        self.progress.reset();
        self.engine = Some(TransferEngine::new(
            device,
            params,
            self.direction,
            Arc::clone(&self.progress),
        ));
        self.state = StreamState::Opened;
        tracing::info!(
            device = %self.device,
            backend = self.backend.name(),
            direction = %self.direction,
            %params,
            "stream opened"
        );
        Ok(())
    }

    /// Starts frame flow. From Stopped the device is re-prepared and the
    /// counters start over.
    pub fn start(&mut self) -> Result<()> {
        let from = self.require(
            StreamOp::Start,
            &[StreamState::Opened, StreamState::Stopped],
        )?;
        let engine = self.engine_mut(StreamOp::Start)?;

        if from == StreamState::Stopped {
            engine.device_mut().prepare()?;
        }
        engine.device_mut().start().map_err(|e| match e {
            Error::DeviceBusy(_) => e,
            other => Error::DeviceBusy(other.to_string()),
        })?;
        let params = *engine.params();

        if from == StreamState::Stopped {
            self.progress.reset();
        }
        self.reporter.arm(Arc::clone(&self.progress), params, self.direction);
        self.state = StreamState::Running;
        tracing::info!(device = %self.device, direction = %self.direction, "stream started");
        Ok(())
    }

    /// Stops frame flow and drops pending frames.
    ///
    /// The stream always ends up Stopped. A device failure while stopping
    /// is reported as [`Error::StreamBroken`].
    pub fn stop(&mut self) -> Result<()> {
        self.require(StreamOp::Stop, &[StreamState::Running, StreamState::Paused])?;
        self.reporter.disarm();
        let result = self.engine_mut(StreamOp::Stop)?.device_mut().stop();
        self.finish_stop(StreamOp::Stop, result)
    }

    /// Plays out every frame written so far, then stops. Playback only.
    ///
    /// Blocks until the device queue is empty. Ends up Stopped like
    /// [`stop`](Self::stop), with the same error reporting.
    pub fn drain(&mut self) -> Result<()> {
        self.require_io(StreamOp::Drain, StreamDirection::Playback)?;
        self.reporter.disarm();
        let result = self.engine_mut(StreamOp::Drain)?.device_mut().drain();
        if result.is_ok() {
            self.progress.set_delay(0);
        }
        self.finish_stop(StreamOp::Drain, result)
    }

    /// Halts frame flow, keeping the device and counters.
    pub fn pause(&mut self) -> Result<()> {
        self.require(StreamOp::Pause, &[StreamState::Running])?;
        self.engine_mut(StreamOp::Pause)?.device_mut().pause(true)?;
        self.reporter.disarm();
        self.state = StreamState::Paused;
        tracing::info!(device = %self.device, "stream paused");
        Ok(())
    }

    /// Resumes a paused stream with its counters intact.
    pub fn resume(&mut self) -> Result<()> {
        self.require(StreamOp::Resume, &[StreamState::Paused])?;
        let engine = self.engine_mut(StreamOp::Resume)?;
        engine.device_mut().pause(false)?;
        let params = *engine.params();
        self.reporter.arm(Arc::clone(&self.progress), params, self.direction);
        self.state = StreamState::Running;
        tracing::info!(device = %self.device, "stream resumed");
        Ok(())
    }

    /// Releases the device from any state. Never fails; closing a closed
    /// stream does nothing.
    pub fn close(&mut self) {
        self.reporter.disarm();
        if let Some(engine) = self.engine.take() {
            drop(engine);
            tracing::info!(device = %self.device, from = %self.state, "stream closed");
        }
        self.progress.reset();
        self.state = StreamState::Closed;
    }

    /// Writes whole frames. Returns the number of frames accepted, which is
    /// short after an underrun.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.require_io(StreamOp::Write, StreamDirection::Playback)?;
        let result = self.engine_mut(StreamOp::Write)?.write(data);
        self.check_broken(result)
    }

    /// Reads whole frames. Returns the number of frames filled, which is
    /// short after an overrun.
    pub fn read(&mut self, data: &mut [u8]) -> Result<usize> {
        self.require_io(StreamOp::Read, StreamDirection::Capture)?;
        let result = self.engine_mut(StreamOp::Read)?.read(data);
        self.check_broken(result)
    }

    fn finish_stop(&mut self, op: StreamOp, result: Result<()>) -> Result<()> {
        self.state = StreamState::Stopped;
        match result {
            Ok(()) => {
                tracing::info!(
                    device = %self.device,
                    %op,
                    frames = self.progress.snapshot().frames,
                    "stream stopped"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(device = %self.device, %op, error = %e, "device failed to stop");
                Err(match e {
                    Error::StreamBroken(_) => e,
                    other => Error::StreamBroken(other.to_string()),
                })
            }
        }
    }

    fn require(&self, op: StreamOp, allowed: &[StreamState]) -> Result<StreamState> {
        if allowed.contains(&self.state) {
            Ok(self.state)
        } else {
            Err(Error::InvalidState {
                op,
                state: self.state,
            })
        }
    }

    fn require_io(&self, op: StreamOp, direction: StreamDirection) -> Result<()> {
        if self.direction != direction {
            return Err(Error::WrongDirection {
                op,
                direction: self.direction,
            });
        }
        self.require(op, &[StreamState::Running]).map(|_| ())
    }

    fn engine_mut(&mut self, op: StreamOp) -> Result<&mut TransferEngine> {
        let state = self.state;
        self.engine.as_mut().ok_or(Error::InvalidState { op, state })
    }

    /// Moves the stream to Stopped when a transfer failed fatally.
    fn check_broken(&mut self, result: Result<usize>) -> Result<usize> {
        if let Err(e) = &result
            && e.is_fatal()
        {
            tracing::error!(device = %self.device, error = %e, "stream broken, stopping");
            self.reporter.disarm();
            if let Some(engine) = self.engine.as_mut()
                && let Err(stop_err) = engine.device_mut().stop()
            {
                tracing::warn!(error = %stop_err, "stop after failure also failed");
            }
            self.state = StreamState::Stopped;
        }
        result
    }
}

impl fmt::Debug for StreamController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamController")
            .field("backend", &self.backend.name())
            .field("device", &self.device)
            .field("direction", &self.direction)
            .field("state", &self.state)
            .field("params", &self.params())
            .finish_non_exhaustive()
    }
}

impl Drop for StreamController {
    fn drop(&mut self) {
        self.close();
    }
}
