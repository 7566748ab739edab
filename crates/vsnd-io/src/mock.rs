//! Deterministic in-memory backend for tests and CI.
//!
//! [`MockBackend`] behaves like a single sound card with configurable
//! capabilities. Failure modes (unavailable device, busy device, xruns,
//! failing recovery) are switched on through control methods, and every
//! handle the engine opens can be inspected afterwards.

use std::sync::Arc;

use parking_lot::Mutex;
use vsnd_core::{
    ParamRangeSet, PcmParam, RangeSet, SampleFormat, StreamDirection, StreamParams, format_mask,
};

use crate::device::{HwQuery, IoStatus, PcmBackend, PcmDevice};
use crate::{Error, Result};

/// Capabilities of the simulated card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockHardware {
    /// Supported sample rates.
    pub rate: RangeSet,
    /// Supported ring buffer sizes in frames.
    pub buffer: RangeSet,
    /// Supported channel counts.
    pub channels: RangeSet,
    /// Supported period sizes in frames.
    pub period: RangeSet,
    /// Supported formats as a mask of wire codes.
    pub formats: RangeSet,
    /// Concrete combinations that `configure` refuses even though each
    /// value is individually in range.
    pub rejected: Vec<StreamParams>,
}

impl Default for MockHardware {
    fn default() -> Self {
        Self {
            rate: RangeSet::interval(8000, 48000),
            buffer: RangeSet::interval(64, 65536),
            channels: RangeSet::discrete([1, 2]),
            period: RangeSet::interval(32, 16384),
            formats: RangeSet::mask(format_mask([SampleFormat::S16Le, SampleFormat::S24Le])),
            rejected: Vec::new(),
        }
    }
}

impl MockHardware {
    /// Hardware range for `param`.
    pub fn range(&self, param: PcmParam) -> &RangeSet {
        match param {
            PcmParam::Rate => &self.rate,
            PcmParam::Buffer => &self.buffer,
            PcmParam::Channels => &self.channels,
            PcmParam::Period => &self.period,
            PcmParam::Format => &self.formats,
        }
    }

    fn check(&self, params: &StreamParams) -> std::result::Result<(), String> {
        let values = [
            (PcmParam::Rate, params.rate),
            (PcmParam::Buffer, params.buffer_frames),
            (PcmParam::Channels, params.channels),
            (PcmParam::Period, params.period_frames),
            (PcmParam::Format, u32::from(params.format.code())),
        ];
        for (param, value) in values {
            if !self.range(param).contains(value) {
                return Err(format!("{param} {value} outside {}", self.range(param)));
            }
        }
        if params.period_frames > params.buffer_frames {
            return Err(format!(
                "period {} exceeds buffer {}",
                params.period_frames, params.buffer_frames
            ));
        }
        if self.rejected.contains(params) {
            return Err(format!("combination refused: {params}"));
        }
        Ok(())
    }
}

/// Observable state of the most recently opened device handle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockDeviceStatus {
    /// Parameters accepted by the last successful `configure`.
    pub configured: Option<StreamParams>,
    /// Whether the clock is running.
    pub running: bool,
    /// Whether frame flow is paused.
    pub paused: bool,
    /// Successful `start` calls.
    pub starts: u32,
    /// `prepare` calls, including those made by `configure` and `recover`.
    pub prepares: u32,
    /// Successful xrun recoveries.
    pub recoveries: u32,
    /// Completed `drain` calls.
    pub drains: u32,
}

#[derive(Default)]
struct MockShared {
    hardware: MockHardware,
    unavailable: bool,
    busy: bool,
    fail_recovery: bool,
    fail_stop: bool,
    refused_commits: Vec<PcmParam>,
    xrun_after: Option<u64>,
    xrun_pending: bool,
    max_frames_per_call: Option<usize>,
    delay: u64,
    capture_pattern: Vec<u8>,
    capture_pos: usize,
    written: Vec<u8>,
    committed: Vec<(PcmParam, RangeSet)>,
    open_queries: usize,
    queries_opened: usize,
    open_devices: usize,
    status: MockDeviceStatus,
}

/// In-memory [`PcmBackend`].
///
/// Clones share state, so a test can keep one handle for control and
/// inspection while the engine owns another.
#[derive(Clone, Default)]
pub struct MockBackend {
    shared: Arc<Mutex<MockShared>>,
}

impl MockBackend {
    /// A backend with [`MockHardware::default`] capabilities.
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend with custom capabilities.
    pub fn with_hardware(hardware: MockHardware) -> Self {
        let backend = Self::default();
        backend.shared.lock().hardware = hardware;
        backend
    }

    /// Current capabilities.
    pub fn hardware(&self) -> MockHardware {
        self.shared.lock().hardware.clone()
    }

    /// Makes every open fail with `DeviceUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.shared.lock().unavailable = unavailable;
    }

    /// Makes `start` fail with `DeviceBusy`.
    pub fn set_busy(&self, busy: bool) {
        self.shared.lock().busy = busy;
    }

    /// Makes xrun recovery fail.
    pub fn fail_recovery(&self, fail: bool) {
        self.shared.lock().fail_recovery = fail;
    }

    /// Makes `stop` fail.
    pub fn fail_stop(&self, fail: bool) {
        self.shared.lock().fail_stop = fail;
    }

    /// Makes query commits for `param` fail.
    pub fn refuse_commit(&self, param: PcmParam) {
        self.shared.lock().refused_commits.push(param);
    }

    /// After `frames` more frames, the next transfer reports an xrun.
    pub fn inject_xrun_after(&self, frames: u64) {
        self.shared.lock().xrun_after = Some(frames);
    }

    /// Caps how many frames a single device transfer moves.
    pub fn set_max_frames_per_call(&self, frames: Option<usize>) {
        self.shared.lock().max_frames_per_call = frames;
    }

    /// Hardware delay reported after every transfer.
    pub fn set_delay(&self, frames: u64) {
        self.shared.lock().delay = frames;
    }

    /// Bytes that capture reads cycle through. Empty means silence.
    pub fn set_capture_data(&self, pattern: Vec<u8>) {
        let mut shared = self.shared.lock();
        shared.capture_pattern = pattern;
        shared.capture_pos = 0;
    }

    /// Every byte written by playback so far.
    pub fn written(&self) -> Vec<u8> {
        self.shared.lock().written.clone()
    }

    /// Constraints committed by the most recent query.
    pub fn committed(&self) -> Vec<(PcmParam, RangeSet)> {
        self.shared.lock().committed.clone()
    }

    /// Query handles currently alive.
    pub fn open_queries(&self) -> usize {
        self.shared.lock().open_queries
    }

    /// Query handles opened since creation.
    pub fn queries_opened(&self) -> usize {
        self.shared.lock().queries_opened
    }

    /// Device handles currently alive.
    pub fn open_devices(&self) -> usize {
        self.shared.lock().open_devices
    }

    /// State of the most recent device handle.
    pub fn device_status(&self) -> MockDeviceStatus {
        self.shared.lock().status.clone()
    }
}

impl std::fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.shared.lock();
        f.debug_struct("MockBackend")
            .field("hardware", &shared.hardware)
            .field("open_queries", &shared.open_queries)
            .field("open_devices", &shared.open_devices)
            .field("status", &shared.status)
            .finish_non_exhaustive()
    }
}

impl PcmBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn open_query(&self, device: &str, _direction: StreamDirection) -> Result<Box<dyn HwQuery>> {
        let mut shared = self.shared.lock();
        if shared.unavailable {
            return Err(Error::unavailable(device, "no such device"));
        }
        shared.open_queries += 1;
        shared.queries_opened += 1;
        shared.committed.clear();
        Ok(Box::new(MockQuery {
            shared: Arc::clone(&self.shared),
            commits: ParamRangeSet::new(),
        }))
    }

    fn open_device(&self, device: &str, direction: StreamDirection) -> Result<Box<dyn PcmDevice>> {
        let mut shared = self.shared.lock();
        if shared.unavailable {
            return Err(Error::unavailable(device, "no such device"));
        }
        shared.open_devices += 1;
        shared.status = MockDeviceStatus::default();
        shared.xrun_pending = false;
        Ok(Box::new(MockDevice {
            shared: Arc::clone(&self.shared),
            direction,
        }))
    }
}

struct MockQuery {
    shared: Arc<Mutex<MockShared>>,
    commits: ParamRangeSet,
}

impl HwQuery for MockQuery {
    fn hw_range(&mut self, param: PcmParam) -> Result<RangeSet> {
        let shared = self.shared.lock();
        let mut range = shared.hardware.range(param).clone();
        if let Some(committed) = self.commits.get(param) {
            range = range.intersect(committed);
        }
        // periods never exceed the largest buffer still allowed
        if param == PcmParam::Period
            && let Some(max_buffer) = self.commits.buffer.as_ref().and_then(RangeSet::max)
        {
            range = range.intersect(&RangeSet::interval(1, max_buffer));
        }
        Ok(range)
    }

    fn commit(&mut self, param: PcmParam, range: &RangeSet) -> Result<()> {
        let mut shared = self.shared.lock();
        if shared.refused_commits.contains(&param) {
            return Err(Error::UnsupportedParams(format!("{param} cannot be constrained")));
        }
        let narrowed = shared.hardware.range(param).intersect(range);
        if narrowed.is_empty() {
            return Err(Error::UnsupportedParams(format!("{param} {range} not supported")));
        }
        shared.committed.push((param, range.clone()));
        self.commits.set(param, narrowed);
        Ok(())
    }
}

impl Drop for MockQuery {
    fn drop(&mut self) {
        self.shared.lock().open_queries -= 1;
    }
}

struct MockDevice {
    shared: Arc<Mutex<MockShared>>,
    direction: StreamDirection,
}

impl MockDevice {
    /// Frames the next transfer may move, or `None` for an xrun.
    fn admit(shared: &mut MockShared, frames: usize) -> Option<usize> {
        if shared.xrun_pending || shared.xrun_after == Some(0) {
            shared.xrun_after = None;
            shared.xrun_pending = true;
            shared.status.running = false;
            return None;
        }
        let mut n = frames;
        if let Some(limit) = shared.max_frames_per_call {
            n = n.min(limit);
        }
        if let Some(remaining) = shared.xrun_after.as_mut() {
            n = n.min(usize::try_from(*remaining).unwrap_or(usize::MAX));
            *remaining -= n as u64;
        }
        Some(n)
    }

    fn frame_bytes(shared: &MockShared) -> Result<usize> {
        shared
            .status
            .configured
            .map(|p| p.frame_bytes())
            .filter(|fb| *fb > 0)
            .ok_or_else(|| Error::StreamBroken("device not configured".into()))
    }
}

impl PcmDevice for MockDevice {
    fn configure(&mut self, params: &StreamParams) -> Result<()> {
        let mut shared = self.shared.lock();
        shared.hardware.check(params).map_err(Error::UnsupportedParams)?;
        shared.status.configured = Some(*params);
        shared.status.prepares += 1;
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        let mut shared = self.shared.lock();
        if shared.busy {
            return Err(Error::DeviceBusy("device is held by another stream".into()));
        }
        shared.status.running = true;
        shared.status.paused = false;
        shared.status.starts += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut shared = self.shared.lock();
        shared.status.running = false;
        shared.status.paused = false;
        if shared.fail_stop {
            return Err(Error::StreamBroken("drop failed".into()));
        }
        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        let mut shared = self.shared.lock();
        shared.status.running = false;
        shared.status.paused = false;
        if shared.fail_stop {
            return Err(Error::StreamBroken("drain failed".into()));
        }
        shared.delay = 0;
        shared.status.drains += 1;
        Ok(())
    }

    fn pause(&mut self, enable: bool) -> Result<()> {
        self.shared.lock().status.paused = enable;
        Ok(())
    }

    fn prepare(&mut self) -> Result<()> {
        let mut shared = self.shared.lock();
        shared.status.prepares += 1;
        shared.status.running = false;
        shared.xrun_pending = false;
        Ok(())
    }

    fn write_frames(&mut self, data: &[u8]) -> Result<IoStatus> {
        let mut shared = self.shared.lock();
        let frame_bytes = Self::frame_bytes(&shared)?;
        if shared.status.paused {
            return Ok(IoStatus::Transferred(0));
        }
        let Some(n) = Self::admit(&mut shared, data.len() / frame_bytes) else {
            return Ok(IoStatus::Xrun);
        };
        shared.written.extend_from_slice(&data[..n * frame_bytes]);
        Ok(IoStatus::Transferred(n))
    }

    fn read_frames(&mut self, data: &mut [u8]) -> Result<IoStatus> {
        let mut shared = self.shared.lock();
        let frame_bytes = Self::frame_bytes(&shared)?;
        if shared.status.paused {
            return Ok(IoStatus::Transferred(0));
        }
        let Some(n) = Self::admit(&mut shared, data.len() / frame_bytes) else {
            return Ok(IoStatus::Xrun);
        };
        let shared = &mut *shared;
        for byte in &mut data[..n * frame_bytes] {
            *byte = match shared.capture_pattern.len() {
                0 => 0,
                len => {
                    let b = shared.capture_pattern[shared.capture_pos % len];
                    shared.capture_pos = (shared.capture_pos + 1) % len;
                    b
                }
            };
        }
        Ok(IoStatus::Transferred(n))
    }

    fn recover(&mut self) -> Result<()> {
        let mut shared = self.shared.lock();
        if shared.fail_recovery {
            return Err(Error::StreamBroken("prepare after xrun failed".into()));
        }
        shared.xrun_pending = false;
        shared.status.prepares += 1;
        shared.status.recoveries += 1;
        shared.status.running = true;
        tracing::trace!(direction = %self.direction, "mock device recovered");
        Ok(())
    }

    fn delay(&mut self) -> Result<u64> {
        Ok(self.shared.lock().delay)
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        let mut shared = self.shared.lock();
        shared.open_devices -= 1;
        shared.status.running = false;
        shared.status.paused = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo() -> StreamParams {
        StreamParams {
            rate: 48000,
            channels: 2,
            format: SampleFormat::S16Le,
            buffer_frames: 4096,
            period_frames: 1024,
        }
    }

    #[test]
    fn configure_checks_hardware() {
        let backend = MockBackend::new();
        let mut device = backend.open_device("default", StreamDirection::Playback).unwrap();
        let bad = StreamParams {
            channels: 6,
            ..stereo()
        };
        let err = device.configure(&bad).unwrap_err();
        assert!(matches!(err, Error::UnsupportedParams(ref m) if m.contains("channels 6")));
        device.configure(&stereo()).unwrap();
        assert_eq!(backend.device_status().configured, Some(stereo()));
    }

    #[test]
    fn rejected_combination_is_refused() {
        let hardware = MockHardware {
            rejected: vec![stereo()],
            ..MockHardware::default()
        };
        let backend = MockBackend::with_hardware(hardware);
        let mut device = backend.open_device("default", StreamDirection::Playback).unwrap();
        assert!(device.configure(&stereo()).is_err());
    }

    #[test]
    fn xrun_fires_after_budget() {
        let backend = MockBackend::new();
        let mut device = backend.open_device("default", StreamDirection::Playback).unwrap();
        device.configure(&stereo()).unwrap();
        backend.inject_xrun_after(3);

        assert_eq!(
            device.write_frames(&[1u8; 20]).unwrap(),
            IoStatus::Transferred(3)
        );
        assert_eq!(device.write_frames(&[1u8; 8]).unwrap(), IoStatus::Xrun);
        assert_eq!(device.write_frames(&[1u8; 8]).unwrap(), IoStatus::Xrun);
        device.recover().unwrap();
        assert_eq!(
            device.write_frames(&[1u8; 8]).unwrap(),
            IoStatus::Transferred(2)
        );
        assert_eq!(backend.written().len(), 20);
        assert_eq!(backend.device_status().recoveries, 1);
    }

    #[test]
    fn capture_cycles_pattern() {
        let backend = MockBackend::new();
        backend.set_capture_data(vec![1, 2, 3]);
        let mut device = backend.open_device("default", StreamDirection::Capture).unwrap();
        device.configure(&stereo()).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(
            device.read_frames(&mut buf).unwrap(),
            IoStatus::Transferred(2)
        );
        assert_eq!(buf, [1, 2, 3, 1, 2, 3, 1, 2]);
    }

    #[test]
    fn handles_are_counted() {
        let backend = MockBackend::new();
        let query = backend.open_query("default", StreamDirection::Playback).unwrap();
        let device = backend.open_device("default", StreamDirection::Playback).unwrap();
        assert_eq!((backend.open_queries(), backend.open_devices()), (1, 1));
        drop(query);
        drop(device);
        assert_eq!((backend.open_queries(), backend.open_devices()), (0, 0));
    }

    #[test]
    fn unavailable_refuses_everything() {
        let backend = MockBackend::new();
        backend.set_unavailable(true);
        assert!(backend.open_query("hw:9", StreamDirection::Capture).is_err());
        assert!(matches!(
            backend.open_device("hw:9", StreamDirection::Capture),
            Err(Error::DeviceUnavailable { ref device, .. }) if device == "hw:9"
        ));
    }
}
