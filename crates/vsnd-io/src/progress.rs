//! Stream position counters and the periodic progress reporter.
//!
//! [`ProgressState`] is written by the transfer path and read by the
//! reporter task. Everything in it is atomic, so the reporter never takes a
//! lock the I/O path also takes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use vsnd_core::{StreamDirection, StreamParams};

use crate::scheduler::{ScheduledTask, Scheduler};

/// Default reporting interval.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(50);

/// Shortest interval the reporter will schedule.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Counters shared between the transfer engine and the reporter.
#[derive(Debug, Default)]
pub struct ProgressState {
    frames: AtomicU64,
    xruns: AtomicU64,
    delay: AtomicU64,
}

/// Point-in-time copy of [`ProgressState`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Frames moved since the stream was opened or last started from Stopped.
    pub frames: u64,
    /// Underruns or overruns recovered so far.
    pub xruns: u64,
    /// Frames queued in hardware at the last transfer.
    pub delay: u64,
}

impl ProgressState {
    /// Fresh zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `frames` to the transferred frame count.
    pub fn record_transfer(&self, frames: u64) {
        self.frames.fetch_add(frames, Ordering::Relaxed);
    }

    /// Counts one xrun.
    pub fn record_xrun(&self) {
        self.xruns.fetch_add(1, Ordering::Relaxed);
    }

    /// Publishes the current hardware delay.
    pub fn set_delay(&self, frames: u64) {
        self.delay.store(frames, Ordering::Relaxed);
    }

    /// Zeroes all counters.
    pub fn reset(&self) {
        self.frames.store(0, Ordering::Relaxed);
        self.xruns.store(0, Ordering::Relaxed);
        self.delay.store(0, Ordering::Relaxed);
    }

    /// Reads all counters.
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            frames: self.frames.load(Ordering::Relaxed),
            xruns: self.xruns.load(Ordering::Relaxed),
            delay: self.delay.load(Ordering::Relaxed),
        }
    }
}

/// What the progress callback receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Frames the application has transferred.
    pub frames: u64,
    /// Frames that have actually reached (playback) or left (capture) the hardware.
    pub position_frames: u64,
    /// `position_frames` as time at the stream rate.
    pub position: Duration,
    /// `position_frames` in bytes.
    pub position_bytes: u64,
    /// Xruns so far.
    pub xruns: u64,
}

impl ProgressUpdate {
    /// Derives an update from raw counters.
    ///
    /// For playback the frames still queued in hardware have not been heard
    /// yet, so they are subtracted from the position.
    pub fn from_snapshot(
        snapshot: ProgressSnapshot,
        params: &StreamParams,
        direction: StreamDirection,
    ) -> Self {
        let position_frames = match direction {
            StreamDirection::Playback => snapshot.frames.saturating_sub(snapshot.delay),
            StreamDirection::Capture => snapshot.frames,
        };
        Self {
            frames: snapshot.frames,
            position_frames,
            position: params.frames_to_duration(position_frames),
            position_bytes: params.frames_to_bytes(position_frames),
            xruns: snapshot.xruns,
        }
    }
}

/// Callback invoked on the scheduler's context.
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Periodically publishes [`ProgressUpdate`]s while a stream runs.
pub struct ProgressReporter {
    scheduler: Arc<dyn Scheduler>,
    interval: Duration,
    callback: Arc<Mutex<Option<ProgressCallback>>>,
    task: Option<Box<dyn ScheduledTask>>,
}

impl ProgressReporter {
    /// Create a disarmed reporter.
    pub fn new(scheduler: Arc<dyn Scheduler>, interval: Duration) -> Self {
        Self {
            scheduler,
            interval: interval.max(MIN_INTERVAL),
            callback: Arc::new(Mutex::new(None)),
            task: None,
        }
    }

    /// The reporting interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Changes the interval used by the next [`arm`](Self::arm).
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval.max(MIN_INTERVAL);
    }

    /// Installs or clears the callback. Takes effect on the next tick.
    pub fn set_callback(&mut self, callback: Option<ProgressCallback>) {
        *self.callback.lock() = callback;
    }

    /// Starts periodic reporting from `state`. Re-arming replaces the old task.
    pub fn arm(
        &mut self,
        state: Arc<ProgressState>,
        params: StreamParams,
        direction: StreamDirection,
    ) {
        self.disarm();

        let callback = Arc::clone(&self.callback);
        let task = self.scheduler.schedule_repeating(
            self.interval,
            Box::new(move || {
                let Some(cb) = callback.lock().clone() else {
                    return;
                };
                cb(ProgressUpdate::from_snapshot(state.snapshot(), &params, direction));
            }),
        );
        self.task = Some(task);
        tracing::debug!(
            interval_ms = self.interval.as_millis(),
            %direction,
            "progress reporter armed"
        );
    }

    /// Stops periodic reporting. No-op when already disarmed.
    pub fn disarm(&mut self) {
        if let Some(mut task) = self.task.take() {
            task.cancel();
            tracing::debug!("progress reporter disarmed");
        }
    }

    /// Whether a reporting task is registered.
    pub fn is_armed(&self) -> bool {
        self.task.as_ref().is_some_and(|t| t.is_active())
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;
    use vsnd_core::SampleFormat;

    fn params() -> StreamParams {
        StreamParams {
            rate: 48000,
            channels: 2,
            format: SampleFormat::S16Le,
            buffer_frames: 16384,
            period_frames: 4096,
        }
    }

    #[test]
    fn state_counts_and_resets() {
        let state = ProgressState::new();
        state.record_transfer(100);
        state.record_transfer(28);
        state.record_xrun();
        state.set_delay(64);
        assert_eq!(
            state.snapshot(),
            ProgressSnapshot {
                frames: 128,
                xruns: 1,
                delay: 64
            }
        );
        state.reset();
        assert_eq!(state.snapshot(), ProgressSnapshot::default());
    }

    #[test]
    fn playback_position_excludes_queued_frames() {
        let snap = ProgressSnapshot {
            frames: 48000,
            xruns: 0,
            delay: 24000,
        };
        let update = ProgressUpdate::from_snapshot(snap, &params(), StreamDirection::Playback);
        assert_eq!(update.frames, 48000);
        assert_eq!(update.position_frames, 24000);
        assert_eq!(update.position, Duration::from_millis(500));
        assert_eq!(update.position_bytes, 96000);

        let update = ProgressUpdate::from_snapshot(snap, &params(), StreamDirection::Capture);
        assert_eq!(update.position_frames, 48000);
    }

    #[test]
    fn reporter_publishes_only_while_armed() {
        let scheduler = ManualScheduler::new();
        let mut reporter =
            ProgressReporter::new(Arc::new(scheduler.clone()), DEFAULT_PROGRESS_INTERVAL);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        reporter.set_callback(Some(Arc::new(move |u: ProgressUpdate| sink.lock().push(u.frames))));

        let state = Arc::new(ProgressState::new());
        state.record_transfer(10);
        reporter.arm(Arc::clone(&state), params(), StreamDirection::Capture);
        assert!(reporter.is_armed());
        assert_eq!(scheduler.intervals(), vec![DEFAULT_PROGRESS_INTERVAL]);

        scheduler.tick();
        state.record_transfer(5);
        scheduler.tick();
        reporter.disarm();
        reporter.disarm();
        scheduler.tick();

        assert!(!reporter.is_armed());
        assert_eq!(*seen.lock(), vec![10, 15]);
    }

    #[test]
    fn rearm_keeps_single_task() {
        let scheduler = ManualScheduler::new();
        let mut reporter = ProgressReporter::new(Arc::new(scheduler.clone()), Duration::ZERO);
        let state = Arc::new(ProgressState::new());
        reporter.arm(Arc::clone(&state), params(), StreamDirection::Playback);
        reporter.arm(state, params(), StreamDirection::Playback);
        assert_eq!(scheduler.active_tasks(), 1);
        assert_eq!(reporter.interval(), MIN_INTERVAL);
        drop(reporter);
        assert_eq!(scheduler.active_tasks(), 0);
    }

    #[test]
    fn missing_callback_is_skipped() {
        let scheduler = ManualScheduler::new();
        let mut reporter =
            ProgressReporter::new(Arc::new(scheduler.clone()), DEFAULT_PROGRESS_INTERVAL);
        reporter.arm(
            Arc::new(ProgressState::new()),
            params(),
            StreamDirection::Playback,
        );
        assert_eq!(scheduler.tick(), 1);
    }
}
