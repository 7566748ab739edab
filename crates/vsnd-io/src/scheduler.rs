//! Periodic scheduling capability used for progress reporting.
//!
//! The stream engine does not own a timer. It asks an injected [`Scheduler`]
//! to run a task every interval and gets back a [`ScheduledTask`] handle to
//! cancel it. [`ThreadScheduler`] runs tasks on background threads;
//! [`ManualScheduler`] runs them only when a test calls
//! [`tick`](ManualScheduler::tick).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;

/// Work executed on every scheduler tick.
pub type RepeatingTask = Box<dyn FnMut() + Send>;

/// Handle to a registered repeating task.
///
/// Dropping the handle cancels the task.
pub trait ScheduledTask: Send {
    /// Stops future runs. Calling it more than once is a no-op.
    fn cancel(&mut self);

    /// Returns `true` until the task is cancelled.
    fn is_active(&self) -> bool;
}

/// Registers repeating tasks.
pub trait Scheduler: Send + Sync {
    /// Runs `task` every `interval` until the returned handle is cancelled or dropped.
    fn schedule_repeating(
        &self,
        interval: Duration,
        task: RepeatingTask,
    ) -> Box<dyn ScheduledTask>;
}

/// Scheduler that gives each task its own named background thread.
#[derive(Debug, Clone)]
pub struct ThreadScheduler {
    thread_name: String,
}

impl ThreadScheduler {
    /// Create a scheduler whose threads are named `vsnd-progress`.
    pub fn new() -> Self {
        Self::with_thread_name("vsnd-progress")
    }

    /// Create a scheduler with a custom thread name.
    pub fn with_thread_name(name: impl Into<String>) -> Self {
        Self {
            thread_name: name.into(),
        }
    }
}

impl Default for ThreadScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule_repeating(
        &self,
        interval: Duration,
        mut task: RepeatingTask,
    ) -> Box<dyn ScheduledTask> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let spawned = std::thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || {
                while let Err(RecvTimeoutError::Timeout) = stop_rx.recv_timeout(interval) {
                    task();
                }
            });

        match spawned {
            Ok(handle) => Box::new(ThreadTask {
                stop: Some(stop_tx),
                handle: Some(handle),
            }),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    name = %self.thread_name,
                    "failed to spawn scheduler thread"
                );
                Box::new(ThreadTask {
                    stop: None,
                    handle: None,
                })
            }
        }
    }
}

struct ThreadTask {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask for ThreadTask {
    fn cancel(&mut self) {
        // Disconnecting the channel ends the wait loop.
        self.stop.take();
        if let Some(handle) = self.handle.take()
            && handle.thread().id() != std::thread::current().id()
            && handle.join().is_err()
        {
            tracing::warn!("scheduler task panicked");
        }
    }

    fn is_active(&self) -> bool {
        self.stop.is_some()
    }
}

impl Drop for ThreadTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

struct ManualEntry {
    interval: Duration,
    task: RepeatingTask,
    active: Arc<AtomicBool>,
}

/// Deterministic scheduler for tests: tasks run only on [`tick`](Self::tick).
///
/// Clones share the same task list, so a test can keep one clone while the
/// stream under test owns another.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    entries: Arc<Mutex<Vec<ManualEntry>>>,
}

impl ManualScheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every active task once. Returns how many ran.
    pub fn tick(&self) -> usize {
        let mut entries = self.entries.lock();
        entries.retain(|e| e.active.load(Ordering::Acquire));
        for entry in entries.iter_mut() {
            (entry.task)();
        }
        entries.len()
    }

    /// Number of tasks that have not been cancelled.
    pub fn active_tasks(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.active.load(Ordering::Acquire))
            .count()
    }

    /// Intervals of the active tasks, in registration order.
    pub fn intervals(&self) -> Vec<Duration> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.active.load(Ordering::Acquire))
            .map(|e| e.interval)
            .collect()
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("active_tasks", &self.active_tasks())
            .finish()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_repeating(
        &self,
        interval: Duration,
        task: RepeatingTask,
    ) -> Box<dyn ScheduledTask> {
        let active = Arc::new(AtomicBool::new(true));
        self.entries.lock().push(ManualEntry {
            interval,
            task,
            active: Arc::clone(&active),
        });
        Box::new(ManualTask { active })
    }
}

struct ManualTask {
    active: Arc<AtomicBool>,
}

impl ScheduledTask for ManualTask {
    fn cancel(&mut self) {
        self.active.store(false, Ordering::Release);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for ManualTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_task() -> (Arc<AtomicUsize>, RepeatingTask) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let task: RepeatingTask = Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (count, task)
    }

    #[test]
    fn manual_runs_only_on_tick() {
        let scheduler = ManualScheduler::new();
        let (count, task) = counting_task();
        let handle = scheduler.schedule_repeating(Duration::from_millis(50), task);

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.tick(), 1);
        assert_eq!(scheduler.tick(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.intervals(), vec![Duration::from_millis(50)]);
        assert!(handle.is_active());
    }

    #[test]
    fn manual_cancel_and_drop() {
        let scheduler = ManualScheduler::new();
        let (count, task) = counting_task();
        let mut handle = scheduler.schedule_repeating(Duration::from_millis(10), task);
        handle.cancel();
        handle.cancel();
        assert!(!handle.is_active());
        assert_eq!(scheduler.tick(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        let (_, task) = counting_task();
        let handle = scheduler.schedule_repeating(Duration::from_millis(10), task);
        assert_eq!(scheduler.active_tasks(), 1);
        drop(handle);
        assert_eq!(scheduler.active_tasks(), 0);
    }

    #[test]
    fn thread_scheduler_runs_until_cancelled() {
        let scheduler = ThreadScheduler::new();
        let (count, task) = counting_task();
        let mut handle = scheduler.schedule_repeating(Duration::from_millis(2), task);

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while count.load(Ordering::SeqCst) < 3 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        handle.cancel();
        assert!(!handle.is_active());

        let after_cancel = count.load(Ordering::SeqCst);
        assert!(after_cancel >= 3);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::SeqCst), after_cancel);
    }
}
