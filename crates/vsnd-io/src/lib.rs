//! Stream engine for the vsnd virtual PCM backend.
//!
//! This crate drives one physical PCM device on behalf of one frontend
//! stream:
//!
//! - **Negotiation**: [`CapabilityNegotiator`] refines a requested
//!   [`ParamRangeSet`](vsnd_core::ParamRangeSet) against what the hardware
//!   supports, through a transient query handle
//! - **Lifecycle**: [`StreamController`] owns the open/start/pause/resume/stop/close
//!   state machine and forwards frame I/O
//! - **Transfer**: [`TransferEngine`] moves interleaved frames and recovers from
//!   underruns and overruns
//! - **Progress**: [`ProgressReporter`] publishes position and xrun counts on an
//!   injected [`Scheduler`]
//!
//! Hardware sits behind the [`PcmBackend`] trait. [`MockBackend`] is a
//! deterministic stand-in for tests and CI; the ALSA backend is available
//! with the `alsa` feature on Linux.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use vsnd_core::{
//!     ParamRangeSet, PcmParam, RangeSet, StreamDefaults, StreamDirection, StreamParams,
//! };
//! use vsnd_io::{CapabilityNegotiator, ManualScheduler, MockBackend, StreamController};
//!
//! let backend = Arc::new(MockBackend::new());
//! let negotiator =
//!     CapabilityNegotiator::new(backend.clone(), "default", StreamDirection::Playback);
//!
//! let requested = ParamRangeSet::new().with(PcmParam::Channels, RangeSet::discrete([2]));
//! let outcome = negotiator.query_ranges(&requested)?;
//! assert!(outcome.is_ok());
//!
//! let params = StreamParams::from_ranges(&outcome.response, &StreamDefaults::default()).unwrap();
//! let mut stream = StreamController::new(
//!     backend,
//!     "default",
//!     StreamDirection::Playback,
//!     Arc::new(ManualScheduler::new()),
//! );
//! stream.open(params)?;
//! stream.start()?;
//! let frames = stream.write(&vec![0u8; params.frame_bytes() * 256])?;
//! assert_eq!(frames, 256);
//! stream.close();
//! # Ok::<(), vsnd_io::Error>(())
//! ```

mod controller;
mod device;
mod mock;
mod negotiate;
mod progress;
mod scheduler;
mod transfer;

#[cfg(all(feature = "alsa", target_os = "linux"))]
pub mod alsa_backend;

pub use controller::{StreamController, StreamOp, StreamState};
pub use device::{HwQuery, IoStatus, PcmBackend, PcmDevice};
pub use mock::{MockBackend, MockHardware};
pub use negotiate::{CapabilityNegotiator, Negotiation};
pub use progress::{
    DEFAULT_PROGRESS_INTERVAL, ProgressCallback, ProgressReporter, ProgressSnapshot, ProgressState,
    ProgressUpdate,
};
pub use scheduler::{ManualScheduler, RepeatingTask, ScheduledTask, Scheduler, ThreadScheduler};
pub use transfer::TransferEngine;

use vsnd_core::StreamDirection;

/// Error types for stream negotiation and control.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The device could not be opened or probed.
    #[error("device '{device}' unavailable: {reason}")]
    DeviceUnavailable {
        /// Device name as configured.
        device: String,
        /// Backend-specific reason.
        reason: String,
    },

    /// The hardware rejected a concrete parameter combination.
    #[error("unsupported stream parameters: {0}")]
    UnsupportedParams(String),

    /// The operation is not valid in the stream's current state.
    #[error("cannot {op} a stream that is {state}")]
    InvalidState {
        /// Attempted operation.
        op: StreamOp,
        /// State the stream was in.
        state: StreamState,
    },

    /// The device refused to start.
    #[error("device busy: {0}")]
    DeviceBusy(String),

    /// The stream failed mid-flight and could not be recovered.
    #[error("stream broken: {0}")]
    StreamBroken(String),

    /// A transfer buffer does not hold a whole number of frames.
    #[error("buffer of {len} bytes is not a multiple of the {frame_bytes}-byte frame")]
    InvalidBuffer {
        /// Buffer length in bytes.
        len: usize,
        /// Bytes per frame of the open stream.
        frame_bytes: usize,
    },

    /// A read was attempted on a playback stream or a write on a capture stream.
    #[error("cannot {op} on a {direction} stream")]
    WrongDirection {
        /// Attempted operation.
        op: StreamOp,
        /// Direction the stream was opened with.
        direction: StreamDirection,
    },
}

impl Error {
    /// Create a device unavailable error.
    pub fn unavailable(device: impl Into<String>, reason: impl ToString) -> Self {
        Error::DeviceUnavailable {
            device: device.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns `true` for errors that leave the stream stopped.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::StreamBroken(_))
    }
}

/// Convenience result type for stream operations.
pub type Result<T> = std::result::Result<T, Error>;
