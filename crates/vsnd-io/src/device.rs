//! Pluggable PCM hardware abstraction.
//!
//! The stream engine never talks to a sound API directly. It goes through
//! three object-safe traits:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ CapabilityNegotiator    StreamController     │
//! └──────┬──────────────────────────┬────────────┘
//!        │ open_query               │ open_device
//!        ▼                          ▼
//! ┌──────────────┐          ┌──────────────┐
//! │   HwQuery    │          │  PcmDevice   │
//! │ (transient)  │          │ (per stream) │
//! └──────────────┘          └──────────────┘
//!        ▲                          ▲
//!        └──────── PcmBackend ──────┘
//!             (MockBackend, AlsaBackend)
//! ```
//!
//! Both handle types release their hardware resources on drop, so every
//! exit path (including `?` propagation) closes them.

use vsnd_core::{PcmParam, RangeSet, StreamDirection, StreamParams};

use crate::Result;

/// Outcome of one blocking device transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoStatus {
    /// This many whole frames were moved.
    Transferred(usize),
    /// The ring buffer under- or overflowed; nothing was moved by this call.
    Xrun,
}

/// Transient capability probe for one device.
///
/// A query handle never shares state with an open stream. Constraints
/// committed through [`commit`](Self::commit) narrow what later calls to
/// [`hw_range`](Self::hw_range) report.
pub trait HwQuery: Send {
    /// The values the hardware accepts for `param`, given earlier commits.
    ///
    /// Formats are reported as a mask of wire codes.
    fn hw_range(&mut self, param: PcmParam) -> Result<RangeSet>;

    /// Restricts `param` to `range` for the rest of this query.
    ///
    /// Returns [`Error::UnsupportedParams`](crate::Error::UnsupportedParams)
    /// if the hardware cannot honour the restriction.
    fn commit(&mut self, param: PcmParam, range: &RangeSet) -> Result<()>;
}

/// An open PCM device handle bound to one stream.
///
/// Transfers are interleaved and blocking: a call returns once the device
/// has taken or produced data, reported an xrun, or failed.
pub trait PcmDevice: Send {
    /// Applies concrete hardware and software parameters and prepares the device.
    fn configure(&mut self, params: &StreamParams) -> Result<()>;

    /// Starts the stream clock.
    fn start(&mut self) -> Result<()>;

    /// Stops the stream clock, discarding pending frames.
    fn stop(&mut self) -> Result<()>;

    /// Blocks until queued playback frames have been played, then stops.
    ///
    /// Devices without a play-out queue just stop.
    fn drain(&mut self) -> Result<()> {
        self.stop()
    }

    /// Pauses (`true`) or resumes (`false`) frame flow without releasing resources.
    fn pause(&mut self, enable: bool) -> Result<()>;

    /// Returns a stopped device to the prepared state so it can start again.
    fn prepare(&mut self) -> Result<()>;

    /// Writes whole frames from `data`.
    fn write_frames(&mut self, data: &[u8]) -> Result<IoStatus>;

    /// Reads whole frames into `data`.
    fn read_frames(&mut self, data: &mut [u8]) -> Result<IoStatus>;

    /// Resets the ring position after an xrun and resumes flow.
    fn recover(&mut self) -> Result<()>;

    /// Frames queued between the application pointer and the hardware.
    fn delay(&mut self) -> Result<u64> {
        Ok(0)
    }
}

/// Factory for query handles and device handles.
///
/// Devices are addressed by a backend-specific name string (for ALSA, a PCM
/// name such as `default` or `hw:0,0`).
pub trait PcmBackend: Send + Sync {
    /// Human-readable name of this backend (e.g. "alsa", "mock").
    fn name(&self) -> &str;

    /// Opens a capability probe for `device`.
    fn open_query(&self, device: &str, direction: StreamDirection) -> Result<Box<dyn HwQuery>>;

    /// Opens `device` for streaming in `direction`.
    fn open_device(&self, device: &str, direction: StreamDirection)
    -> Result<Box<dyn PcmDevice>>;
}
