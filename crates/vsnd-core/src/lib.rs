//! vsnd Core - PCM parameter model for the virtual sound backend
//!
//! This crate holds the hardware-independent vocabulary shared by the stream
//! engine, configuration and CLI crates.
//!
//! # Core Abstractions
//!
//! ## Value Domains
//!
//! - [`RangeSet`] - interval, discrete set or bitmask of acceptable values,
//!   with intersection and deterministic default selection
//!
//! ## Parameters
//!
//! - [`PcmParam`] - the five negotiable parameters, in negotiation order
//! - [`ParamRangeSet`] - one optional range per parameter (requests, responses)
//! - [`StreamParams`] - concrete values a stream is opened with
//! - [`StreamDefaults`] - preferred values used when a range leaves a choice
//! - [`StreamDirection`] - playback or capture
//!
//! ## Formats
//!
//! - [`SampleFormat`] - PCM encodings keyed by their wire code
//! - [`format_mask`] / [`formats_in_mask`] - mask helpers
//!
//! # Example
//!
//! ```rust
//! use vsnd_core::{
//!     ParamRangeSet, PcmParam, RangeSet, SampleFormat, StreamDefaults, StreamParams, format_mask,
//! };
//!
//! let response = ParamRangeSet::new()
//!     .with(PcmParam::Rate, RangeSet::interval(44100, 48000))
//!     .with(PcmParam::Channels, RangeSet::discrete([2]))
//!     .with(PcmParam::Format, RangeSet::mask(format_mask([SampleFormat::S16Le])));
//!
//! let params = StreamParams::from_ranges(&response, &StreamDefaults::default()).unwrap();
//! assert_eq!(params.rate, 48000);
//! assert_eq!(params.frame_bytes(), 4);
//! ```
//!
//! # Features
//!
//! - `serde`: `Serialize`/`Deserialize` for every parameter type, for use by
//!   configuration files and frontend protocol adapters

pub mod format;
pub mod params;
pub mod range;

pub use format::{SampleFormat, format_mask, formats_in_mask};
pub use params::{ParamRangeSet, PcmParam, StreamDefaults, StreamDirection, StreamParams};
pub use range::RangeSet;
