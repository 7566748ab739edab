//! Stream parameters: negotiable ranges and the concrete values a stream runs with.

use std::fmt;
use std::time::Duration;

use crate::format::SampleFormat;
use crate::range::RangeSet;

/// A negotiable stream parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PcmParam {
    /// Sample rate in Hz.
    Rate,
    /// Ring buffer size in frames.
    Buffer,
    /// Interleaved channel count.
    Channels,
    /// Period size in frames.
    Period,
    /// Sample format, as a mask of wire codes.
    Format,
}

impl PcmParam {
    /// Order in which hardware constraints are refined. Later parameters can
    /// depend on what earlier ones committed.
    pub const NEGOTIATION_ORDER: [PcmParam; 5] = [
        Self::Rate,
        Self::Buffer,
        Self::Channels,
        Self::Period,
        Self::Format,
    ];

    /// Short lowercase name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rate => "rate",
            Self::Buffer => "buffer",
            Self::Channels => "channels",
            Self::Period => "period",
            Self::Format => "format",
        }
    }
}

impl fmt::Display for PcmParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Direction of the stream relative to the frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StreamDirection {
    /// Frontend writes frames to the sink.
    #[default]
    Playback,
    /// Frontend reads frames from the source.
    Capture,
}

impl fmt::Display for StreamDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Playback => f.write_str("playback"),
            Self::Capture => f.write_str("capture"),
        }
    }
}

/// One optional [`RangeSet`] per [`PcmParam`].
///
/// `None` leaves the parameter unconstrained: negotiation passes the
/// hardware range through unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParamRangeSet {
    /// Sample rates.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub rate: Option<RangeSet>,
    /// Buffer sizes in frames.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub buffer: Option<RangeSet>,
    /// Channel counts.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub channels: Option<RangeSet>,
    /// Period sizes in frames.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub period: Option<RangeSet>,
    /// Format mask.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub format: Option<RangeSet>,
}

impl ParamRangeSet {
    /// A fully unconstrained set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, param: PcmParam, range: RangeSet) -> Self {
        self.set(param, range);
        self
    }

    /// Range for `param`, if constrained.
    pub fn get(&self, param: PcmParam) -> Option<&RangeSet> {
        self.slot(param).as_ref()
    }

    /// Constrains `param` to `range`.
    pub fn set(&mut self, param: PcmParam, range: RangeSet) {
        *self.slot_mut(param) = Some(range);
    }

    /// Removes the constraint on `param`.
    pub fn clear(&mut self, param: PcmParam) {
        *self.slot_mut(param) = None;
    }

    /// Constrained parameters with their ranges, in negotiation order.
    pub fn iter(&self) -> impl Iterator<Item = (PcmParam, &RangeSet)> {
        PcmParam::NEGOTIATION_ORDER
            .into_iter()
            .filter_map(|p| self.get(p).map(|r| (p, r)))
    }

    /// Parameters whose range is present but empty.
    pub fn empty_params(&self) -> Vec<PcmParam> {
        self.iter()
            .filter(|(_, r)| r.is_empty())
            .map(|(p, _)| p)
            .collect()
    }

    fn slot(&self, param: PcmParam) -> &Option<RangeSet> {
        match param {
            PcmParam::Rate => &self.rate,
            PcmParam::Buffer => &self.buffer,
            PcmParam::Channels => &self.channels,
            PcmParam::Period => &self.period,
            PcmParam::Format => &self.format,
        }
    }

    fn slot_mut(&mut self, param: PcmParam) -> &mut Option<RangeSet> {
        match param {
            PcmParam::Rate => &mut self.rate,
            PcmParam::Buffer => &mut self.buffer,
            PcmParam::Channels => &mut self.channels,
            PcmParam::Period => &mut self.period,
            PcmParam::Format => &mut self.format,
        }
    }
}

/// Preferred values used when a range leaves a choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StreamDefaults {
    /// Preferred sample rate in Hz.
    pub rate: u32,
    /// Preferred channel count.
    pub channels: u32,
    /// Preferred sample format.
    pub format: SampleFormat,
    /// Preferred buffer size in frames.
    pub buffer_frames: u32,
    /// Preferred period size in frames.
    pub period_frames: u32,
}

impl Default for StreamDefaults {
    fn default() -> Self {
        Self {
            rate: 48000,
            channels: 2,
            format: SampleFormat::S16Le,
            buffer_frames: 16384,
            period_frames: 4096,
        }
    }
}

/// Concrete parameters a stream is configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StreamParams {
    /// Sample rate in Hz.
    pub rate: u32,
    /// Interleaved channel count.
    pub channels: u32,
    /// Sample format.
    pub format: SampleFormat,
    /// Ring buffer size in frames.
    pub buffer_frames: u32,
    /// Period size in frames.
    pub period_frames: u32,
}

impl StreamParams {
    /// Picks concrete values from negotiated `ranges`.
    ///
    /// Unconstrained parameters take the default as is. Returns `None` if any
    /// range is empty. The period target is capped at the chosen buffer size.
    pub fn from_ranges(ranges: &ParamRangeSet, defaults: &StreamDefaults) -> Option<Self> {
        let pick = |param: PcmParam, default: u32, priority: &[u32]| match ranges.get(param) {
            Some(range) => range.pick_default_by(default, priority),
            None => Some(default),
        };

        let rate = pick(PcmParam::Rate, defaults.rate, &[])?;
        let buffer_frames = pick(PcmParam::Buffer, defaults.buffer_frames, &[])?;
        let channels = pick(PcmParam::Channels, defaults.channels, &[defaults.channels])?;
        let period_target = defaults.period_frames.min(buffer_frames);
        let period_frames = pick(PcmParam::Period, period_target, &[period_target])?;

        let mut priority = vec![u32::from(defaults.format.code())];
        priority.extend(SampleFormat::PRIORITY.iter().map(|f| u32::from(f.code())));
        let code = pick(
            PcmParam::Format,
            u32::from(defaults.format.code()),
            &priority[..],
        )?;
        let format = SampleFormat::from_code(code)?;

        Some(Self {
            rate,
            channels,
            format,
            buffer_frames,
            period_frames,
        })
    }

    /// Bytes in one interleaved frame.
    pub fn frame_bytes(&self) -> usize {
        self.format.bytes_per_sample() * self.channels as usize
    }

    /// Byte length of `frames` frames.
    pub fn frames_to_bytes(&self, frames: u64) -> u64 {
        frames * self.frame_bytes() as u64
    }

    /// Whole frames contained in `bytes` bytes.
    pub fn bytes_to_frames(&self, bytes: u64) -> u64 {
        match self.frame_bytes() as u64 {
            0 => 0,
            fb => bytes / fb,
        }
    }

    /// Playback time of `frames` frames at this rate.
    pub fn frames_to_duration(&self, frames: u64) -> Duration {
        if self.rate == 0 {
            return Duration::ZERO;
        }
        let nanos = u128::from(frames) * 1_000_000_000 / u128::from(self.rate);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Duration of one hardware period.
    pub fn period_duration(&self) -> Duration {
        self.frames_to_duration(u64::from(self.period_frames))
    }

    /// The same values as single-point ranges.
    pub fn as_ranges(&self) -> ParamRangeSet {
        ParamRangeSet::new()
            .with(PcmParam::Rate, RangeSet::single(self.rate))
            .with(PcmParam::Buffer, RangeSet::single(self.buffer_frames))
            .with(PcmParam::Channels, RangeSet::single(self.channels))
            .with(PcmParam::Period, RangeSet::single(self.period_frames))
            .with(PcmParam::Format, RangeSet::mask(self.format.bit()))
    }
}

impl fmt::Display for StreamParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, {}, buffer {} / period {} frames",
            self.rate, self.channels, self.format, self.buffer_frames, self.period_frames
        )
    }
}
