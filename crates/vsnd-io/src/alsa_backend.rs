//! ALSA implementation of [`PcmBackend`].
//!
//! Devices are addressed by ALSA PCM name (`default`, `hw:0,0`,
//! `plughw:1`...). Transfers use interleaved blocking byte I/O.

use alsa::pcm::{Access, Format, Frames, HwParams, PCM, State};
use alsa::{Direction, ValueOr};
use vsnd_core::{PcmParam, RangeSet, SampleFormat, StreamDirection, StreamParams};

use crate::device::{HwQuery, IoStatus, PcmBackend, PcmDevice};
use crate::{Error, Result};

/// Maps a sample format to its ALSA counterpart.
pub fn alsa_format(format: SampleFormat) -> Option<Format> {
    Some(match format {
        SampleFormat::U8 => Format::U8,
        SampleFormat::S8 => Format::S8,
        SampleFormat::U16Le => Format::U16LE,
        SampleFormat::U16Be => Format::U16BE,
        SampleFormat::S16Le => Format::S16LE,
        SampleFormat::S16Be => Format::S16BE,
        SampleFormat::U24Le => Format::U24LE,
        SampleFormat::U24Be => Format::U24BE,
        SampleFormat::S24Le => Format::S24LE,
        SampleFormat::S24Be => Format::S24BE,
        SampleFormat::U32Le => Format::U32LE,
        SampleFormat::U32Be => Format::U32BE,
        SampleFormat::S32Le => Format::S32LE,
        SampleFormat::S32Be => Format::S32BE,
        SampleFormat::ALaw => Format::ALaw,
        SampleFormat::MuLaw => Format::MuLaw,
        SampleFormat::F32Le => Format::FloatLE,
        SampleFormat::F32Be => Format::FloatBE,
        SampleFormat::F64Le => Format::Float64LE,
        SampleFormat::F64Be => Format::Float64BE,
        SampleFormat::Iec958SubframeLe => Format::IEC958SubframeLE,
        SampleFormat::Iec958SubframeBe => Format::IEC958SubframeBE,
    })
}

fn alsa_direction(direction: StreamDirection) -> Direction {
    match direction {
        StreamDirection::Playback => Direction::Playback,
        StreamDirection::Capture => Direction::Capture,
    }
}

fn to_frames(value: u32) -> Frames {
    Frames::try_from(value).unwrap_or(Frames::MAX)
}

fn from_frames(value: Frames) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

fn open_pcm(device: &str, direction: StreamDirection) -> Result<PCM> {
    PCM::new(device, alsa_direction(direction), false).map_err(|e| Error::unavailable(device, e))
}

/// Backend talking to the system's ALSA library.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlsaBackend;

impl AlsaBackend {
    /// Create the backend.
    pub fn new() -> Self {
        Self
    }
}

impl PcmBackend for AlsaBackend {
    fn name(&self) -> &str {
        "alsa"
    }

    fn open_query(&self, device: &str, direction: StreamDirection) -> Result<Box<dyn HwQuery>> {
        let pcm = open_pcm(device, direction)?;
        tracing::debug!(device, %direction, "opened ALSA query handle");
        Ok(Box::new(AlsaQuery {
            pcm,
            device: device.to_string(),
            commits: Vec::new(),
        }))
    }

    fn open_device(&self, device: &str, direction: StreamDirection) -> Result<Box<dyn PcmDevice>> {
        let pcm = open_pcm(device, direction)?;
        Ok(Box::new(AlsaDevice {
            pcm,
            device: device.to_string(),
            direction,
        }))
    }
}

/// How a committed range is replayed onto a fresh configuration space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Restriction {
    /// Pin the parameter to one value.
    Exact(u32),
    /// Bound the buffer size from both sides.
    BufferBounds { min: u32, max: u32 },
    /// Not expressible through the hardware parameter API. The range only
    /// filters what [`HwQuery::hw_range`] reports.
    ReportOnly,
}

impl Restriction {
    fn of(param: PcmParam, range: &RangeSet) -> Option<Self> {
        let (min, max) = (range.min()?, range.max()?);
        Some(if min == max {
            Self::Exact(min)
        } else if param == PcmParam::Buffer {
            Self::BufferBounds { min, max }
        } else {
            Self::ReportOnly
        })
    }
}

/// Intersects a hardware answer with every range committed for `param`.
fn narrow(param: PcmParam, range: RangeSet, commits: &[(PcmParam, RangeSet)]) -> RangeSet {
    commits
        .iter()
        .filter(|(p, _)| *p == param)
        .fold(range, |acc, (_, committed)| acc.intersect(committed))
}

/// Probe over a dedicated PCM handle.
///
/// `HwParams` borrows the PCM, so instead of holding one configuration
/// space open the committed ranges are replayed onto a fresh one per call.
struct AlsaQuery {
    pcm: PCM,
    device: String,
    commits: Vec<(PcmParam, RangeSet)>,
}

impl AlsaQuery {
    fn space(&self) -> alsa::Result<HwParams<'_>> {
        let hwp = HwParams::any(&self.pcm)?;
        hwp.set_access(Access::RWInterleaved)?;
        for (param, range) in &self.commits {
            match (Restriction::of(*param, range), param) {
                (Some(Restriction::Exact(value)), PcmParam::Rate) => {
                    hwp.set_rate(value, ValueOr::Nearest)?;
                }
                (Some(Restriction::Exact(value)), PcmParam::Buffer) => {
                    hwp.set_buffer_size(to_frames(value))?;
                }
                (Some(Restriction::Exact(value)), PcmParam::Channels) => {
                    hwp.set_channels(value)?;
                }
                (Some(Restriction::Exact(value)), PcmParam::Period) => {
                    hwp.set_period_size(to_frames(value), ValueOr::Nearest)?;
                }
                (Some(Restriction::Exact(code)), PcmParam::Format) => {
                    if let Some(format) = SampleFormat::from_code(code).and_then(alsa_format) {
                        hwp.set_format(format)?;
                    }
                }
                (Some(Restriction::BufferBounds { min, max }), _) => {
                    hwp.set_buffer_size_min(to_frames(min))?;
                    hwp.set_buffer_size_max(to_frames(max))?;
                }
                (Some(Restriction::ReportOnly) | None, _) => {}
            }
        }
        Ok(hwp)
    }
}

impl HwQuery for AlsaQuery {
    fn hw_range(&mut self, param: PcmParam) -> Result<RangeSet> {
        let unavailable = |e: alsa::Error| Error::unavailable(&self.device, e);
        let hwp = self.space().map_err(unavailable)?;
        let range = match param {
            PcmParam::Rate => RangeSet::interval(
                hwp.get_rate_min().map_err(unavailable)?,
                hwp.get_rate_max().map_err(unavailable)?,
            ),
            PcmParam::Buffer => RangeSet::interval(
                from_frames(hwp.get_buffer_size_min().map_err(unavailable)?),
                from_frames(hwp.get_buffer_size_max().map_err(unavailable)?),
            ),
            PcmParam::Channels => RangeSet::interval(
                hwp.get_channels_min().map_err(unavailable)?,
                hwp.get_channels_max().map_err(unavailable)?,
            ),
            PcmParam::Period => RangeSet::interval(
                from_frames(hwp.get_period_size_min().map_err(unavailable)?),
                from_frames(hwp.get_period_size_max().map_err(unavailable)?),
            ),
            PcmParam::Format => {
                let bits = SampleFormat::ALL
                    .into_iter()
                    .filter(|f| alsa_format(*f).is_some_and(|af| hwp.test_format(af).is_ok()))
                    .fold(0u64, |acc, f| acc | f.bit());
                RangeSet::mask(bits)
            }
        };
        Ok(narrow(param, range, &self.commits))
    }

    fn commit(&mut self, param: PcmParam, range: &RangeSet) -> Result<()> {
        let Some(restriction) = Restriction::of(param, range) else {
            return Err(Error::UnsupportedParams(format!("{param} {range} is empty")));
        };
        if restriction == Restriction::ReportOnly {
            tracing::debug!(%param, %range, "range kept as a report filter only");
        }

        self.commits.push((param, range.clone()));
        let applied = self.space().map(|_| ());
        if let Err(e) = applied {
            self.commits.pop();
            return Err(Error::UnsupportedParams(format!("{param} {range}: {e}")));
        }
        Ok(())
    }
}

/// An open ALSA PCM handle bound to one stream.
struct AlsaDevice {
    pcm: PCM,
    device: String,
    direction: StreamDirection,
}

impl AlsaDevice {
    fn broken(&self, what: &str, e: &alsa::Error) -> Error {
        Error::StreamBroken(format!("{what} on '{}': {e}", self.device))
    }

    fn transfer_failed(&self, what: &str, e: &alsa::Error) -> Result<IoStatus> {
        if self.pcm.state() == State::XRun {
            Ok(IoStatus::Xrun)
        } else {
            Err(self.broken(what, e))
        }
    }
}

impl PcmDevice for AlsaDevice {
    fn configure(&mut self, params: &StreamParams) -> Result<()> {
        let unsupported = |e: alsa::Error| Error::UnsupportedParams(e.to_string());
        let format = alsa_format(params.format).ok_or_else(|| {
            Error::UnsupportedParams(format!("{} has no ALSA equivalent", params.format))
        })?;

        {
            let hwp = HwParams::any(&self.pcm).map_err(unsupported)?;
            hwp.set_access(Access::RWInterleaved).map_err(unsupported)?;
            hwp.set_format(format).map_err(unsupported)?;
            hwp.set_channels(params.channels).map_err(unsupported)?;
            hwp.set_rate(params.rate, ValueOr::Nearest).map_err(unsupported)?;
            hwp.set_buffer_size_near(to_frames(params.buffer_frames))
                .map_err(unsupported)?;
            hwp.set_period_size_near(to_frames(params.period_frames), ValueOr::Nearest)
                .map_err(unsupported)?;
            self.pcm.hw_params(&hwp).map_err(unsupported)?;
        }

        let current = self.pcm.hw_params_current().map_err(unsupported)?;
        let rate = current.get_rate().map_err(unsupported)?;
        if rate != params.rate {
            return Err(Error::UnsupportedParams(format!(
                "requested {} Hz, hardware chose {rate} Hz",
                params.rate
            )));
        }
        let buffer = current.get_buffer_size().map_err(unsupported)?;
        let period = current.get_period_size().map_err(unsupported)?;

        let swp = self.pcm.sw_params_current().map_err(unsupported)?;
        swp.set_start_threshold(buffer.saturating_sub(period).max(period))
            .map_err(unsupported)?;
        swp.set_avail_min(period).map_err(unsupported)?;
        self.pcm.sw_params(&swp).map_err(unsupported)?;
        self.pcm.prepare().map_err(unsupported)?;

        tracing::debug!(
            device = %self.device,
            rate,
            buffer,
            period,
            format = %params.format,
            "ALSA hardware configured"
        );
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        // playback starts itself once the start threshold is queued
        if self.direction == StreamDirection::Playback {
            return Ok(());
        }
        self.pcm
            .start()
            .map_err(|e| Error::DeviceBusy(format!("'{}': {e}", self.device)))
    }

    fn stop(&mut self) -> Result<()> {
        self.pcm.drop().map_err(|e| self.broken("stop", &e))
    }

    fn drain(&mut self) -> Result<()> {
        // frames below the start threshold are still waiting for the clock
        if self.pcm.state() == State::Prepared && self.pcm.delay().is_ok_and(|d| d > 0) {
            self.pcm.start().map_err(|e| self.broken("start before drain", &e))?;
        }
        self.pcm.drain().map_err(|e| self.broken("drain", &e))
    }

    fn pause(&mut self, enable: bool) -> Result<()> {
        // a playback stream that has not crossed its threshold has nothing to pause
        if self.pcm.state() == State::Prepared {
            return Ok(());
        }
        self.pcm
            .pause(enable)
            .map_err(|e| self.broken(if enable { "pause" } else { "resume" }, &e))
    }

    fn prepare(&mut self) -> Result<()> {
        self.pcm.prepare().map_err(|e| self.broken("prepare", &e))
    }

    fn write_frames(&mut self, data: &[u8]) -> Result<IoStatus> {
        let io = self.pcm.io_bytes();
        match io.writei(data) {
            Ok(frames) => Ok(IoStatus::Transferred(frames)),
            Err(e) => self.transfer_failed("write", &e),
        }
    }

    fn read_frames(&mut self, data: &mut [u8]) -> Result<IoStatus> {
        let io = self.pcm.io_bytes();
        match io.readi(data) {
            Ok(frames) => Ok(IoStatus::Transferred(frames)),
            Err(e) => self.transfer_failed("read", &e),
        }
    }

    fn recover(&mut self) -> Result<()> {
        self.pcm.prepare().map_err(|e| self.broken("prepare after xrun", &e))?;
        if self.direction == StreamDirection::Capture {
            self.pcm.start().map_err(|e| self.broken("restart after overrun", &e))?;
        }
        Ok(())
    }

    fn delay(&mut self) -> Result<u64> {
        let frames = self.pcm.delay().map_err(|e| self.broken("delay", &e))?;
        Ok(u64::try_from(frames.max(0)).unwrap_or(0))
    }
}
