//! Shared CLI helpers used across multiple commands.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::ValueEnum;
use indicatif::{ProgressBar, ProgressStyle};
use vsnd_config::{BackendConfig, default_config_path, find_config};
use vsnd_core::{ParamRangeSet, RangeSet, SampleFormat, StreamDirection, StreamParams, format_mask};
use vsnd_io::{CapabilityNegotiator, MockBackend, PcmBackend, StreamController, ThreadScheduler};

/// Which [`PcmBackend`] implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// In-memory device: playback is buffered in memory, capture yields silence
    Mock,
    /// System ALSA library
    Alsa,
}

impl Default for BackendKind {
    fn default() -> Self {
        if cfg!(all(feature = "alsa", target_os = "linux")) {
            Self::Alsa
        } else {
            Self::Mock
        }
    }
}

/// Stream direction as a command-line value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DirectionArg {
    /// Frames flow to the device
    Playback,
    /// Frames flow from the device
    Capture,
}

impl From<DirectionArg> for StreamDirection {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Playback => StreamDirection::Playback,
            DirectionArg::Capture => StreamDirection::Capture,
        }
    }
}

/// Configuration and backend shared by every command.
pub struct Context {
    pub config: BackendConfig,
    pub backend: Arc<dyn PcmBackend>,
}

impl Context {
    /// Loads configuration and instantiates the backend.
    pub fn new(config_path: Option<&Path>, kind: BackendKind) -> anyhow::Result<Self> {
        Ok(Self {
            config: load_config(config_path)?,
            backend: make_backend(kind)?,
        })
    }

    /// The device to use: the command-line override or the configured one.
    pub fn device<'a>(&'a self, override_name: Option<&'a str>) -> &'a str {
        override_name.unwrap_or(&self.config.device)
    }
}

/// Load the given config, else the default one if it exists, else defaults.
///
/// The given config may be a path or the name of a file in the user config
/// directory (`studio` for `studio.toml`).
pub fn load_config(path: Option<&Path>) -> anyhow::Result<BackendConfig> {
    if let Some(path) = path {
        let resolved = path
            .to_str()
            .and_then(find_config)
            .unwrap_or_else(|| path.to_path_buf());
        return Ok(BackendConfig::load(&resolved)?);
    }
    let default_path = default_config_path();
    if default_path.is_file() {
        tracing::debug!(path = %default_path.display(), "using default config");
        return Ok(BackendConfig::load(&default_path)?);
    }
    Ok(BackendConfig::default())
}

/// Instantiate a backend.
pub fn make_backend(kind: BackendKind) -> anyhow::Result<Arc<dyn PcmBackend>> {
    match kind {
        BackendKind::Mock => Ok(Arc::new(MockBackend::new())),
        #[cfg(all(feature = "alsa", target_os = "linux"))]
        BackendKind::Alsa => Ok(Arc::new(vsnd_io::alsa_backend::AlsaBackend::new())),
        #[cfg(not(all(feature = "alsa", target_os = "linux")))]
        BackendKind::Alsa => {
            anyhow::bail!("ALSA support not built; rebuild with `--features alsa`")
        }
    }
}

/// Parse a range for clap's `value_parser`.
///
/// Accepts `48000`, `44100-48000` or `1,2,6`.
pub fn parse_range(s: &str) -> Result<RangeSet, String> {
    let number = |v: &str| {
        v.trim()
            .parse::<u32>()
            .map_err(|_| format!("Invalid number '{}' in range '{}'", v.trim(), s))
    };

    if let Some((lo, hi)) = s.split_once('-') {
        let (lo, hi) = (number(lo)?, number(hi)?);
        if lo > hi {
            return Err(format!("Invalid range '{}' (minimum above maximum)", s));
        }
        return Ok(RangeSet::interval(lo, hi));
    }
    if s.contains(',') {
        let values = s.split(',').map(number).collect::<Result<Vec<_>, _>>()?;
        return Ok(RangeSet::discrete(values));
    }
    Ok(RangeSet::single(number(s)?))
}

/// Parse a comma-separated list of sample formats into a format mask.
pub fn parse_formats(s: &str) -> Result<RangeSet, String> {
    let formats = s
        .split(',')
        .map(|name| {
            SampleFormat::from_name(name.trim())
                .ok_or_else(|| format!("Unknown sample format '{}'", name.trim()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RangeSet::mask(format_mask(formats)))
}

/// Negotiates `requested` on `device`, picks concrete values with the
/// configured defaults and opens a stream with them.
pub fn open_stream(
    ctx: &Context,
    device: &str,
    direction: StreamDirection,
    requested: &ParamRangeSet,
) -> anyhow::Result<(StreamController, StreamParams)> {
    let negotiator = CapabilityNegotiator::new(Arc::clone(&ctx.backend), device, direction);
    let outcome = negotiator.query_ranges(requested)?;
    if !outcome.is_ok() {
        let rejected: Vec<String> = outcome.rejected.iter().map(ToString::to_string).collect();
        anyhow::bail!(
            "device '{}' cannot satisfy the request (rejected: {})",
            device,
            rejected.join(", ")
        );
    }
    let Some(params) = outcome.pick(&ctx.config.defaults) else {
        anyhow::bail!("no concrete parameters fit the negotiated ranges");
    };

    let mut stream = StreamController::new(
        Arc::clone(&ctx.backend),
        device,
        direction,
        Arc::new(ThreadScheduler::new()),
    )
    .with_progress_interval(ctx.config.progress_interval());
    stream.open(params)?;
    Ok((stream, params))
}

/// Progress bar counting frames, or a hidden one when `quiet`.
pub fn frame_bar(total_frames: u64, quiet: bool) -> anyhow::Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new(total_frames);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} frames ({eta})")?
            .progress_chars("##-"),
    );
    Ok(pb)
}

/// Installs a Ctrl+C handler and returns the flag it clears.
pub fn interrupt_flag() -> anyhow::Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        eprintln!("\nStopping...");
        r.store(false, Ordering::SeqCst);
    })?;
    Ok(running)
}
