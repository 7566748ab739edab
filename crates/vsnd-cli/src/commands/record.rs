//! WAV capture command.

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use super::common::{Context, frame_bar, interrupt_flag, open_stream};
use clap::Args;
use vsnd_core::{ParamRangeSet, PcmParam, RangeSet, SampleFormat, StreamDirection};

/// Consecutive empty reads tolerated before giving up on the device.
const MAX_STALLED_READS: u32 = 100;

#[derive(Args)]
pub struct RecordArgs {
    /// Output WAV file
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Input device (defaults to the configured device)
    #[arg(short, long)]
    device: Option<String>,

    /// Seconds to record
    #[arg(short, long, default_value = "5.0")]
    seconds: f64,

    /// Sample rate (defaults to the configured rate)
    #[arg(short, long)]
    rate: Option<u32>,

    /// Channel count (defaults to the configured channel count)
    #[arg(short, long)]
    channels: Option<u16>,

    /// Hide the progress bar
    #[arg(short, long)]
    quiet: bool,
}

pub fn run(ctx: &Context, args: RecordArgs) -> anyhow::Result<()> {
    if !args.seconds.is_finite() || args.seconds <= 0.0 {
        anyhow::bail!("--seconds must be positive (got {})", args.seconds);
    }

    let rate = args.rate.unwrap_or(ctx.config.defaults.rate);
    let channels = args
        .channels
        .map_or(ctx.config.defaults.channels, u32::from);
    let requested = ParamRangeSet::new()
        .with(PcmParam::Rate, RangeSet::single(rate))
        .with(PcmParam::Channels, RangeSet::single(channels))
        .with(PcmParam::Format, RangeSet::mask(SampleFormat::S16Le.bit()));

    let device = ctx.device(args.device.as_deref());
    let (mut stream, params) = open_stream(ctx, device, StreamDirection::Capture, &requested)?;
    let frame_bytes = params.frame_bytes();
    let total_frames = (args.seconds * f64::from(params.rate)).round() as u64;

    let spec = hound::WavSpec {
        channels: params.channels as u16,
        sample_rate: params.rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&args.file, spec)?;

    if !args.quiet {
        println!(
            "Recording {:.1}s from {} into {}",
            args.seconds,
            device,
            args.file.display()
        );
        println!("  {}", params);
    }

    let running = interrupt_flag()?;
    let pb = frame_bar(total_frames, args.quiet)?;
    let bar = pb.clone();
    stream.set_progress_callback(move |update| bar.set_position(update.position_frames));
    stream.start()?;

    let mut buffer = vec![0u8; params.period_frames as usize * frame_bytes];
    let mut captured: u64 = 0;
    let mut stalled = 0;
    while captured < total_frames && running.load(Ordering::SeqCst) {
        let want = (total_frames - captured).min(u64::from(params.period_frames)) as usize;
        let frames = stream.read(&mut buffer[..want * frame_bytes])?;
        if frames == 0 {
            stalled += 1;
            if stalled >= MAX_STALLED_READS {
                anyhow::bail!("device '{}' stopped delivering frames", device);
            }
            continue;
        }
        stalled = 0;
        for pair in buffer[..frames * frame_bytes].chunks_exact(2) {
            writer.write_sample(i16::from_le_bytes([pair[0], pair[1]]))?;
        }
        captured += frames as u64;
    }

    let progress = stream.progress();
    stream.stop()?;
    stream.clear_progress_callback();
    writer.finalize()?;
    pb.finish_and_clear();

    println!(
        "Recorded {} frames ({} xruns) to {}",
        captured,
        progress.xruns,
        args.file.display()
    );
    Ok(())
}
