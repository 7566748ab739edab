//! WAV playback command.

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use super::common::{Context, frame_bar, interrupt_flag, open_stream};
use clap::Args;
use vsnd_core::{ParamRangeSet, PcmParam, RangeSet, SampleFormat, StreamDirection};

/// Consecutive empty writes tolerated before giving up on the device.
const MAX_STALLED_WRITES: u32 = 100;

#[derive(Args)]
pub struct PlayArgs {
    /// 16-bit PCM WAV file to play
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Output device (defaults to the configured device)
    #[arg(short, long)]
    device: Option<String>,

    /// Hide the progress bar
    #[arg(short, long)]
    quiet: bool,
}

pub fn run(ctx: &Context, args: PlayArgs) -> anyhow::Result<()> {
    let mut reader = hound::WavReader::open(&args.file)?;
    let spec = reader.spec();
    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        anyhow::bail!(
            "{}: only 16-bit integer WAV files are supported (got {}-bit {:?})",
            args.file.display(),
            spec.bits_per_sample,
            spec.sample_format
        );
    }

    let mut data = Vec::with_capacity(reader.len() as usize * 2);
    for sample in reader.samples::<i16>() {
        data.extend_from_slice(&sample?.to_le_bytes());
    }

    let requested = ParamRangeSet::new()
        .with(PcmParam::Rate, RangeSet::single(spec.sample_rate))
        .with(
            PcmParam::Channels,
            RangeSet::single(u32::from(spec.channels)),
        )
        .with(PcmParam::Format, RangeSet::mask(SampleFormat::S16Le.bit()));

    let device = ctx.device(args.device.as_deref());
    let (mut stream, params) = open_stream(ctx, device, StreamDirection::Playback, &requested)?;
    let frame_bytes = params.frame_bytes();
    let total_frames = (data.len() / frame_bytes) as u64;

    if !args.quiet {
        println!("Playing {} on {}", args.file.display(), device);
        println!(
            "  {} frames, {:.1}s ({})",
            total_frames,
            params.frames_to_duration(total_frames).as_secs_f32(),
            params
        );
    }

    let running = interrupt_flag()?;
    let pb = frame_bar(total_frames, args.quiet)?;
    let bar = pb.clone();
    stream.set_progress_callback(move |update| bar.set_position(update.position_frames));
    stream.start()?;

    let chunk_bytes = params.period_frames as usize * frame_bytes;
    let mut offset = 0;
    let mut stalled = 0;
    while offset < data.len() && running.load(Ordering::SeqCst) {
        let end = (offset + chunk_bytes).min(data.len());
        let end = offset + (end - offset) / frame_bytes * frame_bytes;
        if end == offset {
            break;
        }

        let frames = stream.write(&data[offset..end])?;
        if frames == 0 {
            stalled += 1;
            if stalled >= MAX_STALLED_WRITES {
                anyhow::bail!("device '{}' stopped accepting frames", device);
            }
            std::thread::sleep(params.period_duration());
            continue;
        }
        stalled = 0;
        offset += frames * frame_bytes;
    }

    let interrupted = !running.load(Ordering::SeqCst);
    let progress = stream.progress();
    if interrupted {
        stream.stop()?;
    } else {
        stream.drain()?;
    }
    stream.clear_progress_callback();
    pb.finish_and_clear();

    println!(
        "Played {} frames ({} xruns)",
        progress.frames, progress.xruns
    );
    Ok(())
}
