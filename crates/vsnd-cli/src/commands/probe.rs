//! Capability negotiation command.

use std::sync::Arc;

use super::common::{Context, DirectionArg, parse_formats, parse_range};
use clap::Args;
use vsnd_core::{ParamRangeSet, PcmParam, RangeSet, StreamDirection, formats_in_mask};
use vsnd_io::CapabilityNegotiator;

#[derive(Args)]
pub struct ProbeArgs {
    /// Device to query (defaults to the configured device)
    #[arg(short, long)]
    device: Option<String>,

    /// Stream direction (defaults to the configured direction)
    #[arg(long, value_enum)]
    direction: Option<DirectionArg>,

    /// Sample rate: a value, a range (44100-48000) or a list (44100,48000)
    #[arg(long, value_parser = parse_range)]
    rate: Option<RangeSet>,

    /// Channel count, range or list
    #[arg(long, value_parser = parse_range)]
    channels: Option<RangeSet>,

    /// Buffer size in frames
    #[arg(long, value_parser = parse_range)]
    buffer: Option<RangeSet>,

    /// Period size in frames
    #[arg(long, value_parser = parse_range)]
    period: Option<RangeSet>,

    /// Sample formats, comma separated (e.g. "S16_LE,S24_LE")
    #[arg(long, value_parser = parse_formats)]
    format: Option<RangeSet>,

    /// Print the result as JSON instead of a table
    #[arg(long)]
    json: bool,
}

pub fn run(ctx: &Context, args: ProbeArgs) -> anyhow::Result<()> {
    let device = ctx.device(args.device.as_deref());
    let direction = args
        .direction
        .map_or(ctx.config.direction, StreamDirection::from);

    let mut requested = ParamRangeSet::new();
    let given = [
        (PcmParam::Rate, args.rate),
        (PcmParam::Buffer, args.buffer),
        (PcmParam::Channels, args.channels),
        (PcmParam::Period, args.period),
        (PcmParam::Format, args.format),
    ];
    for (param, range) in given {
        if let Some(range) = range {
            requested.set(param, range);
        }
    }

    let negotiator = CapabilityNegotiator::new(Arc::clone(&ctx.backend), device, direction);
    let outcome = negotiator.query_ranges(&requested)?;

    if args.json {
        let report = serde_json::json!({
            "device": device,
            "direction": direction,
            "backend": ctx.backend.name(),
            "requested": requested,
            "response": outcome.response,
            "rejected": outcome.rejected,
            "params": outcome.pick(&ctx.config.defaults),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        if !outcome.is_ok() {
            anyhow::bail!("not satisfiable");
        }
        return Ok(());
    }

    let backend = ctx.backend.name();
    println!("Device:    {} ({}, {})", device, direction, backend);
    println!();
    println!("{:<10} {:<24} Response", "Parameter", "Requested");
    println!("{}", "-".repeat(60));
    for param in PcmParam::NEGOTIATION_ORDER {
        let asked = requested
            .get(param)
            .map_or_else(|| "any".to_string(), |r| describe(param, r));
        let answer = outcome
            .response
            .get(param)
            .map_or_else(|| "any".to_string(), |r| describe(param, r));
        println!("{:<10} {:<24} {}", param, asked, answer);
    }
    println!();

    if !outcome.is_ok() {
        let rejected: Vec<&str> = outcome.rejected.iter().map(|p| p.name()).collect();
        anyhow::bail!("not satisfiable: {} rejected", rejected.join(", "));
    }

    println!("Satisfiable.");
    if let Some(params) = outcome.pick(&ctx.config.defaults) {
        println!("Would open: {}", params);
    }
    Ok(())
}

/// Human-readable range, listing format names for format masks.
fn describe(param: PcmParam, range: &RangeSet) -> String {
    if range.is_empty() {
        return "none".to_string();
    }
    match (param, range) {
        (PcmParam::Format, RangeSet::Mask(bits)) => formats_in_mask(*bits)
            .map(|f| f.name())
            .collect::<Vec<_>>()
            .join(","),
        _ => range.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsnd_core::{SampleFormat, format_mask};

    #[test]
    fn describe_names_formats() {
        let mask = RangeSet::mask(format_mask([SampleFormat::S16Le, SampleFormat::S24Le]));
        assert_eq!(describe(PcmParam::Format, &mask), "S16_LE,S24_LE");
        assert_eq!(describe(PcmParam::Format, &RangeSet::Mask(0)), "none");
        let rate = RangeSet::interval(8000, 48000);
        assert_eq!(describe(PcmParam::Rate, &rate), "[8000..48000]");
        assert_eq!(describe(PcmParam::Channels, &RangeSet::Empty), "none");
    }
}
