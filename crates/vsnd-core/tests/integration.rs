//! Integration tests for vsnd-core.
//!
//! Exercises ranges, formats and parameter selection together the way the
//! negotiation layer uses them.

use vsnd_core::{
    ParamRangeSet, PcmParam, RangeSet, SampleFormat, StreamDefaults, StreamParams, format_mask,
    formats_in_mask,
};

fn hardware() -> ParamRangeSet {
    ParamRangeSet::new()
        .with(PcmParam::Rate, RangeSet::interval(8000, 48000))
        .with(PcmParam::Buffer, RangeSet::interval(64, 65536))
        .with(PcmParam::Channels, RangeSet::discrete([1, 2]))
        .with(PcmParam::Period, RangeSet::interval(32, 16384))
        .with(
            PcmParam::Format,
            RangeSet::mask(format_mask([SampleFormat::S16Le, SampleFormat::S24Le])),
        )
}

/// Intersects every parameter by hand, the way a negotiator would.
fn refine(requested: &ParamRangeSet, hw: &ParamRangeSet) -> ParamRangeSet {
    let mut out = ParamRangeSet::new();
    for param in PcmParam::NEGOTIATION_ORDER {
        let hw_range = hw.get(param).cloned().unwrap_or(RangeSet::Empty);
        let refined = match requested.get(param) {
            Some(req) => req.intersect(&hw_range),
            None => hw_range,
        };
        out.set(param, refined);
    }
    out
}

#[test]
fn stereo_s16_request_refines_to_request() {
    let requested = ParamRangeSet::new()
        .with(PcmParam::Rate, RangeSet::interval(44100, 48000))
        .with(PcmParam::Channels, RangeSet::discrete([2]))
        .with(PcmParam::Format, RangeSet::mask(SampleFormat::S16Le.bit()));

    let response = refine(&requested, &hardware());
    assert_eq!(response.rate, Some(RangeSet::interval(44100, 48000)));
    assert_eq!(response.channels, Some(RangeSet::discrete([2])));
    assert_eq!(
        response.format,
        Some(RangeSet::mask(SampleFormat::S16Le.bit()))
    );
    assert!(response.empty_params().is_empty());

    let params = StreamParams::from_ranges(&response, &StreamDefaults::default()).unwrap();
    assert_eq!(
        params,
        StreamParams {
            rate: 48000,
            channels: 2,
            format: SampleFormat::S16Le,
            buffer_frames: 16384,
            period_frames: 4096,
        }
    );
}

#[test]
fn six_channels_cannot_be_met() {
    let requested = ParamRangeSet::new().with(PcmParam::Channels, RangeSet::discrete([6]));
    let response = refine(&requested, &hardware());
    assert_eq!(response.empty_params(), vec![PcmParam::Channels]);
    assert!(StreamParams::from_ranges(&response, &StreamDefaults::default()).is_none());
}

#[test]
fn wildcard_request_passes_hardware_through() {
    let response = refine(&ParamRangeSet::new(), &hardware());
    assert_eq!(response, hardware());
}

#[test]
fn preferred_format_falls_back_through_priority() {
    let defaults = StreamDefaults {
        format: SampleFormat::F32Le,
        ..StreamDefaults::default()
    };
    let response = refine(&ParamRangeSet::new(), &hardware());
    let params = StreamParams::from_ranges(&response, &defaults).unwrap();
    assert_eq!(params.format, SampleFormat::S16Le);

    let top = response.format.unwrap().max().map_or(0, |b| 1 << b);
    let offered: Vec<_> = formats_in_mask(top).collect();
    assert_eq!(offered, vec![SampleFormat::S24Le]);
}

#[test]
fn byte_accounting_follows_format_width() {
    let params = StreamParams {
        rate: 44100,
        channels: 6,
        format: SampleFormat::S24Le,
        buffer_frames: 8192,
        period_frames: 1024,
    };
    assert_eq!(params.frame_bytes(), 24);
    let period = u64::from(params.period_frames);
    assert_eq!(params.frames_to_bytes(period), 24 * 1024);
    assert_eq!(params.bytes_to_frames(24 * 1024 + 23), 1024);
}
