//! PCM sample formats and their wire codes.
//!
//! Formats are identified on the frontend protocol by a stable numeric code;
//! format masks (see [`RangeSet::Mask`](crate::RangeSet::Mask)) use that code
//! as the bit index. Everything here is a pure lookup over static tables.

use std::fmt;

/// A PCM sample encoding.
///
/// The discriminant is the wire code used by the frontend protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum SampleFormat {
    U8 = 0,
    S8 = 1,
    U16Le = 2,
    U16Be = 3,
    S16Le = 4,
    S16Be = 5,
    U24Le = 6,
    U24Be = 7,
    S24Le = 8,
    S24Be = 9,
    U32Le = 10,
    U32Be = 11,
    S32Le = 12,
    S32Be = 13,
    ALaw = 14,
    MuLaw = 15,
    F32Le = 16,
    F32Be = 17,
    F64Le = 18,
    F64Be = 19,
    Iec958SubframeLe = 20,
    Iec958SubframeBe = 21,
}

impl SampleFormat {
    /// Every format, indexed by wire code.
    pub const ALL: [SampleFormat; 22] = [
        Self::U8,
        Self::S8,
        Self::U16Le,
        Self::U16Be,
        Self::S16Le,
        Self::S16Be,
        Self::U24Le,
        Self::U24Be,
        Self::S24Le,
        Self::S24Be,
        Self::U32Le,
        Self::U32Be,
        Self::S32Le,
        Self::S32Be,
        Self::ALaw,
        Self::MuLaw,
        Self::F32Le,
        Self::F32Be,
        Self::F64Le,
        Self::F64Be,
        Self::Iec958SubframeLe,
        Self::Iec958SubframeBe,
    ];

    /// Canonical preference order used when a format must be chosen.
    pub const PRIORITY: [SampleFormat; 22] = [
        Self::S16Le,
        Self::S24Le,
        Self::S32Le,
        Self::F32Le,
        Self::U8,
        Self::S8,
        Self::U16Le,
        Self::U16Be,
        Self::S16Be,
        Self::U24Le,
        Self::U24Be,
        Self::S24Be,
        Self::U32Le,
        Self::U32Be,
        Self::S32Be,
        Self::ALaw,
        Self::MuLaw,
        Self::F32Be,
        Self::F64Le,
        Self::F64Be,
        Self::Iec958SubframeLe,
        Self::Iec958SubframeBe,
    ];

    /// Wire code of this format.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Bit of this format inside a format mask.
    pub const fn bit(self) -> u64 {
        1u64 << self.code()
    }

    /// Looks a format up by wire code.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.get(usize::try_from(code).ok()?).copied()
    }

    /// Bytes one sample occupies in memory (24-bit formats use 4).
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            Self::U8 | Self::S8 | Self::ALaw | Self::MuLaw => 1,
            Self::U16Le | Self::U16Be | Self::S16Le | Self::S16Be => 2,
            Self::U24Le
            | Self::U24Be
            | Self::S24Le
            | Self::S24Be
            | Self::U32Le
            | Self::U32Be
            | Self::S32Le
            | Self::S32Be
            | Self::F32Le
            | Self::F32Be
            | Self::Iec958SubframeLe
            | Self::Iec958SubframeBe => 4,
            Self::F64Le | Self::F64Be => 8,
        }
    }

    /// Canonical upper-case name, e.g. `S16_LE`.
    pub const fn name(self) -> &'static str {
        match self {
            Self::U8 => "U8",
            Self::S8 => "S8",
            Self::U16Le => "U16_LE",
            Self::U16Be => "U16_BE",
            Self::S16Le => "S16_LE",
            Self::S16Be => "S16_BE",
            Self::U24Le => "U24_LE",
            Self::U24Be => "U24_BE",
            Self::S24Le => "S24_LE",
            Self::S24Be => "S24_BE",
            Self::U32Le => "U32_LE",
            Self::U32Be => "U32_BE",
            Self::S32Le => "S32_LE",
            Self::S32Be => "S32_BE",
            Self::ALaw => "A_LAW",
            Self::MuLaw => "MU_LAW",
            Self::F32Le => "F32_LE",
            Self::F32Be => "F32_BE",
            Self::F64Le => "F64_LE",
            Self::F64Be => "F64_BE",
            Self::Iec958SubframeLe => "IEC958_SUBFRAME_LE",
            Self::Iec958SubframeBe => "IEC958_SUBFRAME_BE",
        }
    }

    /// Parses a format name, case-insensitively.
    ///
    /// Accepts the canonical names plus the little-endian shorthands `S16`,
    /// `S24`, `S32`, `U16`, `U24`, `U32`, `F32` and `F64`.
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.trim().to_ascii_uppercase().replace('-', "_");
        let alias = match upper.as_str() {
            "S16" => Some(Self::S16Le),
            "S24" => Some(Self::S24Le),
            "S32" => Some(Self::S32Le),
            "U16" => Some(Self::U16Le),
            "U24" => Some(Self::U24Le),
            "U32" => Some(Self::U32Le),
            "F32" | "FLOAT" => Some(Self::F32Le),
            "F64" => Some(Self::F64Le),
            _ => None,
        };
        alias.or_else(|| Self::ALL.into_iter().find(|f| f.name() == upper))
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Builds a format mask from a list of formats.
pub fn format_mask(formats: impl IntoIterator<Item = SampleFormat>) -> u64 {
    formats.into_iter().fold(0, |mask, f| mask | f.bit())
}

/// Formats present in `mask`, in wire-code order. Unknown bits are ignored.
pub fn formats_in_mask(mask: u64) -> impl Iterator<Item = SampleFormat> {
    SampleFormat::ALL
        .into_iter()
        .filter(move |f| mask & f.bit() != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_index_the_table() {
        for (code, format) in SampleFormat::ALL.iter().enumerate() {
            assert_eq!(usize::from(format.code()), code);
            assert_eq!(SampleFormat::from_code(code as u32), Some(*format));
        }
        assert_eq!(SampleFormat::from_code(22), None);
    }

    #[test]
    fn priority_is_a_permutation() {
        let mut sorted = SampleFormat::PRIORITY;
        sorted.sort();
        assert_eq!(sorted, SampleFormat::ALL);
        assert_eq!(SampleFormat::PRIORITY[0], SampleFormat::S16Le);
    }

    #[test]
    fn widths() {
        assert_eq!(SampleFormat::S16Le.bytes_per_sample(), 2);
        assert_eq!(SampleFormat::S24Le.bytes_per_sample(), 4);
        assert_eq!(SampleFormat::MuLaw.bytes_per_sample(), 1);
        assert_eq!(SampleFormat::F64Be.bytes_per_sample(), 8);
    }

    #[test]
    fn names_round_trip_and_aliases() {
        for format in SampleFormat::ALL {
            assert_eq!(SampleFormat::from_name(format.name()), Some(format));
        }
        assert_eq!(SampleFormat::from_name("s16"), Some(SampleFormat::S16Le));
        assert_eq!(SampleFormat::from_name("s24-le"), Some(SampleFormat::S24Le));
        assert_eq!(SampleFormat::from_name("dsd"), None);
    }

    #[test]
    fn masks() {
        let mask = format_mask([SampleFormat::S16Le, SampleFormat::S24Le]);
        assert_eq!(mask, (1 << 4) | (1 << 8));
        let back: Vec<_> = formats_in_mask(mask | (1 << 40)).collect();
        assert_eq!(back, vec![SampleFormat::S16Le, SampleFormat::S24Le]);
    }
}
