//! Acceptable value domains for PCM parameters.
//!
//! A [`RangeSet`] describes every value a party (frontend or hardware) accepts
//! for one stream parameter. Three shapes cover what sound hardware reports:
//!
//! - **Interval**: closed `[min, max]` with an optional step (sample rates,
//!   buffer and period sizes)
//! - **Discrete**: an explicit set of values (channel layouts a frontend offers)
//! - **Mask**: a bitmask of enumerated options (sample formats, bit `n` is the
//!   format with wire code `n`)
//!
//! Intersection never fails. An empty intersection is the [`RangeSet::Empty`]
//! value, which negotiation reports as data.
//!
//! ## Default selection
//!
//! [`RangeSet::pick_default`] is deterministic:
//!
//! - intervals pick the value nearest the requested default, clamped into the
//!   range and snapped onto the step grid (ties go to the lower value)
//! - discrete sets pick their smallest member
//! - masks pick their lowest set bit
//!
//! [`RangeSet::pick_default_by`] lets a priority list override the discrete
//! and mask rules.
//!
//! ```rust
//! use vsnd_core::RangeSet;
//!
//! let hw = RangeSet::interval(8000, 48000);
//! let req = RangeSet::interval(44100, 96000);
//! let both = hw.intersect(&req);
//!
//! assert_eq!(both, RangeSet::interval(44100, 48000));
//! assert_eq!(both.pick_default(96000), Some(48000));
//! assert!(RangeSet::discrete([6]).intersect(&RangeSet::discrete([1, 2])).is_empty());
//! ```

use std::collections::BTreeSet;
use std::fmt;

/// A set of acceptable values for one stream parameter.
///
/// Build values through the constructors ([`interval`](Self::interval),
/// [`stepped`](Self::stepped), [`discrete`](Self::discrete),
/// [`mask`](Self::mask)); they normalize degenerate input to
/// [`Empty`](Self::Empty) so that equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RangeSet {
    /// No acceptable value.
    Empty,
    /// Every `min + k * step` within `[min, max]`.
    Interval {
        /// Lowest accepted value.
        min: u32,
        /// Highest accepted value, on the step grid.
        max: u32,
        /// Grid spacing, at least 1.
        step: u32,
    },
    /// An explicit set of values.
    Discrete(BTreeSet<u32>),
    /// Bitmask of enumerated options; bit `n` accepts value `n`.
    Mask(u64),
}

impl RangeSet {
    /// Closed interval `[min, max]` with unit step.
    pub fn interval(min: u32, max: u32) -> Self {
        Self::stepped(min, max, 1)
    }

    /// Closed interval `[min, max]` restricted to `min + k * step`.
    pub fn stepped(min: u32, max: u32, step: u32) -> Self {
        let step = step.max(1);
        if min > max {
            return Self::Empty;
        }
        let max = min + (max - min) / step * step;
        let step = if min == max { 1 } else { step };
        Self::Interval { min, max, step }
    }

    /// A single accepted value.
    pub fn single(value: u32) -> Self {
        Self::interval(value, value)
    }

    /// Explicit set of values.
    pub fn discrete(values: impl IntoIterator<Item = u32>) -> Self {
        let set: BTreeSet<u32> = values.into_iter().collect();
        if set.is_empty() {
            Self::Empty
        } else {
            Self::Discrete(set)
        }
    }

    /// Bitmask of enumerated options.
    pub fn mask(bits: u64) -> Self {
        if bits == 0 {
            Self::Empty
        } else {
            Self::Mask(bits)
        }
    }

    /// Returns `true` if no value is accepted.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Interval { min, max, .. } => min > max,
            Self::Discrete(set) => set.is_empty(),
            Self::Mask(bits) => *bits == 0,
        }
    }

    /// Returns `true` if `value` is accepted.
    pub fn contains(&self, value: u32) -> bool {
        match self {
            Self::Empty => false,
            Self::Interval { min, max, step } => {
                value >= *min && value <= *max && (value - min) % (*step).max(1) == 0
            }
            Self::Discrete(set) => set.contains(&value),
            Self::Mask(bits) => value < 64 && bits & (1u64 << value) != 0,
        }
    }

    /// Lowest accepted value.
    pub fn min(&self) -> Option<u32> {
        if self.is_empty() {
            return None;
        }
        match self {
            Self::Empty => None,
            Self::Interval { min, .. } => Some(*min),
            Self::Discrete(set) => set.first().copied(),
            Self::Mask(bits) => Some(bits.trailing_zeros()),
        }
    }

    /// Highest accepted value.
    pub fn max(&self) -> Option<u32> {
        if self.is_empty() {
            return None;
        }
        match self {
            Self::Empty => None,
            Self::Interval { max, .. } => Some(*max),
            Self::Discrete(set) => set.last().copied(),
            Self::Mask(bits) => Some(63 - bits.leading_zeros()),
        }
    }

    /// Values accepted by both `self` and `other`.
    ///
    /// The operation is commutative and the result is normalized. Masks
    /// intersected with numeric sets treat the numbers as bit indices.
    pub fn intersect(&self, other: &RangeSet) -> RangeSet {
        if self.is_empty() || other.is_empty() {
            return Self::Empty;
        }
        match (self, other) {
            (Self::Empty, _) | (_, Self::Empty) => Self::Empty,
            (
                Self::Interval {
                    min: a_min,
                    max: a_max,
                    step: a_step,
                },
                Self::Interval {
                    min: b_min,
                    max: b_max,
                    step: b_step,
                },
            ) => intersect_intervals((*a_min, *a_max, *a_step), (*b_min, *b_max, *b_step)),
            (iv @ Self::Interval { .. }, Self::Discrete(set))
            | (Self::Discrete(set), iv @ Self::Interval { .. }) => {
                Self::discrete(set.iter().copied().filter(|v| iv.contains(*v)))
            }
            (Self::Discrete(a), Self::Discrete(b)) => Self::discrete(a.intersection(b).copied()),
            (Self::Mask(a), Self::Mask(b)) => Self::mask(a & b),
            (Self::Mask(bits), numeric) | (numeric, Self::Mask(bits)) => {
                let kept = (0..64u32)
                    .filter(|bit| bits & (1u64 << bit) != 0 && numeric.contains(*bit))
                    .fold(0u64, |acc, bit| acc | (1u64 << bit));
                Self::mask(kept)
            }
        }
    }

    /// Picks one accepted value, preferring `default`.
    ///
    /// Returns `None` when the set is empty. See the module docs for the
    /// policy per shape.
    pub fn pick_default(&self, default: u32) -> Option<u32> {
        if self.is_empty() {
            return None;
        }
        match self {
            Self::Empty => None,
            Self::Interval { min, max, step } => Some(nearest_on_grid(*min, *max, *step, default)),
            Self::Discrete(set) => set.first().copied(),
            Self::Mask(bits) => Some(bits.trailing_zeros()),
        }
    }

    /// Like [`pick_default`](Self::pick_default), but discrete sets and masks
    /// return the first entry of `priority` they accept.
    pub fn pick_default_by(&self, default: u32, priority: &[u32]) -> Option<u32> {
        match self {
            Self::Discrete(_) | Self::Mask(_) => priority
                .iter()
                .copied()
                .find(|v| self.contains(*v))
                .or_else(|| self.pick_default(default)),
            _ => self.pick_default(default),
        }
    }
}

impl fmt::Display for RangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "∅"),
            Self::Interval { min, max, step } if *step > 1 => {
                write!(f, "[{}..{}/{}]", min, max, step)
            }
            Self::Interval { min, max, .. } => write!(f, "[{}..{}]", min, max),
            Self::Discrete(set) => {
                write!(f, "{{")?;
                for (i, v) in set.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "}}")
            }
            Self::Mask(bits) => write!(f, "mask({:#x})", bits),
        }
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Overlap of two stepped intervals, keeping only values on both grids.
fn intersect_intervals(a: (u32, u32, u32), b: (u32, u32, u32)) -> RangeSet {
    let (a_min, a_max, a_step) = (a.0, a.1, a.2.max(1));
    let (b_min, b_max, b_step) = (b.0, b.1, b.2.max(1));
    let lo = a_min.max(b_min);
    let hi = a_max.min(b_max);
    if lo > hi {
        return RangeSet::Empty;
    }
    if a_step == 1 && b_step == 1 {
        return RangeSet::interval(lo, hi);
    }

    // Common points solve x = a_min (mod a_step) and x = b_min (mod b_step).
    let (a_min, b_min) = (i128::from(a_min), i128::from(b_min));
    let (a_step, b_step) = (i128::from(a_step), i128::from(b_step));
    let g = i128::from(gcd(a_step as u64, b_step as u64));
    let diff = b_min - a_min;
    if diff.rem_euclid(g) != 0 {
        return RangeSet::Empty;
    }
    let m = b_step / g;
    let inverse = mod_inverse((a_step / g).rem_euclid(m), m);
    let k = ((diff / g).rem_euclid(m) * inverse).rem_euclid(m);
    let step = a_step / g * b_step;
    let residue = (a_min + a_step * k).rem_euclid(step);

    let (lo, hi) = (i128::from(lo), i128::from(hi));
    let first = lo + (residue - lo).rem_euclid(step);
    if first > hi {
        return RangeSet::Empty;
    }
    if step > hi - first {
        RangeSet::single(first as u32)
    } else {
        RangeSet::stepped(first as u32, hi as u32, step as u32)
    }
}

/// Inverse of `a` modulo `m` for coprime `a` and `m`.
fn mod_inverse(a: i128, m: i128) -> i128 {
    let (mut old_r, mut r) = (a, m);
    let (mut old_s, mut s) = (1i128, 0i128);
    while r != 0 {
        let q = old_r / r;
        (old_r, r) = (r, old_r - q * r);
        (old_s, s) = (s, old_s - q * s);
    }
    old_s.rem_euclid(m)
}

fn nearest_on_grid(min: u32, max: u32, step: u32, target: u32) -> u32 {
    let step = step.max(1);
    let clamped = target.clamp(min, max);
    let lower = min + (clamped - min) / step * step;
    match lower.checked_add(step) {
        Some(upper) if upper <= max && upper - clamped < clamped - lower => upper,
        _ => lower,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_normalize_degenerate_input() {
        assert_eq!(RangeSet::interval(10, 5), RangeSet::Empty);
        assert_eq!(RangeSet::discrete([]), RangeSet::Empty);
        assert_eq!(RangeSet::mask(0), RangeSet::Empty);
        assert_eq!(
            RangeSet::stepped(0, 10, 4),
            RangeSet::Interval {
                min: 0,
                max: 8,
                step: 4
            }
        );
        assert_eq!(RangeSet::stepped(7, 9, 5), RangeSet::single(7));
    }

    #[test]
    fn interval_overlap() {
        let hw = RangeSet::interval(8000, 48000);
        assert_eq!(
            hw.intersect(&RangeSet::interval(44100, 48000)),
            RangeSet::interval(44100, 48000)
        );
        assert!(hw.intersect(&RangeSet::interval(96000, 192000)).is_empty());
    }

    #[test]
    fn stepped_intervals_share_lcm_grid() {
        let a = RangeSet::stepped(0, 100, 4);
        let b = RangeSet::stepped(2, 100, 6);
        let both = a.intersect(&b);
        assert_eq!(
            both,
            RangeSet::Interval {
                min: 8,
                max: 92,
                step: 12
            }
        );
        assert!(both.contains(20));
        assert!(!both.contains(24));
    }

    #[test]
    fn stepped_intervals_without_common_point_are_empty() {
        let even = RangeSet::stepped(0, 100, 2);
        let odd = RangeSet::stepped(1, 99, 2);
        assert!(even.intersect(&odd).is_empty());
    }

    #[test]
    fn wide_grids_intersect_in_either_order() {
        let dense = RangeSet::interval(1, u32::MAX);
        let sparse = RangeSet::stepped(0, u32::MAX, 4_000_000_000);
        assert_eq!(dense.intersect(&sparse), RangeSet::single(4_000_000_000));
        assert_eq!(sparse.intersect(&dense), RangeSet::single(4_000_000_000));

        let a = RangeSet::stepped(0, u32::MAX, 65_537);
        let b = RangeSet::stepped(3, u32::MAX, 65_521);
        assert_eq!(a.intersect(&b), RangeSet::single(3_488_927_732));
        assert_eq!(b.intersect(&a), RangeSet::single(3_488_927_732));
    }

    #[test]
    fn discrete_filters_against_interval() {
        let channels = RangeSet::discrete([1, 2, 6]);
        let hw = RangeSet::interval(1, 2);
        assert_eq!(channels.intersect(&hw), RangeSet::discrete([1, 2]));
        assert_eq!(hw.intersect(&channels), RangeSet::discrete([1, 2]));
        assert!(RangeSet::discrete([6]).intersect(&hw).is_empty());
    }

    #[test]
    fn masks_and_numeric_sets() {
        let hw = RangeSet::mask(0b1_0001_0000);
        let low = RangeSet::mask(0b1_0000);
        assert_eq!(hw.intersect(&RangeSet::mask(0b1_0000)), low);
        assert_eq!(hw.intersect(&RangeSet::discrete([4, 5])), low);
        assert_eq!(RangeSet::interval(0, 7).intersect(&hw), low);
    }

    #[test]
    fn pick_default_policies() {
        let rates = RangeSet::interval(8000, 48000);
        assert_eq!(rates.pick_default(96000), Some(48000));
        assert_eq!(rates.pick_default(100), Some(8000));
        assert_eq!(RangeSet::stepped(0, 100, 10).pick_default(44), Some(40));
        assert_eq!(RangeSet::stepped(0, 100, 10).pick_default(46), Some(50));
        assert_eq!(RangeSet::stepped(0, 100, 10).pick_default(45), Some(40));
        assert_eq!(RangeSet::discrete([6, 2, 4]).pick_default(4), Some(2));
        assert_eq!(RangeSet::mask(0b1100).pick_default(0), Some(2));
        assert_eq!(RangeSet::Empty.pick_default(1), None);
    }

    #[test]
    fn pick_default_by_priority() {
        let channels = RangeSet::discrete([1, 2]);
        assert_eq!(channels.pick_default_by(2, &[2]), Some(2));
        assert_eq!(channels.pick_default_by(6, &[6]), Some(1));
        let formats = RangeSet::mask((1 << 4) | (1 << 8));
        assert_eq!(formats.pick_default_by(0, &[8, 4]), Some(8));
        assert_eq!(
            RangeSet::interval(1, 8).pick_default_by(2, &[8]),
            Some(2),
            "intervals ignore the priority list"
        );
    }

    #[test]
    fn bounds() {
        assert_eq!(RangeSet::mask(0b1010).min(), Some(1));
        assert_eq!(RangeSet::mask(0b1010).max(), Some(3));
        assert_eq!(RangeSet::discrete([3, 9]).max(), Some(9));
        assert_eq!(RangeSet::Empty.min(), None);
    }

    #[test]
    fn display() {
        assert_eq!(RangeSet::interval(1, 2).to_string(), "[1..2]");
        assert_eq!(RangeSet::stepped(0, 8, 4).to_string(), "[0..8/4]");
        assert_eq!(RangeSet::discrete([2, 1]).to_string(), "{1,2}");
        assert_eq!(RangeSet::mask(0x10).to_string(), "mask(0x10)");
        assert_eq!(RangeSet::Empty.to_string(), "∅");
    }
}
