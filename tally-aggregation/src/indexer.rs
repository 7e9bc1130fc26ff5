//! Bucket indexing for base-2 exponential histograms.
//!
//! At scale `s` the bucket boundaries are the integer powers of `base = 2^(2^-s)`,
//! and bucket `i` holds the magnitudes in `(base^i, base^(i+1)]`. Every boundary at
//! a coarser scale is also a boundary at every finer scale, which gives the rescale
//! law used when a histogram downscales:
//!
//! ```text
//! index(v, s) >> (s - s') == index(v, s')    for all s' < s
//! ```

use std::f64::consts::LOG2_E;

use tally_core::{ConfigError, MAX_SCALE, MIN_SCALE};

const SIGNIFICAND_WIDTH: u32 = 52;
const EXPONENT_WIDTH: i32 = 11;
const EXPONENT_BIAS: i32 = 1023;
const SIGNIFICAND_MASK: u64 = (1 << SIGNIFICAND_WIDTH) - 1;
const EXPONENT_MASK: u64 = 0x7FF0_0000_0000_0000;
/// Exponent of the smallest subnormal, 2^-1074
const MIN_SUBNORMAL_EXPONENT: i32 = -(EXPONENT_BIAS + SIGNIFICAND_WIDTH as i32 - 1);

/// Maps magnitudes to bucket indices at one scale.
///
/// # Example
///
/// ```
/// use tally_aggregation::Base2ExponentialHistogramIndexer;
///
/// let indexer = Base2ExponentialHistogramIndexer::new(0).unwrap();
/// // (2, 4] is bucket 1 at scale 0
/// assert_eq!(indexer.compute_index(3.0), 1);
/// assert_eq!(indexer.compute_index(4.0), 1);
/// assert_eq!(indexer.compute_index(4.5), 2);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Base2ExponentialHistogramIndexer {
    scale: i32,
    scale_factor: f64,
}

impl Base2ExponentialHistogramIndexer {
    /// Indexer for `scale`, which must be within `MIN_SCALE..=MAX_SCALE`
    pub fn new(scale: i32) -> Result<Self, ConfigError> {
        if !(MIN_SCALE..=MAX_SCALE).contains(&scale) {
            return Err(ConfigError::ScaleOutOfRange { scale });
        }
        Ok(Self {
            scale,
            scale_factor: scale_factor(scale),
        })
    }

    /// Indexer at [`MAX_SCALE`], the finest resolution
    pub fn finest() -> Self {
        Self {
            scale: MAX_SCALE,
            scale_factor: scale_factor(MAX_SCALE),
        }
    }

    /// The scale this indexer maps at
    pub fn scale(&self) -> i32 {
        self.scale
    }

    /// Bucket index of `|value|`.
    ///
    /// `value` must be finite and non-zero; zeros belong to the zero bucket and
    /// callers are expected to filter them out first.
    pub fn compute_index(&self, value: f64) -> i32 {
        let magnitude = value.abs();
        match self.scale {
            s if s > 0 => self.index_by_logarithm(magnitude),
            0 => map_to_index_scale_zero(magnitude),
            s => map_to_index_scale_zero(magnitude) >> -s,
        }
    }

    /// Indexer for the coarser `scale`, clamped at [`MIN_SCALE`]
    pub(crate) fn downscaled_to(self, scale: i32) -> Self {
        let scale = scale.clamp(MIN_SCALE, self.scale);
        Self {
            scale,
            scale_factor: scale_factor(scale),
        }
    }

    fn index_by_logarithm(&self, magnitude: f64) -> i32 {
        // powers of two sit exactly on a boundary, where ln() may round either way
        if let Some(exponent) = exact_power_of_two(magnitude) {
            return (exponent << self.scale) - 1;
        }
        let index = ((magnitude.ln() * self.scale_factor).ceil() - 1.0) as i32;
        // rounding in ln() must not carry a value across a power of two
        let octave = map_to_index_scale_zero(magnitude);
        index.clamp(octave << self.scale, ((octave + 1) << self.scale) - 1)
    }
}

/// `log2(e) * 2^scale`, the factor turning a natural log into a bucket position.
pub fn scale_factor(scale: i32) -> f64 {
    LOG2_E * 2f64.powi(scale)
}

/// Scale-zero bucket index of a positive magnitude, read straight from its IEEE-754
/// bits instead of computing a logarithm.
///
/// Equal to `ceil(log2(magnitude)) - 1` for every finite positive double.
pub fn map_to_index_scale_zero(magnitude: f64) -> i32 {
    let raw = magnitude.to_bits();
    let mut raw_exponent = ((raw & EXPONENT_MASK) >> SIGNIFICAND_WIDTH) as i32;
    let raw_significand = raw & SIGNIFICAND_MASK;
    if raw_exponent == 0 {
        // subnormal: normalize using the position of the leading significand bit
        raw_exponent -=
            raw_significand.wrapping_sub(1).leading_zeros() as i32 - EXPONENT_WIDTH - 1;
    }
    let ieee_exponent = raw_exponent - EXPONENT_BIAS;
    if raw_significand == 0 {
        ieee_exponent - 1
    } else {
        ieee_exponent
    }
}

/// `Some(k)` when `magnitude == 2^k`
fn exact_power_of_two(magnitude: f64) -> Option<i32> {
    let raw = magnitude.to_bits();
    let raw_exponent = ((raw & EXPONENT_MASK) >> SIGNIFICAND_WIDTH) as i32;
    let raw_significand = raw & SIGNIFICAND_MASK;
    match (raw_exponent, raw_significand) {
        (0, s) if s.is_power_of_two() => Some(MIN_SUBNORMAL_EXPONENT + s.trailing_zeros() as i32),
        (0, _) => None,
        (e, 0) => Some(e - EXPONENT_BIAS),
        _ => None,
    }
}
