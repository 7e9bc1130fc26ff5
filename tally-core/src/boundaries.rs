// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use crate::ConfigError;

/// Boundaries used when neither a view nor the instrument advises any.
pub const DEFAULT_BOUNDARIES: [f64; 15] = [
    0.0, 5.0, 10.0, 25.0, 50.0, 75.0, 100.0, 250.0, 500.0, 750.0, 1000.0, 2500.0, 5000.0,
    7500.0, 10000.0,
];

/// Validated upper bounds of an explicit bucket histogram.
///
/// `n` boundaries partition the real line into `n + 1` buckets:
/// `(-inf, b0], (b0, b1], ..., (b(n-1), +inf)`. The boundaries are finite and
/// strictly increasing; this is checked once in [`ExplicitBucketBoundaries::new`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ExplicitBucketBoundaries(Arc<[f64]>);

impl ExplicitBucketBoundaries {
    /// Validate `boundaries`
    pub fn new(boundaries: impl Into<Vec<f64>>) -> Result<Self, ConfigError> {
        let boundaries = boundaries.into();
        for (index, &value) in boundaries.iter().enumerate() {
            if !value.is_finite() {
                return Err(ConfigError::NonFiniteBoundary { index, value });
            }
            if index > 0 && boundaries[index - 1] >= value {
                return Err(ConfigError::NonIncreasingBoundaries {
                    index,
                    previous: boundaries[index - 1],
                    current: value,
                });
            }
        }
        Ok(Self(boundaries.into()))
    }

    /// The default boundary set, see [`DEFAULT_BOUNDARIES`].
    pub fn default_boundaries() -> Self {
        Self(Arc::from(DEFAULT_BOUNDARIES.as_slice()))
    }

    /// The boundaries themselves
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Number of buckets, which is one more than the number of boundaries.
    pub fn bucket_count(&self) -> usize {
        self.0.len() + 1
    }

    /// Index of the bucket `value` falls into: the first boundary `>= value`, or the
    /// overflow bucket past the last boundary.
    pub fn bucket_index(&self, value: f64) -> usize {
        self.0.partition_point(|&boundary| boundary < value)
    }
}

impl Default for ExplicitBucketBoundaries {
    fn default() -> Self {
        Self::default_boundaries()
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for ExplicitBucketBoundaries {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = <Vec<f64> as serde::Deserialize>::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};
    use rstest::rstest;

    use super::ExplicitBucketBoundaries;
    use crate::ConfigError;

    #[rstest]
    #[case(-3.0, 0)]
    #[case(0.0, 0)]
    #[case(0.5, 1)]
    #[case(5.0, 1)]
    #[case(10.0, 2)]
    #[case(10.0001, 3)]
    #[case(f64::INFINITY, 3)]
    fn bucket_upper_bound_is_inclusive(#[case] value: f64, #[case] bucket: usize) {
        let boundaries = ExplicitBucketBoundaries::new([0.0, 5.0, 10.0]).unwrap();
        check!(boundaries.bucket_index(value) == bucket);
    }

    #[test]
    fn rejects_unsorted() {
        let_assert!(
            Err(ConfigError::NonIncreasingBoundaries { index: 2, .. }) =
                ExplicitBucketBoundaries::new([1.0, 2.0, 2.0])
        );
    }

    #[test]
    fn rejects_non_finite() {
        let_assert!(
            Err(ConfigError::NonFiniteBoundary { index: 1, .. }) =
                ExplicitBucketBoundaries::new([1.0, f64::NAN])
        );
        let_assert!(Err(_) = ExplicitBucketBoundaries::new([f64::NEG_INFINITY, 1.0]));
    }

    #[test]
    fn empty_is_one_bucket() {
        let boundaries = ExplicitBucketBoundaries::new(Vec::new()).unwrap();
        check!(boundaries.bucket_count() == 1);
        check!(boundaries.bucket_index(42.0) == 0);
    }
}
