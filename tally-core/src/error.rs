// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Smallest scale an exponential histogram may use.
///
/// At this scale the whole finite `f64` range fits in a handful of buckets.
pub const MIN_SCALE: i32 = -10;

/// Largest scale an exponential histogram may use.
pub const MAX_SCALE: i32 = 20;

/// A misconfigured aggregation, rejected when it is constructed rather than when the
/// first measurement arrives.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A histogram boundary was NaN or infinite.
    #[error("bucket boundary at index {index} is not finite: {value}")]
    NonFiniteBoundary {
        /// Position of the offending boundary.
        index: usize,
        /// The offending boundary.
        value: f64,
    },
    /// Histogram boundaries must be strictly increasing.
    #[error(
        "bucket boundaries must be strictly increasing, but {current} at index {index} follows {previous}"
    )]
    NonIncreasingBoundaries {
        /// Position of the boundary that broke the ordering.
        index: usize,
        /// The boundary before it.
        previous: f64,
        /// The boundary itself.
        current: f64,
    },
    /// An exponential histogram scale outside `MIN_SCALE..=MAX_SCALE`.
    #[error("scale {scale} is outside the supported range [{MIN_SCALE}, {MAX_SCALE}]")]
    ScaleOutOfRange {
        /// The requested scale.
        scale: i32,
    },
    /// An exponential histogram needs room for at least one bucket.
    #[error("max_buckets must be positive")]
    NonPositiveMaxBuckets,
}
