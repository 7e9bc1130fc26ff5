// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use crate::{
    Attributes, ExemplarData, ExplicitBucketBoundaries, InstrumentationScopeInfo,
    MetricDescriptor, NumberValue, Resource,
};

/// Whether exported points accumulate from a fixed start or cover only the time
/// since the previous collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AggregationTemporality {
    /// Running totals since the start of the stream
    #[default]
    Cumulative,
    /// Changes since the previous collection
    Delta,
}

/// One aggregated data point of one attribute set over `[start, end)`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PointData {
    /// Start of the window
    pub start_epoch_nanos: u64,
    /// End of the window
    pub end_epoch_nanos: u64,
    /// Attribute set the point belongs to
    pub attributes: Attributes,
    /// Sampled measurements
    pub exemplars: Vec<ExemplarData>,
    /// The aggregate
    pub value: PointValue,
}

impl PointData {
    /// The point produced by dropped aggregations
    pub const fn empty() -> Self {
        Self {
            start_epoch_nanos: 0,
            end_epoch_nanos: 0,
            attributes: Attributes::empty(),
            exemplars: Vec::new(),
            value: PointValue::Empty,
        }
    }

    /// Whether this is [`PointData::empty`]
    pub fn is_empty(&self) -> bool {
        matches!(self.value, PointValue::Empty)
    }
}

/// Aggregation-specific payload of a [`PointData`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PointValue {
    /// Nothing was aggregated
    Empty,
    /// Running or delta sum
    Sum(NumberValue),
    /// Last observed value
    Gauge(NumberValue),
    /// Explicit bucket histogram
    Histogram(HistogramPointValue),
    /// Base-2 exponential histogram
    ExponentialHistogram(ExponentialHistogramPointValue),
}

/// Explicit bucket histogram payload.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HistogramPointValue {
    /// Bucket upper bounds
    pub boundaries: ExplicitBucketBoundaries,
    /// One count per bucket, `boundaries.bucket_count()` long
    pub counts: Vec<u64>,
    /// Sum of recorded values
    pub sum: f64,
    /// Number of recorded values
    pub count: u64,
    /// Smallest recorded value. `None` when unknown, e.g. for delta points.
    pub min: Option<f64>,
    /// Largest recorded value. `None` when unknown, e.g. for delta points.
    pub max: Option<f64>,
}

/// Contiguous run of exponential histogram buckets starting at `offset`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExponentialBuckets {
    /// Bucket index of `counts[0]`
    pub offset: i32,
    /// Count per bucket
    pub counts: Vec<u64>,
}

impl ExponentialBuckets {
    /// Iterate over `(index, count)` pairs with non-zero counts
    pub fn iter(&self) -> impl Iterator<Item = (i32, u64)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(i, count)| (self.offset + i as i32, *count))
    }

    /// Sum of all counts
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// Base-2 exponential histogram payload.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExponentialHistogramPointValue {
    /// Resolution of the buckets; bucket `i` is `(base^i, base^(i+1)]` with
    /// `base = 2^(2^-scale)`
    pub scale: i32,
    /// Sum of recorded values
    pub sum: f64,
    /// Number of recorded values
    pub count: u64,
    /// Values whose magnitude is at most `zero_threshold`
    pub zero_count: u64,
    /// Width of the zero bucket
    pub zero_threshold: f64,
    /// Buckets for positive values
    pub positive: ExponentialBuckets,
    /// Buckets for the magnitude of negative values
    pub negative: ExponentialBuckets,
    /// Smallest recorded value, `None` when unknown
    pub min: Option<f64>,
    /// Largest recorded value, `None` when unknown
    pub max: Option<f64>,
}

/// The shape of the points carried by a [`MetricData`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MetricDataKind {
    /// No data, see [`MetricData::empty`]
    Empty,
    /// Sum points
    Sum {
        /// Whether the sum can only increase
        monotonic: bool,
    },
    /// Gauge points
    Gauge,
    /// Explicit bucket histogram points
    Histogram,
    /// Exponential histogram points
    ExponentialHistogram,
}

/// Everything one instrument produced for one reader in one collection.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricData {
    /// Producing entity
    pub resource: Arc<Resource>,
    /// Producing library
    pub scope: Arc<InstrumentationScopeInfo>,
    /// Exported name, description and unit
    pub descriptor: MetricDescriptor,
    /// Shape of `points`
    pub kind: MetricDataKind,
    /// Temporality of `points`
    pub temporality: AggregationTemporality,
    /// One point per attribute set
    pub points: Vec<PointData>,
}

impl MetricData {
    /// The canonical empty result, returned by dropped and empty storages.
    pub fn empty() -> Self {
        Self {
            resource: Arc::new(Resource::empty()),
            scope: Arc::new(InstrumentationScopeInfo::empty()),
            descriptor: MetricDescriptor::empty(),
            kind: MetricDataKind::Empty,
            temporality: AggregationTemporality::Cumulative,
            points: Vec::new(),
        }
    }

    /// Whether this carries no data. Exporters can skip such metrics.
    pub fn is_empty(&self) -> bool {
        self.kind == MetricDataKind::Empty || self.points.is_empty()
    }
}
