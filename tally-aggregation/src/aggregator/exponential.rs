//! Base-2 exponential histogram state.
//!
//! Positive and negative magnitudes are kept in separate sparse bucket maps sharing
//! one scale. When a new index would stretch either map beyond `max_buckets`, the
//! whole histogram is downscaled first: every index is shifted right, merging
//! neighbouring buckets pairwise per step.

use std::collections::BTreeMap;

use itertools::{EitherOrBoth, Itertools};
use tally_core::{
    ExponentialBuckets, ExponentialHistogramPointValue, MIN_SCALE, MetricDataKind, NumberValue,
    PointValue,
};

use super::{Accumulator, kind_mismatch};
use crate::{
    Base2ExponentialHistogramIndexer, DiffError, error::checked_count_diff,
    exemplar::ExemplarSampling,
};

/// Default cap on the number of buckets per sign
pub const DEFAULT_MAX_BUCKETS: usize = 160;

/// Counts measurements into base-2 exponential buckets, as
/// [`Aggregation::Base2ExponentialHistogram`](crate::Aggregation::Base2ExponentialHistogram)
/// does.
#[derive(Clone, Debug)]
pub struct Base2ExponentialHistogramAggregator {
    max_buckets: usize,
    indexer: Base2ExponentialHistogramIndexer,
    pub(super) sampling: ExemplarSampling,
}

impl Base2ExponentialHistogramAggregator {
    pub(crate) fn new(
        max_buckets: usize,
        indexer: Base2ExponentialHistogramIndexer,
        sampling: ExemplarSampling,
    ) -> Self {
        Self {
            max_buckets,
            indexer,
            sampling,
        }
    }

    /// Cap on the number of buckets per sign
    pub fn max_buckets(&self) -> usize {
        self.max_buckets
    }

    /// Scale new handles start at
    pub fn max_scale(&self) -> i32 {
        self.indexer.scale()
    }

    pub(super) fn kind(&self) -> MetricDataKind {
        MetricDataKind::ExponentialHistogram
    }

    pub(super) fn new_state(&self) -> ExponentialHistogramState {
        ExponentialHistogramState {
            max_buckets: self.max_buckets,
            indexer: self.indexer,
            sum: 0.0,
            count: 0,
            zero_count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            positive: BucketMap::default(),
            negative: BucketMap::default(),
        }
    }

    /// Subtract two snapshots, first bringing both to the coarser of their scales.
    pub(super) fn diff(
        &self,
        previous: &PointValue,
        current: &PointValue,
    ) -> Result<PointValue, DiffError> {
        let (
            PointValue::ExponentialHistogram(previous),
            PointValue::ExponentialHistogram(current),
        ) = (previous, current)
        else {
            kind_mismatch("exponential histogram", previous, current)
        };
        let scale = previous.scale.min(current.scale);
        let align = |point: &ExponentialHistogramPointValue, buckets: &ExponentialBuckets| {
            downscale_buckets(buckets, (point.scale - scale) as u32)
        };
        let positive = subtract_buckets(
            &align(previous, &previous.positive),
            &align(current, &current.positive),
        )?;
        let negative = subtract_buckets(
            &align(previous, &previous.negative),
            &align(current, &current.negative),
        )?;
        Ok(PointValue::ExponentialHistogram(
            ExponentialHistogramPointValue {
                scale,
                sum: current.sum - previous.sum,
                count: checked_count_diff(previous.count, current.count)?,
                zero_count: checked_count_diff(previous.zero_count, current.zero_count)?,
                zero_threshold: current.zero_threshold,
                positive,
                negative,
                min: None,
                max: None,
            },
        ))
    }
}

#[derive(Debug)]
pub(super) struct ExponentialHistogramState {
    max_buckets: usize,
    indexer: Base2ExponentialHistogramIndexer,
    sum: f64,
    count: u64,
    zero_count: u64,
    min: f64,
    max: f64,
    positive: BucketMap,
    negative: BucketMap,
}

impl ExponentialHistogramState {
    /// Steps needed before `index` fits next to the buckets already held.
    fn required_downscale(&self, buckets: &BucketMap, index: i32) -> u32 {
        let Some((low, high)) = buckets.bounds() else {
            return 0;
        };
        let (mut low, mut high) = (i64::from(low.min(index)), i64::from(high.max(index)));
        let mut shift = 0;
        while high - low + 1 > self.max_buckets as i64 && self.indexer.scale() - shift > MIN_SCALE
        {
            low >>= 1;
            high >>= 1;
            shift += 1;
        }
        shift as u32
    }

    fn downscale(&mut self, by: u32) {
        let scale = self.indexer.scale() - by as i32;
        self.positive.downscale(by);
        self.negative.downscale(by);
        self.indexer = self.indexer.downscaled_to(scale);
        tracing::trace!(scale, "downscaled exponential histogram");
    }
}

impl Accumulator for ExponentialHistogramState {
    fn record(&mut self, value: NumberValue, _epoch_nanos: u64) -> bool {
        let value = value.as_f64();
        if !value.is_finite() {
            tracing::debug!(value, "ignoring non-finite exponential histogram measurement");
            return false;
        }
        self.sum += value;
        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        if value == 0.0 {
            self.zero_count += 1;
            return true;
        }

        let index = self.indexer.compute_index(value);
        let buckets = if value > 0.0 {
            &self.positive
        } else {
            &self.negative
        };
        let shift = self.required_downscale(buckets, index);
        if shift > 0 {
            self.downscale(shift);
        }
        let index = index >> shift;
        let buckets = if value > 0.0 {
            &mut self.positive
        } else {
            &mut self.negative
        };
        buckets.increment(index);
        if buckets.len() > self.max_buckets {
            tracing::debug!(
                max_buckets = self.max_buckets,
                "bucket span exceeds the cap at the minimum scale"
            );
        }
        true
    }

    fn snapshot(&self) -> Option<(PointValue, Option<u64>)> {
        let observed = self.count > 0;
        let value = ExponentialHistogramPointValue {
            scale: self.indexer.scale(),
            sum: self.sum,
            count: self.count,
            zero_count: self.zero_count,
            zero_threshold: 0.0,
            positive: self.positive.to_buckets(),
            negative: self.negative.to_buckets(),
            min: observed.then_some(self.min),
            max: observed.then_some(self.max),
        };
        Some((PointValue::ExponentialHistogram(value), None))
    }
}

/// Sparse bucket counts keyed by index.
#[derive(Clone, Debug, Default)]
struct BucketMap(BTreeMap<i32, u64>);

impl BucketMap {
    fn bounds(&self) -> Option<(i32, i32)> {
        let (low, _) = self.0.first_key_value()?;
        let (high, _) = self.0.last_key_value()?;
        Some((*low, *high))
    }

    /// Width of the index range, counting empty buckets in between
    fn len(&self) -> usize {
        self.bounds()
            .map_or(0, |(low, high)| (i64::from(high) - i64::from(low) + 1) as usize)
    }

    fn increment(&mut self, index: i32) {
        *self.0.entry(index).or_default() += 1;
    }

    fn downscale(&mut self, by: u32) {
        if by == 0 {
            return;
        }
        let mut merged = BTreeMap::new();
        for (index, count) in std::mem::take(&mut self.0) {
            *merged.entry(index >> by).or_default() += count;
        }
        self.0 = merged;
    }

    fn to_buckets(&self) -> ExponentialBuckets {
        dense(self.0.iter().map(|(index, count)| (*index, *count)))
    }
}

/// Lay sorted `(index, count)` pairs out contiguously.
fn dense(pairs: impl IntoIterator<Item = (i32, u64)>) -> ExponentialBuckets {
    let mut pairs = pairs.into_iter().filter(|(_, count)| *count > 0).peekable();
    let Some(&(offset, _)) = pairs.peek() else {
        return ExponentialBuckets::default();
    };
    let mut counts = Vec::new();
    for (index, count) in pairs {
        counts.resize((index - offset) as usize, 0);
        counts.push(count);
    }
    ExponentialBuckets { offset, counts }
}

fn downscale_buckets(buckets: &ExponentialBuckets, by: u32) -> ExponentialBuckets {
    if by == 0 {
        return buckets.clone();
    }
    let merged = buckets
        .iter()
        .map(|(index, count)| (index >> by, count))
        .coalesce(|(a, x), (b, y)| if a == b { Ok((a, x + y)) } else { Err(((a, x), (b, y))) });
    dense(merged)
}

fn subtract_buckets(
    previous: &ExponentialBuckets,
    current: &ExponentialBuckets,
) -> Result<ExponentialBuckets, DiffError> {
    let diffs = current
        .iter()
        .merge_join_by(previous.iter(), |(a, _), (b, _)| a.cmp(b))
        .map(|pair| match pair {
            EitherOrBoth::Left(bucket) => Ok(bucket),
            EitherOrBoth::Both((bucket, current), (_, previous)) => current
                .checked_sub(previous)
                .map(|count| (bucket, count))
                .ok_or(DiffError::BucketCountDecreased {
                    bucket,
                    previous,
                    current,
                }),
            EitherOrBoth::Right((bucket, previous)) => Err(DiffError::BucketCountDecreased {
                bucket,
                previous,
                current: 0,
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(dense(diffs))
}
