use tally_core::{
    ExplicitBucketBoundaries, HistogramPointValue, MetricDataKind, NumberValue, PointValue,
};

use super::{Accumulator, kind_mismatch};
use crate::{
    DiffError,
    error::checked_count_diff,
    exemplar::ExemplarSampling,
};

/// Counts measurements into fixed buckets, as
/// [`Aggregation::ExplicitBucketHistogram`](crate::Aggregation::ExplicitBucketHistogram)
/// does. Bucket `i` holds values in `(boundaries[i-1], boundaries[i]]`.
#[derive(Clone, Debug)]
pub struct ExplicitBucketHistogramAggregator {
    boundaries: ExplicitBucketBoundaries,
    pub(super) sampling: ExemplarSampling,
}

impl ExplicitBucketHistogramAggregator {
    pub(crate) fn new(boundaries: ExplicitBucketBoundaries, sampling: ExemplarSampling) -> Self {
        Self {
            boundaries,
            sampling,
        }
    }

    /// Bucket upper bounds
    pub fn boundaries(&self) -> &ExplicitBucketBoundaries {
        &self.boundaries
    }

    pub(super) fn kind(&self) -> MetricDataKind {
        MetricDataKind::Histogram
    }

    pub(super) fn new_state(&self) -> HistogramState {
        HistogramState {
            boundaries: self.boundaries.clone(),
            counts: vec![0; self.boundaries.bucket_count()],
            sum: 0.0,
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    pub(super) fn diff(
        &self,
        previous: &PointValue,
        current: &PointValue,
    ) -> Result<PointValue, DiffError> {
        let (PointValue::Histogram(previous), PointValue::Histogram(current)) = (previous, current)
        else {
            kind_mismatch("explicit bucket histogram", previous, current)
        };
        if previous.boundaries != current.boundaries {
            kind_mismatch("explicit bucket histogram", previous, current)
        }
        let counts = current
            .counts
            .iter()
            .zip(&previous.counts)
            .enumerate()
            .map(|(bucket, (&current, &previous))| {
                current
                    .checked_sub(previous)
                    .ok_or(DiffError::BucketCountDecreased {
                        bucket: bucket as i32,
                        previous,
                        current,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PointValue::Histogram(HistogramPointValue {
            boundaries: current.boundaries.clone(),
            counts,
            sum: current.sum - previous.sum,
            count: checked_count_diff(previous.count, current.count)?,
            min: None,
            max: None,
        }))
    }
}

#[derive(Debug)]
pub(super) struct HistogramState {
    boundaries: ExplicitBucketBoundaries,
    counts: Vec<u64>,
    sum: f64,
    count: u64,
    min: f64,
    max: f64,
}

impl Accumulator for HistogramState {
    fn record(&mut self, value: NumberValue, _epoch_nanos: u64) -> bool {
        let value = value.as_f64();
        if value.is_nan() {
            tracing::debug!("ignoring NaN histogram measurement");
            return false;
        }
        self.counts[self.boundaries.bucket_index(value)] += 1;
        self.sum += value;
        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        true
    }

    fn snapshot(&self) -> Option<(PointValue, Option<u64>)> {
        let observed = self.count > 0;
        let value = HistogramPointValue {
            boundaries: self.boundaries.clone(),
            counts: self.counts.clone(),
            sum: self.sum,
            count: self.count,
            min: observed.then_some(self.min),
            max: observed.then_some(self.max),
        };
        Some((PointValue::Histogram(value), None))
    }
}
