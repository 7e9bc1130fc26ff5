//! Aggregators turn a stream of measurements for one attribute set into points.
//!
//! An [`Aggregator`] is created once per instrument and storage; it creates one
//! [`AggregatorHandle`] per attribute set. Handles accumulate cumulatively and are
//! never reset, so delta points are derived with [`Aggregator::diff`] against the
//! previous snapshot instead of draining.

use std::{fmt::Debug, sync::Arc};

use parking_lot::Mutex;
use tally_core::{
    AggregationTemporality, Attributes, ExemplarData, ExemplarFilter, InstrumentationScopeInfo,
    Measurement, MetricData, MetricDescriptor, MetricDataKind, NumberValue, PointData,
    PointValue, Resource,
};

use crate::{DiffError, exemplar::ExemplarReservoir};

mod explicit_bucket;
mod exponential;
mod last_value;
mod sum;

pub use explicit_bucket::ExplicitBucketHistogramAggregator;
pub use exponential::{Base2ExponentialHistogramAggregator, DEFAULT_MAX_BUCKETS};
pub use last_value::LastValueAggregator;
pub use sum::SumAggregator;

use explicit_bucket::HistogramState;
use exponential::ExponentialHistogramState;
use last_value::LastValueState;
use sum::SumState;

/// Running state of one attribute set.
trait Accumulator {
    /// Fold in a measurement. Returns `false` when the value was rejected.
    fn record(&mut self, value: NumberValue, epoch_nanos: u64) -> bool;

    /// The aggregate so far, plus an observation time overriding the window end.
    /// `None` when there is nothing to report.
    fn snapshot(&self) -> Option<(PointValue, Option<u64>)>;
}

#[track_caller]
fn kind_mismatch(aggregator: &str, previous: &dyn Debug, current: &dyn Debug) -> ! {
    panic!("{aggregator} aggregator cannot diff {previous:?} against {current:?}")
}

/// The aggregator an [`Aggregation`](crate::Aggregation) resolves to for one
/// instrument.
#[derive(Clone, Debug)]
pub enum Aggregator {
    /// Discards everything
    Drop,
    /// Running sum
    Sum(SumAggregator),
    /// Most recent value
    LastValue(LastValueAggregator),
    /// Explicit bucket histogram
    ExplicitBucketHistogram(ExplicitBucketHistogramAggregator),
    /// Base-2 exponential histogram
    Base2ExponentialHistogram(Base2ExponentialHistogramAggregator),
}

impl Aggregator {
    /// Whether this is [`Aggregator::Drop`]
    pub fn is_drop(&self) -> bool {
        matches!(self, Self::Drop)
    }

    /// Shape of the points this aggregator produces
    pub fn kind(&self) -> MetricDataKind {
        match self {
            Self::Drop => MetricDataKind::Empty,
            Self::Sum(sum) => sum.kind(),
            Self::LastValue(last_value) => last_value.kind(),
            Self::ExplicitBucketHistogram(histogram) => histogram.kind(),
            Self::Base2ExponentialHistogram(histogram) => histogram.kind(),
        }
    }

    /// A fresh handle for one attribute set
    pub fn create_handle(&self) -> AggregatorHandle {
        let (state, reservoir, filter) = match self {
            Self::Drop => (
                HandleState::Drop,
                ExemplarReservoir::NoSamples,
                ExemplarFilter::AlwaysOff,
            ),
            Self::Sum(sum) => (
                HandleState::Sum(sum.new_state()),
                sum.sampling.fixed_size_reservoir(),
                sum.sampling.filter(),
            ),
            Self::LastValue(last_value) => (
                HandleState::LastValue(last_value.new_state()),
                last_value.sampling.fixed_size_reservoir(),
                last_value.sampling.filter(),
            ),
            Self::ExplicitBucketHistogram(histogram) => (
                HandleState::Histogram(histogram.new_state()),
                histogram.sampling.aligned_reservoir(histogram.boundaries()),
                histogram.sampling.filter(),
            ),
            Self::Base2ExponentialHistogram(histogram) => (
                HandleState::Exponential(histogram.new_state()),
                histogram.sampling.fixed_size_reservoir(),
                histogram.sampling.filter(),
            ),
        };
        AggregatorHandle {
            inner: Mutex::new(HandleInner {
                state,
                reservoir,
                recordings: 0,
            }),
            exemplar_filter: filter,
        }
    }

    /// The change from `previous` to `current`, two cumulative points of the same
    /// attribute set.
    ///
    /// The result carries `current`'s attributes, window and exemplars. Histogram
    /// minimum and maximum are unknown for a difference and left unset.
    ///
    /// # Panics
    ///
    /// When either point was not produced by this kind of aggregator.
    pub fn diff(&self, previous: &PointData, current: &PointData) -> Result<PointData, DiffError> {
        let value = match self {
            Self::Drop => return Ok(PointData::empty()),
            Self::Sum(sum) => sum.diff(&previous.value, &current.value),
            Self::LastValue(last_value) => last_value.diff(&previous.value, &current.value),
            Self::ExplicitBucketHistogram(histogram) => {
                histogram.diff(&previous.value, &current.value)?
            }
            Self::Base2ExponentialHistogram(histogram) => {
                histogram.diff(&previous.value, &current.value)?
            }
        };
        Ok(PointData {
            value,
            ..current.clone()
        })
    }

    /// The point a single measurement aggregates to on its own, spanning the
    /// measurement's window.
    pub fn to_point(&self, measurement: &Measurement) -> PointData {
        let handle = self.create_handle();
        handle.record(measurement, &Attributes::empty(), measurement.epoch_nanos);
        handle
            .snapshot(
                &measurement.attributes,
                measurement.start_epoch_nanos,
                measurement.epoch_nanos,
            )
            .map_or_else(PointData::empty, |snapshot| snapshot.point)
    }

    /// Wrap collected points. Dropped aggregations yield [`MetricData::empty`].
    pub fn to_metric_data(
        &self,
        resource: &Arc<Resource>,
        scope: &Arc<InstrumentationScopeInfo>,
        descriptor: &MetricDescriptor,
        points: Vec<PointData>,
        temporality: AggregationTemporality,
    ) -> MetricData {
        if self.is_drop() {
            return MetricData::empty();
        }
        MetricData {
            resource: resource.clone(),
            scope: scope.clone(),
            descriptor: descriptor.clone(),
            kind: self.kind(),
            temporality,
            points,
        }
    }
}

#[derive(Debug)]
enum HandleState {
    Drop,
    Sum(SumState),
    LastValue(LastValueState),
    Histogram(HistogramState),
    Exponential(ExponentialHistogramState),
}

impl HandleState {
    fn as_accumulator(&mut self) -> Option<&mut dyn Accumulator> {
        match self {
            Self::Drop => None,
            Self::Sum(state) => Some(state),
            Self::LastValue(state) => Some(state),
            Self::Histogram(state) => Some(state),
            Self::Exponential(state) => Some(state),
        }
    }

    fn snapshot(&self) -> Option<(PointValue, Option<u64>)> {
        match self {
            Self::Drop => None,
            Self::Sum(state) => state.snapshot(),
            Self::LastValue(state) => state.snapshot(),
            Self::Histogram(state) => state.snapshot(),
            Self::Exponential(state) => state.snapshot(),
        }
    }
}

#[derive(Debug)]
struct HandleInner {
    state: HandleState,
    reservoir: ExemplarReservoir,
    recordings: u64,
}

/// Accumulation state of one attribute set.
///
/// Recording and snapshotting go through one lock, so a snapshot never observes
/// a measurement half applied.
#[derive(Debug)]
pub struct AggregatorHandle {
    inner: Mutex<HandleInner>,
    exemplar_filter: ExemplarFilter,
}

/// What [`AggregatorHandle::snapshot`] returns.
#[derive(Clone, Debug, PartialEq)]
pub struct HandleSnapshot {
    /// The cumulative point
    pub point: PointData,
    /// Measurements accepted so far, used to tell idle attribute sets apart
    pub recordings: u64,
}

impl AggregatorHandle {
    /// Fold `measurement` in. Returns whether it was accepted; dropped aggregations
    /// and rejected values (NaN, negative counter increments) are not.
    ///
    /// `filtered_attributes` are the measurement attributes removed before keying
    /// this handle; they are kept on exemplars.
    pub fn record(
        &self,
        measurement: &Measurement,
        filtered_attributes: &Attributes,
        epoch_nanos: u64,
    ) -> bool {
        let mut inner = self.inner.lock();
        let Some(accumulator) = inner.state.as_accumulator() else {
            return false;
        };
        if !accumulator.record(measurement.value, epoch_nanos) {
            return false;
        }
        inner.recordings += 1;
        if self.exemplar_filter.should_sample(measurement) {
            inner.reservoir.offer(ExemplarData {
                value: measurement.value,
                epoch_nanos,
                filtered_attributes: filtered_attributes.clone(),
            });
        }
        true
    }

    /// Measurements accepted so far
    pub fn recordings(&self) -> u64 {
        self.inner.lock().recordings
    }

    /// The cumulative point over `[start, end)`, or `None` for dropped aggregations
    /// and gauges that never observed anything.
    pub fn snapshot(
        &self,
        attributes: &Attributes,
        start_epoch_nanos: u64,
        end_epoch_nanos: u64,
    ) -> Option<HandleSnapshot> {
        let inner = self.inner.lock();
        let (value, observed_at) = inner.state.snapshot()?;
        Some(HandleSnapshot {
            point: PointData {
                start_epoch_nanos,
                end_epoch_nanos: observed_at.unwrap_or(end_epoch_nanos),
                attributes: attributes.clone(),
                exemplars: inner.reservoir.collect(),
                value,
            },
            recordings: inner.recordings,
        })
    }
}
