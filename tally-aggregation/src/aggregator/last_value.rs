use tally_core::{MetricDataKind, NumberValue, PointValue};

use super::{Accumulator, kind_mismatch};
use crate::exemplar::ExemplarSampling;

/// Keeps the most recent measurement, as
/// [`Aggregation::LastValue`](crate::Aggregation::LastValue) does.
///
/// Points carry the time of the observation as their end.
#[derive(Clone, Debug)]
pub struct LastValueAggregator {
    pub(super) sampling: ExemplarSampling,
}

impl LastValueAggregator {
    pub(crate) fn new(sampling: ExemplarSampling) -> Self {
        Self { sampling }
    }

    pub(super) fn kind(&self) -> MetricDataKind {
        MetricDataKind::Gauge
    }

    pub(super) fn new_state(&self) -> LastValueState {
        LastValueState::default()
    }

    /// Gauges are not differences, so the later point wins.
    pub(super) fn diff(&self, previous: &PointValue, current: &PointValue) -> PointValue {
        match (previous, current) {
            (PointValue::Gauge(_), PointValue::Gauge(_)) => current.clone(),
            (previous, current) => kind_mismatch("last value", previous, current),
        }
    }
}

#[derive(Debug, Default)]
pub(super) struct LastValueState {
    last: Option<(NumberValue, u64)>,
}

impl Accumulator for LastValueState {
    fn record(&mut self, value: NumberValue, epoch_nanos: u64) -> bool {
        self.last = Some((value, epoch_nanos));
        true
    }

    fn snapshot(&self) -> Option<(PointValue, Option<u64>)> {
        self.last
            .map(|(value, epoch_nanos)| (PointValue::Gauge(value), Some(epoch_nanos)))
    }
}
