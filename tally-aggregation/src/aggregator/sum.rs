use tally_core::{InstrumentValueType, MetricDataKind, NumberValue, PointValue};

use super::{Accumulator, kind_mismatch};
use crate::exemplar::ExemplarSampling;

/// Adds measurements up, as [`Aggregation::Sum`](crate::Aggregation::Sum) does.
#[derive(Clone, Debug)]
pub struct SumAggregator {
    value_type: InstrumentValueType,
    monotonic: bool,
    pub(super) sampling: ExemplarSampling,
}

impl SumAggregator {
    pub(crate) fn new(
        value_type: InstrumentValueType,
        monotonic: bool,
        sampling: ExemplarSampling,
    ) -> Self {
        Self {
            value_type,
            monotonic,
            sampling,
        }
    }

    /// Whether negative measurements are rejected
    pub fn is_monotonic(&self) -> bool {
        self.monotonic
    }

    pub(super) fn kind(&self) -> MetricDataKind {
        MetricDataKind::Sum {
            monotonic: self.monotonic,
        }
    }

    pub(super) fn new_state(&self) -> SumState {
        SumState {
            value: match self.value_type {
                InstrumentValueType::Long => NumberValue::Long(0),
                InstrumentValueType::Double => NumberValue::Double(0.0),
            },
            monotonic: self.monotonic,
        }
    }

    pub(super) fn diff(&self, previous: &PointValue, current: &PointValue) -> PointValue {
        match (previous, current) {
            (PointValue::Sum(previous), PointValue::Sum(current)) => {
                PointValue::Sum(*current - *previous)
            }
            (previous, current) => kind_mismatch("sum", previous, current),
        }
    }
}

#[derive(Debug)]
pub(super) struct SumState {
    value: NumberValue,
    monotonic: bool,
}

impl Accumulator for SumState {
    fn record(&mut self, value: NumberValue, _epoch_nanos: u64) -> bool {
        if self.monotonic && value.is_negative() {
            tracing::debug!(?value, "ignoring negative measurement for monotonic sum");
            return false;
        }
        self.value = match (self.value, value) {
            (NumberValue::Long(total), NumberValue::Long(v)) => {
                NumberValue::Long(total.wrapping_add(v))
            }
            (NumberValue::Long(_), NumberValue::Double(v)) => {
                tracing::debug!(v, "ignoring floating point measurement for integer sum");
                return false;
            }
            (NumberValue::Double(total), v) => NumberValue::Double(total + v.as_f64()),
        };
        true
    }

    fn snapshot(&self) -> Option<(PointValue, Option<u64>)> {
        Some((PointValue::Sum(self.value), None))
    }
}
