use std::{fmt, sync::Arc};

use tally_core::{InstrumentDescriptor, InstrumentType};

use crate::Aggregation;

/// Picks the aggregation an instrument type gets when no view says otherwise.
pub trait DefaultAggregationSelector: Send + Sync + fmt::Debug {
    /// Aggregation for instruments of `instrument_type`
    fn default_aggregation(&self, instrument_type: InstrumentType) -> Aggregation;
}

type ResolveFn = dyn Fn(InstrumentType) -> Aggregation + Send + Sync;

/// An immutable, cheaply clonable [`DefaultAggregationSelector`].
///
/// The default selector answers [`Aggregation::Default`] for every type. Overrides
/// are layered with [`AggregationSelector::with`], which leaves the original
/// untouched:
///
/// ```
/// use tally_aggregation::{Aggregation, AggregationSelector, DefaultAggregationSelector};
/// use tally_core::InstrumentType;
///
/// let base = AggregationSelector::default();
/// let exponential =
///     base.with(InstrumentType::Histogram, Aggregation::base2_exponential_histogram());
///
/// assert_eq!(
///     exponential.default_aggregation(InstrumentType::Histogram),
///     Aggregation::base2_exponential_histogram()
/// );
/// assert_eq!(base.default_aggregation(InstrumentType::Histogram), Aggregation::Default);
/// ```
#[derive(Clone)]
pub struct AggregationSelector {
    resolve: Arc<ResolveFn>,
}

impl AggregationSelector {
    /// Selector backed by an arbitrary policy
    pub fn from_fn(
        resolve: impl Fn(InstrumentType) -> Aggregation + Send + Sync + 'static,
    ) -> Self {
        Self {
            resolve: Arc::new(resolve),
        }
    }

    /// A new selector answering `aggregation` for `instrument_type` and deferring to
    /// `self` for everything else
    pub fn with(&self, instrument_type: InstrumentType, aggregation: Aggregation) -> Self {
        let fallback = self.resolve.clone();
        Self::from_fn(move |requested| {
            if requested == instrument_type {
                aggregation.clone()
            } else {
                fallback(requested)
            }
        })
    }

    /// The concrete aggregation for `descriptor`, with [`Aggregation::Default`]
    /// resolved against the descriptor (including its advisory boundaries)
    pub fn select(&self, descriptor: &InstrumentDescriptor) -> Aggregation {
        self.default_aggregation(descriptor.instrument_type())
            .resolve(descriptor)
    }
}

impl Default for AggregationSelector {
    fn default() -> Self {
        Self::from_fn(|_| Aggregation::Default)
    }
}

impl DefaultAggregationSelector for AggregationSelector {
    fn default_aggregation(&self, instrument_type: InstrumentType) -> Aggregation {
        (self.resolve)(instrument_type)
    }
}

impl fmt::Debug for AggregationSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for instrument_type in InstrumentType::ALL {
            map.entry(&instrument_type, &self.default_aggregation(instrument_type));
        }
        map.finish()
    }
}
