use tally_core::{
    ConfigError, ExemplarFilter, ExplicitBucketBoundaries, InstrumentDescriptor, InstrumentType,
};

use crate::{
    Base2ExponentialHistogramIndexer,
    aggregator::{
        Aggregator, Base2ExponentialHistogramAggregator, DEFAULT_MAX_BUCKETS,
        ExplicitBucketHistogramAggregator, LastValueAggregator, SumAggregator,
    },
    exemplar::ExemplarSampling,
};

/// How the measurements of an instrument are summarized.
///
/// An `Aggregation` is a configuration value; [`Aggregation::create_aggregator`]
/// turns it into the [`Aggregator`] doing the work for one instrument.
///
/// ```
/// use tally_aggregation::Aggregation;
/// use tally_core::{InstrumentDescriptor, InstrumentType, InstrumentValueType};
///
/// let latency = InstrumentDescriptor::new(
///     "latency",
///     InstrumentType::Histogram,
///     InstrumentValueType::Double,
/// );
/// assert!(Aggregation::base2_exponential_histogram().is_compatible(&latency));
/// assert!(!Aggregation::sum().is_compatible(&latency));
/// ```
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Aggregation {
    /// Discard all measurements
    Drop,
    /// Pick by instrument type, see [`Aggregation::resolve`]
    #[default]
    Default,
    /// Arithmetic sum
    Sum,
    /// Most recent measurement
    LastValue,
    /// Histogram with fixed bucket boundaries
    ExplicitBucketHistogram(ExplicitBucketBoundaries),
    /// Histogram with base-2 exponential buckets adapting their scale
    Base2ExponentialHistogram(ExponentialHistogramOptions),
}

/// Configuration of [`Aggregation::Base2ExponentialHistogram`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExponentialHistogramOptions {
    max_buckets: usize,
    indexer: Base2ExponentialHistogramIndexer,
}

impl ExponentialHistogramOptions {
    /// Validate the options. `max_buckets` must be positive and `max_scale` within
    /// `MIN_SCALE..=MAX_SCALE`.
    pub fn new(max_buckets: usize, max_scale: i32) -> Result<Self, ConfigError> {
        if max_buckets == 0 {
            return Err(ConfigError::NonPositiveMaxBuckets);
        }
        Ok(Self {
            max_buckets,
            indexer: Base2ExponentialHistogramIndexer::new(max_scale)?,
        })
    }

    /// Cap on the number of buckets per sign
    pub fn max_buckets(&self) -> usize {
        self.max_buckets
    }

    /// Scale histograms start at
    pub fn max_scale(&self) -> i32 {
        self.indexer.scale()
    }
}

impl Default for ExponentialHistogramOptions {
    fn default() -> Self {
        Self {
            max_buckets: DEFAULT_MAX_BUCKETS,
            indexer: Base2ExponentialHistogramIndexer::finest(),
        }
    }
}

impl Aggregation {
    /// [`Aggregation::Drop`]
    pub fn drop() -> Self {
        Self::Drop
    }

    /// [`Aggregation::Default`]
    pub fn default_aggregation() -> Self {
        Self::Default
    }

    /// [`Aggregation::Sum`]
    pub fn sum() -> Self {
        Self::Sum
    }

    /// [`Aggregation::LastValue`]
    pub fn last_value() -> Self {
        Self::LastValue
    }

    /// Explicit bucket histogram over [`DEFAULT_BOUNDARIES`](tally_core::DEFAULT_BOUNDARIES)
    pub fn explicit_bucket_histogram() -> Self {
        Self::ExplicitBucketHistogram(ExplicitBucketBoundaries::default_boundaries())
    }

    /// Explicit bucket histogram over `boundaries`, which must be finite and
    /// strictly increasing
    pub fn explicit_bucket_histogram_with_boundaries(
        boundaries: impl Into<Vec<f64>>,
    ) -> Result<Self, ConfigError> {
        ExplicitBucketBoundaries::new(boundaries).map(Self::ExplicitBucketHistogram)
    }

    /// Exponential histogram with 160 buckets per sign starting at scale 20
    pub fn base2_exponential_histogram() -> Self {
        Self::Base2ExponentialHistogram(ExponentialHistogramOptions::default())
    }

    /// Exponential histogram with custom limits
    pub fn base2_exponential_histogram_with(
        max_buckets: usize,
        max_scale: i32,
    ) -> Result<Self, ConfigError> {
        ExponentialHistogramOptions::new(max_buckets, max_scale)
            .map(Self::Base2ExponentialHistogram)
    }

    /// The concrete aggregation [`Aggregation::Default`] stands for.
    ///
    /// Counters of any kind sum, gauges keep the last value, and histograms use
    /// the instrument's advisory boundaries or [`DEFAULT_BOUNDARIES`]. Other
    /// variants resolve to themselves.
    ///
    /// [`DEFAULT_BOUNDARIES`]: tally_core::DEFAULT_BOUNDARIES
    pub fn resolve(&self, descriptor: &InstrumentDescriptor) -> Aggregation {
        if *self != Self::Default {
            return self.clone();
        }
        match descriptor.instrument_type() {
            InstrumentType::Counter
            | InstrumentType::UpDownCounter
            | InstrumentType::ObservableCounter
            | InstrumentType::ObservableUpDownCounter => Self::Sum,
            InstrumentType::Histogram => Self::ExplicitBucketHistogram(
                descriptor
                    .explicit_bucket_boundaries_advice()
                    .cloned()
                    .unwrap_or_default(),
            ),
            InstrumentType::Gauge | InstrumentType::ObservableGauge => Self::LastValue,
        }
    }

    /// Whether this aggregation can summarize `descriptor`'s measurements
    pub fn is_compatible(&self, descriptor: &InstrumentDescriptor) -> bool {
        let instrument_type = descriptor.instrument_type();
        match self {
            Self::Drop | Self::Default => true,
            Self::Sum => instrument_type.is_counter_family(),
            Self::LastValue => instrument_type.is_gauge(),
            Self::ExplicitBucketHistogram(_) | Self::Base2ExponentialHistogram(_) => {
                instrument_type.is_histogram()
            }
        }
    }

    /// The aggregator for `descriptor`, sampling exemplars with `exemplar_filter`.
    ///
    /// Compatibility is not checked here; see [`Aggregation::is_compatible`].
    pub fn create_aggregator(
        &self,
        descriptor: &InstrumentDescriptor,
        exemplar_filter: ExemplarFilter,
    ) -> Aggregator {
        let sampling = ExemplarSampling::new(exemplar_filter);
        match self {
            Self::Drop => Aggregator::Drop,
            Self::Default => self
                .resolve(descriptor)
                .create_aggregator(descriptor, exemplar_filter),
            Self::Sum => Aggregator::Sum(SumAggregator::new(
                descriptor.value_type(),
                descriptor.instrument_type().is_monotonic(),
                sampling,
            )),
            Self::LastValue => Aggregator::LastValue(LastValueAggregator::new(sampling)),
            Self::ExplicitBucketHistogram(boundaries) => Aggregator::ExplicitBucketHistogram(
                ExplicitBucketHistogramAggregator::new(boundaries.clone(), sampling),
            ),
            Self::Base2ExponentialHistogram(options) => {
                Aggregator::Base2ExponentialHistogram(Base2ExponentialHistogramAggregator::new(
                    options.max_buckets,
                    options.indexer,
                    sampling,
                ))
            }
        }
    }
}
