// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Readers decide temporality and default aggregation, and drive collection.

use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use tally_aggregation::{Aggregation, AggregationSelector, DefaultAggregationSelector};
use tally_core::{
    AggregationTemporality, Clock, ExemplarFilter, InstrumentDescriptor, InstrumentType,
    InstrumentationScopeInfo, MetricData, Resource,
};

use crate::{
    ExportResult, ViewRegistry,
    storage::{EmptyMetricStorage, MetricStorage, SynchronousMetricStorage, WritableMetricStorage},
};

/// Picks a temporality per instrument type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TemporalitySelector {
    /// Cumulative for everything
    #[default]
    Cumulative,
    /// Delta for everything but up-down counters
    Delta,
    /// Delta only for synchronous counters and histograms, which is where keeping
    /// cumulative state costs the most
    LowMemory,
}

impl TemporalitySelector {
    /// Temporality for instruments of `instrument_type`
    pub fn temporality(self, instrument_type: InstrumentType) -> AggregationTemporality {
        use AggregationTemporality::{Cumulative, Delta};
        match (self, instrument_type) {
            (Self::Cumulative, _) => Cumulative,
            (
                Self::Delta,
                InstrumentType::UpDownCounter | InstrumentType::ObservableUpDownCounter,
            ) => Cumulative,
            (Self::Delta, _) => Delta,
            (Self::LowMemory, InstrumentType::Counter | InstrumentType::Histogram) => Delta,
            (Self::LowMemory, _) => Cumulative,
        }
    }
}

/// Something that periodically or on demand collects metrics.
pub trait MetricReader: Send + Sync + fmt::Debug {
    /// Temporality of the points this reader wants for `instrument_type`
    fn temporality(&self, instrument_type: InstrumentType) -> AggregationTemporality;

    /// Aggregation for instruments no view configures
    fn default_aggregation(&self, instrument_type: InstrumentType) -> Aggregation;

    /// Flush pending exports
    fn force_flush(&self) -> ExportResult;

    /// Stop the reader. Idempotent.
    fn shutdown(&self) -> ExportResult;
}

/// A reader collecting only when asked to.
///
/// ```
/// use tally::{ManualReader, MetricReader, TemporalitySelector};
/// use tally_core::{AggregationTemporality, InstrumentType};
///
/// let reader = ManualReader::builder()
///     .with_temporality(TemporalitySelector::Delta)
///     .build();
/// assert_eq!(reader.temporality(InstrumentType::Counter), AggregationTemporality::Delta);
/// ```
#[derive(Debug, Default)]
pub struct ManualReader {
    temporality: TemporalitySelector,
    aggregation: AggregationSelector,
    is_shutdown: AtomicBool,
}

impl ManualReader {
    /// Configure a reader
    pub fn builder() -> ManualReaderBuilder {
        ManualReaderBuilder::default()
    }

    /// Whether [`MetricReader::shutdown`] was called
    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown.load(Ordering::Acquire)
    }
}

impl MetricReader for ManualReader {
    fn temporality(&self, instrument_type: InstrumentType) -> AggregationTemporality {
        self.temporality.temporality(instrument_type)
    }

    fn default_aggregation(&self, instrument_type: InstrumentType) -> Aggregation {
        self.aggregation.default_aggregation(instrument_type)
    }

    fn force_flush(&self) -> ExportResult {
        ExportResult::Success
    }

    fn shutdown(&self) -> ExportResult {
        if !self.is_shutdown.swap(true, Ordering::AcqRel) {
            tracing::debug!("manual reader shut down");
        }
        ExportResult::Success
    }
}

/// Builder for [`ManualReader`].
#[derive(Debug, Default)]
pub struct ManualReaderBuilder {
    temporality: TemporalitySelector,
    aggregation: AggregationSelector,
}

impl ManualReaderBuilder {
    /// Temporality policy, cumulative by default
    pub fn with_temporality(mut self, temporality: TemporalitySelector) -> Self {
        self.temporality = temporality;
        self
    }

    /// Default aggregation policy
    pub fn with_aggregation_selector(mut self, aggregation: AggregationSelector) -> Self {
        self.aggregation = aggregation;
        self
    }

    /// Build the reader
    pub fn build(self) -> ManualReader {
        ManualReader {
            temporality: self.temporality,
            aggregation: self.aggregation,
            is_shutdown: AtomicBool::new(false),
        }
    }
}

/// Process-unique identity of a [`RegisteredReader`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReaderId(u64);

impl ReaderId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ReaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reader-{}", self.0)
    }
}

/// A [`MetricReader`] bound to its [`ViewRegistry`] under a unique id.
///
/// Storages keep per-reader state keyed by this id, so two registrations with
/// identical configuration are still distinct readers.
pub struct RegisteredReader {
    id: ReaderId,
    reader: Arc<dyn MetricReader>,
    views: ViewRegistry,
    last_collected_epoch_nanos: AtomicU64,
    previous_collected_epoch_nanos: AtomicU64,
}

impl RegisteredReader {
    /// Register `reader` with `views`
    pub fn new(reader: Arc<dyn MetricReader>, views: ViewRegistry) -> Self {
        let id = ReaderId::next();
        tracing::debug!(%id, "registered metric reader");
        Self {
            id,
            reader,
            views,
            last_collected_epoch_nanos: AtomicU64::new(0),
            previous_collected_epoch_nanos: AtomicU64::new(0),
        }
    }

    /// This registration's identity
    pub fn id(&self) -> ReaderId {
        self.id
    }

    /// The registered reader
    pub fn reader(&self) -> &Arc<dyn MetricReader> {
        &self.reader
    }

    /// The views this reader applies
    pub fn views(&self) -> &ViewRegistry {
        &self.views
    }

    /// When the current or most recent collection cycle started, 0 before the first
    pub fn last_collected_epoch_nanos(&self) -> u64 {
        self.last_collected_epoch_nanos.load(Ordering::Acquire)
    }

    /// When the cycle before the current one started, 0 if there was none.
    ///
    /// Delta windows of storages this reader has not collected before start here,
    /// so they never overlap a window the reader already reported.
    pub fn previous_collected_epoch_nanos(&self) -> u64 {
        self.previous_collected_epoch_nanos.load(Ordering::Acquire)
    }

    /// Record the start of a collection cycle
    pub fn set_last_collected_epoch_nanos(&self, epoch_nanos: u64) {
        let previous = self
            .last_collected_epoch_nanos
            .swap(epoch_nanos, Ordering::AcqRel);
        self.previous_collected_epoch_nanos
            .store(previous, Ordering::Release);
    }

    /// The storages `instrument` records into for this reader, one per matching view.
    ///
    /// A view whose aggregation cannot summarize the instrument falls back to an
    /// [`EmptyMetricStorage`], so recording always succeeds.
    pub fn create_storages(
        &self,
        instrument: &InstrumentDescriptor,
        exemplar_filter: ExemplarFilter,
        clock: Arc<dyn Clock>,
    ) -> Vec<Arc<dyn WritableMetricStorage>> {
        self.views
            .find_views(instrument)
            .into_iter()
            .map(|view| -> Arc<dyn WritableMetricStorage> {
                let aggregation = view.aggregation().cloned().unwrap_or_else(|| {
                    self.reader
                        .default_aggregation(instrument.instrument_type())
                });
                if !aggregation.is_compatible(instrument) {
                    tracing::warn!(
                        instrument = instrument.name(),
                        ?aggregation,
                        reader = %self.id,
                        "aggregation is incompatible with the instrument, dropping its measurements"
                    );
                    return Arc::new(EmptyMetricStorage);
                }
                let aggregator = aggregation.create_aggregator(instrument, exemplar_filter);
                Arc::new(SynchronousMetricStorage::new(
                    instrument.clone(),
                    view,
                    aggregator,
                    clock.clone(),
                ))
            })
            .collect()
    }

    /// Run one collection cycle over `storages`, skipping those with nothing to
    /// report.
    pub fn collect_all<'a>(
        &self,
        storages: impl IntoIterator<Item = (&'a Arc<InstrumentationScopeInfo>, &'a dyn MetricStorage)>,
        resource: &Arc<Resource>,
        start_epoch_nanos: u64,
        clock: &dyn Clock,
    ) -> Vec<MetricData> {
        let epoch_nanos = clock.now_epoch_nanos();
        self.set_last_collected_epoch_nanos(epoch_nanos);
        let metrics: Vec<MetricData> = storages
            .into_iter()
            .filter(|(_, storage)| !storage.is_empty())
            .map(|(scope, storage)| {
                storage.collect(self, resource, scope, start_epoch_nanos, epoch_nanos)
            })
            .filter(|metric| !metric.is_empty())
            .collect();
        tracing::debug!(reader = %self.id, metrics = metrics.len(), epoch_nanos, "collected");
        metrics
    }
}

impl fmt::Debug for RegisteredReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredReader")
            .field("id", &self.id)
            .field("reader", &self.reader)
            .field("views", &self.views)
            .field("last_collected_epoch_nanos", &self.last_collected_epoch_nanos())
            .field(
                "previous_collected_epoch_nanos",
                &self.previous_collected_epoch_nanos(),
            )
            .finish()
    }
}

impl PartialEq for RegisteredReader {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RegisteredReader {}

impl Hash for RegisteredReader {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
