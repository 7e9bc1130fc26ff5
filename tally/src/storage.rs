// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Per-instrument storage of aggregator handles.
//!
//! Handles accumulate cumulatively for the lifetime of the storage and are shared
//! by every reader. Each reader gets its own record of what it saw last, so delta
//! readers diff against their own previous snapshot and one reader collecting never
//! changes what another reader sees.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use dashmap::DashMap;
use parking_lot::Mutex;
use tally_aggregation::{Aggregator, AggregatorHandle, HandleSnapshot};
use tally_core::{
    AggregationTemporality, Attributes, Clock, InstrumentDescriptor, InstrumentationScopeInfo,
    Measurement, MetricData, MetricDescriptor, PointData, Resource,
};

use crate::{
    View,
    reader::{ReaderId, RegisteredReader},
};

/// Collection side of a storage.
pub trait MetricStorage: Send + Sync + fmt::Debug {
    /// The descriptor exported points are reported under
    fn metric_descriptor(&self) -> &MetricDescriptor;

    /// Snapshot every attribute set for `reader` at `epoch_nanos`.
    ///
    /// Cumulative points span `[start_epoch_nanos, epoch_nanos)`. Delta points span
    /// from this reader's previous collection of the storage and only cover
    /// attribute sets recorded into since then. The first delta window starts at
    /// the later of `start_epoch_nanos` and
    /// [`RegisteredReader::previous_collected_epoch_nanos`].
    fn collect(
        &self,
        reader: &RegisteredReader,
        resource: &Arc<Resource>,
        scope: &Arc<InstrumentationScopeInfo>,
        start_epoch_nanos: u64,
        epoch_nanos: u64,
    ) -> MetricData;

    /// Whether any measurement was ever accepted
    fn is_empty(&self) -> bool;
}

/// Recording side of a storage.
pub trait WritableMetricStorage: MetricStorage {
    /// Record one measurement. Never blocks on collection.
    fn record(&self, measurement: &Measurement);
}

/// Storage discarding everything, used where no aggregation applies.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyMetricStorage;

static EMPTY_DESCRIPTOR: MetricDescriptor = MetricDescriptor::empty();

impl MetricStorage for EmptyMetricStorage {
    fn metric_descriptor(&self) -> &MetricDescriptor {
        &EMPTY_DESCRIPTOR
    }

    fn collect(
        &self,
        _reader: &RegisteredReader,
        _resource: &Arc<Resource>,
        _scope: &Arc<InstrumentationScopeInfo>,
        _start_epoch_nanos: u64,
        _epoch_nanos: u64,
    ) -> MetricData {
        MetricData::empty()
    }

    fn is_empty(&self) -> bool {
        true
    }
}

impl WritableMetricStorage for EmptyMetricStorage {
    fn record(&self, _measurement: &Measurement) {}
}

/// What one reader saw at its previous collection.
#[derive(Debug)]
struct ReaderState {
    last_epoch_nanos: u64,
    previous: hashbrown::HashMap<Attributes, HandleSnapshot>,
}

/// Storage for synchronous instruments.
pub struct SynchronousMetricStorage {
    instrument: InstrumentDescriptor,
    descriptor: MetricDescriptor,
    view: View,
    aggregator: Aggregator,
    clock: Arc<dyn Clock>,
    handles: DashMap<Attributes, Arc<AggregatorHandle>>,
    readers: Mutex<hashbrown::HashMap<ReaderId, ReaderState>>,
    has_recordings: AtomicBool,
}

impl SynchronousMetricStorage {
    /// Storage for `instrument` as shaped by `view`, aggregating with `aggregator`.
    pub fn new(
        instrument: InstrumentDescriptor,
        view: View,
        aggregator: Aggregator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            descriptor: view.metric_descriptor(&instrument),
            instrument,
            view,
            aggregator,
            clock,
            handles: DashMap::new(),
            readers: Mutex::new(hashbrown::HashMap::new()),
            has_recordings: AtomicBool::new(false),
        }
    }

    /// The aggregator handles are created from
    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Number of attribute sets seen so far
    pub fn attribute_set_count(&self) -> usize {
        self.handles.len()
    }

    /// Get or create the handle for `attributes`. Concurrent creators race on the
    /// shard lock and all end up with the winner's handle.
    fn handle(&self, attributes: &Attributes) -> Arc<AggregatorHandle> {
        if let Some(handle) = self.handles.get(attributes) {
            return handle.value().clone();
        }
        self.handles
            .entry(attributes.clone())
            .or_insert_with(|| Arc::new(self.aggregator.create_handle()))
            .value()
            .clone()
    }

    /// Every handle, taken out of the map so snapshots run without shard locks.
    fn handles(&self) -> Vec<(Attributes, Arc<AggregatorHandle>)> {
        self.handles
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// This reader's delta state, created on first use. A storage the reader
    /// never collected starts its window at the reader's previous cycle.
    fn reader_state<'a>(
        readers: &'a mut hashbrown::HashMap<ReaderId, ReaderState>,
        reader: &RegisteredReader,
        start_epoch_nanos: u64,
    ) -> &'a mut ReaderState {
        readers.entry(reader.id()).or_insert_with(|| ReaderState {
            last_epoch_nanos: start_epoch_nanos.max(reader.previous_collected_epoch_nanos()),
            previous: hashbrown::HashMap::new(),
        })
    }

    fn delta_point(
        &self,
        state: &mut ReaderState,
        attributes: Attributes,
        snapshot: HandleSnapshot,
    ) -> Option<PointData> {
        let point = match state.previous.get(&attributes) {
            Some(previous) if previous.recordings == snapshot.recordings => return None,
            Some(previous) => match self.aggregator.diff(&previous.point, &snapshot.point) {
                Ok(point) => Some(point),
                Err(error) => {
                    tracing::error!(
                        instrument = self.instrument.name(),
                        ?attributes,
                        %error,
                        "cumulative snapshots went backwards, omitting point"
                    );
                    None
                }
            },
            None => Some(snapshot.point.clone()),
        };
        state.previous.insert(attributes, snapshot);
        point.map(|mut point| {
            // reservoirs are never drained; keep only this window's samples
            let window_start = point.start_epoch_nanos;
            point
                .exemplars
                .retain(|exemplar| exemplar.epoch_nanos >= window_start);
            point
        })
    }
}

impl fmt::Debug for SynchronousMetricStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynchronousMetricStorage")
            .field("descriptor", &self.descriptor)
            .field("aggregator", &self.aggregator)
            .field("attribute_sets", &self.handles.len())
            .finish_non_exhaustive()
    }
}

impl MetricStorage for SynchronousMetricStorage {
    fn metric_descriptor(&self) -> &MetricDescriptor {
        &self.descriptor
    }

    fn collect(
        &self,
        reader: &RegisteredReader,
        resource: &Arc<Resource>,
        scope: &Arc<InstrumentationScopeInfo>,
        start_epoch_nanos: u64,
        epoch_nanos: u64,
    ) -> MetricData {
        if self.aggregator.is_drop() {
            return MetricData::empty();
        }
        let temporality = reader
            .reader()
            .temporality(self.instrument.instrument_type());
        let window_start = match temporality {
            AggregationTemporality::Cumulative => start_epoch_nanos,
            AggregationTemporality::Delta => {
                let mut readers = self.readers.lock();
                Self::reader_state(&mut readers, reader, start_epoch_nanos).last_epoch_nanos
            }
        };

        // snapshot outside the reader lock so readers collect in parallel
        let snapshots: Vec<(Attributes, HandleSnapshot)> = self
            .handles()
            .into_iter()
            .filter_map(|(attributes, handle)| {
                let snapshot = handle.snapshot(&attributes, window_start, epoch_nanos)?;
                (snapshot.recordings > 0).then_some((attributes, snapshot))
            })
            .collect();

        let points: Vec<PointData> = match temporality {
            AggregationTemporality::Cumulative => snapshots
                .into_iter()
                .map(|(_, snapshot)| snapshot.point)
                .collect(),
            AggregationTemporality::Delta => {
                let mut readers = self.readers.lock();
                let state = Self::reader_state(&mut readers, reader, start_epoch_nanos);
                let points = snapshots
                    .into_iter()
                    .filter_map(|(attributes, snapshot)| {
                        self.delta_point(state, attributes, snapshot)
                    })
                    .collect();
                state.last_epoch_nanos = epoch_nanos;
                points
            }
        };

        tracing::trace!(
            instrument = self.instrument.name(),
            reader = %reader.id(),
            ?temporality,
            points = points.len(),
            "collected storage"
        );
        self.aggregator
            .to_metric_data(resource, scope, &self.descriptor, points, temporality)
    }

    fn is_empty(&self) -> bool {
        !self.has_recordings.load(Ordering::Relaxed)
    }
}

impl WritableMetricStorage for SynchronousMetricStorage {
    fn record(&self, measurement: &Measurement) {
        if self.aggregator.is_drop() {
            return;
        }
        let epoch_nanos = self.clock.now_epoch_nanos();
        let accepted = if self.view.filters_attributes() {
            let (attributes, filtered) = self.view.filter_attributes(&measurement.attributes);
            self.handle(&attributes)
                .record(measurement, &filtered, epoch_nanos)
        } else {
            self.handle(&measurement.attributes)
                .record(measurement, &Attributes::empty(), epoch_nanos)
        };
        if accepted && !self.has_recordings.load(Ordering::Relaxed) {
            self.has_recordings.store(true, Ordering::Relaxed);
        }
    }
}
