use std::{
    io,
    sync::{Arc, Mutex},
    time::Duration,
};

use assert2::{check, let_assert};
use tally::{
    Aggregation, AggregationSelector, AggregationTemporality, Attributes, ExemplarFilter,
    InstrumentDescriptor, InstrumentSelector, InstrumentType, InstrumentValueType,
    InstrumentationScopeInfo, KeyValue, ManualReader, Measurement, MetricData, MetricDataKind,
    MetricReader, MetricStorage, NumberValue, PointValue, RegisteredReader, Resource,
    SynchronousMetricStorage, TemporalitySelector, View, ViewRegistry, WritableMetricStorage,
    fakes::ManualClock,
};

fn reader(temporality: TemporalitySelector) -> RegisteredReader {
    registered(temporality, ViewRegistry::new())
}

fn registered(temporality: TemporalitySelector, views: ViewRegistry) -> RegisteredReader {
    let reader: Arc<dyn MetricReader> =
        Arc::new(ManualReader::builder().with_temporality(temporality).build());
    RegisteredReader::new(reader, views)
}

fn counter() -> InstrumentDescriptor {
    InstrumentDescriptor::new("requests", InstrumentType::Counter, InstrumentValueType::Long)
}

fn sum_storage(instrument: InstrumentDescriptor, clock: &ManualClock) -> SynchronousMetricStorage {
    let aggregator = Aggregation::Sum.create_aggregator(&instrument, ExemplarFilter::AlwaysOff);
    SynchronousMetricStorage::new(instrument, View::new(), aggregator, Arc::new(clock.clone()))
}

fn route(route: &'static str) -> Attributes {
    Attributes::from([KeyValue::new("route", route)])
}

fn collect(
    storage: &dyn MetricStorage,
    reader: &RegisteredReader,
    epoch_nanos: u64,
) -> MetricData {
    storage.collect(
        reader,
        &Arc::new(Resource::empty()),
        &Arc::new(InstrumentationScopeInfo::new("test")),
        0,
        epoch_nanos,
    )
}

/// `(attributes, sum, start, end)` of every sum point, sorted by attributes
fn sums(metric: &MetricData) -> Vec<(Attributes, i64, u64, u64)> {
    let mut sums: Vec<_> = metric
        .points
        .iter()
        .map(|point| {
            let_assert!(PointValue::Sum(NumberValue::Long(sum)) = &point.value);
            (
                point.attributes.clone(),
                *sum,
                point.start_epoch_nanos,
                point.end_epoch_nanos,
            )
        })
        .collect();
    sums.sort_by_key(|(attributes, ..)| format!("{attributes:?}"));
    sums
}

#[test]
fn delta_readers_do_not_see_each_others_collections() {
    let clock = ManualClock::at(0);
    let storage = sum_storage(counter(), &clock);
    let first = reader(TemporalitySelector::Delta);
    let second = reader(TemporalitySelector::Delta);
    let cumulative = reader(TemporalitySelector::Cumulative);

    storage.record(&Measurement::new(5i64, route("/")));
    check!(sums(&collect(&storage, &first, 100)) == [(route("/"), 5, 0, 100)]);

    storage.record(&Measurement::new(3i64, route("/")));
    check!(sums(&collect(&storage, &second, 200)) == [(route("/"), 8, 0, 200)]);
    check!(sums(&collect(&storage, &first, 300)) == [(route("/"), 3, 100, 300)]);

    // nothing new for the first reader
    let idle = collect(&storage, &first, 400);
    check!(idle.is_empty());

    check!(sums(&collect(&storage, &cumulative, 500)) == [(route("/"), 8, 0, 500)]);
    check!(sums(&collect(&storage, &cumulative, 600)) == [(route("/"), 8, 0, 600)]);
}

#[test]
fn delta_collection_only_reports_attribute_sets_recorded_since() {
    let clock = ManualClock::at(0);
    let storage = sum_storage(counter(), &clock);
    let delta = reader(TemporalitySelector::Delta);

    storage.record(&Measurement::new(1i64, route("/a")));
    storage.record(&Measurement::new(2i64, route("/b")));
    let metric = collect(&storage, &delta, 10);
    check!(metric.temporality == AggregationTemporality::Delta);
    check!(metric.kind == MetricDataKind::Sum { monotonic: true });
    check!(sums(&metric) == [(route("/a"), 1, 0, 10), (route("/b"), 2, 0, 10)]);

    storage.record(&Measurement::new(4i64, route("/b")));
    check!(sums(&collect(&storage, &delta, 20)) == [(route("/b"), 4, 10, 20)]);
    check!(storage.attribute_set_count() == 2);
}

#[test]
fn up_down_counters_stay_cumulative_for_delta_readers() {
    let clock = ManualClock::at(0);
    let instrument = InstrumentDescriptor::new(
        "queue_depth",
        InstrumentType::UpDownCounter,
        InstrumentValueType::Long,
    );
    let storage = sum_storage(instrument, &clock);
    let delta = reader(TemporalitySelector::Delta);

    storage.record(&Measurement::new(5i64, Attributes::empty()));
    storage.record(&Measurement::new(-2i64, Attributes::empty()));
    let metric = collect(&storage, &delta, 10);
    check!(metric.temporality == AggregationTemporality::Cumulative);
    check!(metric.kind == MetricDataKind::Sum { monotonic: false });
    check!(sums(&metric) == [(Attributes::empty(), 3, 0, 10)]);

    storage.record(&Measurement::new(1i64, Attributes::empty()));
    check!(sums(&collect(&storage, &delta, 20)) == [(Attributes::empty(), 4, 0, 20)]);
}

#[test]
fn gauges_report_the_latest_observation() {
    let clock = ManualClock::at(0);
    let instrument =
        InstrumentDescriptor::new("temperature", InstrumentType::Gauge, InstrumentValueType::Double);
    let aggregator = Aggregation::default_aggregation()
        .create_aggregator(&instrument, ExemplarFilter::AlwaysOff);
    let storage =
        SynchronousMetricStorage::new(instrument, View::new(), aggregator, Arc::new(clock.clone()));
    let delta = reader(TemporalitySelector::Delta);

    check!(collect(&storage, &delta, 5).is_empty());

    clock.set(7);
    storage.record(&Measurement::new(20.5, Attributes::empty()));
    clock.set(9);
    storage.record(&Measurement::new(21.0, Attributes::empty()));
    let metric = collect(&storage, &delta, 10);
    check!(metric.kind == MetricDataKind::Gauge);
    let_assert!([point] = metric.points.as_slice());
    check!(point.value == PointValue::Gauge(NumberValue::Double(21.0)));
    check!(point.end_epoch_nanos == 9);

    check!(collect(&storage, &delta, 20).is_empty());
}

#[test]
fn views_rename_and_filter_attributes() {
    let clock = ManualClock::at(42);
    let views = ViewRegistry::new().with_view(
        InstrumentSelector::named("requests"),
        View::new()
            .with_name("http.requests")
            .with_description("requests served")
            .with_attribute_keys(["route"]),
    );
    let reader = registered(TemporalitySelector::Cumulative, views);
    let storages =
        reader.create_storages(&counter(), ExemplarFilter::AlwaysOn, Arc::new(clock.clone()));
    let_assert!([storage] = storages.as_slice());
    check!(storage.metric_descriptor().name == "http.requests");
    check!(storage.metric_descriptor().description == "requests served");

    let attributes = Attributes::from([
        KeyValue::new("route", "/"),
        KeyValue::new("user", "u-1"),
    ]);
    storage.record(&Measurement::new(1i64, attributes.clone()));
    storage.record(&Measurement::new(1i64, attributes.clone()));

    let metric = collect(&**storage, &reader, 100);
    check!(metric.descriptor.name == "http.requests");
    let_assert!([point] = metric.points.as_slice());
    check!(point.attributes == route("/"));
    check!(point.value == PointValue::Sum(NumberValue::Long(2)));
    check!(!point.exemplars.is_empty());
    for exemplar in &point.exemplars {
        check!(exemplar.filtered_attributes == Attributes::from([KeyValue::new("user", "u-1")]));
        check!(exemplar.epoch_nanos == 42);
    }
}

#[test]
fn every_matching_view_gets_its_own_storage() {
    let clock = ManualClock::at(0);
    let views = ViewRegistry::new()
        .with_view(InstrumentSelector::named("requests"), View::new().with_name("a"))
        .with_view(InstrumentSelector::named("requests"), View::new().with_name("b"));
    let reader = registered(TemporalitySelector::Cumulative, views);
    let storages =
        reader.create_storages(&counter(), ExemplarFilter::AlwaysOff, Arc::new(clock.clone()));
    check!(storages.len() == 2);
    for storage in &storages {
        storage.record(&Measurement::new(1i64, Attributes::empty()));
    }
    let scope = Arc::new(InstrumentationScopeInfo::new("test"));
    let metrics = reader.collect_all(
        storages
            .iter()
            .map(|storage| (&scope, &**storage as &dyn MetricStorage)),
        &Arc::new(Resource::empty()),
        0,
        &clock,
    );
    let names: Vec<_> = metrics.iter().map(|m| m.descriptor.name.clone()).collect();
    check!(names == ["a", "b"]);
}

#[test]
fn dropped_views_record_nothing() {
    let clock = ManualClock::at(0);
    let views = ViewRegistry::new().with_view(
        InstrumentSelector::named("requests"),
        View::new().with_aggregation(Aggregation::Drop),
    );
    let reader = registered(TemporalitySelector::Cumulative, views);
    let storages =
        reader.create_storages(&counter(), ExemplarFilter::AlwaysOn, Arc::new(clock.clone()));
    let_assert!([storage] = storages.as_slice());
    storage.record(&Measurement::new(1i64, route("/")));
    check!(storage.is_empty());
    check!(collect(&**storage, &reader, 10) == MetricData::empty());
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

#[test]
fn incompatible_aggregations_fall_back_to_empty_storage() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    let clock = ManualClock::at(0);
    let views = ViewRegistry::new().with_view(
        InstrumentSelector::named("requests"),
        View::new().with_aggregation(Aggregation::explicit_bucket_histogram()),
    );
    let reader = registered(TemporalitySelector::Cumulative, views);
    let storages = tracing::subscriber::with_default(subscriber, || {
        reader.create_storages(&counter(), ExemplarFilter::AlwaysOff, Arc::new(clock.clone()))
    });
    let_assert!([storage] = storages.as_slice());
    storage.record(&Measurement::new(1i64, route("/")));
    check!(storage.is_empty());
    check!(collect(&**storage, &reader, 10).is_empty());
    check!(logs.contents().contains("incompatible"));
}

#[test]
fn reader_default_aggregation_applies_without_views() {
    let clock = ManualClock::at(0);
    let selector = AggregationSelector::default()
        .with(InstrumentType::Histogram, Aggregation::base2_exponential_histogram());
    let reader: Arc<dyn MetricReader> =
        Arc::new(ManualReader::builder().with_aggregation_selector(selector).build());
    let reader = RegisteredReader::new(reader, ViewRegistry::new());
    let latency =
        InstrumentDescriptor::new("latency", InstrumentType::Histogram, InstrumentValueType::Double);
    let storages =
        reader.create_storages(&latency, ExemplarFilter::AlwaysOff, Arc::new(clock.clone()));
    let_assert!([storage] = storages.as_slice());
    for value in [1.0, 2.0, 4.0, 0.0] {
        storage.record(&Measurement::new(value, Attributes::empty()));
    }
    let metric = collect(&**storage, &reader, 10);
    check!(metric.kind == MetricDataKind::ExponentialHistogram);
    let_assert!([point] = metric.points.as_slice());
    let_assert!(PointValue::ExponentialHistogram(histogram) = &point.value);
    check!(histogram.count == 4);
    check!(histogram.zero_count == 1);
    check!(histogram.sum == 7.0);
    check!(histogram.positive.total() == 3);
}

#[test]
fn collect_all_skips_storages_without_data() {
    let clock = ManualClock::at(1_000);
    let reader = reader(TemporalitySelector::Cumulative);
    let used = sum_storage(counter(), &clock);
    let unused = sum_storage(
        InstrumentDescriptor::new("errors", InstrumentType::Counter, InstrumentValueType::Long),
        &clock,
    );
    used.record(&Measurement::new(1i64, Attributes::empty()));
    check!(!used.is_empty());
    check!(unused.is_empty());
    check!(reader.last_collected_epoch_nanos() == 0);

    let scope = Arc::new(InstrumentationScopeInfo::new("test"));
    let storages: [&dyn MetricStorage; 3] = [&used, &unused, &tally::EmptyMetricStorage];
    let metrics = reader.collect_all(
        storages.into_iter().map(|storage| (&scope, storage)),
        &Arc::new(Resource::empty()),
        0,
        &clock,
    );
    let_assert!([metric] = metrics.as_slice());
    check!(metric.descriptor.name == "requests");
    check!(metric.points[0].end_epoch_nanos == 1_000);
    check!(reader.last_collected_epoch_nanos() == 1_000);
}

#[test]
fn first_delta_of_a_storage_starts_at_the_readers_previous_cycle() {
    let clock = ManualClock::at(0);
    let delta = reader(TemporalitySelector::Delta);
    let busy = sum_storage(counter(), &clock);
    let late = sum_storage(
        InstrumentDescriptor::new("errors", InstrumentType::Counter, InstrumentValueType::Long),
        &clock,
    );
    let scope = Arc::new(InstrumentationScopeInfo::new("test"));
    let resource = Arc::new(Resource::empty());
    let cycle = || {
        let storages: [&dyn MetricStorage; 2] = [&busy, &late];
        delta.collect_all(
            storages.into_iter().map(|storage| (&scope, storage)),
            &resource,
            0,
            &clock,
        )
    };

    busy.record(&Measurement::new(1i64, Attributes::empty()));
    clock.set(100);
    let metrics = cycle();
    let_assert!([metric] = metrics.as_slice());
    check!(sums(metric) == [(Attributes::empty(), 1, 0, 100)]);

    // `late` had nothing to report at 100, so this reader never collected it
    clock.set(150);
    late.record(&Measurement::new(2i64, Attributes::empty()));
    clock.set(200);
    let metrics = cycle();
    let_assert!([metric] = metrics.as_slice());
    check!(metric.descriptor.name == "errors");
    check!(sums(metric) == [(Attributes::empty(), 2, 100, 200)]);
    check!(delta.previous_collected_epoch_nanos() == 100);
    check!(delta.last_collected_epoch_nanos() == 200);
}

#[test]
fn delta_points_only_carry_exemplars_from_their_window() {
    let clock = ManualClock::at(10);
    let latency =
        InstrumentDescriptor::new("latency", InstrumentType::Histogram, InstrumentValueType::Double);
    let aggregator = Aggregation::explicit_bucket_histogram_with_boundaries([10.0])
        .unwrap()
        .create_aggregator(&latency, ExemplarFilter::AlwaysOn);
    let storage =
        SynchronousMetricStorage::new(latency, View::new(), aggregator, Arc::new(clock.clone()));
    let delta = reader(TemporalitySelector::Delta);
    let cumulative = reader(TemporalitySelector::Cumulative);

    storage.record(&Measurement::new(1.0, Attributes::empty()));
    let metric = collect(&storage, &delta, 100);
    let_assert!([point] = metric.points.as_slice());
    check!(point.exemplars.len() == 1);

    clock.set(150);
    storage.record(&Measurement::new(50.0, Attributes::empty()));
    let metric = collect(&storage, &delta, 200);
    let_assert!([point] = metric.points.as_slice());
    let_assert!([exemplar] = point.exemplars.as_slice());
    check!(exemplar.value == NumberValue::Double(50.0));
    check!(exemplar.epoch_nanos == 150);

    let metric = collect(&storage, &cumulative, 300);
    let_assert!([point] = metric.points.as_slice());
    check!(point.exemplars.len() == 2);
}

#[test]
fn delta_readers_collect_one_storage_in_parallel() {
    const RECORDS: i64 = 5_000;

    let clock = ManualClock::at(0);
    let storage = sum_storage(counter(), &clock);
    let readers: Vec<RegisteredReader> = (0..4)
        .map(|_| reader(TemporalitySelector::Delta))
        .collect();

    let totals: Vec<i64> = std::thread::scope(|s| {
        s.spawn(|| {
            for i in 0..RECORDS {
                let path = if i % 2 == 0 { "/a" } else { "/b" };
                storage.record(&Measurement::new(1i64, route(path)));
            }
        });
        let collectors: Vec<_> = readers
            .iter()
            .map(|reader| {
                let storage = &storage;
                s.spawn(move || {
                    let mut total = 0;
                    for epoch in 1..20 {
                        total += sums(&collect(storage, reader, epoch))
                            .iter()
                            .map(|(_, sum, _, _)| sum)
                            .sum::<i64>();
                    }
                    total
                })
            })
            .collect();
        collectors
            .into_iter()
            .map(|collector| collector.join().unwrap())
            .collect()
    });

    for (reader, collected) in readers.iter().zip(totals) {
        let remaining: i64 = sums(&collect(&storage, reader, 1_000))
            .iter()
            .map(|(_, sum, _, _)| sum)
            .sum();
        check!(collected + remaining == RECORDS);
    }
}

#[test]
fn recording_while_collecting_loses_nothing() {
    const THREADS: i64 = 8;
    const RECORDS: i64 = 2_000;

    let clock = ManualClock::at(0);
    let storage = sum_storage(counter(), &clock);
    let delta = reader(TemporalitySelector::Delta);
    let routes = ["/a", "/b", "/c"];

    let collected: i64 = std::thread::scope(|s| {
        for t in 0..THREADS {
            let storage = &storage;
            s.spawn(move || {
                for i in 0..RECORDS {
                    let path = routes[((t + i) % 3) as usize];
                    storage.record(&Measurement::new(1i64, route(path)));
                }
            });
        }
        let collector = s.spawn(|| {
            let mut total = 0;
            for epoch in 1..50 {
                clock.advance(Duration::from_nanos(1));
                total += sums(&collect(&storage, &delta, epoch))
                    .iter()
                    .map(|(_, sum, _, _)| sum)
                    .sum::<i64>();
            }
            total
        });
        collector.join().unwrap()
    });

    let remaining: i64 = sums(&collect(&storage, &delta, 1_000))
        .iter()
        .map(|(_, sum, _, _)| sum)
        .sum();
    check!(collected + remaining == THREADS * RECORDS);
}

#[test]
fn in_memory_exporter_keeps_exports_until_shutdown() {
    use tally::{InMemoryMetricExporter, MetricExporter};

    let clock = ManualClock::at(0);
    let storage = sum_storage(counter(), &clock);
    let reader = reader(TemporalitySelector::Cumulative);
    storage.record(&Measurement::new(3i64, Attributes::empty()));

    let exporter = InMemoryMetricExporter::new();
    check!(exporter.export(vec![collect(&storage, &reader, 10)]).is_success());
    check!(exporter.export(vec![collect(&storage, &reader, 20)]).is_success());
    let finished = exporter.finished_metrics();
    check!(finished.len() == 2);
    check!(sums(&finished[1]) == [(Attributes::empty(), 3, 0, 20)]);

    exporter.reset();
    check!(exporter.finished_metrics().is_empty());

    check!(exporter.shutdown().is_success());
    check!(exporter.shutdown().is_success());
    check!(!exporter.export(vec![collect(&storage, &reader, 30)]).is_success());
    check!(exporter.force_flush().is_success());
}
