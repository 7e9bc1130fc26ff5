use std::sync::Arc;

use divan::{Bencher, black_box};
use tally::{
    Aggregation, Attributes, ExemplarFilter, InstrumentDescriptor, InstrumentType,
    InstrumentValueType, InstrumentationScopeInfo, KeyValue, ManualReader, Measurement,
    MetricStorage, RegisteredReader, Resource, SynchronousMetricStorage, SystemClock,
    TemporalitySelector, View, ViewRegistry, WritableMetricStorage,
};

fn main() {
    divan::main();
}

const THREADS: &[usize] = &[1, 2, 4, 8];
const ATTRIBUTE_SETS: &[usize] = &[1, 100, 1000];

fn storage(aggregation: Aggregation) -> SynchronousMetricStorage {
    let instrument =
        InstrumentDescriptor::new("latency", InstrumentType::Histogram, InstrumentValueType::Double);
    let aggregator = aggregation.create_aggregator(&instrument, ExemplarFilter::TraceBased);
    SynchronousMetricStorage::new(instrument, View::new(), aggregator, Arc::new(SystemClock))
}

fn attribute_sets(count: usize) -> Vec<Attributes> {
    (0..count)
        .map(|i| Attributes::from([KeyValue::new("shard", i as i64)]))
        .collect()
}

#[divan::bench(consts = THREADS, args = ATTRIBUTE_SETS)]
fn record<const T: usize>(bencher: Bencher, sets: usize) {
    let attributes = attribute_sets(sets);
    bencher
        .with_inputs(|| storage(Aggregation::explicit_bucket_histogram()))
        .bench_values(|storage| {
            std::thread::scope(|s| {
                for t in 0..T {
                    let storage = &storage;
                    let attributes = &attributes;
                    s.spawn(move || {
                        for i in 0..1000 {
                            let set = &attributes[(t + i) % attributes.len()];
                            storage.record(&Measurement::new(black_box(i as f64), set.clone()));
                        }
                    });
                }
            });
            storage
        });
}

#[divan::bench(args = ATTRIBUTE_SETS)]
fn collect_delta(bencher: Bencher, sets: usize) {
    let reader = RegisteredReader::new(
        Arc::new(
            ManualReader::builder()
                .with_temporality(TemporalitySelector::Delta)
                .build(),
        ),
        ViewRegistry::new(),
    );
    let resource = Arc::new(Resource::empty());
    let scope = Arc::new(InstrumentationScopeInfo::new("bench"));
    let attributes = attribute_sets(sets);
    bencher
        .with_inputs(|| {
            let storage = storage(Aggregation::base2_exponential_histogram());
            for (i, set) in attributes.iter().enumerate() {
                storage.record(&Measurement::new(i as f64 + 0.5, set.clone()));
            }
            storage
        })
        .bench_values(|storage| black_box(storage.collect(&reader, &resource, &scope, 0, 1)));
}
