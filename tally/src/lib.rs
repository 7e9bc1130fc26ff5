// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod export;
pub mod reader;
pub mod storage;
mod view;

pub use export::{ExportResult, MetricExporter};
#[cfg(feature = "test-util")]
pub use export::InMemoryMetricExporter;
pub use reader::{
    ManualReader, ManualReaderBuilder, MetricReader, ReaderId, RegisteredReader,
    TemporalitySelector,
};
pub use storage::{
    EmptyMetricStorage, MetricStorage, SynchronousMetricStorage, WritableMetricStorage,
};
pub use view::{InstrumentSelector, View, ViewRegistry};

pub use tally_aggregation::{
    Aggregation, AggregationSelector, Aggregator, AggregatorHandle,
    Base2ExponentialHistogramIndexer, DefaultAggregationSelector, DiffError,
    ExponentialHistogramOptions,
};
pub use tally_core::*;
