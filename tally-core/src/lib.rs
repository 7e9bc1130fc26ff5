// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod attributes;
mod boundaries;
mod clock;
mod data;
mod error;
mod exemplar;
mod instrument;
mod measurement;
mod resource;

pub use attributes::{AttributeValue, Attributes, Key, KeyValue};
pub use boundaries::{DEFAULT_BOUNDARIES, ExplicitBucketBoundaries};
#[cfg(feature = "test-util")]
pub use clock::fakes;
pub use clock::{Clock, SystemClock};
pub use data::{
    AggregationTemporality, ExponentialBuckets, ExponentialHistogramPointValue,
    HistogramPointValue, MetricData, MetricDataKind, PointData, PointValue,
};
pub use error::{ConfigError, MAX_SCALE, MIN_SCALE};
pub use exemplar::{ExemplarData, ExemplarFilter};
pub use instrument::{InstrumentDescriptor, InstrumentType, InstrumentValueType, MetricDescriptor};
pub use measurement::{Measurement, NumberValue};
pub use resource::{InstrumentationScopeInfo, Resource};
