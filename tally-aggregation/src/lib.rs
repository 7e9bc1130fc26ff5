#![deny(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod aggregation;
pub mod aggregator;
mod error;
pub mod exemplar;
mod indexer;
mod selector;

pub use aggregation::{Aggregation, ExponentialHistogramOptions};
pub use aggregator::{Aggregator, AggregatorHandle, HandleSnapshot};
pub use error::DiffError;
pub use indexer::{Base2ExponentialHistogramIndexer, map_to_index_scale_zero, scale_factor};
pub use selector::{AggregationSelector, DefaultAggregationSelector};
