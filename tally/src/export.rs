// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The seam between collection and transport.

use std::fmt::Debug;

use tally_core::MetricData;

/// Outcome of an exporter call.
///
/// Exporters own retries; callers only learn whether the call went through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub enum ExportResult {
    /// The call completed
    Success,
    /// The call failed
    Failure,
}

impl ExportResult {
    /// Whether this is [`ExportResult::Success`]
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

/// Sends collected metrics somewhere.
///
/// All methods are synchronous and may be called concurrently with recordings.
/// `shutdown` must be idempotent.
pub trait MetricExporter: Send + Sync + Debug {
    /// Hand over one collection's worth of metrics
    fn export(&self, metrics: Vec<MetricData>) -> ExportResult;

    /// Push out anything buffered
    fn force_flush(&self) -> ExportResult {
        ExportResult::Success
    }

    /// Release resources. Later exports fail.
    fn shutdown(&self) -> ExportResult;
}

#[cfg(feature = "test-util")]
mod in_memory {
    use std::sync::atomic::{AtomicBool, Ordering};

    use parking_lot::Mutex;
    use tally_core::MetricData;

    use super::{ExportResult, MetricExporter};

    /// Keeps exported metrics in memory so tests can inspect them.
    ///
    /// This requires that the `test-util` feature be enabled.
    #[derive(Debug, Default)]
    pub struct InMemoryMetricExporter {
        metrics: Mutex<Vec<MetricData>>,
        is_shutdown: AtomicBool,
    }

    impl InMemoryMetricExporter {
        /// An empty exporter
        pub fn new() -> Self {
            Self::default()
        }

        /// Everything exported so far, in export order
        pub fn finished_metrics(&self) -> Vec<MetricData> {
            self.metrics.lock().clone()
        }

        /// Forget everything exported so far
        pub fn reset(&self) {
            self.metrics.lock().clear();
        }
    }

    impl MetricExporter for InMemoryMetricExporter {
        fn export(&self, metrics: Vec<MetricData>) -> ExportResult {
            if self.is_shutdown.load(Ordering::Acquire) {
                return ExportResult::Failure;
            }
            self.metrics.lock().extend(metrics);
            ExportResult::Success
        }

        fn shutdown(&self) -> ExportResult {
            if !self.is_shutdown.swap(true, Ordering::AcqRel) {
                tracing::debug!("in-memory exporter shut down");
            }
            ExportResult::Success
        }
    }
}

#[cfg(feature = "test-util")]
pub use in_memory::InMemoryMetricExporter;
