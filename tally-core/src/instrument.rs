// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::borrow::Cow;

use crate::{ConfigError, ExplicitBucketBoundaries};

/// The kind of instrument a measurement came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InstrumentType {
    /// Synchronous monotonic sum
    Counter,
    /// Synchronous non-monotonic sum
    UpDownCounter,
    /// Synchronous distribution
    Histogram,
    /// Synchronous current value
    Gauge,
    /// Asynchronous monotonic sum
    ObservableCounter,
    /// Asynchronous non-monotonic sum
    ObservableUpDownCounter,
    /// Asynchronous current value
    ObservableGauge,
}

impl InstrumentType {
    /// Every instrument type, in declaration order
    pub const ALL: [InstrumentType; 7] = [
        Self::Counter,
        Self::UpDownCounter,
        Self::Histogram,
        Self::Gauge,
        Self::ObservableCounter,
        Self::ObservableUpDownCounter,
        Self::ObservableGauge,
    ];

    /// Counters and up-down counters, synchronous or not
    pub fn is_counter_family(self) -> bool {
        matches!(
            self,
            Self::Counter
                | Self::UpDownCounter
                | Self::ObservableCounter
                | Self::ObservableUpDownCounter
        )
    }

    /// Whether sums produced by this instrument can only grow
    pub fn is_monotonic(self) -> bool {
        matches!(self, Self::Counter | Self::ObservableCounter)
    }

    /// Histograms
    pub fn is_histogram(self) -> bool {
        matches!(self, Self::Histogram)
    }

    /// Gauges, synchronous or not
    pub fn is_gauge(self) -> bool {
        matches!(self, Self::Gauge | Self::ObservableGauge)
    }
}

/// Whether an instrument records integers or doubles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InstrumentValueType {
    /// `i64` measurements
    Long,
    /// `f64` measurements
    #[default]
    Double,
}

/// Static description of an instrument, handed over once at instrument creation.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InstrumentDescriptor {
    name: Cow<'static, str>,
    description: Cow<'static, str>,
    unit: Cow<'static, str>,
    instrument_type: InstrumentType,
    value_type: InstrumentValueType,
    explicit_bucket_boundaries_advice: Option<ExplicitBucketBoundaries>,
}

impl InstrumentDescriptor {
    /// Describe an instrument
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        instrument_type: InstrumentType,
        value_type: InstrumentValueType,
    ) -> Self {
        Self {
            name: name.into(),
            description: Cow::Borrowed(""),
            unit: Cow::Borrowed(""),
            instrument_type,
            value_type,
            explicit_bucket_boundaries_advice: None,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<Cow<'static, str>>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the unit
    pub fn with_unit(mut self, unit: impl Into<Cow<'static, str>>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Attach advisory histogram boundaries. They are validated here, so a
    /// descriptor never carries boundaries that a histogram would reject.
    pub fn with_explicit_bucket_boundaries_advice(
        mut self,
        boundaries: impl Into<Vec<f64>>,
    ) -> Result<Self, ConfigError> {
        self.explicit_bucket_boundaries_advice = Some(ExplicitBucketBoundaries::new(boundaries)?);
        Ok(self)
    }

    /// Instrument name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instrument description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Instrument unit
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Instrument type
    pub fn instrument_type(&self) -> InstrumentType {
        self.instrument_type
    }

    /// Measurement value type
    pub fn value_type(&self) -> InstrumentValueType {
        self.value_type
    }

    /// Advisory boundaries for histograms, if any
    pub fn explicit_bucket_boundaries_advice(&self) -> Option<&ExplicitBucketBoundaries> {
        self.explicit_bucket_boundaries_advice.as_ref()
    }
}

/// Name, description and unit a metric is exported under.
///
/// Starts out as a copy of the instrument's, but a view may rename the stream.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricDescriptor {
    /// Exported name
    pub name: Cow<'static, str>,
    /// Exported description
    pub description: Cow<'static, str>,
    /// Exported unit
    pub unit: Cow<'static, str>,
}

impl MetricDescriptor {
    /// The descriptor attached to [`MetricData::empty`](crate::MetricData::empty)
    pub const fn empty() -> Self {
        Self {
            name: Cow::Borrowed(""),
            description: Cow::Borrowed(""),
            unit: Cow::Borrowed(""),
        }
    }
}

impl From<&InstrumentDescriptor> for MetricDescriptor {
    fn from(instrument: &InstrumentDescriptor) -> Self {
        Self {
            name: instrument.name.clone(),
            description: instrument.description.clone(),
            unit: instrument.unit.clone(),
        }
    }
}
