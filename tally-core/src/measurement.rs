// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::ops::Sub;

use crate::Attributes;

/// A long or double value, matching the instrument's [`InstrumentValueType`].
///
/// [`InstrumentValueType`]: crate::InstrumentValueType
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NumberValue {
    /// Integer value
    Long(i64),
    /// Floating point value
    Double(f64),
}

impl NumberValue {
    /// The value as a double. Long values beyond 2^53 lose precision.
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Long(v) => v as f64,
            Self::Double(v) => v,
        }
    }

    /// Whether the value is below zero
    pub fn is_negative(self) -> bool {
        match self {
            Self::Long(v) => v < 0,
            Self::Double(v) => v < 0.0,
        }
    }
}

impl Sub for NumberValue {
    type Output = NumberValue;

    /// Integers wrap rather than overflow; mixing kinds falls back to doubles.
    fn sub(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Self::Long(a), Self::Long(b)) => Self::Long(a.wrapping_sub(b)),
            (a, b) => Self::Double(a.as_f64() - b.as_f64()),
        }
    }
}

impl From<i64> for NumberValue {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<f64> for NumberValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

/// One recorded value together with its attributes.
#[derive(Clone, Debug, PartialEq)]
pub struct Measurement {
    /// The recorded value
    pub value: NumberValue,
    /// Attributes supplied with the recording
    pub attributes: Attributes,
    /// Whether the recording happened inside a sampled trace. Only consulted by
    /// [`ExemplarFilter::TraceBased`](crate::ExemplarFilter::TraceBased).
    pub sampled: bool,
    /// Start of the window this measurement covers, for asynchronous instruments
    pub start_epoch_nanos: u64,
    /// When the measurement was taken
    pub epoch_nanos: u64,
}

impl Measurement {
    /// A measurement of `value` with `attributes` and zeroed timestamps
    pub fn new(value: impl Into<NumberValue>, attributes: Attributes) -> Self {
        Self {
            value: value.into(),
            attributes,
            sampled: false,
            start_epoch_nanos: 0,
            epoch_nanos: 0,
        }
    }

    /// Mark the measurement as taken inside a sampled trace
    pub fn sampled(mut self, sampled: bool) -> Self {
        self.sampled = sampled;
        self
    }

    /// Set the window the measurement covers
    pub fn at(mut self, start_epoch_nanos: u64, epoch_nanos: u64) -> Self {
        self.start_epoch_nanos = start_epoch_nanos;
        self.epoch_nanos = epoch_nanos;
        self
    }
}
