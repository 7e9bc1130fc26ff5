// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{Attributes, Measurement, NumberValue};

/// A raw measurement kept next to an aggregate for diagnostic context.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExemplarData {
    /// The recorded value
    pub value: NumberValue,
    /// When it was recorded
    pub epoch_nanos: u64,
    /// Attributes of the measurement that did not make it into the point
    pub filtered_attributes: Attributes,
}

/// Decides which measurements are offered to the exemplar reservoir.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExemplarFilter {
    /// Every measurement is a candidate
    AlwaysOn,
    /// No measurement is a candidate
    AlwaysOff,
    /// Measurements recorded inside a sampled trace are candidates
    #[default]
    TraceBased,
}

impl ExemplarFilter {
    /// Whether `measurement` should be offered to the reservoir
    pub fn should_sample(self, measurement: &Measurement) -> bool {
        match self {
            Self::AlwaysOn => true,
            Self::AlwaysOff => false,
            Self::TraceBased => measurement.sampled,
        }
    }
}
