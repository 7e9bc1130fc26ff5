// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Per-reader customization of the streams an instrument produces.

use std::borrow::Cow;

use tally_aggregation::Aggregation;
use tally_core::{Attributes, InstrumentDescriptor, InstrumentType, Key, MetricDescriptor};

/// Matches instruments by exact name and, optionally, type.
#[derive(Clone, Debug, PartialEq)]
pub struct InstrumentSelector {
    name: Cow<'static, str>,
    instrument_type: Option<InstrumentType>,
}

impl InstrumentSelector {
    /// Select instruments called `name`
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            instrument_type: None,
        }
    }

    /// Additionally require `instrument_type`
    pub fn with_type(mut self, instrument_type: InstrumentType) -> Self {
        self.instrument_type = Some(instrument_type);
        self
    }

    /// Whether `instrument` is selected
    pub fn matches(&self, instrument: &InstrumentDescriptor) -> bool {
        instrument.name() == self.name
            && self
                .instrument_type
                .is_none_or(|t| t == instrument.instrument_type())
    }
}

/// How a selected instrument is turned into a stream.
///
/// Every field is optional; unset fields keep the instrument's own behaviour.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct View {
    name: Option<Cow<'static, str>>,
    description: Option<Cow<'static, str>>,
    aggregation: Option<Aggregation>,
    attribute_keys: Option<Vec<Key>>,
}

impl View {
    /// A view changing nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Export under `name`
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Export with `description`
    pub fn with_description(mut self, description: impl Into<Cow<'static, str>>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Aggregate with `aggregation` instead of the reader's default
    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = Some(aggregation);
        self
    }

    /// Keep only these attribute keys on points. The others are moved onto
    /// exemplars.
    pub fn with_attribute_keys<K: Into<Key>>(mut self, keys: impl IntoIterator<Item = K>) -> Self {
        let mut keys: Vec<Key> = keys.into_iter().map(Into::into).collect();
        keys.sort();
        keys.dedup();
        self.attribute_keys = Some(keys);
        self
    }

    /// The aggregation override, if any
    pub fn aggregation(&self) -> Option<&Aggregation> {
        self.aggregation.as_ref()
    }

    /// The exported descriptor of `instrument` under this view
    pub fn metric_descriptor(&self, instrument: &InstrumentDescriptor) -> MetricDescriptor {
        let mut descriptor = MetricDescriptor::from(instrument);
        if let Some(name) = &self.name {
            descriptor.name = name.clone();
        }
        if let Some(description) = &self.description {
            descriptor.description = description.clone();
        }
        descriptor
    }

    /// Split `attributes` into the set keying the point and the filtered rest.
    pub fn filter_attributes(&self, attributes: &Attributes) -> (Attributes, Attributes) {
        match &self.attribute_keys {
            None => (attributes.clone(), Attributes::empty()),
            Some(keys) => attributes.partition(|key| {
                keys.binary_search_by(|allowed| allowed.as_ref().cmp(key))
                    .is_ok()
            }),
        }
    }

    pub(crate) fn filters_attributes(&self) -> bool {
        self.attribute_keys.is_some()
    }
}

/// The views one reader applies, in registration order.
///
/// Instruments no view selects get a single [`View::new`].
#[derive(Clone, Debug, Default)]
pub struct ViewRegistry {
    views: Vec<(InstrumentSelector, View)>,
}

impl ViewRegistry {
    /// A registry with no views
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `view` for instruments matching `selector`
    pub fn with_view(mut self, selector: InstrumentSelector, view: View) -> Self {
        self.views.push((selector, view));
        self
    }

    /// Views applying to `instrument`; never empty
    pub fn find_views(&self, instrument: &InstrumentDescriptor) -> Vec<View> {
        let matched: Vec<View> = self
            .views
            .iter()
            .filter(|(selector, _)| selector.matches(instrument))
            .map(|(_, view)| view.clone())
            .collect();
        if matched.is_empty() {
            vec![View::new()]
        } else {
            matched
        }
    }
}
