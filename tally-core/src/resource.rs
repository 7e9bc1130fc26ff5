// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::borrow::Cow;

use crate::Attributes;

/// The entity producing telemetry, e.g. a service instance.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Resource {
    /// Attributes describing the entity
    pub attributes: Attributes,
}

impl Resource {
    /// A resource with no attributes
    pub const fn empty() -> Self {
        Self {
            attributes: Attributes::empty(),
        }
    }

    /// A resource described by `attributes`
    pub fn new(attributes: Attributes) -> Self {
        Self { attributes }
    }
}

/// The library or component that created an instrument.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InstrumentationScopeInfo {
    /// Scope name
    pub name: Cow<'static, str>,
    /// Scope version
    pub version: Option<Cow<'static, str>>,
    /// Schema the emitted telemetry follows
    pub schema_url: Option<Cow<'static, str>>,
}

impl InstrumentationScopeInfo {
    /// A scope with only a name
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            version: None,
            schema_url: None,
        }
    }

    /// The unnamed scope attached to [`MetricData::empty`](crate::MetricData::empty)
    pub const fn empty() -> Self {
        Self {
            name: Cow::Borrowed(""),
            version: None,
            schema_url: None,
        }
    }

    /// Set the version
    pub fn with_version(mut self, version: impl Into<Cow<'static, str>>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the schema url
    pub fn with_schema_url(mut self, schema_url: impl Into<Cow<'static, str>>) -> Self {
        self.schema_url = Some(schema_url.into());
        self
    }
}
