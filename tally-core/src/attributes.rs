// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::{borrow::Cow, fmt};

use ordered_float::OrderedFloat;
use smallvec::SmallVec;

/// Attribute key
pub type Key = Cow<'static, str>;

/// The value half of an attribute.
///
/// Doubles are wrapped in [`OrderedFloat`] so that an attribute set can be used as a
/// hash map key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AttributeValue {
    /// A string value
    String(Cow<'static, str>),
    /// A boolean value
    Bool(bool),
    /// A signed integer value
    I64(i64),
    /// A floating point value
    F64(OrderedFloat<f64>),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Bool(b) => b.fmt(f),
            Self::I64(i) => i.fmt(f),
            Self::F64(v) => v.fmt(f),
        }
    }
}

impl From<&'static str> for AttributeValue {
    fn from(value: &'static str) -> Self {
        Self::String(Cow::Borrowed(value))
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(Cow::Owned(value))
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::I64(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::F64(OrderedFloat(value))
    }
}

/// A single key/value attribute.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyValue {
    /// Attribute key
    pub key: Key,
    /// Attribute value
    pub value: AttributeValue,
}

impl KeyValue {
    /// Create a new attribute
    pub fn new(key: impl Into<Key>, value: impl Into<AttributeValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// An immutable set of attributes identifying one time series of an instrument.
///
/// Entries are kept sorted by key with duplicate keys collapsed (the last one wins),
/// so two sets built from the same pairs in different orders compare and hash equal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(transparent))]
pub struct Attributes(SmallVec<[KeyValue; 4]>);

impl Attributes {
    /// The empty attribute set
    pub const fn empty() -> Self {
        Self(SmallVec::new_const())
    }

    /// Number of attributes in the set
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set has no attributes
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Look up the value for `key`
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.0
            .binary_search_by(|kv| kv.key.as_ref().cmp(key))
            .ok()
            .map(|idx| &self.0[idx].value)
    }

    /// Iterate over the attributes in key order
    pub fn iter(&self) -> impl Iterator<Item = &KeyValue> {
        self.0.iter()
    }

    /// Split the set into the attributes whose key satisfies `keep` and the rest.
    pub fn partition(&self, mut keep: impl FnMut(&str) -> bool) -> (Attributes, Attributes) {
        let (kept, dropped): (SmallVec<_>, SmallVec<_>) =
            self.0.iter().cloned().partition(|kv| keep(&kv.key));
        (Self(kept), Self(dropped))
    }
}

impl FromIterator<KeyValue> for Attributes {
    fn from_iter<T: IntoIterator<Item = KeyValue>>(iter: T) -> Self {
        let mut entries: SmallVec<[KeyValue; 4]> = iter.into_iter().collect();
        // stable sort keeps insertion order between equal keys, so the later pair
        // survives the reverse dedup below
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries.reverse();
        entries.dedup_by(|a, b| a.key == b.key);
        entries.reverse();
        Self(entries)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Attributes {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        <Vec<KeyValue> as serde::Deserialize>::deserialize(deserializer).map(Self::from_iter)
    }
}

impl<const N: usize> From<[KeyValue; N]> for Attributes {
    fn from(value: [KeyValue; N]) -> Self {
        value.into_iter().collect()
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = &'a KeyValue;
    type IntoIter = std::slice::Iter<'a, KeyValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use assert2::check;

    use super::{AttributeValue, Attributes, KeyValue};

    #[test]
    fn order_does_not_matter() {
        let a = Attributes::from([KeyValue::new("b", 1i64), KeyValue::new("a", "x")]);
        let b = Attributes::from([KeyValue::new("a", "x"), KeyValue::new("b", 1i64)]);
        check!(a == b);
    }

    #[test]
    fn later_duplicate_wins() {
        let attrs = Attributes::from([
            KeyValue::new("k", "first"),
            KeyValue::new("z", true),
            KeyValue::new("k", "second"),
        ]);
        check!(attrs.len() == 2);
        check!(attrs.get("k") == Some(&AttributeValue::from("second")));
    }

    #[test]
    fn partition_by_key() {
        let attrs = Attributes::from([
            KeyValue::new("method", "GET"),
            KeyValue::new("user", "alice"),
            KeyValue::new("status", 200i64),
        ]);
        let (kept, dropped) = attrs.partition(|k| k != "user");
        check!(kept.len() == 2);
        check!(kept.get("user").is_none());
        check!(dropped.get("user") == Some(&AttributeValue::from("alice")));
    }
}
