// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use serde::{Serialize, Serializer};

use crate::value::{AnyEncodable, HostValue};

/// Namespace prefix reserved for attributes the SDK injects itself, such as
/// event timestamps. Everything else is user data.
pub const INTERNAL_ATTRIBUTE_PREFIX: &str = "_dd.";

pub fn is_internal_attribute(key: &str) -> bool {
    key.starts_with(INTERNAL_ATTRIBUTE_PREFIX)
}

/// A typed attribute, ready for the native SDK's encoder.
///
/// Internal attributes are narrowed to one of the three variants the native
/// encoder handles directly; user attributes keep their full shape behind the
/// [`AnyEncodable`] erasure. Serialization is transparent in both cases, the
/// variant never appears in the output.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    String(String),
    Integer(i64),
    Double(f64),
    Encodable(AnyEncodable),
}

impl AttributeValue {
    /// Returns the underlying string when the attribute holds one, looking
    /// through the erasure for user attributes.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(string) => Some(string),
            AttributeValue::Encodable(any) => match &any.value {
                HostValue::String(string) => Some(string),
                _ => None,
            },
            _ => None,
        }
    }
}

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AttributeValue::String(string) => serializer.serialize_str(string),
            AttributeValue::Integer(integer) => serializer.serialize_i64(*integer),
            AttributeValue::Double(double) => serializer.serialize_f64(*double),
            AttributeValue::Encodable(any) => any.serialize(serializer),
        }
    }
}

/// The typed attribute map handed to the logging, tracing and RUM sinks.
pub type AttributeMap = HashMap<String, AttributeValue>;

/// Converts a raw host-runtime map into a typed attribute map.
///
/// Two-track policy keyed on the reserved namespace: internal attributes are
/// narrowed to a string, a 64-bit integer or a double, in that order, and
/// silently dropped when none fits; user attributes are wrapped unmodified,
/// deferring any validation to serialization time. Pure function, no entry is
/// ever invented and only failed internal narrowings are removed.
pub fn cast_attributes(attributes: HashMap<String, HostValue>) -> AttributeMap {
    let mut casted = AttributeMap::with_capacity(attributes.len());
    for (key, value) in attributes {
        if is_internal_attribute(&key) {
            if let Some(value) = cast_internal_attribute(value) {
                casted.insert(key, value);
            }
        } else {
            casted.insert(key, AttributeValue::Encodable(AnyEncodable::new(value)));
        }
    }
    casted
}

/// Internal attributes support only a narrow value set. A boxed boolean
/// narrows as an integer here, the host runtime does not deliver it as
/// anything more specific than a one-bit number; the double narrowing comes
/// last as the wider type.
fn cast_internal_attribute(value: HostValue) -> Option<AttributeValue> {
    match value {
        HostValue::String(string) => Some(AttributeValue::String(string)),
        HostValue::Number(number) => number
            .as_i64()
            .map(AttributeValue::Integer)
            .or_else(|| number.as_f64().map(AttributeValue::Double)),
        _ => None,
    }
}
