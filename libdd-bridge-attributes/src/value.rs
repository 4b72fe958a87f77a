// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::Error;
use serde::{Serialize, Serializer};
use url::Url;

/// A dynamically tagged value received from the host runtime.
///
/// The cross-platform layer marshals call arguments as string-keyed maps of
/// loosely typed values. This enum is the closed set of shapes the host can
/// deliver; classification happens by matching on the variant, never by
/// open-ended reflection.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Null,
    Number(NumberValue),
    String(String),
    Date(DateTime<Utc>),
    Url(Url),
    Array(Vec<HostValue>),
    Map(HashMap<String, HostValue>),
    /// Raw binary buffers can cross the bridge but have no JSON encoding.
    Bytes(Vec<u8>),
}

/// A boxed number as stored by the host runtime.
///
/// The host boxes every numeric argument, booleans included, and the storage
/// category is the only reliable type information left on the value. Encoding
/// re-inspects the category so that a boxed `true` comes out as a JSON
/// boolean rather than `1`, and a boxed `u64` is not squeezed through `i64`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberValue {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U16(u16),
    U32(u32),
    U64(u64),
    /// Platform-width integers (index types on the host side).
    Isize(isize),
    F32(f32),
    F64(f64),
}

impl NumberValue {
    /// Narrows the boxed number to an `i64` when the conversion is
    /// value-exact. Booleans narrow to `0` or `1`: the host does not keep
    /// boolean identity apart from numeric storage, so a flag arriving here
    /// is indistinguishable from a one-bit integer.
    pub fn as_i64(self) -> Option<i64> {
        match self {
            NumberValue::Bool(value) => Some(i64::from(value)),
            NumberValue::I8(value) => Some(i64::from(value)),
            NumberValue::I16(value) => Some(i64::from(value)),
            NumberValue::I32(value) => Some(i64::from(value)),
            NumberValue::I64(value) => Some(value),
            NumberValue::U16(value) => Some(i64::from(value)),
            NumberValue::U32(value) => Some(i64::from(value)),
            NumberValue::U64(value) => i64::try_from(value).ok(),
            NumberValue::Isize(value) => Some(value as i64),
            NumberValue::F32(value) => float_as_i64_exact(f64::from(value)),
            NumberValue::F64(value) => float_as_i64_exact(value),
        }
    }

    /// Narrows the boxed number to an `f64` when the conversion is
    /// value-exact. Wide integers that would lose precision do not narrow.
    pub fn as_f64(self) -> Option<f64> {
        match self {
            NumberValue::Bool(_) => None,
            NumberValue::I8(value) => Some(f64::from(value)),
            NumberValue::I16(value) => Some(f64::from(value)),
            NumberValue::I32(value) => Some(f64::from(value)),
            NumberValue::I64(value) => {
                // The upper bound is exclusive: MAX itself rounds up to 2^63
                // and the saturating cast back would mask the mismatch.
                let float = value as f64;
                (float < i64::MAX as f64 && float as i64 == value).then_some(float)
            }
            NumberValue::U16(value) => Some(f64::from(value)),
            NumberValue::U32(value) => Some(f64::from(value)),
            NumberValue::U64(value) => {
                let float = value as f64;
                (float < u64::MAX as f64 && float as u64 == value).then_some(float)
            }
            NumberValue::Isize(value) => NumberValue::I64(value as i64).as_f64(),
            NumberValue::F32(value) => Some(f64::from(value)),
            NumberValue::F64(value) => Some(value),
        }
    }
}

fn float_as_i64_exact(float: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, so the exclusive bound also rejects
    // values the saturating cast would silently clamp.
    if float.is_finite()
        && float.trunc() == float
        && float >= i64::MIN as f64
        && float < i64::MAX as f64
    {
        Some(float as i64)
    } else {
        None
    }
}

impl Serialize for NumberValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            NumberValue::Bool(value) => serializer.serialize_bool(value),
            NumberValue::I8(value) => serializer.serialize_i8(value),
            NumberValue::I16(value) => serializer.serialize_i16(value),
            NumberValue::I32(value) => serializer.serialize_i32(value),
            NumberValue::I64(value) => serializer.serialize_i64(value),
            NumberValue::U16(value) => serializer.serialize_u16(value),
            NumberValue::U32(value) => serializer.serialize_u32(value),
            NumberValue::U64(value) => serializer.serialize_u64(value),
            NumberValue::Isize(value) => serializer.serialize_i64(value as i64),
            NumberValue::F32(value) => serializer.serialize_f32(value),
            NumberValue::F64(value) => serializer.serialize_f64(value),
        }
    }
}

/// Type-erased encodable wrapper around a [`HostValue`].
///
/// User-supplied attributes are wrapped unmodified at coercion time; no type
/// check happens until the wrapper meets a serializer. Containers are walked
/// recursively, each element re-wrapped, so arbitrarily nested host values
/// encode without upfront shape knowledge. The one shape JSON cannot carry,
/// binary buffers, fails the whole encode with an explicit error instead of
/// being dropped or defaulted.
#[derive(Debug, Clone, PartialEq)]
pub struct AnyEncodable {
    pub value: HostValue,
}

impl AnyEncodable {
    pub fn new(value: impl Into<HostValue>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl Serialize for AnyEncodable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        encode_host_value(&self.value, serializer)
    }
}

/// Borrowed re-wrap used when descending into arrays and maps.
struct AnyEncodableRef<'a>(&'a HostValue);

impl Serialize for AnyEncodableRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        encode_host_value(self.0, serializer)
    }
}

fn encode_host_value<S: Serializer>(value: &HostValue, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        HostValue::Null => serializer.serialize_unit(),
        HostValue::Number(number) => number.serialize(serializer),
        HostValue::String(string) => serializer.serialize_str(string),
        HostValue::Date(date) => {
            serializer.serialize_str(&date.to_rfc3339_opts(SecondsFormat::Secs, true))
        }
        HostValue::Url(url) => serializer.serialize_str(url.as_str()),
        HostValue::Array(values) => serializer.collect_seq(values.iter().map(AnyEncodableRef)),
        HostValue::Map(map) => {
            serializer.collect_map(map.iter().map(|(key, value)| (key, AnyEncodableRef(value))))
        }
        HostValue::Bytes(bytes) => Err(S::Error::custom(format!(
            "value {bytes:?} cannot be encoded - binary buffers are not supported by AnyEncodable"
        ))),
    }
}

impl From<NumberValue> for HostValue {
    fn from(value: NumberValue) -> Self {
        HostValue::Number(value)
    }
}

// Host booleans arrive boxed like any other number.
impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        HostValue::Number(NumberValue::Bool(value))
    }
}

impl From<i32> for HostValue {
    fn from(value: i32) -> Self {
        HostValue::Number(NumberValue::I32(value))
    }
}

impl From<i64> for HostValue {
    fn from(value: i64) -> Self {
        HostValue::Number(NumberValue::I64(value))
    }
}

impl From<u64> for HostValue {
    fn from(value: u64) -> Self {
        HostValue::Number(NumberValue::U64(value))
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        HostValue::Number(NumberValue::F64(value))
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::String(value.to_string())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        HostValue::String(value)
    }
}

impl From<DateTime<Utc>> for HostValue {
    fn from(value: DateTime<Utc>) -> Self {
        HostValue::Date(value)
    }
}

impl From<Url> for HostValue {
    fn from(value: Url) -> Self {
        HostValue::Url(value)
    }
}

impl From<Vec<HostValue>> for HostValue {
    fn from(value: Vec<HostValue>) -> Self {
        HostValue::Array(value)
    }
}

impl From<HashMap<String, HostValue>> for HostValue {
    fn from(value: HashMap<String, HostValue>) -> Self {
        HostValue::Map(value)
    }
}

impl From<HostValue> for AnyEncodable {
    fn from(value: HostValue) -> Self {
        AnyEncodable { value }
    }
}
