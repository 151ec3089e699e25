//! Attribute conversion functions.
//!
//! Pure functions for converting between native values and store attribute
//! values. `marshal` is total; `unmarshal` fails only on malformed numbers.

use std::collections::{BTreeMap, HashSet};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CoreError, Result};
use crate::keys;
use crate::table::TableDescriptor;
use crate::value::{AttributeValue, Item, NativeItem, NativeValue, Number};

// ============================================================================
// Marshal
// ============================================================================

/// Convert a native value to its attribute value.
///
/// Rules, first match wins: text, number, bool, bytes, set of distinct
/// strings, set of distinct integers, mapping, any other sequence, null.
pub fn marshal(value: &NativeValue) -> AttributeValue {
    match value {
        NativeValue::String(s) => AttributeValue::S(s.clone()),
        NativeValue::Number(n) => AttributeValue::N(n.as_str().to_string()),
        NativeValue::Bool(b) => AttributeValue::Bool(*b),
        NativeValue::Bytes(bytes) => AttributeValue::B(bytes.clone()),
        NativeValue::Seq(items) => marshal_seq(items),
        NativeValue::Map(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), marshal(v)))
                .collect(),
        ),
        NativeValue::Null => AttributeValue::Null,
    }
}

fn marshal_seq(items: &[NativeValue]) -> AttributeValue {
    if let Some(strings) = string_set(items) {
        return AttributeValue::Ss(strings);
    }
    if let Some(numbers) = integer_set(items) {
        return AttributeValue::Ns(numbers);
    }
    AttributeValue::L(items.iter().map(marshal).collect())
}

/// Sets must be non-empty and duplicate-free on the wire, otherwise the
/// sequence is sent as a list.
fn string_set(items: &[NativeValue]) -> Option<Vec<String>> {
    if items.is_empty() {
        return None;
    }
    let strings: Vec<String> = items
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect::<Option<_>>()?;
    all_distinct(&strings).then_some(strings)
}

fn integer_set(items: &[NativeValue]) -> Option<Vec<String>> {
    if items.is_empty() {
        return None;
    }
    let numbers: Vec<String> = items
        .iter()
        .map(|v| match v {
            NativeValue::Number(n) if n.is_integer() => Some(n.as_str().to_string()),
            _ => None,
        })
        .collect::<Option<_>>()?;
    // The store compares numbers by value, so "01" and "1" are one member.
    let canonical: Vec<String> = numbers.iter().map(|n| canonical_integer(n)).collect();
    all_distinct(&canonical).then_some(numbers)
}

/// Integer text without sign noise or leading zeros; `-0` and `+0` become `0`.
fn canonical_integer(text: &str) -> String {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let digits = digits.trim_start_matches('0');
    match (digits.is_empty(), negative) {
        (true, _) => "0".to_string(),
        (false, true) => format!("-{digits}"),
        (false, false) => digits.to_string(),
    }
}

fn all_distinct(values: &[String]) -> bool {
    let mut seen = HashSet::with_capacity(values.len());
    values.iter().all(|v| seen.insert(v.as_str()))
}

/// Marshal every attribute of a mapping without key validation.
pub fn marshal_map(item: &NativeItem) -> Item {
    item.iter().map(|(k, v)| (k.clone(), marshal(v))).collect()
}

/// Marshal a full row for `descriptor`, validating key presence and type.
pub fn marshal_item(descriptor: &TableDescriptor, item: &NativeItem) -> Result<Item> {
    let marshaled = marshal_map(item);
    keys::validate_item_keys(descriptor, &marshaled)?;
    Ok(marshaled)
}

// ============================================================================
// Unmarshal
// ============================================================================

/// Convert an attribute value back to its native value.
pub fn unmarshal(value: &AttributeValue) -> Result<NativeValue> {
    Ok(match value {
        AttributeValue::S(s) => NativeValue::String(s.clone()),
        AttributeValue::N(n) => NativeValue::Number(Number::parse(n)?),
        AttributeValue::Bool(b) => NativeValue::Bool(*b),
        AttributeValue::B(bytes) => NativeValue::Bytes(bytes.clone()),
        AttributeValue::Ss(strings) => NativeValue::Seq(
            strings
                .iter()
                .map(|s| NativeValue::String(s.clone()))
                .collect(),
        ),
        AttributeValue::Ns(numbers) => NativeValue::Seq(
            numbers
                .iter()
                .map(|n| Number::parse(n).map(NativeValue::Number))
                .collect::<Result<_>>()?,
        ),
        AttributeValue::L(items) => {
            NativeValue::Seq(items.iter().map(unmarshal).collect::<Result<_>>()?)
        }
        AttributeValue::M(map) => NativeValue::Map(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), unmarshal(v)?)))
                .collect::<Result<_>>()?,
        ),
        AttributeValue::Null => NativeValue::Null,
    })
}

/// Convert a stored row back to native form.
pub fn unmarshal_item(item: &Item) -> Result<NativeItem> {
    item.iter()
        .map(|(k, v)| Ok((k.clone(), unmarshal(v)?)))
        .collect()
}

// ============================================================================
// Serde bridge
// ============================================================================

/// Convert any serializable value into a native value.
pub fn to_native<T: Serialize + ?Sized>(value: &T) -> Result<NativeValue> {
    let json = serde_json::to_value(value).map_err(|e| CoreError::Serialization(e.to_string()))?;
    Ok(NativeValue::from(json))
}

/// Convert a serializable record into a native row. The record must
/// serialize to a map.
pub fn to_native_item<T: Serialize + ?Sized>(value: &T) -> Result<NativeItem> {
    match to_native(value)? {
        NativeValue::Map(map) => Ok(map),
        other => Err(CoreError::Serialization(format!(
            "expected a record, got {}",
            native_kind(&other)
        ))),
    }
}

/// Deserialize a native value into a caller type.
pub fn from_native<T: DeserializeOwned>(value: NativeValue) -> Result<T> {
    serde_json::from_value(serde_json::Value::from(value))
        .map_err(|e| CoreError::Serialization(e.to_string()))
}

/// Deserialize a native row into a caller type.
pub fn from_native_item<T: DeserializeOwned>(item: NativeItem) -> Result<T> {
    from_native(NativeValue::Map(item))
}

fn native_kind(value: &NativeValue) -> &'static str {
    match value {
        NativeValue::Null => "null",
        NativeValue::Bool(_) => "bool",
        NativeValue::Number(_) => "number",
        NativeValue::String(_) => "string",
        NativeValue::Bytes(_) => "bytes",
        NativeValue::Seq(_) => "sequence",
        NativeValue::Map(_) => "map",
    }
}

impl From<serde_json::Value> for NativeValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => NativeValue::Null,
            serde_json::Value::Bool(b) => NativeValue::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    NativeValue::from(i)
                } else if let Some(u) = n.as_u64() {
                    NativeValue::from(u)
                } else {
                    NativeValue::from(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => NativeValue::String(s),
            serde_json::Value::Array(items) => {
                NativeValue::Seq(items.into_iter().map(NativeValue::from).collect())
            }
            serde_json::Value::Object(map) => NativeValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, NativeValue::from(v)))
                    .collect::<BTreeMap<_, _>>(),
            ),
        }
    }
}

/// Bytes become base64 text; numbers outside the `i64`/`u64`/`f64` range
/// lose precision.
impl From<NativeValue> for serde_json::Value {
    fn from(value: NativeValue) -> Self {
        match value {
            NativeValue::Null => serde_json::Value::Null,
            NativeValue::Bool(b) => serde_json::Value::Bool(b),
            NativeValue::Number(n) => number_to_json(&n),
            NativeValue::String(s) => serde_json::Value::String(s),
            NativeValue::Bytes(bytes) => serde_json::Value::String(BASE64.encode(bytes)),
            NativeValue::Seq(items) => {
                serde_json::Value::Array(items.into_iter().map(serde_json::Value::from).collect())
            }
            NativeValue::Map(map) => serde_json::Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

fn number_to_json(number: &Number) -> serde_json::Value {
    if let Some(i) = number.as_i64() {
        return serde_json::Value::from(i);
    }
    if let Some(u) = number.as_u64() {
        return serde_json::Value::from(u);
    }
    number
        .as_f64()
        .and_then(serde_json::Number::from_f64)
        .map_or(serde_json::Value::Null, serde_json::Value::Number)
}
