//! Attribute values as the store sees them, and native values as callers see them.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::error::{CoreError, Result};

/// One row as sent to / received from the store.
pub type Item = HashMap<String, AttributeValue>;

/// One row in native form.
pub type NativeItem = BTreeMap<String, NativeValue>;

// ============================================================================
// AttributeValue
// ============================================================================

/// Store-native tagged value.
///
/// Numbers travel as decimal text to avoid floating-point drift. String and
/// number sets compare without regard to element order.
#[derive(Debug, Clone)]
pub enum AttributeValue {
    S(String),
    N(String),
    Bool(bool),
    B(Vec<u8>),
    Ss(Vec<String>),
    Ns(Vec<String>),
    L(Vec<AttributeValue>),
    M(HashMap<String, AttributeValue>),
    Null,
}

impl AttributeValue {
    /// Wire tag of this value (`S`, `N`, `BOOL`, ...).
    pub fn type_tag(&self) -> &'static str {
        match self {
            AttributeValue::S(_) => "S",
            AttributeValue::N(_) => "N",
            AttributeValue::Bool(_) => "BOOL",
            AttributeValue::B(_) => "B",
            AttributeValue::Ss(_) => "SS",
            AttributeValue::Ns(_) => "NS",
            AttributeValue::L(_) => "L",
            AttributeValue::M(_) => "M",
            AttributeValue::Null => "NULL",
        }
    }

    /// Returns the string payload of an `S` value.
    pub fn as_s(&self) -> Option<&str> {
        match self {
            AttributeValue::S(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the decimal text of an `N` value.
    pub fn as_n(&self) -> Option<&str> {
        match self {
            AttributeValue::N(n) => Some(n),
            _ => None,
        }
    }

    /// Renders a scalar for log lines and error messages.
    pub fn display_scalar(&self) -> String {
        match self {
            AttributeValue::S(s) | AttributeValue::N(s) => s.clone(),
            AttributeValue::Bool(b) => b.to_string(),
            AttributeValue::B(bytes) => format!("<{} bytes>", bytes.len()),
            AttributeValue::Null => "null".to_string(),
            other => format!("<{}>", other.type_tag()),
        }
    }
}

impl PartialEq for AttributeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AttributeValue::S(a), AttributeValue::S(b)) => a == b,
            (AttributeValue::N(a), AttributeValue::N(b)) => a == b,
            (AttributeValue::Bool(a), AttributeValue::Bool(b)) => a == b,
            (AttributeValue::B(a), AttributeValue::B(b)) => a == b,
            (AttributeValue::Ss(a), AttributeValue::Ss(b)) => same_members(a, b),
            (AttributeValue::Ns(a), AttributeValue::Ns(b)) => same_members(a, b),
            (AttributeValue::L(a), AttributeValue::L(b)) => a == b,
            (AttributeValue::M(a), AttributeValue::M(b)) => a == b,
            (AttributeValue::Null, AttributeValue::Null) => true,
            _ => false,
        }
    }
}

impl Eq for AttributeValue {}

fn same_members(a: &[String], b: &[String]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut left: Vec<&String> = a.iter().collect();
    let mut right: Vec<&String> = b.iter().collect();
    left.sort();
    right.sort();
    left == right
}

// ============================================================================
// Number
// ============================================================================

/// A decimal number kept as validated text.
///
/// Integers render without a decimal point and floats use the shortest
/// representation that parses back to the same `f64`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Number(String);

impl Number {
    /// Parses decimal text, rejecting anything that is not a finite decimal literal.
    pub fn parse(text: &str) -> Result<Self> {
        if is_decimal_literal(text) {
            Ok(Self(text.to_string()))
        } else {
            Err(CoreError::InvalidNumericLiteral(text.to_string()))
        }
    }

    /// Builds a number from a float. Returns `None` for NaN and infinities.
    pub fn from_f64(value: f64) -> Option<Self> {
        value.is_finite().then(|| Self(value.to_string()))
    }

    /// The decimal text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the text has no fraction or exponent part.
    pub fn is_integer(&self) -> bool {
        !self.0.contains(['.', 'e', 'E'])
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.0.parse().ok()
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.0.parse().ok()
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! number_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Number {
                fn from(value: $ty) -> Self {
                    Self(value.to_string())
                }
            }
        )*
    };
}

number_from_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

/// `[+-]? (digits [. digits?] | . digits) ([eE] [+-]? digits)?`
fn is_decimal_literal(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut i = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }

    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let int_digits = i - int_start;

    let mut frac_digits = 0;
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        frac_digits = i - frac_start;
    }

    if int_digits == 0 && frac_digits == 0 {
        return false;
    }

    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        i += 1;
        if i < bytes.len() && matches!(bytes[i], b'+' | b'-') {
            i += 1;
        }
        let exp_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_start {
            return false;
        }
    }

    i == bytes.len()
}

// ============================================================================
// NativeValue
// ============================================================================

/// Closed set of application value shapes the codec understands.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Bytes(Vec<u8>),
    Seq(Vec<NativeValue>),
    Map(BTreeMap<String, NativeValue>),
}

impl NativeValue {
    /// Wraps raw bytes. `Vec<u8>` alone converts to a sequence of numbers.
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        NativeValue::Bytes(bytes.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            NativeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            NativeValue::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            NativeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for NativeValue {
    fn from(value: &str) -> Self {
        NativeValue::String(value.to_string())
    }
}

impl From<String> for NativeValue {
    fn from(value: String) -> Self {
        NativeValue::String(value)
    }
}

impl From<bool> for NativeValue {
    fn from(value: bool) -> Self {
        NativeValue::Bool(value)
    }
}

impl From<Number> for NativeValue {
    fn from(value: Number) -> Self {
        NativeValue::Number(value)
    }
}

/// Non-finite floats have no decimal form and fall back to their text.
impl From<f64> for NativeValue {
    fn from(value: f64) -> Self {
        match Number::from_f64(value) {
            Some(number) => NativeValue::Number(number),
            None => NativeValue::String(value.to_string()),
        }
    }
}

impl From<f32> for NativeValue {
    fn from(value: f32) -> Self {
        // Go through the shortest f32 text so 0.1f32 stays "0.1".
        match value.to_string().parse::<f64>() {
            Ok(widened) => NativeValue::from(widened),
            Err(_) => NativeValue::String(value.to_string()),
        }
    }
}

macro_rules! native_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for NativeValue {
                fn from(value: $ty) -> Self {
                    NativeValue::Number(Number::from(value))
                }
            }
        )*
    };
}

native_from_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl<T: Into<NativeValue>> From<Vec<T>> for NativeValue {
    fn from(values: Vec<T>) -> Self {
        NativeValue::Seq(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<NativeValue>> From<Option<T>> for NativeValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(NativeValue::Null, Into::into)
    }
}

impl From<BTreeMap<String, NativeValue>> for NativeValue {
    fn from(map: BTreeMap<String, NativeValue>) -> Self {
        NativeValue::Map(map)
    }
}
