use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// The value part of span tags and log fields.
///
/// Tags hold arbitrary scalar metadata; homogeneous conversions exist for the
/// types instrumentation typically records.
///
/// # Examples
///
/// ```
/// use tracekit::Value;
///
/// let status: Value = 200.into();
/// let route: Value = "/api/orders".into();
/// assert_eq!(status, Value::I64(200));
/// assert_eq!(route.to_string(), "/api/orders");
/// ```
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean value
    Bool(bool),
    /// Signed 64-bit integer value
    I64(i64),
    /// 64-bit floating point value
    F64(f64),
    /// String value
    String(Cow<'static, str>),
}

macro_rules! value_from_integer {
    ($($t:ty),+) => {
        $(
            impl From<$t> for Value {
                fn from(value: $t) -> Self {
                    Value::I64(value as i64)
                }
            }
        )+
    };
}

value_from_integer!(i64, i32, u32, u16);

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::F64(value)
    }
}

impl From<&'static str> for Value {
    fn from(value: &'static str) -> Self {
        Value::String(Cow::Borrowed(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(Cow::Owned(value))
    }
}

impl From<Cow<'static, str>> for Value {
    fn from(value: Cow<'static, str>) -> Self {
        Value::String(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => v.fmt(fmt),
            Value::I64(v) => v.fmt(fmt),
            Value::F64(v) => v.fmt(fmt),
            Value::String(v) => v.fmt(fmt),
        }
    }
}

/// A key-value pair attached to a span log entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyValue {
    /// The field's key.
    pub key: Cow<'static, str>,
    /// The field's value.
    pub value: Value,
}

impl KeyValue {
    /// Creates a new `KeyValue` pair.
    pub fn new(key: impl Into<Cow<'static, str>>, value: impl Into<Value>) -> Self {
        KeyValue {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_conversions() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42i64), Value::I64(42));
        assert_eq!(Value::from(404u16), Value::I64(404));
        assert_eq!(Value::from(1.5), Value::F64(1.5));
        assert_eq!(
            Value::from(String::from("owned")),
            Value::String(Cow::Borrowed("owned"))
        );
    }

    #[test]
    fn untagged_json_representation() {
        let kv = KeyValue::new("http.status_code", 200);
        let json = serde_json::to_string(&kv).unwrap();
        assert_eq!(json, r#"{"key":"http.status_code","value":200}"#);

        let back: KeyValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, kv);
    }
}
