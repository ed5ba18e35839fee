//! Value Module
//!
//! Defines the closed set of storable values and the entry that wraps them
//! with an absolute expiry timestamp.

use chrono::{Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value as Json};

use crate::error::CacheError;

// == Value Kind ==
/// Shape tag of a stored value.
///
/// On the wire the tag is its discriminant: 0, 1 or 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ValueKind {
    Scalar = 0,
    Sequence = 1,
    Mapping = 2,
}

impl Serialize for ValueKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for ValueKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            0 => Ok(ValueKind::Scalar),
            1 => Ok(ValueKind::Sequence),
            2 => Ok(ValueKind::Mapping),
            other => Err(serde::de::Error::invalid_value(
                serde::de::Unexpected::Unsigned(other.into()),
                &"0, 1 or 2",
            )),
        }
    }
}

// == Value ==
/// A storable value.
///
/// The shape is decided once, when the value enters the system; numbers,
/// booleans and null are rejected at that point. Sequence elements and
/// mapping values may be arbitrary JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(String),
    Sequence(Vec<Json>),
    Mapping(Map<String, Json>),
}

impl Value {
    /// Returns the shape tag of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Scalar(_) => ValueKind::Scalar,
            Value::Sequence(_) => ValueKind::Sequence,
            Value::Mapping(_) => ValueKind::Mapping,
        }
    }
}

impl TryFrom<Json> for Value {
    type Error = CacheError;

    fn try_from(raw: Json) -> Result<Self, Self::Error> {
        match raw {
            Json::String(s) => Ok(Value::Scalar(s)),
            Json::Array(items) => Ok(Value::Sequence(items)),
            Json::Object(map) => Ok(Value::Mapping(map)),
            Json::Null | Json::Bool(_) | Json::Number(_) => Err(CacheError::InvalidValue),
        }
    }
}

impl From<Value> for Json {
    fn from(value: Value) -> Self {
        match value {
            Value::Scalar(s) => Json::String(s),
            Value::Sequence(items) => Json::Array(items),
            Value::Mapping(map) => Json::Object(map),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Scalar(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Scalar(s)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Json::deserialize(deserializer)?;
        Value::try_from(raw).map_err(serde::de::Error::custom)
    }
}

// == Entry ==
/// A stored value together with its type tag and expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Shape of `data`
    #[serde(rename = "type")]
    pub kind: ValueKind,
    /// The stored value
    pub data: Value,
    /// Absolute expiry in Unix nanoseconds, 0 = never
    #[serde(default, skip_serializing_if = "is_never")]
    pub expires: i64,
}

fn is_never(expires: &i64) -> bool {
    *expires == 0
}

impl Entry {
    // == Constructor ==
    /// Creates an entry, deriving its kind from the value.
    pub fn new(data: Value, expires: i64) -> Self {
        Self {
            kind: data.kind(),
            data,
            expires,
        }
    }

    // == Is Expired ==
    /// Checks whether the entry has expired as of now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ns())
    }

    /// An entry is expired once the clock reaches its expiry timestamp.
    pub fn is_expired_at(&self, now_ns: i64) -> bool {
        self.expires != 0 && self.expires <= now_ns
    }

    // == Time To Live ==
    /// Returns the time left before expiry, or None if the entry never expires.
    ///
    /// Returns a zero duration once the entry has expired.
    pub fn ttl_remaining(&self) -> Option<Duration> {
        if self.expires == 0 {
            return None;
        }
        let left = self.expires.saturating_sub(current_timestamp_ns());
        Some(Duration::nanoseconds(left.max(0)))
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in nanoseconds.
pub fn current_timestamp_ns() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}

/// Converts a relative TTL into an absolute expiry timestamp.
///
/// A zero or negative TTL means the entry never expires.
pub fn expiry_after(ttl: Duration) -> i64 {
    if ttl <= Duration::zero() {
        return 0;
    }
    let nanos = ttl.num_nanoseconds().unwrap_or(i64::MAX);
    current_timestamp_ns().saturating_add(nanos)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classification() {
        assert_eq!(
            Value::try_from(json!("abc")).unwrap().kind(),
            ValueKind::Scalar
        );
        assert_eq!(
            Value::try_from(json!([1, "a", null])).unwrap().kind(),
            ValueKind::Sequence
        );
        assert_eq!(
            Value::try_from(json!({"k": 1})).unwrap().kind(),
            ValueKind::Mapping
        );
    }

    #[test]
    fn test_unsupported_shapes_rejected() {
        for raw in [json!(1), json!(2.5), json!(true), json!(null)] {
            assert!(matches!(
                Value::try_from(raw),
                Err(CacheError::InvalidValue)
            ));
        }
    }

    #[test]
    fn test_deserialize_rejects_numbers() {
        assert!(serde_json::from_str::<Value>("42").is_err());
        let value: Value = serde_json::from_str(r#"{"hello":"world"}"#).unwrap();
        assert_eq!(value.kind(), ValueKind::Mapping);
    }

    #[test]
    fn test_entry_serialization_omits_zero_expiry() {
        let entry = Entry::new(Value::from("something"), 0);
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"{"type":0,"data":"something"}"#);

        let back: Entry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_kind_tags_are_numeric() {
        let list = Entry::new(Value::try_from(json!([1])).unwrap(), 0);
        let map = Entry::new(Value::try_from(json!({"a": 1})).unwrap(), 0);
        assert_eq!(serde_json::to_value(&list).unwrap()["type"], json!(1));
        assert_eq!(serde_json::to_value(&map).unwrap()["type"], json!(2));

        assert!(serde_json::from_str::<ValueKind>("3").is_err());
        assert!(serde_json::from_str::<ValueKind>(r#""scalar""#).is_err());
    }

    #[test]
    fn test_entry_without_expiry_never_expires() {
        let entry = Entry::new(Value::from("v"), 0);
        assert!(!entry.is_expired_at(i64::MAX));
        assert!(entry.ttl_remaining().is_none());
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = current_timestamp_ns();
        let entry = Entry::new(Value::from("v"), now);
        assert!(entry.is_expired_at(now), "Entry should be expired at boundary");
        assert!(!entry.is_expired_at(now - 1));
    }

    #[test]
    fn test_expiry_after() {
        assert_eq!(expiry_after(Duration::zero()), 0);
        assert_eq!(expiry_after(Duration::seconds(-1)), 0);

        let before = current_timestamp_ns();
        let expires = expiry_after(Duration::seconds(10));
        assert!(expires >= before + 10_000_000_000);
    }

    #[test]
    fn test_ttl_remaining() {
        let entry = Entry::new(Value::from("v"), expiry_after(Duration::seconds(10)));
        let remaining = entry.ttl_remaining().unwrap();
        assert!(remaining <= Duration::seconds(10));
        assert!(remaining >= Duration::seconds(9));
    }
}
