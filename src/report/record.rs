//! Event record decoding and tolerant field reads.
//!
//! A raw event body is decoded into an [`EventRecord`], a thin wrapper over a
//! JSON object. Every field read goes through [`EventRecord::read_or`], which
//! returns the supplied default when the field is absent or holds a value of
//! an incompatible type. Decoding never panics; failures are returned as
//! [`DecodeError`] so the caller can report and skip the event.

use serde_json::{Map, Value};
use thiserror::Error;

use super::kind::EventKind;

/// Name of the field carrying the event kind.
pub const EVENT_TYPE_FIELD: &str = "EventType";

/// Errors that can occur while decoding a raw event body.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The body is not valid UTF-8.
    #[error("event body is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// The body is not valid JSON.
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    /// The body is valid JSON but not an object.
    #[error("event body is not a JSON object (found {0})")]
    NotAnObject(&'static str),
}

/// A JSON value type that can be read out of an event field.
///
/// Implementations return `None` when the JSON value is not compatible with
/// the expected type; [`EventRecord::read_or`] then falls back to the default.
pub trait FieldValue: Sized {
    /// Converts a JSON value into `Self`, or `None` on a type mismatch.
    fn from_json(value: &Value) -> Option<Self>;
}

impl FieldValue for String {
    fn from_json(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FieldValue for i64 {
    fn from_json(value: &Value) -> Option<Self> {
        if let Some(n) = value.as_i64() {
            return Some(n);
        }
        // Integral floats such as `3.0` still count as integers.
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
            .map(|f| f as i64)
    }
}

impl FieldValue for f64 {
    fn from_json(value: &Value) -> Option<Self> {
        value.as_f64()
    }
}

impl FieldValue for bool {
    fn from_json(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

/// Reads `key` from any JSON value, falling back to `default`.
///
/// Non-object values have no fields, so every read on them yields the
/// default. This is what lets a malformed product entry render as
/// `Unknown`/`0` instead of failing the whole event.
pub fn read_value_or<T: FieldValue>(value: &Value, key: &str, default: T) -> T {
    value.get(key).and_then(T::from_json).unwrap_or(default)
}

/// The structured decoding of one raw event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    fields: Map<String, Value>,
}

impl EventRecord {
    /// Decodes a raw event body.
    ///
    /// The body must be UTF-8 JSON holding an object. A JSON string whose
    /// content is itself a JSON object is unwrapped once, since some
    /// publishers serialise their payload twice.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the body is not UTF-8, not JSON, or not an
    /// object.
    ///
    /// # Examples
    ///
    /// ```
    /// use laekning_eventhub::report::EventRecord;
    ///
    /// let record = EventRecord::decode(br#"{"EventType":"OrderPlaced"}"#).unwrap();
    /// assert_eq!(record.kind().as_str(), "OrderPlaced");
    ///
    /// assert!(EventRecord::decode(b"not-json").is_err());
    /// ```
    pub fn decode(body: &[u8]) -> Result<Self, DecodeError> {
        let text = std::str::from_utf8(body)?;
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Builds a record from an already parsed JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::NotAnObject`] for anything but an object (or a
    /// string holding an object).
    pub fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            Value::String(inner) => match serde_json::from_str::<Value>(&inner) {
                Ok(Value::Object(fields)) => Ok(Self { fields }),
                _ => Err(DecodeError::NotAnObject("string")),
            },
            other => Err(DecodeError::NotAnObject(json_type_name(&other))),
        }
    }

    /// Returns the raw value of a field, if present.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Reads a field as `T`, returning `default` when it is absent or of an
    /// incompatible type.
    ///
    /// # Examples
    ///
    /// ```
    /// use laekning_eventhub::report::EventRecord;
    ///
    /// let record = EventRecord::decode(br#"{"ItemCount":"three"}"#).unwrap();
    /// assert_eq!(record.read_or("ItemCount", 0i64), 0);
    /// assert!(!record.read_or("GiftWrap", false));
    /// ```
    pub fn read_or<T: FieldValue>(&self, key: &str, default: T) -> T {
        self.fields
            .get(key)
            .and_then(T::from_json)
            .unwrap_or(default)
    }

    /// Reads a text field, returning `default` when absent or not a string.
    pub fn text_or(&self, key: &str, default: &str) -> String {
        self.read_or(key, default.to_string())
    }

    /// Returns the event kind, `Unknown` when `EventType` is missing.
    pub fn kind(&self) -> EventKind {
        EventKind::from_tag(&self.text_or(EVENT_TYPE_FIELD, EventKind::UNKNOWN))
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
