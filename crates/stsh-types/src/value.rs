//! Values flowing through stream-shell pipelines.
//!
//! A value is one of three kinds: raw bytes, anything JSON can represent, or
//! an opaque payload tagged with a type name. Values are immutable; operators
//! build new ones.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as Json;

use crate::Error;

/// Largest integer that survives a round trip through `f64`.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// A single element of a stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Raw bytes, e.g. binary output of a process.
    Bytes(Vec<u8>),
    /// Null, bool, number, string, list or struct.
    Json(Json),
    /// A payload of a named type with no JSON shape of its own.
    Typed(TypedValue),
}

/// An opaque value identified by its type name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedValue {
    pub type_name: String,
    pub payload: Vec<u8>,
}

impl TypedValue {
    pub fn new(type_name: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            type_name: type_name.into(),
            payload,
        }
    }
}

/// The kind of a value, as seen by operator dispatch and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    String,
    List,
    Struct,
    Bytes,
    Typed,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::List => "list",
            ValueKind::Struct => "struct",
            ValueKind::Bytes => "bytes",
            ValueKind::Typed => "typed",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    pub fn null() -> Self {
        Value::Json(Json::Null)
    }

    pub fn bool(b: bool) -> Self {
        Value::Json(Json::Bool(b))
    }

    /// A number. Integral values are stored as integers so that `1 + 2`
    /// compares equal to the literal `3`.
    ///
    /// Non-finite numbers have no JSON form and become null; operators check
    /// for them before constructing a value.
    pub fn number(n: f64) -> Self {
        if n.is_finite() && n.fract() == 0.0 && n.abs() < MAX_SAFE_INTEGER {
            return Value::Json(Json::from(n as i64));
        }
        serde_json::Number::from_f64(n)
            .map(|num| Value::Json(Json::Number(num)))
            .unwrap_or_else(Value::null)
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::Json(Json::String(s.into()))
    }

    /// Parse a JSON literal (`1.5`, `"text"`, `true`, `{"a": 1}`).
    pub fn from_json_str(text: &str) -> Result<Self, Error> {
        Ok(Value::Json(serde_json::from_str(text)?))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bytes(_) => ValueKind::Bytes,
            Value::Typed(_) => ValueKind::Typed,
            Value::Json(json) => match json {
                Json::Null => ValueKind::Null,
                Json::Bool(_) => ValueKind::Bool,
                Json::Number(_) => ValueKind::Number,
                Json::String(_) => ValueKind::String,
                Json::Array(_) => ValueKind::List,
                Json::Object(_) => ValueKind::Struct,
            },
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Json(Json::Number(n)) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Json(Json::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Json(Json::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Json> {
        match self {
            Value::Json(json) => Some(json),
            _ => None,
        }
    }

    /// Boolean coercion used by `!`, `&&`, `||` and the ternary operator.
    ///
    /// null is false, numbers are true when positive, strings and lists when
    /// non-empty, structs always. Bytes are true if any byte is non-zero.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bytes(bytes) => bytes.iter().any(|b| *b != 0),
            Value::Typed(_) => true,
            Value::Json(json) => json_truthy(json),
        }
    }

    /// JSON form of the value. Bytes become a base64 string; typed values
    /// become their payload struct tagged with `@type`.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Json(json) => json.clone(),
            Value::Bytes(bytes) => Json::String(BASE64.encode(bytes)),
            Value::Typed(typed) => {
                let mut object = match serde_json::from_slice::<Json>(&typed.payload) {
                    Ok(Json::Object(map)) => map,
                    _ => {
                        let mut map = serde_json::Map::new();
                        map.insert("value".into(), Json::String(BASE64.encode(&typed.payload)));
                        map
                    }
                };
                object.insert("@type".into(), Json::String(typed.type_name.clone()));
                Json::Object(object)
            }
        }
    }

    /// Compact JSON text of the value.
    pub fn to_json_string(&self) -> String {
        self.to_json().to_string()
    }

    /// Human-facing string form: strings are raw, bytes are decoded lossily,
    /// everything else is compact JSON.
    pub fn render(&self) -> String {
        match self {
            Value::Json(Json::String(s)) => s.clone(),
            Value::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            other => other.to_json_string(),
        }
    }

    /// Raw bytes written by the file redirect: bytes and typed payloads as-is,
    /// everything else as its rendered string.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Value::Bytes(bytes) => bytes.clone(),
            Value::Typed(typed) => typed.payload.clone(),
            other => other.render().into_bytes(),
        }
    }

    /// Strict lookup of a dotted field path. Numeric segments index lists.
    ///
    /// Returns `None` as soon as a segment is missing.
    pub fn lookup<'a, I>(&self, path: I) -> Option<Value>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut current = self.as_json()?;
        for segment in path {
            current = child(current, segment)?;
        }
        Some(Value::Json(current.clone()))
    }

    /// Best-effort projection of a dotted field path.
    ///
    /// Walks as far as the path matches and returns the container where the
    /// first missing segment was requested.
    pub fn project<'a, I>(&self, path: I) -> Value
    where
        I: IntoIterator<Item = &'a str>,
    {
        let Some(mut current) = self.as_json() else {
            return self.clone();
        };
        for segment in path {
            match child(current, segment) {
                Some(next) => current = next,
                None => break,
            }
        }
        Value::Json(current.clone())
    }
}

fn json_truthy(json: &Json) -> bool {
    match json {
        Json::Null => false,
        Json::Bool(b) => *b,
        Json::Number(n) => n.as_f64().is_some_and(|f| f > 0.0),
        Json::String(s) => !s.is_empty(),
        Json::Array(items) => !items.is_empty(),
        Json::Object(_) => true,
    }
}

fn child<'j>(json: &'j Json, segment: &str) -> Option<&'j Json> {
    match json {
        Json::Object(map) => map.get(segment),
        Json::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Value::Json(Json::deserialize(deserializer)?))
    }
}

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        Value::Json(json)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Json(Json::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Bytes(bytes)
    }
}
