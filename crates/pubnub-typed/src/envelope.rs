//! The raw positional response shape handed over by the transport.

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Minimum number of elements every acknowledgment and message builder needs.
pub const MIN_LEN: usize = 3;

/// An ordered, variable-length sequence of untyped values.
///
/// Typical shapes are `[payload, timetoken, channel]` and
/// `[payload, timetoken, sub_channel, wildcard_channel]`; the meaning of each
/// position depends on the operation that produced it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Envelope(Vec<Value>);

impl Envelope {
    pub fn new(items: Vec<Value>) -> Self {
        Self(items)
    }

    /// Accept a raw value from the transport. Only a JSON array is an envelope.
    pub fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Array(items) => Ok(Self(items)),
            Value::Null => Err(Error::NullEnvelope),
            other => Err(Error::NotAList(kind_name(&other))),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn items(&self) -> &[Value] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<Value> {
        self.0
    }

    /// Fail with [`Error::TooShort`] unless the envelope has at least `min` elements.
    pub fn require(&self, min: usize) -> Result<()> {
        if self.0.len() < min {
            return Err(Error::TooShort {
                len: self.0.len(),
                min,
            });
        }
        Ok(())
    }

    /// Element at `index` rendered as text.
    ///
    /// Strings come back verbatim, `null` and missing positions as the empty
    /// string, everything else as compact JSON.
    pub fn text_at(&self, index: usize) -> String {
        self.0.get(index).map(value_text).unwrap_or_default()
    }
}

impl From<Vec<Value>> for Envelope {
    fn from(items: Vec<Value>) -> Self {
        Self(items)
    }
}

impl From<Envelope> for Value {
    fn from(envelope: Envelope) -> Self {
        Value::Array(envelope.0)
    }
}

impl TryFrom<Value> for Envelope {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        Self::try_from_value(value)
    }
}

/// Render a single value the way envelope fields are read as text.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Look up `key` in a map and render it as text; missing keys read as empty.
pub(crate) fn map_text(map: &Map<String, Value>, key: &str) -> String {
    map.get(key).map(value_text).unwrap_or_default()
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
