//! Pluggable JSON strategy used for payload decoding and publish encoding.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::builders::FromEnvelope;
use crate::envelope::Envelope;
use crate::error::{Result, SerializerError};

/// Converts between text and typed values on behalf of the facade.
///
/// One instance is shared read-only by every adapter, possibly from several
/// transport threads at once, so implementations must be stateless or
/// internally synchronized.
pub trait JsonPluggable: Send + Sync {
    fn serialize<T: Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> std::result::Result<String, SerializerError>;

    fn deserialize<T: DeserializeOwned>(
        &self,
        text: &str,
    ) -> std::result::Result<T, SerializerError>;

    /// Build a typed result straight from a wire envelope.
    ///
    /// The default runs the built-in builder for `T`. Override to take over
    /// conversion for particular result types.
    fn deserialize_envelope<T: FromEnvelope>(&self, envelope: &Envelope) -> Result<T> {
        T::from_envelope(envelope, self)
    }

    /// View a value as a string-keyed map, if it is one.
    ///
    /// Objects are returned as-is and strings holding a JSON object are parsed.
    fn to_map(&self, value: &Value) -> Option<Map<String, Value>> {
        match value {
            Value::Object(map) => Some(map.clone()),
            Value::String(text) => self.deserialize::<Map<String, Value>>(text).ok(),
            _ => None,
        }
    }
}

/// Default strategy backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerdeJson;

impl JsonPluggable for SerdeJson {
    fn serialize<T: Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> std::result::Result<String, SerializerError> {
        Ok(serde_json::to_string(value)?)
    }

    fn deserialize<T: DeserializeOwned>(
        &self,
        text: &str,
    ) -> std::result::Result<T, SerializerError> {
        Ok(serde_json::from_str(text)?)
    }
}
