//! Field extraction rules, one table per result variant.
//!
//! Each rule names the target field, where in the envelope its value comes
//! from and how the raw text is coerced. Channel positions differ between
//! variants and, for presence and message envelopes, depend on the envelope
//! length, so every shape rule lives here rather than in the builders.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::envelope::{Envelope, MIN_LEN, map_text};
use crate::error::{Error, Result};
use crate::serializer::JsonPluggable;
use crate::timetoken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    StatusCode,
    StatusMessage,
    ChannelName,
    Who,
    Action,
    Timestamp,
    Occupancy,
}

impl Field {
    /// The coercion a rule targeting this field must use.
    pub const fn coercion(self) -> Coerce {
        match self {
            Field::StatusCode | Field::Occupancy => Coerce::IntOrDefault,
            Field::Timestamp => Coerce::Timetoken,
            Field::StatusMessage | Field::ChannelName | Field::Who | Field::Action => Coerce::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Index(usize),
    /// Key of the map at `index`. A non-map element is a contract violation.
    MapKey { index: usize, key: &'static str },
    /// Key of the map at `index`. A non-map element leaves the field unset.
    MapKeyOrEmpty { index: usize, key: &'static str },
    /// Position `at` when the envelope has exactly `len` elements, else `otherwise`.
    ByLength {
        len: usize,
        at: usize,
        otherwise: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coerce {
    Text,
    /// Integer via [`parse_or_default`].
    IntOrDefault,
    /// Timetoken text via [`timetoken::parse_text`].
    Timetoken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub field: Field,
    pub source: Source,
    pub coerce: Coerce,
}

impl FieldRule {
    const fn new(field: Field, source: Source) -> Self {
        Self {
            field,
            source,
            coerce: field.coercion(),
        }
    }
}

const WILDCARD_CHANNEL: Source = Source::ByLength {
    len: 4,
    at: 3,
    otherwise: 2,
};

/// Required key of the map at position 0.
const fn event_key(key: &'static str) -> Source {
    Source::MapKey { index: 0, key }
}

/// Optional key of the map at position 0.
const fn status_key(key: &'static str) -> Source {
    Source::MapKeyOrEmpty { index: 0, key }
}

/// `[status_code, status_message, channel]`
pub const ACK: &[FieldRule] = &[
    FieldRule::new(Field::StatusCode, Source::Index(0)),
    FieldRule::new(Field::StatusMessage, Source::Index(1)),
    FieldRule::new(Field::ChannelName, Source::Index(2)),
];

/// Same shape as [`ACK`].
pub const CONNECT_OR_DISCONNECT: &[FieldRule] = ACK;

/// `[status_code, status_message, timetoken, channel]`
pub const PUBLISH: &[FieldRule] = &[
    FieldRule::new(Field::StatusCode, Source::Index(0)),
    FieldRule::new(Field::StatusMessage, Source::Index(1)),
    FieldRule::new(Field::ChannelName, Source::Index(3)),
];

/// `[{status, message, ...}, channel, ...]`
pub const GRANT: &[FieldRule] = &[
    FieldRule::new(Field::StatusCode, status_key("status")),
    FieldRule::new(Field::StatusMessage, status_key("message")),
    FieldRule::new(Field::ChannelName, Source::Index(1)),
];

/// `[{uuid, action, occupancy}, timetoken, channel]` or
/// `[{uuid, action, occupancy}, timetoken, sub_channel, channel]`
pub const JOIN_OR_LEAVE: &[FieldRule] = &[
    FieldRule::new(Field::Who, event_key("uuid")),
    FieldRule::new(Field::Action, event_key("action")),
    FieldRule::new(Field::Occupancy, event_key("occupancy")),
    FieldRule::new(Field::Timestamp, Source::Index(1)),
    FieldRule::new(Field::ChannelName, WILDCARD_CHANNEL),
];

/// Metadata of `[payload, timetoken, channel]` or
/// `[payload, timetoken, sub_channel, channel]`. The payload is decoded separately.
pub const MESSAGE: &[FieldRule] = &[
    FieldRule::new(Field::Timestamp, Source::Index(1)),
    FieldRule::new(Field::ChannelName, WILDCARD_CHANNEL),
];

/// Parse an integer, falling back to 0.
///
/// Status codes and counts arrive as loosely typed text; a malformed value
/// must never stop a result from being delivered.
pub fn parse_or_default(text: &str) -> i32 {
    match text.trim().parse::<i32>() {
        Ok(n) => n,
        Err(_) => {
            tracing::trace!(text, "non-numeric value, defaulting to 0");
            0
        }
    }
}

/// Named values pulled out of one envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub status_code: i32,
    pub status_message: String,
    pub channel_name: String,
    pub who: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
    pub occupancy: i32,
}

impl Default for Extracted {
    fn default() -> Self {
        Self {
            status_code: 0,
            status_message: String::new(),
            channel_name: String::new(),
            who: String::new(),
            action: String::new(),
            timestamp: timetoken::epoch(),
            occupancy: 0,
        }
    }
}

#[derive(Debug)]
enum Coerced {
    Text(String),
    Int(i32),
    Time(DateTime<Utc>),
}

impl Extracted {
    fn assign(&mut self, field: Field, value: Coerced) {
        match (field, value) {
            (Field::StatusCode, Coerced::Int(n)) => self.status_code = n,
            (Field::Occupancy, Coerced::Int(n)) => self.occupancy = n,
            (Field::Timestamp, Coerced::Time(at)) => self.timestamp = at,
            (Field::StatusMessage, Coerced::Text(s)) => self.status_message = s,
            (Field::ChannelName, Coerced::Text(s)) => self.channel_name = s,
            (Field::Who, Coerced::Text(s)) => self.who = s,
            (Field::Action, Coerced::Text(s)) => self.action = s,
            (field, value) => {
                tracing::warn!(?field, ?value, "coercion does not fit field, leaving default");
            }
        }
    }
}

/// Apply `rules` to `envelope`.
///
/// Fails on envelopes shorter than [`MIN_LEN`] and on a non-map element where
/// a [`Source::MapKey`] rule needs one. Coercion failures never fail.
pub fn extract<S: JsonPluggable + ?Sized>(
    rules: &[FieldRule],
    envelope: &Envelope,
    serializer: &S,
) -> Result<Extracted> {
    envelope.require(MIN_LEN)?;

    let mut out = Extracted::default();
    let mut maps: Vec<(usize, Option<Map<String, Value>>)> = Vec::new();

    for rule in rules {
        let text = match rule.source {
            Source::Index(index) => envelope.text_at(index),
            Source::ByLength { len, at, otherwise } => {
                let index = if envelope.len() == len { at } else { otherwise };
                envelope.text_at(index)
            }
            Source::MapKey { index, key } => {
                let map = map_at(&mut maps, envelope, index, serializer);
                map_text(map.ok_or(Error::NotAMap { index })?, key)
            }
            Source::MapKeyOrEmpty { index, key } => {
                let Some(map) = map_at(&mut maps, envelope, index, serializer) else {
                    continue;
                };
                map_text(map, key)
            }
        };

        let value = match rule.coerce {
            Coerce::Text => Coerced::Text(text),
            Coerce::IntOrDefault => Coerced::Int(parse_or_default(&text)),
            Coerce::Timetoken => Coerced::Time(timetoken::parse_text(&text)),
        };
        out.assign(rule.field, value);
    }

    Ok(out)
}

fn map_at<'a, S: JsonPluggable + ?Sized>(
    cache: &'a mut Vec<(usize, Option<Map<String, Value>>)>,
    envelope: &Envelope,
    index: usize,
    serializer: &S,
) -> Option<&'a Map<String, Value>> {
    let pos = match cache.iter().position(|(i, _)| *i == index) {
        Some(pos) => pos,
        None => {
            let map = envelope.get(index).and_then(|v| serializer.to_map(v));
            cache.push((index, map));
            cache.len() - 1
        }
    };
    cache.get(pos).and_then(|(_, map)| map.as_ref())
}
