//! Builders turning a wire envelope into one typed result.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::envelope::{Envelope, MIN_LEN};
use crate::error::{Error, Result};
use crate::rules::{self, Extracted};
use crate::serializer::JsonPluggable;
use crate::types::{
    Ack, ConnectOrDisconnectAck, GrantAck, JoinOrLeaveAck, PublishAck, TypeTag, TypedEvent,
};

/// A result type that can be built from a wire envelope.
///
/// Implemented for every acknowledgment variant, for [`TypedEvent<T>`] and for
/// [`Envelope`] itself, which passes the raw shape through.
pub trait FromEnvelope: Sized + Send + 'static {
    fn from_envelope<S: JsonPluggable + ?Sized>(
        envelope: &Envelope,
        serializer: &S,
    ) -> Result<Self>;
}

pub fn ack<S: JsonPluggable + ?Sized>(
    envelope: &Envelope,
    serializer: &S,
    requested: TypeTag,
) -> Result<Ack> {
    let f = rules::extract(rules::ACK, envelope, serializer)?;
    Ok(Ack {
        status_code: f.status_code,
        status_message: f.status_message,
        channel_name: f.channel_name,
        result_type: requested,
    })
}

pub fn connect_or_disconnect<S: JsonPluggable + ?Sized>(
    envelope: &Envelope,
    serializer: &S,
    requested: TypeTag,
) -> Result<ConnectOrDisconnectAck> {
    let f = rules::extract(rules::CONNECT_OR_DISCONNECT, envelope, serializer)?;
    Ok(ConnectOrDisconnectAck {
        status_code: f.status_code,
        status_message: f.status_message,
        channel_name: f.channel_name,
        result_type: requested,
    })
}

pub fn publish<S: JsonPluggable + ?Sized>(
    envelope: &Envelope,
    serializer: &S,
    requested: TypeTag,
) -> Result<PublishAck> {
    let f = rules::extract(rules::PUBLISH, envelope, serializer)?;
    Ok(PublishAck {
        status_code: f.status_code,
        status_message: f.status_message,
        channel_name: f.channel_name,
        result_type: requested,
    })
}

pub fn grant<S: JsonPluggable + ?Sized>(
    envelope: &Envelope,
    serializer: &S,
    requested: TypeTag,
) -> Result<GrantAck> {
    let f = rules::extract(rules::GRANT, envelope, serializer)?;
    Ok(GrantAck {
        status_code: f.status_code,
        status_message: f.status_message,
        channel_name: f.channel_name,
        result_type: requested,
    })
}

pub fn join_or_leave<S: JsonPluggable + ?Sized>(
    envelope: &Envelope,
    serializer: &S,
    requested: TypeTag,
) -> Result<JoinOrLeaveAck> {
    let Extracted {
        who,
        action,
        timestamp,
        channel_name,
        occupancy,
        ..
    } = rules::extract(rules::JOIN_OR_LEAVE, envelope, serializer)?;
    Ok(JoinOrLeaveAck {
        who,
        status: action,
        happened_at: timestamp,
        channel_name,
        occupancy,
        result_type: requested,
    })
}

/// Build a message event, decoding element 0 as `T`.
///
/// The payload is serialized back to text and then deserialized as `T`, so
/// nothing here depends on the payload's shape.
pub fn event<T, S>(envelope: &Envelope, serializer: &S) -> Result<TypedEvent<T>>
where
    T: DeserializeOwned,
    S: JsonPluggable + ?Sized,
{
    let meta = rules::extract(rules::MESSAGE, envelope, serializer)?;
    let raw = envelope.get(0).ok_or(Error::TooShort {
        len: envelope.len(),
        min: MIN_LEN,
    })?;
    let text = serializer.serialize(raw)?;
    let payload = serializer.deserialize::<T>(&text)?;
    Ok(TypedEvent {
        payload,
        occurred_at: meta.timestamp,
        channel_name: meta.channel_name,
    })
}

impl FromEnvelope for Ack {
    fn from_envelope<S: JsonPluggable + ?Sized>(
        envelope: &Envelope,
        serializer: &S,
    ) -> Result<Self> {
        ack(envelope, serializer, TypeTag::of::<Self>())
    }
}

impl FromEnvelope for ConnectOrDisconnectAck {
    fn from_envelope<S: JsonPluggable + ?Sized>(
        envelope: &Envelope,
        serializer: &S,
    ) -> Result<Self> {
        connect_or_disconnect(envelope, serializer, TypeTag::of::<Self>())
    }
}

impl FromEnvelope for PublishAck {
    fn from_envelope<S: JsonPluggable + ?Sized>(
        envelope: &Envelope,
        serializer: &S,
    ) -> Result<Self> {
        publish(envelope, serializer, TypeTag::of::<Self>())
    }
}

impl FromEnvelope for GrantAck {
    fn from_envelope<S: JsonPluggable + ?Sized>(
        envelope: &Envelope,
        serializer: &S,
    ) -> Result<Self> {
        grant(envelope, serializer, TypeTag::of::<Self>())
    }
}

impl FromEnvelope for JoinOrLeaveAck {
    fn from_envelope<S: JsonPluggable + ?Sized>(
        envelope: &Envelope,
        serializer: &S,
    ) -> Result<Self> {
        join_or_leave(envelope, serializer, TypeTag::of::<Self>())
    }
}

impl<T: DeserializeOwned + Send + 'static> FromEnvelope for TypedEvent<T> {
    fn from_envelope<S: JsonPluggable + ?Sized>(
        envelope: &Envelope,
        serializer: &S,
    ) -> Result<Self> {
        event(envelope, serializer)
    }
}

impl FromEnvelope for Envelope {
    fn from_envelope<S: JsonPluggable + ?Sized>(
        envelope: &Envelope,
        _serializer: &S,
    ) -> Result<Self> {
        Ok(envelope.clone())
    }
}

/// Untyped results (history pages, here-now listings, time) as one JSON array.
impl FromEnvelope for Value {
    fn from_envelope<S: JsonPluggable + ?Sized>(
        envelope: &Envelope,
        _serializer: &S,
    ) -> Result<Self> {
        Ok(Value::Array(envelope.items().to_vec()))
    }
}
