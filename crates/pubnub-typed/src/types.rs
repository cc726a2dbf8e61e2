//! Public result types delivered to typed callbacks.

use std::any::TypeId;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Runtime tag for the type a caller asked a result to be built as.
///
/// Equality compares the underlying [`TypeId`]; the name is for display.
#[derive(Clone, Copy)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path (`pubnub_typed::types::Ack` → `Ack`).
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        match base.rfind("::") {
            Some(pos) => self.name.get(pos + 2..).unwrap_or(self.name),
            None => self.name,
        }
    }

    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

impl std::hash::Hash for TypeTag {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({})", self.name)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl Serialize for TypeTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.short_name())
    }
}

/// A subscribed message with its payload decoded as `T`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedEvent<T> {
    pub payload: T,
    /// Publish time taken from the message timetoken.
    pub occurred_at: DateTime<Utc>,
    pub channel_name: String,
}

macro_rules! status_ack {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize)]
        #[serde(rename_all = "camelCase")]
        pub struct $name {
            /// Numeric status; 0 when the wire value was not a number.
            pub status_code: i32,
            pub status_message: String,
            pub channel_name: String,
            /// The type the caller requested this acknowledgment as.
            pub result_type: TypeTag,
        }

        impl $name {
            pub fn is_success(&self) -> bool {
                self.status_code == 1 || self.status_code == 200
            }
        }
    };
}

status_ack! {
    /// Generic acknowledgment read from `[status_code, status_message, channel]`.
    Ack
}

status_ack! {
    /// Connect or disconnect confirmation for a subscribed channel.
    ConnectOrDisconnectAck
}

status_ack! {
    /// Publish confirmation. The channel sits after the publish timetoken.
    PublishAck
}

status_ack! {
    /// Access grant/audit confirmation. Success is reported as status 200.
    GrantAck
}

/// A presence change on a channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinOrLeaveAck {
    /// UUID of the client whose presence changed.
    pub who: String,
    /// Presence action: `join`, `leave`, `timeout`, `state-change`, ...
    pub status: String,
    pub happened_at: DateTime<Utc>,
    pub channel_name: String,
    /// Channel occupancy after the change; 0 when not a number.
    pub occupancy: i32,
    pub result_type: TypeTag,
}

impl JoinOrLeaveAck {
    pub fn is_join(&self) -> bool {
        self.status == "join"
    }

    pub fn is_leave(&self) -> bool {
        self.status == "leave"
    }
}

/// Service or transport failure reported through the error callback.
///
/// The facade never builds or inspects these; they are passed through from
/// the transport unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientError {
    pub status_code: i32,
    pub message: String,
    pub channel: String,
    pub channel_group: String,
    pub description: String,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status={} {}", self.status_code, self.message)?;
        if !self.channel.is_empty() {
            write!(f, " channel={}", self.channel)?;
        }
        if !self.channel_group.is_empty() {
            write!(f, " channel_group={}", self.channel_group)?;
        }
        Ok(())
    }
}
