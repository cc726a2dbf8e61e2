//! Contract of the transport engine the facade drives.
//!
//! The engine owns connections, retries and heartbeats. It accepts untyped
//! callbacks and later invokes them with raw decoded payloads, possibly from
//! several of its own threads at once.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::SessionSettings;
use crate::error::Result;
use crate::types::ClientError;

/// Untyped result callback.
///
/// Returns `Err` synchronously when the payload is not a usable envelope;
/// that is a defect in the engine or its wiring, not a service error.
pub type RawCallback = Arc<dyn Fn(Value) -> Result<()> + Send + Sync>;

/// Error callback; receives service and network failures unchanged.
pub type ErrorCallback = Arc<dyn Fn(ClientError) + Send + Sync>;

/// Untyped callbacks for subscribe-style operations.
#[derive(Clone)]
pub struct RawSubscribeCallbacks {
    pub message: RawCallback,
    pub connect: RawCallback,
    pub presence: Option<RawCallback>,
    pub disconnect: Option<RawCallback>,
    pub wildcard_presence: Option<RawCallback>,
}

impl RawSubscribeCallbacks {
    pub fn new(message: RawCallback, connect: RawCallback) -> Self {
        Self {
            message,
            connect,
            presence: None,
            disconnect: None,
            wildcard_presence: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub channel: String,
    #[serde(default)]
    pub channel_group: String,
}

impl SubscribeRequest {
    pub fn channel(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            channel_group: String::new(),
        }
    }

    pub fn group(channel_group: impl Into<String>) -> Self {
        Self {
            channel: String::new(),
            channel_group: channel_group.into(),
        }
    }

    pub fn with_group(mut self, channel_group: impl Into<String>) -> Self {
        self.channel_group = channel_group.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishRequest {
    pub channel: String,
    pub message: Value,
    pub store_in_history: bool,
}

impl PublishRequest {
    /// Publish request that is stored in history.
    pub fn new(channel: impl Into<String>, message: Value) -> Self {
        Self {
            channel: channel.into(),
            message,
            store_in_history: true,
        }
    }

    pub fn without_history(mut self) -> Self {
        self.store_in_history = false;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRequest {
    pub channel: String,
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub count: Option<u32>,
    pub reverse: bool,
}

impl HistoryRequest {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            ..Default::default()
        }
    }

    pub fn count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    pub fn range(mut self, start: i64, end: i64) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn start(mut self, start: i64) -> Self {
        self.start = Some(start);
        self
    }

    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HereNowRequest {
    pub channel: String,
    pub show_uuid_list: bool,
    pub include_user_state: bool,
}

impl HereNowRequest {
    /// Here-now listing with UUIDs but without user state.
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            show_uuid_list: true,
            include_user_state: false,
        }
    }
}

/// What an access grant or audit applies to. Empty names mean "all".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessTarget {
    Channel(String),
    ChannelGroup(String),
}

impl AccessTarget {
    pub fn name(&self) -> &str {
        match self {
            AccessTarget::Channel(name) | AccessTarget::ChannelGroup(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRequest {
    pub target: AccessTarget,
    /// Grant on the presence companion channel (`<name>-pnpres`).
    pub presence: bool,
    pub auth_key: Option<String>,
    pub read: bool,
    /// Write for channels, manage for channel groups.
    pub write: bool,
    /// Minutes; `None` leaves the service default.
    pub ttl: Option<u32>,
}

impl GrantRequest {
    pub fn new(target: AccessTarget, read: bool, write: bool) -> Self {
        Self {
            target,
            presence: false,
            auth_key: None,
            read,
            write,
            ttl: None,
        }
    }

    pub fn presence(mut self) -> Self {
        self.presence = true;
        self
    }

    pub fn auth_key(mut self, auth_key: impl Into<String>) -> Self {
        self.auth_key = Some(auth_key.into());
        self
    }

    pub fn ttl(mut self, minutes: u32) -> Self {
        self.ttl = Some(minutes);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRequest {
    pub target: AccessTarget,
    pub presence: bool,
    pub auth_key: Option<String>,
}

impl AuditRequest {
    pub fn new(target: AccessTarget) -> Self {
        Self {
            target,
            presence: false,
            auth_key: None,
        }
    }

    pub fn presence(mut self) -> Self {
        self.presence = true;
        self
    }

    pub fn auth_key(mut self, auth_key: impl Into<String>) -> Self {
        self.auth_key = Some(auth_key.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStateRequest {
    pub channel: String,
    pub channel_group: String,
    /// `None` means the session's own UUID.
    pub uuid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UserState {
    /// A complete JSON object as text.
    Json(String),
    /// A single key to set; `Value::Null` removes it.
    KeyValue(String, Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetUserStateRequest {
    pub target: UserStateRequest,
    pub state: UserState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PushType {
    Apns,
    Gcm,
    Mpns,
    Wns,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PushOperation {
    RegisterDevice,
    UnregisterDevice,
    RemoveChannel,
    ListChannels,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRequest {
    pub operation: PushOperation,
    /// Unused by `UnregisterDevice` and `ListChannels`.
    pub channel: String,
    pub push_type: PushType,
    pub push_token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelGroupOperation {
    AddChannels,
    RemoveChannels,
    RemoveGroup,
    RemoveNamespace,
    ListChannels,
    ListGroups,
    ListNamespaces,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelGroupRequest {
    pub operation: ChannelGroupOperation,
    pub namespace: String,
    pub group: String,
    pub channels: Vec<String>,
}

impl ChannelGroupRequest {
    pub fn new(operation: ChannelGroupOperation) -> Self {
        Self {
            operation,
            namespace: String::new(),
            group: String::new(),
            channels: Vec::new(),
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn channels<I, C>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        self.channels = channels.into_iter().map(Into::into).collect();
        self
    }
}

/// Untyped operation surface of the transport engine.
///
/// Operations returning `bool` report whether the request was accepted for
/// sending; the outcome always arrives through the callbacks.
pub trait Transport: Send + Sync {
    fn subscribe(
        &self,
        request: &SubscribeRequest,
        callbacks: RawSubscribeCallbacks,
        on_error: ErrorCallback,
    );
    fn presence(
        &self,
        request: &SubscribeRequest,
        callbacks: RawSubscribeCallbacks,
        on_error: ErrorCallback,
    );
    fn unsubscribe(
        &self,
        request: &SubscribeRequest,
        callbacks: RawSubscribeCallbacks,
        on_error: ErrorCallback,
    );
    fn presence_unsubscribe(
        &self,
        request: &SubscribeRequest,
        callbacks: RawSubscribeCallbacks,
        on_error: ErrorCallback,
    );

    fn publish(
        &self,
        request: &PublishRequest,
        on_result: RawCallback,
        on_error: ErrorCallback,
    ) -> bool;
    fn detailed_history(
        &self,
        request: &HistoryRequest,
        on_result: RawCallback,
        on_error: ErrorCallback,
    ) -> bool;
    fn here_now(
        &self,
        request: &HereNowRequest,
        on_result: RawCallback,
        on_error: ErrorCallback,
    ) -> bool;
    fn global_here_now(
        &self,
        show_uuid_list: bool,
        include_user_state: bool,
        on_result: RawCallback,
        on_error: ErrorCallback,
    ) -> bool;
    fn where_now(&self, uuid: &str, on_result: RawCallback, on_error: ErrorCallback);
    fn time(&self, on_result: RawCallback, on_error: ErrorCallback) -> bool;

    fn grant_access(
        &self,
        request: &GrantRequest,
        on_result: RawCallback,
        on_error: ErrorCallback,
    ) -> bool;
    fn audit_access(
        &self,
        request: &AuditRequest,
        on_result: RawCallback,
        on_error: ErrorCallback,
    );

    fn set_user_state(
        &self,
        request: &SetUserStateRequest,
        on_result: RawCallback,
        on_error: ErrorCallback,
    );
    fn get_user_state(
        &self,
        request: &UserStateRequest,
        on_result: RawCallback,
        on_error: ErrorCallback,
    );

    fn push(&self, request: &PushRequest, on_result: RawCallback, on_error: ErrorCallback);
    fn channel_group(
        &self,
        request: &ChannelGroupRequest,
        on_result: RawCallback,
        on_error: ErrorCallback,
    );

    fn terminate_current_subscriber_request(&self);
    fn end_pending_requests(&self);
    fn change_uuid(&self, uuid: &str);

    fn settings(&self) -> SessionSettings;
    fn apply_settings(&self, settings: &SessionSettings);
}
