//! Typed callback facade over a PubNub-style publish/subscribe transport.
//!
//! The transport engine delivers loosely typed positional payloads such as
//! `["1", "Sent", "14578941", "hello_channel"]`. This crate turns them into
//! typed results and routes them to per-operation callbacks.
//!
//! # Features
//! - Acknowledgment types for connect/disconnect, publish, grant and presence
//!   events, each built from its own field-position rules
//! - Message events whose payload is decoded through a pluggable serializer
//! - Runtime dispatch by requested type with raw pass-through for unknown types
//! - Lenient status parsing: a malformed status code never drops a result
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use pubnub_typed::{
//!     Client, ConnectOrDisconnectAck, PublishAck, SubscribeRequest, Transport, TypedEvent,
//! };
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct UserCreated {
//!     id: u32,
//!     name: String,
//! }
//!
//! fn run<E: Transport>(transport: Arc<E>) -> Result<(), pubnub_typed::Error> {
//!     let client = Client::new(transport);
//!     client.subscribe(
//!         &SubscribeRequest::channel("users"),
//!         |e: TypedEvent<UserCreated>| println!("{} on {}", e.payload.name, e.channel_name),
//!         |ack: ConnectOrDisconnectAck| println!("connected: {}", ack.status_message),
//!         |err| eprintln!("error: {err}"),
//!     );
//!
//!     let user = UserCreated { id: 1, name: "Ada".into() };
//!     client.publish(
//!         "users",
//!         &user,
//!         true,
//!         |ack: PublishAck| println!("published, status {}", ack.status_code),
//!         |err| eprintln!("error: {err}"),
//!     )?;
//!     Ok(())
//! }
//! ```

pub mod builders;
mod client;
pub mod config;
pub mod dispatch;
mod envelope;
mod error;
pub mod rules;
mod serializer;
pub mod timetoken;
pub mod transport;
mod types;

pub use builders::FromEnvelope;
pub use client::{Client, SubscribeBuilder};
pub use config::{ClientConfig, SessionSettings};
pub use dispatch::{DispatchTable, Resolved, ResultKind, resolve};
pub use envelope::{Envelope, MIN_LEN, value_text};
pub use error::{Error, Result, SerializerError};
pub use serializer::{JsonPluggable, SerdeJson};
pub use transport::{
    AccessTarget, AuditRequest, ChannelGroupOperation, ChannelGroupRequest, ErrorCallback,
    GrantRequest, HereNowRequest, HistoryRequest, PublishRequest, PushOperation, PushRequest,
    PushType, RawCallback, RawSubscribeCallbacks, SetUserStateRequest, SubscribeRequest, Transport,
    UserState, UserStateRequest,
};
pub use types::{
    Ack, ClientError, ConnectOrDisconnectAck, GrantAck, JoinOrLeaveAck, PublishAck, TypeTag,
    TypedEvent,
};
