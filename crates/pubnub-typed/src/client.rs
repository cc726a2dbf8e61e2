//! Typed facade over a [`Transport`].
//!
//! Every typed callback is wrapped in an untyped adapter before it is handed
//! to the transport. When the transport invokes the adapter with a raw
//! payload, the adapter checks the envelope shape, builds the requested
//! result type and passes it to the caller's callback. Malformed envelopes
//! are returned to the transport as [`Error`](crate::Error)s; they never reach the typed
//! callback or the error callback.
//!
//! The `*_resolved` variants build results through the client's
//! [`DispatchTable`] instead, so types registered at runtime are delivered too.

use std::any::type_name;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::builders::FromEnvelope;
use crate::config::{ClientConfig, SessionSettings};
use crate::dispatch::{DispatchTable, Resolved};
use crate::envelope::Envelope;
use crate::error::Result;
use crate::serializer::{JsonPluggable, SerdeJson};
use crate::transport::{
    AuditRequest, ChannelGroupRequest, ErrorCallback, GrantRequest, HereNowRequest, HistoryRequest,
    PublishRequest, PushRequest, RawCallback, RawSubscribeCallbacks, SetUserStateRequest,
    SubscribeRequest, Transport, UserStateRequest,
};
use crate::types::{ClientError, TypeTag};

fn deliver<R, F>(
    operation: &'static str,
    result_type: &'static str,
    result: Result<R>,
    callback: &F,
) -> Result<()>
where
    F: Fn(R),
{
    match result {
        Ok(value) => {
            tracing::debug!(operation, result_type, "delivering result");
            callback(value);
            Ok(())
        }
        Err(e) => {
            tracing::warn!(operation, result_type, error = %e, "rejecting envelope");
            Err(e)
        }
    }
}

/// Wrap a typed callback into an untyped adapter for the transport.
fn adapt<T, S, F>(operation: &'static str, serializer: Arc<S>, callback: F) -> RawCallback
where
    T: FromEnvelope,
    S: JsonPluggable + 'static,
    F: Fn(T) + Send + Sync + 'static,
{
    Arc::new(move |raw: Value| {
        let result = Envelope::try_from_value(raw)
            .and_then(|envelope| serializer.deserialize_envelope::<T>(&envelope));
        deliver(operation, type_name::<T>(), result, &callback)
    })
}

/// Wrap a callback into an adapter that resolves `tag` against `table`.
fn resolve_adapt<S, F>(
    operation: &'static str,
    tag: TypeTag,
    table: Arc<DispatchTable>,
    serializer: Arc<S>,
    callback: F,
) -> RawCallback
where
    S: JsonPluggable + 'static,
    F: Fn(Resolved) + Send + Sync + 'static,
{
    Arc::new(move |raw: Value| {
        let result = Envelope::try_from_value(raw)
            .and_then(|envelope| table.resolve(tag, envelope, &*serializer));
        deliver(operation, tag.name(), result, &callback)
    })
}

/// Adapter for callbacks the caller did not supply.
fn ignore(operation: &'static str) -> RawCallback {
    Arc::new(move |_raw: Value| {
        tracing::trace!(operation, "no callback registered, dropping result");
        Ok(())
    })
}

fn raw<F>(callback: F) -> RawCallback
where
    F: Fn(Value) + Send + Sync + 'static,
{
    Arc::new(move |value: Value| {
        callback(value);
        Ok(())
    })
}

fn on_error<F>(callback: F) -> ErrorCallback
where
    F: Fn(ClientError) + Send + Sync + 'static,
{
    Arc::new(callback)
}

/// Typed publish/subscribe client.
///
/// Holds no conversation state: only the transport, the serializer and the
/// dispatch table, all shared. Cloning is cheap and clones drive the same
/// transport.
pub struct Client<E, S = SerdeJson> {
    transport: Arc<E>,
    serializer: Arc<S>,
    dispatch: Arc<DispatchTable>,
}

impl<E, S> Clone for Client<E, S> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            serializer: Arc::clone(&self.serializer),
            dispatch: Arc::clone(&self.dispatch),
        }
    }
}

impl<E: Transport> Client<E, SerdeJson> {
    pub fn new(transport: Arc<E>) -> Self {
        Self::with_serializer(transport, SerdeJson)
    }
}

impl<E, S> Client<E, S>
where
    E: Transport,
    S: JsonPluggable + 'static,
{
    pub fn with_serializer(transport: Arc<E>, serializer: S) -> Self {
        Self {
            transport,
            serializer: Arc::new(serializer),
            dispatch: Arc::new(DispatchTable::standard().clone()),
        }
    }

    /// Build a client and push the config's session settings into the transport.
    pub fn from_config(transport: Arc<E>, serializer: S, config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let client = Self::with_serializer(transport, serializer);
        client.transport.apply_settings(&config.session);
        if let Some(uuid) = config.session.session_uuid.as_deref() {
            client.transport.change_uuid(uuid);
        }
        tracing::debug!(subscribe_key = %config.subscribe_key, "client configured");
        Ok(client)
    }

    /// Replace the table the `*_resolved` callbacks are built from.
    ///
    /// Defaults to [`DispatchTable::standard`].
    pub fn with_dispatch(mut self, table: DispatchTable) -> Self {
        self.dispatch = Arc::new(table);
        self
    }

    pub fn transport(&self) -> &Arc<E> {
        &self.transport
    }

    pub fn serializer(&self) -> &S {
        &self.serializer
    }

    pub fn dispatch(&self) -> &DispatchTable {
        &self.dispatch
    }

    fn adapt<T, F>(&self, operation: &'static str, callback: F) -> RawCallback
    where
        T: FromEnvelope,
        F: Fn(T) + Send + Sync + 'static,
    {
        adapt::<T, S, F>(operation, Arc::clone(&self.serializer), callback)
    }

    /// Adapter that resolves each envelope for the type tag of `T`.
    ///
    /// Tags missing from the table arrive as [`Resolved::Raw`].
    pub fn resolver<T: ?Sized + 'static>(
        &self,
        operation: &'static str,
        callback: impl Fn(Resolved) + Send + Sync + 'static,
    ) -> RawCallback {
        let tag = TypeTag::of::<T>();
        let table = Arc::clone(&self.dispatch);
        let serializer = Arc::clone(&self.serializer);
        resolve_adapt(operation, tag, table, serializer, callback)
    }

    // -- subscribe family --

    /// Start assembling callbacks for a subscribe-style operation.
    pub fn callbacks(&self) -> SubscribeBuilder<'_, E, S> {
        SubscribeBuilder {
            client: self,
            message: None,
            connect: None,
            presence: None,
            disconnect: None,
            wildcard_presence: None,
            on_error: None,
        }
    }

    /// Subscribe with a typed message callback and a typed connect callback.
    ///
    /// `M` is usually [`TypedEvent<T>`](crate::TypedEvent) and `C` an
    /// acknowledgment type such as [`ConnectOrDisconnectAck`](crate::ConnectOrDisconnectAck).
    pub fn subscribe<M, C>(
        &self,
        request: &SubscribeRequest,
        on_message: impl Fn(M) + Send + Sync + 'static,
        on_connect: impl Fn(C) + Send + Sync + 'static,
        on_err: impl Fn(ClientError) + Send + Sync + 'static,
    ) where
        M: FromEnvelope,
        C: FromEnvelope,
    {
        self.callbacks()
            .message::<M>(on_message)
            .connect::<C>(on_connect)
            .error(on_err)
            .subscribe(request);
    }

    /// Subscribe and also receive presence events for the subscribed channels.
    pub fn subscribe_with_presence<M, P, C>(
        &self,
        request: &SubscribeRequest,
        on_message: impl Fn(M) + Send + Sync + 'static,
        on_presence: impl Fn(P) + Send + Sync + 'static,
        on_connect: impl Fn(C) + Send + Sync + 'static,
        on_err: impl Fn(ClientError) + Send + Sync + 'static,
    ) where
        M: FromEnvelope,
        P: FromEnvelope,
        C: FromEnvelope,
    {
        self.callbacks()
            .message::<M>(on_message)
            .presence::<P>(on_presence)
            .connect::<C>(on_connect)
            .error(on_err)
            .subscribe(request);
    }

    /// Subscribe without conversion; callbacks see the transport's raw payloads.
    pub fn subscribe_raw(
        &self,
        request: &SubscribeRequest,
        on_message: impl Fn(Value) + Send + Sync + 'static,
        on_connect: impl Fn(Value) + Send + Sync + 'static,
        on_err: impl Fn(ClientError) + Send + Sync + 'static,
    ) {
        self.transport.subscribe(
            request,
            RawSubscribeCallbacks::new(raw(on_message), raw(on_connect)),
            on_error(on_err),
        );
    }

    /// Subscribe to the presence channel of `request`.
    pub fn presence<P, C>(
        &self,
        request: &SubscribeRequest,
        on_presence: impl Fn(P) + Send + Sync + 'static,
        on_connect: impl Fn(C) + Send + Sync + 'static,
        on_err: impl Fn(ClientError) + Send + Sync + 'static,
    ) where
        P: FromEnvelope,
        C: FromEnvelope,
    {
        self.callbacks()
            .presence::<P>(on_presence)
            .connect::<C>(on_connect)
            .error(on_err)
            .presence_subscribe(request);
    }

    pub fn unsubscribe<M, C, D>(
        &self,
        request: &SubscribeRequest,
        on_message: impl Fn(M) + Send + Sync + 'static,
        on_connect: impl Fn(C) + Send + Sync + 'static,
        on_disconnect: impl Fn(D) + Send + Sync + 'static,
        on_err: impl Fn(ClientError) + Send + Sync + 'static,
    ) where
        M: FromEnvelope,
        C: FromEnvelope,
        D: FromEnvelope,
    {
        self.callbacks()
            .message::<M>(on_message)
            .connect::<C>(on_connect)
            .disconnect::<D>(on_disconnect)
            .error(on_err)
            .unsubscribe(request);
    }

    pub fn presence_unsubscribe<P, C, D>(
        &self,
        request: &SubscribeRequest,
        on_presence: impl Fn(P) + Send + Sync + 'static,
        on_connect: impl Fn(C) + Send + Sync + 'static,
        on_disconnect: impl Fn(D) + Send + Sync + 'static,
        on_err: impl Fn(ClientError) + Send + Sync + 'static,
    ) where
        P: FromEnvelope,
        C: FromEnvelope,
        D: FromEnvelope,
    {
        self.callbacks()
            .presence::<P>(on_presence)
            .connect::<C>(on_connect)
            .disconnect::<D>(on_disconnect)
            .error(on_err)
            .presence_unsubscribe(request);
    }

    // -- single-result operations --

    fn publish_request<M: Serialize + ?Sized>(
        &self,
        channel: &str,
        message: &M,
        store_in_history: bool,
    ) -> Result<PublishRequest> {
        let text = self.serializer.serialize(message)?;
        let value: Value = self.serializer.deserialize(&text)?;
        let mut request = PublishRequest::new(channel, value);
        request.store_in_history = store_in_history;
        tracing::debug!(channel, store_in_history, "publish");
        Ok(request)
    }

    /// Publish `message` on `channel`.
    ///
    /// The message goes through the serializer before it reaches the
    /// transport, so serializer failures surface here. Returns the
    /// transport's acceptance flag.
    pub fn publish<A, M>(
        &self,
        channel: &str,
        message: &M,
        store_in_history: bool,
        on_ack: impl Fn(A) + Send + Sync + 'static,
        on_err: impl Fn(ClientError) + Send + Sync + 'static,
    ) -> Result<bool>
    where
        A: FromEnvelope,
        M: Serialize + ?Sized,
    {
        let request = self.publish_request(channel, message, store_in_history)?;
        let on_ack = self.adapt::<A, _>("publish", on_ack);
        Ok(self.transport.publish(&request, on_ack, on_error(on_err)))
    }

    /// Publish and resolve the acknowledgment for the type tag of `T`.
    pub fn publish_resolved<T, M>(
        &self,
        channel: &str,
        message: &M,
        store_in_history: bool,
        on_ack: impl Fn(Resolved) + Send + Sync + 'static,
        on_err: impl Fn(ClientError) + Send + Sync + 'static,
    ) -> Result<bool>
    where
        T: ?Sized + 'static,
        M: Serialize + ?Sized,
    {
        let request = self.publish_request(channel, message, store_in_history)?;
        let on_ack = self.resolver::<T>("publish", on_ack);
        Ok(self.transport.publish(&request, on_ack, on_error(on_err)))
    }

    pub fn detailed_history<T: FromEnvelope>(
        &self,
        request: &HistoryRequest,
        on_result: impl Fn(T) + Send + Sync + 'static,
        on_err: impl Fn(ClientError) + Send + Sync + 'static,
    ) -> bool {
        let on_result = self.adapt::<T, _>("detailed_history", on_result);
        self.transport
            .detailed_history(request, on_result, on_error(on_err))
    }

    pub fn here_now<T: FromEnvelope>(
        &self,
        request: &HereNowRequest,
        on_result: impl Fn(T) + Send + Sync + 'static,
        on_err: impl Fn(ClientError) + Send + Sync + 'static,
    ) -> bool {
        let on_result = self.adapt::<T, _>("here_now", on_result);
        self.transport
            .here_now(request, on_result, on_error(on_err))
    }

    pub fn global_here_now<T: FromEnvelope>(
        &self,
        show_uuid_list: bool,
        include_user_state: bool,
        on_result: impl Fn(T) + Send + Sync + 'static,
        on_err: impl Fn(ClientError) + Send + Sync + 'static,
    ) -> bool {
        let on_result = self.adapt::<T, _>("global_here_now", on_result);
        self.transport.global_here_now(
            show_uuid_list,
            include_user_state,
            on_result,
            on_error(on_err),
        )
    }

    pub fn where_now<T: FromEnvelope>(
        &self,
        uuid: &str,
        on_result: impl Fn(T) + Send + Sync + 'static,
        on_err: impl Fn(ClientError) + Send + Sync + 'static,
    ) {
        let on_result = self.adapt::<T, _>("where_now", on_result);
        self.transport.where_now(uuid, on_result, on_error(on_err));
    }

    pub fn time<T: FromEnvelope>(
        &self,
        on_result: impl Fn(T) + Send + Sync + 'static,
        on_err: impl Fn(ClientError) + Send + Sync + 'static,
    ) -> bool {
        let on_result = self.adapt::<T, _>("time", on_result);
        self.transport.time(on_result, on_error(on_err))
    }

    /// Grant access on a channel or channel group. Use [`GrantAck`](crate::GrantAck) for `T`.
    pub fn grant_access<T: FromEnvelope>(
        &self,
        request: &GrantRequest,
        on_result: impl Fn(T) + Send + Sync + 'static,
        on_err: impl Fn(ClientError) + Send + Sync + 'static,
    ) -> bool {
        tracing::debug!(
            target_name = request.target.name(),
            presence = request.presence,
            "grant access"
        );
        let on_result = self.adapt::<T, _>("grant_access", on_result);
        self.transport
            .grant_access(request, on_result, on_error(on_err))
    }

    pub fn audit_access<T: FromEnvelope>(
        &self,
        request: &AuditRequest,
        on_result: impl Fn(T) + Send + Sync + 'static,
        on_err: impl Fn(ClientError) + Send + Sync + 'static,
    ) {
        let on_result = self.adapt::<T, _>("audit_access", on_result);
        self.transport
            .audit_access(request, on_result, on_error(on_err));
    }

    pub fn set_user_state<T: FromEnvelope>(
        &self,
        request: &SetUserStateRequest,
        on_result: impl Fn(T) + Send + Sync + 'static,
        on_err: impl Fn(ClientError) + Send + Sync + 'static,
    ) {
        let on_result = self.adapt::<T, _>("set_user_state", on_result);
        self.transport
            .set_user_state(request, on_result, on_error(on_err));
    }

    pub fn get_user_state<T: FromEnvelope>(
        &self,
        request: &UserStateRequest,
        on_result: impl Fn(T) + Send + Sync + 'static,
        on_err: impl Fn(ClientError) + Send + Sync + 'static,
    ) {
        let on_result = self.adapt::<T, _>("get_user_state", on_result);
        self.transport
            .get_user_state(request, on_result, on_error(on_err));
    }

    /// Register, unregister or list push-notification channels for a device.
    pub fn push<T: FromEnvelope>(
        &self,
        request: &PushRequest,
        on_result: impl Fn(T) + Send + Sync + 'static,
        on_err: impl Fn(ClientError) + Send + Sync + 'static,
    ) {
        let on_result = self.adapt::<T, _>("push", on_result);
        self.transport.push(request, on_result, on_error(on_err));
    }

    /// Forward a channel-group management request.
    pub fn channel_group<T: FromEnvelope>(
        &self,
        request: &ChannelGroupRequest,
        on_result: impl Fn(T) + Send + Sync + 'static,
        on_err: impl Fn(ClientError) + Send + Sync + 'static,
    ) {
        let on_result = self.adapt::<T, _>("channel_group", on_result);
        self.transport
            .channel_group(request, on_result, on_error(on_err));
    }

    // -- session --

    pub fn terminate_current_subscriber_request(&self) {
        self.transport.terminate_current_subscriber_request();
    }

    pub fn end_pending_requests(&self) {
        self.transport.end_pending_requests();
    }

    pub fn change_uuid(&self, uuid: &str) {
        self.transport.change_uuid(uuid);
    }

    pub fn generate_guid(&self) -> Uuid {
        Uuid::new_v4()
    }

    pub fn settings(&self) -> SessionSettings {
        self.transport.settings()
    }

    /// Modify the transport's session settings. Invalid results are not applied.
    pub fn update_settings(&self, update: impl FnOnce(&mut SessionSettings)) -> Result<()> {
        let mut settings = self.transport.settings();
        update(&mut settings);
        settings.validate()?;
        self.transport.apply_settings(&settings);
        Ok(())
    }
}

/// Collects typed callbacks for one subscribe-style call.
///
/// Callbacks left unset are replaced by adapters that accept and drop
/// whatever the transport delivers.
#[must_use = "callbacks are only registered by a finishing call such as `subscribe`"]
pub struct SubscribeBuilder<'a, E, S> {
    client: &'a Client<E, S>,
    message: Option<RawCallback>,
    connect: Option<RawCallback>,
    presence: Option<RawCallback>,
    disconnect: Option<RawCallback>,
    wildcard_presence: Option<RawCallback>,
    on_error: Option<ErrorCallback>,
}

impl<E, S> SubscribeBuilder<'_, E, S>
where
    E: Transport,
    S: JsonPluggable + 'static,
{
    pub fn message<M: FromEnvelope>(
        mut self,
        callback: impl Fn(M) + Send + Sync + 'static,
    ) -> Self {
        self.message = Some(self.client.adapt::<M, _>("message", callback));
        self
    }

    pub fn connect<C: FromEnvelope>(
        mut self,
        callback: impl Fn(C) + Send + Sync + 'static,
    ) -> Self {
        self.connect = Some(self.client.adapt::<C, _>("connect", callback));
        self
    }

    pub fn presence<P: FromEnvelope>(
        mut self,
        callback: impl Fn(P) + Send + Sync + 'static,
    ) -> Self {
        self.presence = Some(self.client.adapt::<P, _>("presence", callback));
        self
    }

    pub fn disconnect<D: FromEnvelope>(
        mut self,
        callback: impl Fn(D) + Send + Sync + 'static,
    ) -> Self {
        self.disconnect = Some(self.client.adapt::<D, _>("disconnect", callback));
        self
    }

    pub fn wildcard_presence<W: FromEnvelope>(
        mut self,
        callback: impl Fn(W) + Send + Sync + 'static,
    ) -> Self {
        self.wildcard_presence = Some(self.client.adapt::<W, _>("wildcard_presence", callback));
        self
    }

    /// Message callback resolved through the client's [`DispatchTable`] for
    /// the type tag of `T`.
    pub fn message_resolved<T: ?Sized + 'static>(
        mut self,
        callback: impl Fn(Resolved) + Send + Sync + 'static,
    ) -> Self {
        self.message = Some(self.client.resolver::<T>("message", callback));
        self
    }

    pub fn connect_resolved<T: ?Sized + 'static>(
        mut self,
        callback: impl Fn(Resolved) + Send + Sync + 'static,
    ) -> Self {
        self.connect = Some(self.client.resolver::<T>("connect", callback));
        self
    }

    pub fn presence_resolved<T: ?Sized + 'static>(
        mut self,
        callback: impl Fn(Resolved) + Send + Sync + 'static,
    ) -> Self {
        self.presence = Some(self.client.resolver::<T>("presence", callback));
        self
    }

    pub fn disconnect_resolved<T: ?Sized + 'static>(
        mut self,
        callback: impl Fn(Resolved) + Send + Sync + 'static,
    ) -> Self {
        self.disconnect = Some(self.client.resolver::<T>("disconnect", callback));
        self
    }

    pub fn error(mut self, callback: impl Fn(ClientError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(on_error(callback));
        self
    }

    fn split(self) -> (RawSubscribeCallbacks, ErrorCallback) {
        let callbacks = RawSubscribeCallbacks {
            message: self.message.unwrap_or_else(|| ignore("message")),
            connect: self.connect.unwrap_or_else(|| ignore("connect")),
            presence: self.presence,
            disconnect: self.disconnect,
            wildcard_presence: self.wildcard_presence,
        };
        let on_error = self.on_error.unwrap_or_else(|| {
            Arc::new(|err: ClientError| tracing::warn!(%err, "unhandled client error"))
        });
        (callbacks, on_error)
    }

    pub fn subscribe(self, request: &SubscribeRequest) {
        let transport = Arc::clone(&self.client.transport);
        let (callbacks, on_error) = self.split();
        tracing::debug!(
            channel = %request.channel,
            channel_group = %request.channel_group,
            "subscribe"
        );
        transport.subscribe(request, callbacks, on_error);
    }

    /// Subscribe to presence events. Presence events arrive on the `presence`
    /// callback; the transport sees it in the message slot.
    pub fn presence_subscribe(self, request: &SubscribeRequest) {
        let transport = Arc::clone(&self.client.transport);
        let (mut callbacks, on_error) = self.split();
        if let Some(presence) = callbacks.presence.take() {
            callbacks.message = presence;
        }
        tracing::debug!(
            channel = %request.channel,
            channel_group = %request.channel_group,
            "presence"
        );
        transport.presence(request, callbacks, on_error);
    }

    pub fn unsubscribe(self, request: &SubscribeRequest) {
        let transport = Arc::clone(&self.client.transport);
        let (callbacks, on_error) = self.split();
        tracing::debug!(
            channel = %request.channel,
            channel_group = %request.channel_group,
            "unsubscribe"
        );
        transport.unsubscribe(request, callbacks, on_error);
    }

    pub fn presence_unsubscribe(self, request: &SubscribeRequest) {
        let transport = Arc::clone(&self.client.transport);
        let (mut callbacks, on_error) = self.split();
        if let Some(presence) = callbacks.presence.take() {
            callbacks.message = presence;
        }
        tracing::debug!(
            channel = %request.channel,
            channel_group = %request.channel_group,
            "presence unsubscribe"
        );
        transport.presence_unsubscribe(request, callbacks, on_error);
    }
}
