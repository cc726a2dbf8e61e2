use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use pubnub_typed::{
    AccessTarget, AuditRequest, ChannelGroupOperation, ChannelGroupRequest, Client, ClientConfig,
    ClientError, ConnectOrDisconnectAck, DispatchTable, Envelope, Error, ErrorCallback, GrantAck,
    GrantRequest, HereNowRequest, HistoryRequest, JoinOrLeaveAck, JsonPluggable, PublishAck,
    PublishRequest, PushOperation, PushRequest, PushType, RawCallback, RawSubscribeCallbacks,
    Resolved, ResultKind, SerdeJson, SerializerError, SessionSettings, SetUserStateRequest,
    SubscribeRequest, Transport, TypeTag, TypedEvent, UserState, UserStateRequest, resolve,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::mpsc::{self, UnboundedReceiver};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

/// Lock a mutex, recovering the data if another test thread panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct UserCreated {
    id: u32,
    name: String,
}

/// Callbacks one facade call handed to the transport.
#[derive(Clone)]
struct Registration {
    operation: &'static str,
    callbacks: Option<RawSubscribeCallbacks>,
    on_result: Option<RawCallback>,
    on_error: ErrorCallback,
}

impl Registration {
    /// # Panics
    /// Panics on a subscribe-style registration.
    #[allow(clippy::expect_used)]
    fn deliver(&self, payload: Value) -> pubnub_typed::Result<()> {
        let on_result = self.on_result.as_ref().expect("not a single-result registration");
        on_result(payload)
    }

    /// # Panics
    /// Panics on a single-result registration.
    #[allow(clippy::expect_used)]
    fn message(&self, payload: Value) -> pubnub_typed::Result<()> {
        let callbacks = self.callbacks.as_ref().expect("not a subscribe registration");
        (callbacks.message)(payload)
    }

    /// # Panics
    /// Panics on a single-result registration.
    #[allow(clippy::expect_used)]
    fn connect(&self, payload: Value) -> pubnub_typed::Result<()> {
        let callbacks = self.callbacks.as_ref().expect("not a subscribe registration");
        (callbacks.connect)(payload)
    }

    fn fail(&self, error: ClientError) {
        (self.on_error)(error)
    }
}

/// Transport engine stand-in that records what it was given.
#[derive(Default)]
struct MockTransport {
    registrations: Mutex<Vec<Registration>>,
    publishes: Mutex<Vec<PublishRequest>>,
    settings: Mutex<SessionSettings>,
    uuid: Mutex<Option<String>>,
    terminations: AtomicUsize,
}

impl MockTransport {
    fn record_subscribe(
        &self,
        operation: &'static str,
        callbacks: RawSubscribeCallbacks,
        on_error: ErrorCallback,
    ) {
        lock(&self.registrations).push(Registration {
            operation,
            callbacks: Some(callbacks),
            on_result: None,
            on_error,
        });
    }

    fn record(&self, operation: &'static str, on_result: RawCallback, on_error: ErrorCallback) {
        lock(&self.registrations).push(Registration {
            operation,
            callbacks: None,
            on_result: Some(on_result),
            on_error,
        });
    }

    /// Most recent registration for `operation`.
    fn last(&self, operation: &str) -> Option<Registration> {
        lock(&self.registrations)
            .iter()
            .rev()
            .find(|r| r.operation == operation)
            .cloned()
    }
}

impl Transport for MockTransport {
    fn subscribe(
        &self,
        _: &SubscribeRequest,
        callbacks: RawSubscribeCallbacks,
        on_error: ErrorCallback,
    ) {
        self.record_subscribe("subscribe", callbacks, on_error);
    }

    fn presence(
        &self,
        _: &SubscribeRequest,
        callbacks: RawSubscribeCallbacks,
        on_error: ErrorCallback,
    ) {
        self.record_subscribe("presence", callbacks, on_error);
    }

    fn unsubscribe(
        &self,
        _: &SubscribeRequest,
        callbacks: RawSubscribeCallbacks,
        on_error: ErrorCallback,
    ) {
        self.record_subscribe("unsubscribe", callbacks, on_error);
    }

    fn presence_unsubscribe(
        &self,
        _: &SubscribeRequest,
        callbacks: RawSubscribeCallbacks,
        on_error: ErrorCallback,
    ) {
        self.record_subscribe("presence_unsubscribe", callbacks, on_error);
    }

    fn publish(
        &self,
        request: &PublishRequest,
        on_result: RawCallback,
        on_error: ErrorCallback,
    ) -> bool {
        lock(&self.publishes).push(request.clone());
        self.record("publish", on_result, on_error);
        true
    }

    fn detailed_history(
        &self,
        _: &HistoryRequest,
        on_result: RawCallback,
        on_error: ErrorCallback,
    ) -> bool {
        self.record("detailed_history", on_result, on_error);
        true
    }

    fn here_now(
        &self,
        _: &HereNowRequest,
        on_result: RawCallback,
        on_error: ErrorCallback,
    ) -> bool {
        self.record("here_now", on_result, on_error);
        true
    }

    fn global_here_now(
        &self,
        _: bool,
        _: bool,
        on_result: RawCallback,
        on_error: ErrorCallback,
    ) -> bool {
        self.record("global_here_now", on_result, on_error);
        true
    }

    fn where_now(&self, _: &str, on_result: RawCallback, on_error: ErrorCallback) {
        self.record("where_now", on_result, on_error);
    }

    fn time(&self, on_result: RawCallback, on_error: ErrorCallback) -> bool {
        self.record("time", on_result, on_error);
        true
    }

    fn grant_access(
        &self,
        _: &GrantRequest,
        on_result: RawCallback,
        on_error: ErrorCallback,
    ) -> bool {
        self.record("grant_access", on_result, on_error);
        true
    }

    fn audit_access(&self, _: &AuditRequest, on_result: RawCallback, on_error: ErrorCallback) {
        self.record("audit_access", on_result, on_error);
    }

    fn set_user_state(
        &self,
        _: &SetUserStateRequest,
        on_result: RawCallback,
        on_error: ErrorCallback,
    ) {
        self.record("set_user_state", on_result, on_error);
    }

    fn get_user_state(
        &self,
        _: &UserStateRequest,
        on_result: RawCallback,
        on_error: ErrorCallback,
    ) {
        self.record("get_user_state", on_result, on_error);
    }

    fn push(&self, _: &PushRequest, on_result: RawCallback, on_error: ErrorCallback) {
        self.record("push", on_result, on_error);
    }

    fn channel_group(
        &self,
        _: &ChannelGroupRequest,
        on_result: RawCallback,
        on_error: ErrorCallback,
    ) {
        self.record("channel_group", on_result, on_error);
    }

    fn terminate_current_subscriber_request(&self) {
        self.terminations.fetch_add(1, Ordering::SeqCst);
    }

    fn end_pending_requests(&self) {
        self.terminations.fetch_add(1, Ordering::SeqCst);
    }

    fn change_uuid(&self, uuid: &str) {
        *lock(&self.uuid) = Some(uuid.to_string());
    }

    fn settings(&self) -> SessionSettings {
        lock(&self.settings).clone()
    }

    fn apply_settings(&self, settings: &SessionSettings) {
        *lock(&self.settings) = settings.clone();
    }
}

fn client() -> (Arc<MockTransport>, Client<MockTransport>) {
    init_tracing();
    let transport = Arc::new(MockTransport::default());
    (Arc::clone(&transport), Client::new(transport))
}

/// Typed callback that forwards into a channel.
fn sink<T: Send + 'static>() -> (impl Fn(T) + Send + Sync + 'static, UnboundedReceiver<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        move |value: T| {
            let _ = tx.send(value);
        },
        rx,
    )
}

#[allow(clippy::panic)]
fn no_errors(err: ClientError) {
    panic!("unexpected client error: {err}");
}

// ---------------------------------------------------------------------------
// Subscribe
// ---------------------------------------------------------------------------

#[tokio::test]
async fn subscribe_delivers_typed_message_and_connect() {
    let (transport, client) = client();
    let (on_message, mut messages) = sink::<TypedEvent<UserCreated>>();
    let (on_connect, mut connects) = sink::<ConnectOrDisconnectAck>();

    let request = SubscribeRequest::channel("users");
    client.subscribe(&request, on_message, on_connect, no_errors);
    let reg = transport.last("subscribe").unwrap();

    reg.connect(json!(["1", "Connected", "users"])).unwrap();
    let payload = json!([{"id": 7, "name": "Ada"}, "14630000000000000", "users"]);
    reg.message(payload).unwrap();

    let ack = connects.recv().await.unwrap();
    assert_eq!(ack.status_code, 1);
    assert_eq!(ack.status_message, "Connected");
    assert_eq!(ack.channel_name, "users");
    assert!(ack.result_type.is::<ConnectOrDisconnectAck>());

    let event = messages.recv().await.unwrap();
    let expected = UserCreated {
        id: 7,
        name: "Ada".into(),
    };
    assert_eq!(event.payload, expected);
    assert_eq!(event.channel_name, "users");
    assert_eq!(event.occurred_at.timestamp_millis(), 1_463_000_000_000);
}

#[tokio::test]
async fn wildcard_message_takes_channel_from_fourth_element() {
    let (transport, client) = client();
    let (on_message, mut messages) = sink::<TypedEvent<Value>>();

    let request = SubscribeRequest::channel("news.*");
    client.subscribe(&request, on_message, |_: Value| {}, no_errors);
    let payload = json!(["hi", "14630000000000000", "news.*", "news.sports"]);
    let reg = transport.last("subscribe").unwrap();
    reg.message(payload).unwrap();

    let event = messages.recv().await.unwrap();
    assert_eq!(event.payload, json!("hi"));
    assert_eq!(event.channel_name, "news.sports");
}

#[tokio::test]
async fn message_order_is_preserved() {
    let (transport, client) = client();
    let (on_message, mut messages) = sink::<TypedEvent<u32>>();

    let request = SubscribeRequest::channel("seq");
    client.subscribe(&request, on_message, |_: Value| {}, no_errors);
    let reg = transport.last("subscribe").unwrap();
    for i in 0..100u32 {
        reg.message(json!([i, "14630000000000000", "seq"])).unwrap();
    }

    for expected in 0..100u32 {
        assert_eq!(messages.recv().await.unwrap().payload, expected);
    }
}

#[tokio::test]
async fn subscribe_with_presence_routes_presence_events() {
    let (transport, client) = client();
    let (on_presence, mut presence) = sink::<JoinOrLeaveAck>();

    client.subscribe_with_presence(
        &SubscribeRequest::channel("room"),
        |_: TypedEvent<Value>| {},
        on_presence,
        |_: ConnectOrDisconnectAck| {},
        no_errors,
    );
    let reg = transport.last("subscribe").unwrap();
    let callbacks = reg.callbacks.clone().unwrap();
    let on_presence_raw = callbacks.presence.unwrap();
    let event = json!({"uuid": "u1", "action": "join", "occupancy": 2});
    on_presence_raw(json!([event, "1463000000000000", "room"])).unwrap();

    let ack = presence.recv().await.unwrap();
    assert_eq!(ack.who, "u1");
    assert!(ack.is_join());
    assert_eq!(ack.occupancy, 2);
    assert_eq!(ack.channel_name, "room");
}

#[tokio::test]
async fn presence_channel_position_depends_on_length() {
    let (transport, client) = client();
    let (on_presence, mut presence) = sink::<JoinOrLeaveAck>();

    let request = SubscribeRequest::channel("sub_ch");
    client.presence(&request, on_presence, |_: Value| {}, no_errors);
    let reg = transport.last("presence").unwrap();

    let join = json!({"uuid": "u1", "action": "join", "occupancy": 2});
    let leave = json!({"uuid": "u1", "action": "leave", "occupancy": 1});
    reg.message(json!([join, "1463000000000000", "sub_ch", "real_ch"])).unwrap();
    reg.message(json!([leave, "1463000000000000", "sub_ch"])).unwrap();

    let joined = presence.recv().await.unwrap();
    assert_eq!(joined.channel_name, "real_ch");
    assert_eq!(joined.status, "join");
    assert_eq!(joined.happened_at.timestamp_millis(), 146_300_000_000);

    let left = presence.recv().await.unwrap();
    assert_eq!(left.channel_name, "sub_ch");
    assert!(left.is_leave());
    assert_eq!(left.occupancy, 1);
}

#[tokio::test]
async fn unsubscribe_registers_disconnect_callback() {
    let (transport, client) = client();
    let (on_disconnect, mut disconnects) = sink::<ConnectOrDisconnectAck>();

    client.unsubscribe(
        &SubscribeRequest::channel("users"),
        |_: TypedEvent<Value>| {},
        |_: ConnectOrDisconnectAck| {},
        on_disconnect,
        no_errors,
    );
    let callbacks = transport.last("unsubscribe").unwrap().callbacks.unwrap();
    let disconnect = callbacks.disconnect.unwrap();
    disconnect(json!(["1", "Unsubscribed from users", "users"])).unwrap();

    let ack = disconnects.recv().await.unwrap();
    assert_eq!(ack.status_message, "Unsubscribed from users");
}

#[tokio::test]
async fn presence_unsubscribe_puts_presence_in_message_slot() {
    let (transport, client) = client();
    let (on_presence, mut presence) = sink::<JoinOrLeaveAck>();

    client.presence_unsubscribe(
        &SubscribeRequest::channel("room"),
        on_presence,
        |_: ConnectOrDisconnectAck| {},
        |_: ConnectOrDisconnectAck| {},
        no_errors,
    );
    let reg = transport.last("presence_unsubscribe").unwrap();
    assert!(reg.callbacks.as_ref().unwrap().presence.is_none());
    let event = json!({"uuid": "u9", "action": "timeout", "occupancy": 0});
    reg.message(json!([event, "0", "room"])).unwrap();

    let ack = presence.recv().await.unwrap();
    assert_eq!(ack.who, "u9");
    assert_eq!(ack.status, "timeout");
}

#[tokio::test]
async fn builder_leaves_unset_callbacks_as_noops() {
    let (transport, client) = client();
    let (on_message, mut messages) = sink::<TypedEvent<String>>();

    client
        .callbacks()
        .message::<TypedEvent<String>>(on_message)
        .subscribe(&SubscribeRequest::group("cg1"));
    let reg = transport.last("subscribe").unwrap();

    // Anything goes through the default connect adapter, even a non-envelope.
    reg.connect(Value::Null).unwrap();
    reg.fail(ClientError {
        status_code: 500,
        ..Default::default()
    });

    reg.message(json!(["hello", "0", "ch"])).unwrap();
    assert_eq!(messages.recv().await.unwrap().payload, "hello");
}

#[tokio::test]
async fn subscribe_raw_passes_payload_through() {
    let (transport, client) = client();
    let (on_message, mut messages) = sink::<Value>();

    let request = SubscribeRequest::channel("raw");
    client.subscribe_raw(&request, on_message, |_| {}, no_errors);
    let payload = json!([[1, 2], "x"]);
    let reg = transport.last("subscribe").unwrap();
    reg.message(payload.clone()).unwrap();

    assert_eq!(messages.recv().await.unwrap(), payload);
}

// ---------------------------------------------------------------------------
// Single-result operations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn publish_serializes_message_and_reads_channel_from_index_three() {
    let (transport, client) = client();
    let (on_ack, mut acks) = sink::<PublishAck>();

    let user = UserCreated {
        id: 1,
        name: "Ada".into(),
    };
    let accepted = client.publish("hello_channel", &user, false, on_ack, no_errors);
    assert!(accepted.unwrap());

    let sent = lock(&transport.publishes).pop().unwrap();
    assert_eq!(sent.channel, "hello_channel");
    assert_eq!(sent.message, json!({"id": 1, "name": "Ada"}));
    assert!(!sent.store_in_history);

    let reg = transport.last("publish").unwrap();
    reg.deliver(json!(["1", "Sent", "14578941", "hello_channel"])).unwrap();

    let ack = acks.recv().await.unwrap();
    assert_eq!(ack.status_code, 1);
    assert_eq!(ack.status_message, "Sent");
    assert_eq!(ack.channel_name, "hello_channel");
    assert!(ack.is_success());
}

#[tokio::test]
async fn grant_with_non_numeric_status_still_delivers() {
    let (transport, client) = client();
    let (on_grant, mut grants) = sink::<GrantAck>();

    let target = AccessTarget::Channel("ch".into());
    let request = GrantRequest::new(target, true, true).ttl(5);
    assert!(client.grant_access(&request, on_grant, no_errors));

    let status = json!({"status": "error", "message": "Forbidden"});
    let reg = transport.last("grant_access").unwrap();
    reg.deliver(json!([status, "ch", ""])).unwrap();

    let ack = grants.recv().await.unwrap();
    assert_eq!(ack.status_code, 0);
    assert_eq!(ack.status_message, "Forbidden");
    assert_eq!(ack.channel_name, "ch");
    assert!(!ack.is_success());
}

#[tokio::test]
async fn grant_success_uses_status_200() {
    let (transport, client) = client();
    let (on_grant, mut grants) = sink::<GrantAck>();

    let target = AccessTarget::ChannelGroup("cg1".into());
    let request = GrantRequest::new(target, true, false);
    client.grant_access(&request, on_grant, no_errors);

    let status = json!({"status": 200, "message": "Success", "service": "Access Manager"});
    let reg = transport.last("grant_access").unwrap();
    reg.deliver(json!([status, "cg1", ""])).unwrap();

    let ack = grants.recv().await.unwrap();
    assert_eq!(ack.status_code, 200);
    assert!(ack.is_success());
}

#[tokio::test]
async fn operations_without_a_builder_receive_raw_payloads() {
    let (transport, client) = client();
    let (on_history, mut history) = sink::<Value>();
    let (on_time, mut times) = sink::<Envelope>();

    let request = HistoryRequest::new("ch").count(10);
    client.detailed_history(&request, on_history, no_errors);
    client.time(on_time, no_errors);

    let page = json!([["a", "b"], 1, 2, "ch"]);
    let reg = transport.last("detailed_history").unwrap();
    reg.deliver(page.clone()).unwrap();
    let reg = transport.last("time").unwrap();
    reg.deliver(json!([14630000000000000i64])).unwrap();

    assert_eq!(history.recv().await.unwrap(), page);
    assert_eq!(times.recv().await.unwrap().len(), 1);
}

#[tokio::test]
async fn every_operation_reaches_the_transport() {
    let (transport, client) = client();

    let audit = AuditRequest::new(AccessTarget::Channel(String::new()));
    client.here_now(&HereNowRequest::new("ch"), |_: Value| {}, no_errors);
    client.global_here_now(true, false, |_: Value| {}, no_errors);
    client.where_now("u1", |_: Value| {}, no_errors);
    client.audit_access(&audit, |_: Value| {}, no_errors);
    client.get_user_state(&UserStateRequest::default(), |_: Value| {}, no_errors);
    client.set_user_state(
        &SetUserStateRequest {
            target: UserStateRequest::default(),
            state: UserState::KeyValue("mood".into(), json!("happy")),
        },
        |_: Value| {},
        no_errors,
    );
    client.push(
        &PushRequest {
            operation: PushOperation::RegisterDevice,
            channel: "ch".into(),
            push_type: PushType::Gcm,
            push_token: "token".into(),
        },
        |_: Value| {},
        no_errors,
    );
    client.channel_group(
        &ChannelGroupRequest::new(ChannelGroupOperation::ListGroups),
        |_: Value| {},
        no_errors,
    );
    client.terminate_current_subscriber_request();
    client.end_pending_requests();

    let operations: Vec<&str> = lock(&transport.registrations)
        .iter()
        .map(|r| r.operation)
        .collect();
    assert_eq!(
        operations,
        vec![
            "here_now",
            "global_here_now",
            "where_now",
            "audit_access",
            "get_user_state",
            "set_user_state",
            "push",
            "channel_group",
        ]
    );
    assert_eq!(transport.terminations.load(Ordering::SeqCst), 2);
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_envelopes_are_rejected_at_the_adapter() {
    let (transport, client) = client();
    let (on_ack, mut acks) = sink::<ConnectOrDisconnectAck>();
    let (on_err, mut errors) = sink::<ClientError>();

    let request = SubscribeRequest::channel("ch");
    client.subscribe(&request, |_: TypedEvent<Value>| {}, on_ack, on_err);
    let reg = transport.last("subscribe").unwrap();

    assert!(matches!(reg.connect(Value::Null), Err(Error::NullEnvelope)));
    assert!(matches!(reg.connect(json!({"status": 1})), Err(Error::NotAList(_))));
    assert!(matches!(
        reg.connect(json!(["1", "Connected"])),
        Err(Error::TooShort { len: 2, min: 3 })
    ));
    assert!(reg.connect(json!("1")).unwrap_err().is_contract_violation());

    assert!(acks.try_recv().is_err());
    assert!(errors.try_recv().is_err());
}

#[tokio::test]
async fn presence_without_event_map_is_a_contract_violation() {
    let (transport, client) = client();
    let (on_presence, mut presence) = sink::<JoinOrLeaveAck>();

    let request = SubscribeRequest::channel("room");
    client.presence(&request, on_presence, |_: Value| {}, no_errors);
    let reg = transport.last("presence").unwrap();
    let err = reg.message(json!(["not a map", "0", "room"])).unwrap_err();

    assert!(matches!(err, Error::NotAMap { index: 0 }));
    assert!(presence.try_recv().is_err());
}

#[tokio::test]
async fn payload_type_mismatch_is_a_serializer_error() {
    let (transport, client) = client();
    let (on_message, mut messages) = sink::<TypedEvent<UserCreated>>();

    let request = SubscribeRequest::channel("users");
    client.subscribe(&request, on_message, |_: Value| {}, no_errors);
    let reg = transport.last("subscribe").unwrap();
    let err = reg.message(json!(["just text", "0", "users"])).unwrap_err();

    assert!(matches!(err, Error::Serializer(_)));
    assert!(!err.is_contract_violation());
    assert!(messages.try_recv().is_err());
}

#[tokio::test]
async fn service_errors_pass_through_unchanged() {
    let (transport, client) = client();
    let (on_err, mut errors) = sink::<ClientError>();

    let accepted = client.publish("ch", &json!("hi"), true, |_: PublishAck| {}, on_err);
    assert!(accepted.unwrap());
    let error = ClientError {
        status_code: 403,
        message: "Forbidden".into(),
        channel: "ch".into(),
        channel_group: String::new(),
        description: "publish denied".into(),
    };
    transport.last("publish").unwrap().fail(error.clone());

    assert_eq!(errors.recv().await.unwrap(), error);
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[allow(dead_code)] // only named as a type tag
struct Receipt;

#[allow(dead_code)] // only named as a type tag
struct Unregistered;

#[test]
fn unknown_type_tag_returns_envelope_unchanged() {
    let envelope = Envelope::try_from_value(json!(["x", {"nested": [1, 2]}, null, 4])).unwrap();
    let tag = TypeTag::of::<Unregistered>();
    let resolved = resolve(tag, envelope.clone(), &SerdeJson).unwrap();
    assert_eq!(resolved, Resolved::Raw(envelope));
}

#[test]
fn resolve_stamps_requested_type() {
    let envelope = Envelope::try_from_value(json!(["1", "Success", "hello_channel"])).unwrap();
    match resolve(TypeTag::of::<PublishAck>(), envelope, &SerdeJson).unwrap() {
        // Three elements: the publish rule reads index 3, which is absent.
        Resolved::Publish(ack) => {
            assert_eq!(ack.channel_name, "");
            assert_eq!(ack.result_type, TypeTag::of::<PublishAck>());
        }
        other => panic!("expected Publish, got {other:?}"),
    }
}

#[tokio::test]
async fn custom_registered_tag_is_delivered_through_the_client() {
    let (transport, client) = client();
    let table = DispatchTable::new()
        .with(TypeTag::of::<Receipt>(), ResultKind::ConnectOrDisconnect);
    let client = client.with_dispatch(table);
    let (on_connect, mut connects) = sink::<Resolved>();
    let (on_message, mut messages) = sink::<Resolved>();

    client
        .callbacks()
        .connect_resolved::<Receipt>(on_connect)
        .message_resolved::<Unregistered>(on_message)
        .subscribe(&SubscribeRequest::channel("orders"));
    let reg = transport.last("subscribe").unwrap();
    reg.connect(json!(["1", "Connected", "orders"])).unwrap();
    let payload = json!(["x", "0"]);
    reg.message(payload.clone()).unwrap();

    match connects.recv().await.unwrap() {
        Resolved::ConnectOrDisconnect(ack) => {
            assert!(ack.result_type.is::<Receipt>());
            assert_eq!(ack.status_message, "Connected");
            assert_eq!(ack.channel_name, "orders");
        }
        other => panic!("expected ConnectOrDisconnect, got {other:?}"),
    }
    let expected = Envelope::try_from_value(payload).unwrap();
    assert_eq!(messages.recv().await.unwrap(), Resolved::Raw(expected));

    let kind = client.dispatch().kind_of(&TypeTag::of::<Receipt>());
    assert_eq!(kind, Some(ResultKind::ConnectOrDisconnect));
}

#[tokio::test]
async fn resolved_callbacks_default_to_the_standard_table() {
    let (transport, client) = client();
    let (on_ack, mut acks) = sink::<Resolved>();

    let accepted = client.publish_resolved::<PublishAck, _>("ch", "hi", true, on_ack, no_errors);
    assert!(accepted.unwrap());
    let reg = transport.last("publish").unwrap();
    reg.deliver(json!(["1", "Sent", "14578941", "ch"])).unwrap();
    // Registered tags still reject malformed envelopes.
    assert!(matches!(
        reg.deliver(json!(["1"])),
        Err(Error::TooShort { len: 1, min: 3 })
    ));

    match acks.recv().await.unwrap() {
        Resolved::Publish(ack) => {
            assert_eq!(ack.channel_name, "ch");
            assert!(ack.result_type.is::<PublishAck>());
        }
        other => panic!("expected Publish, got {other:?}"),
    }
    assert!(acks.try_recv().is_err());
    assert_eq!(client.dispatch().kind_of(&TypeTag::of::<Receipt>()), None);
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn adapters_are_safe_to_invoke_concurrently() {
    let (transport, client) = client();
    let (on_message, mut messages) = sink::<TypedEvent<UserCreated>>();
    let (on_ack, mut acks) = sink::<PublishAck>();

    let request = SubscribeRequest::channel("users");
    client.subscribe(&request, on_message, |_: Value| {}, no_errors);
    let accepted = client.publish("users", &json!({"id": 0}), true, on_ack, no_errors);
    assert!(accepted.unwrap());
    let subscribe = transport.last("subscribe").unwrap();
    let publish = transport.last("publish").unwrap();

    let mut tasks = Vec::new();
    for worker in 0..8u32 {
        let subscribe = subscribe.clone();
        let publish = publish.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..50u32 {
                let id = worker * 1000 + i;
                let payload = json!([{"id": id, "name": "n"}, "14630000000000000", "users"]);
                subscribe.message(payload).unwrap();
                if i % 10 == 0 {
                    publish.deliver(json!(["1", "Sent", "1", "users"])).unwrap();
                }
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let mut seen = Vec::new();
    for _ in 0..400 {
        let event = tokio::time::timeout(Duration::from_secs(5), messages.recv())
            .await
            .unwrap()
            .unwrap();
        seen.push(event.payload.id);
    }
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen.len(), 400);

    for _ in 0..40 {
        let ack = acks.recv().await.unwrap();
        assert_eq!(ack.channel_name, "users");
    }
}

// ---------------------------------------------------------------------------
// Serializer injection
// ---------------------------------------------------------------------------

/// Delegates to serde_json and counts calls.
#[derive(Default)]
struct CountingSerializer {
    serialized: AtomicUsize,
    deserialized: AtomicUsize,
}

impl JsonPluggable for CountingSerializer {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, SerializerError> {
        self.serialized.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::to_string(value)?)
    }

    fn deserialize<T: DeserializeOwned>(&self, text: &str) -> Result<T, SerializerError> {
        self.deserialized.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::from_str(text)?)
    }
}

#[tokio::test]
async fn injected_serializer_builds_payloads() {
    init_tracing();
    let transport = Arc::new(MockTransport::default());
    let serializer = CountingSerializer::default();
    let client = Client::with_serializer(Arc::clone(&transport), serializer);
    let (on_message, mut messages) = sink::<TypedEvent<UserCreated>>();

    let request = SubscribeRequest::channel("users");
    client.subscribe(&request, on_message, |_: Value| {}, no_errors);
    let payload = json!([{"id": 3, "name": "Bo"}, "0", "users"]);
    let reg = transport.last("subscribe").unwrap();
    reg.message(payload).unwrap();

    assert_eq!(messages.recv().await.unwrap().payload.name, "Bo");
    assert_eq!(client.serializer().serialized.load(Ordering::SeqCst), 1);
    assert_eq!(client.serializer().deserialized.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn from_config_applies_session_settings() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("client.yaml");
    let yaml = r#"publish_key: pub-c-1
subscribe_key: sub-c-1
session:
  session_uuid: client-42
  ssl: true
"#;
    tokio::fs::write(&path, yaml).await.unwrap();
    let config = pubnub_typed::config::load(&path).await.unwrap();

    let transport = Arc::new(MockTransport::default());
    let client = Client::from_config(Arc::clone(&transport), SerdeJson, &config).unwrap();

    assert!(client.settings().ssl);
    assert_eq!(lock(&transport.uuid).as_deref(), Some("client-42"));
}

#[test]
fn from_config_rejects_invalid_config() {
    let transport = Arc::new(MockTransport::default());
    let config = ClientConfig::new("pub", "");

    let result = Client::from_config(Arc::clone(&transport), SerdeJson, &config);
    assert!(matches!(result, Err(Error::Config(_))));
    assert!(lock(&transport.uuid).is_none());
}

#[test]
fn update_settings_validates_before_applying() {
    let (transport, client) = client();

    client
        .update_settings(|s| {
            s.presence_heartbeat_secs = 60;
            s.presence_heartbeat_interval_secs = 25;
        })
        .unwrap();
    assert_eq!(transport.settings().presence_heartbeat_secs, 60);

    let err = client
        .update_settings(|s| s.presence_heartbeat_interval_secs = 90)
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert_eq!(transport.settings().presence_heartbeat_interval_secs, 25);
}

#[test]
fn change_uuid_and_generate_guid() {
    let (transport, client) = client();
    let guid = client.generate_guid();
    client.change_uuid(&guid.to_string());
    assert_eq!(lock(&transport.uuid).clone(), Some(guid.to_string()));
    assert_ne!(client.generate_guid(), guid);
}
