//! User command server: answers the five command channels from a
//! [`UserStore`] and publishes domain events after successful mutations.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;

use crate::broker::{Broker, BrokerError, Message, Subscription};
use crate::contract::{
    Command, CommandError, CommandRequest, CommandResponse, DeleteResult, DeletedUser, ErrorCode,
    Event, EventKind, IdRequest, ListUsersRequest, UpdateUserRequest, decode, encode,
};
use crate::domain::{CreateUserInput, User, UserId};
use crate::store::{StoreError, UserStore};
use crate::validation::{ValidationError, parse_user_id, validate_create, validate_update};

/// Sent when a reply cannot be encoded.
const FALLBACK_REPLY: &[u8] =
    br#"{"ok":false,"error":{"code":"INTERNAL","message":"internal error"}}"#;

/// Serves the user commands.
///
/// Every delivery is handled on its own task. Handlers share only the store
/// and the broker.
#[derive(Debug, Clone)]
pub struct CommandServer {
    store: Arc<dyn UserStore>,
    broker: Arc<dyn Broker>,
}

/// Running subscription loops of a started [`CommandServer`].
#[derive(Debug)]
pub struct ServerHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// Stops accepting commands. Deliveries already being handled finish on
    /// their own tasks.
    pub fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
        tracing::info!("command server stopped");
    }
}

impl CommandServer {
    /// Creates a server over `store`, publishing events to `broker`.
    #[must_use]
    pub fn new(store: Arc<dyn UserStore>, broker: Arc<dyn Broker>) -> Self {
        Self { store, broker }
    }

    /// Subscribes to every command channel and starts serving.
    ///
    /// # Errors
    ///
    /// Returns a [`BrokerError`] if any subscription fails; loops already
    /// started are stopped.
    pub async fn start(self) -> Result<ServerHandle, BrokerError> {
        let server = Arc::new(self);
        let mut tasks: Vec<JoinHandle<()>> = Vec::with_capacity(Command::ALL.len());
        for command in Command::ALL {
            let subscription = match server.broker.subscribe(command.subject()).await {
                Ok(sub) => sub,
                Err(err) => {
                    for task in &tasks {
                        task.abort();
                    }
                    return Err(err);
                }
            };
            let serving = Arc::clone(&server).serve(command, subscription);
            tasks.push(tokio::spawn(serving));
            tracing::info!(channel = command.subject(), "serving command");
        }
        Ok(ServerHandle { tasks })
    }

    async fn serve(self: Arc<Self>, command: Command, mut subscription: Subscription) {
        while let Some(message) = subscription.next().await {
            let server = Arc::clone(&self);
            tokio::spawn(async move { server.handle(command, message).await });
        }
        tracing::debug!(channel = command.subject(), "command subscription ended");
    }

    /// Handles one delivery: reply first, then publish the event, if any.
    async fn handle(&self, command: Command, message: Message) {
        let (reply, event) = self.dispatch(command, &message.payload).await;

        if message.expects_reply()
            && let Err(err) = message.respond(reply)
        {
            tracing::warn!(channel = command.subject(), error = %err, "failed to deliver reply");
        }

        if let Some((kind, payload)) = event
            && let Err(err) = self.broker.publish(kind.subject(), payload).await
        {
            tracing::warn!(channel = kind.subject(), error = %err, "failed to publish event");
        }
    }

    async fn dispatch(
        &self,
        command: Command,
        payload: &[u8],
    ) -> (Bytes, Option<(EventKind, Bytes)>) {
        match command {
            Command::Create => match self.create(payload).await {
                Ok(user) => (success(&user), event(EventKind::Created, &user)),
                Err(err) => (failure(err), None),
            },
            Command::List => (respond(self.list(payload).await), None),
            Command::Get => (respond(self.get(payload).await), None),
            Command::Update => match self.update(payload).await {
                Ok(user) => (success(&user), event(EventKind::Updated, &user)),
                Err(err) => (failure(err), None),
            },
            Command::Delete => match self.delete(payload).await {
                Ok(user_id) => (
                    success(&DeleteResult::deleted()),
                    event(EventKind::Deleted, &DeletedUser { user_id }),
                ),
                Err(err) => (failure(err), None),
            },
        }
    }

    async fn create(&self, payload: &[u8]) -> Result<User, CommandError> {
        let request: CommandRequest<CreateUserInput> = decode_request(payload)?;
        validate_create(&request.data).map_err(rejected)?;
        let user = self
            .store
            .create(&request.data)
            .await
            .map_err(|e| store_failure(Command::Create, e))?;
        tracing::info!(user_id = %user.user_id, request_id = %request.request_id, "user created");
        Ok(user)
    }

    async fn list(&self, payload: &[u8]) -> Result<Vec<User>, CommandError> {
        let _: CommandRequest<Option<ListUsersRequest>> = decode_request(payload)?;
        self.store
            .list()
            .await
            .map_err(|e| store_failure(Command::List, e))
    }

    async fn get(&self, payload: &[u8]) -> Result<User, CommandError> {
        let request: CommandRequest<IdRequest> = decode_request(payload)?;
        let id = parse_user_id(&request.data.id).map_err(rejected)?;
        self.store
            .get_by_id(id)
            .await
            .map_err(|e| store_failure(Command::Get, e))
    }

    async fn update(&self, payload: &[u8]) -> Result<User, CommandError> {
        let request: CommandRequest<UpdateUserRequest> = decode_request(payload)?;
        let id = parse_user_id(&request.data.id).map_err(rejected)?;
        validate_update(&request.data.changes).map_err(rejected)?;
        let user = self
            .store
            .update(id, &request.data.changes)
            .await
            .map_err(|e| store_failure(Command::Update, e))?;
        tracing::info!(user_id = %user.user_id, "user updated");
        Ok(user)
    }

    async fn delete(&self, payload: &[u8]) -> Result<UserId, CommandError> {
        let request: CommandRequest<IdRequest> = decode_request(payload)?;
        let id = parse_user_id(&request.data.id).map_err(rejected)?;
        self.store
            .delete(id)
            .await
            .map_err(|e| store_failure(Command::Delete, e))?;
        tracing::info!(user_id = %id, "user deleted");
        Ok(id)
    }
}

fn error(code: ErrorCode, message: impl Into<String>) -> CommandError {
    CommandError {
        code,
        message: message.into(),
    }
}

fn decode_request<T: DeserializeOwned>(payload: &[u8]) -> Result<CommandRequest<T>, CommandError> {
    decode(payload).map_err(|err| {
        tracing::debug!(error = %err, "undecodable command");
        error(ErrorCode::BadRequest, "invalid request")
    })
}

fn rejected(err: ValidationError) -> CommandError {
    error(ErrorCode::BadRequest, err.0)
}

fn store_failure(command: Command, err: StoreError) -> CommandError {
    match err {
        StoreError::NotFound => error(ErrorCode::NotFound, "user not found"),
        StoreError::Conflict(message) => error(ErrorCode::BadRequest, message),
        StoreError::Other(detail) => {
            tracing::error!(command = command.name(), error = %detail, "store failure");
            let message = match command {
                Command::List => "failed to list users".to_string(),
                other => format!("failed to {} user", other.name()),
            };
            error(ErrorCode::Internal, message)
        }
    }
}

fn encode_reply<T: Serialize>(response: &CommandResponse<T>) -> Bytes {
    encode(response).unwrap_or_else(|err| {
        tracing::error!(error = %err, "failed to encode reply");
        Bytes::from_static(FALLBACK_REPLY)
    })
}

fn success<T: Serialize>(data: &T) -> Bytes {
    encode_reply(&CommandResponse::success(data))
}

fn failure(err: CommandError) -> Bytes {
    encode_reply(&CommandResponse::<()> {
        ok: false,
        data: None,
        error: Some(err),
    })
}

fn respond<T: Serialize>(result: Result<T, CommandError>) -> Bytes {
    match result {
        Ok(data) => success(&data),
        Err(err) => failure(err),
    }
}

fn event<T: Serialize>(kind: EventKind, data: &T) -> Option<(EventKind, Bytes)> {
    match encode(&Event::new(kind.event_type(), data)) {
        Ok(payload) => Some((kind, payload)),
        Err(err) => {
            tracing::error!(channel = kind.subject(), error = %err, "failed to encode event");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::indexing_slicing)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::broker::MemoryBroker;
    use crate::client::{ClientError, UserClient};
    use crate::contract::{USER_EVENT_CREATED, USER_EVENT_DELETED, USER_EVENT_UPDATED};
    use crate::domain::UpdateUserInput;
    use crate::store::MemoryUserStore;

    const WAIT: Duration = Duration::from_secs(1);

    struct Fixture {
        broker: Arc<MemoryBroker>,
        store: Arc<MemoryUserStore>,
        client: UserClient,
        _server: ServerHandle,
    }

    async fn fixture() -> Fixture {
        let broker = Arc::new(MemoryBroker::default());
        let store = Arc::new(MemoryUserStore::new());
        let server = CommandServer::new(
            Arc::clone(&store) as Arc<dyn UserStore>,
            Arc::clone(&broker) as Arc<dyn Broker>,
        );
        let Ok(handle) = server.start().await else {
            panic!("server failed to start");
        };
        let client = UserClient::new(Arc::clone(&broker) as Arc<dyn Broker>, WAIT);
        Fixture {
            broker,
            store,
            client,
            _server: handle,
        }
    }

    fn input(email: &str) -> CreateUserInput {
        CreateUserInput {
            first_name: "Ana".to_string(),
            last_name: "Lee".to_string(),
            email: email.to_string(),
            phone: None,
            age: Some(30),
            status: None,
        }
    }

    async fn raw_request(
        broker: &MemoryBroker,
        command: Command,
        body: &'static [u8],
    ) -> serde_json::Value {
        let Ok(reply) = broker
            .request(command.subject(), Bytes::from_static(body), WAIT)
            .await
        else {
            panic!("no reply");
        };
        let Ok(value) = serde_json::from_slice(&reply) else {
            panic!("reply is not json");
        };
        value
    }

    #[tokio::test]
    async fn create_echoes_input_with_fresh_id() {
        let f = fixture().await;
        let Ok(a) = f.client.create(input("a@x.io")).await else {
            panic!("create failed");
        };
        let Ok(b) = f.client.create(input("b@x.io")).await else {
            panic!("create failed");
        };
        assert_eq!(a.first_name, "Ana");
        assert_eq!(a.age, Some(30));
        assert_eq!(a.phone, None);
        assert_ne!(a.user_id, b.user_id);
    }

    #[tokio::test]
    async fn malformed_payload_has_no_side_effects() {
        let f = fixture().await;
        let Ok(mut events) = f.broker.subscribe(USER_EVENT_CREATED).await else {
            panic!("subscribe failed");
        };

        let reply = raw_request(&f.broker, Command::Create, b"{not json").await;
        assert_eq!(reply["ok"], false);
        assert_eq!(reply["error"]["code"], "BAD_REQUEST");
        assert_eq!(reply["error"]["message"], "invalid request");
        assert!(reply.get("data").is_none());

        assert!(f.store.is_empty().await);
        let next = tokio::time::timeout(Duration::from_millis(50), events.next()).await;
        assert!(next.is_err(), "no event expected");
    }

    #[tokio::test]
    async fn undecodable_update_and_delete_leave_store_untouched() {
        let f = fixture().await;
        let Ok(user) = f.client.create(input("keep@x.io")).await else {
            panic!("create failed");
        };
        let Ok(mut updated) = f.broker.subscribe(USER_EVENT_UPDATED).await else {
            panic!("subscribe failed");
        };
        let Ok(mut deleted) = f.broker.subscribe(USER_EVENT_DELETED).await else {
            panic!("subscribe failed");
        };

        let bodies: [(Command, &'static [u8]); 4] = [
            (Command::Update, b"{not json"),
            (Command::Update, br#"{"requestId":"r","data":{"id":42,"age":"old"}}"#),
            (Command::Delete, b"[]"),
            (Command::Delete, br#"{"requestId":"r","data":{}}"#),
        ];
        for (command, body) in bodies {
            let reply = raw_request(&f.broker, command, body).await;
            assert_eq!(reply["ok"], false);
            assert_eq!(reply["error"]["code"], "BAD_REQUEST");
            assert_eq!(reply["error"]["message"], "invalid request");
        }

        let Ok(stored) = f.store.get_by_id(user.user_id).await else {
            panic!("user vanished");
        };
        assert_eq!(stored, user);
        assert_eq!(f.store.len().await, 1);

        let quiet = Duration::from_millis(50);
        assert!(tokio::time::timeout(quiet, updated.next()).await.is_err());
        assert!(tokio::time::timeout(quiet, deleted.next()).await.is_err());
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_store() {
        let f = fixture().await;
        let mut bad = input("not-an-email");
        bad.first_name = "A".to_string();
        let result = f.client.create(bad).await;
        assert!(matches!(result, Err(ClientError::BadRequest(_))));
        assert!(f.store.is_empty().await);
    }

    #[tokio::test]
    async fn malformed_id_is_bad_request() {
        let f = fixture().await;
        let body = br#"{"requestId":"r","data":{"id":"nope"}}"#;
        let reply = raw_request(&f.broker, Command::Get, body).await;
        assert_eq!(reply["error"]["code"], "BAD_REQUEST");
        assert_eq!(reply["error"]["message"], "id must be valid uuid");
    }

    #[tokio::test]
    async fn get_of_unknown_id_is_not_found() {
        let f = fixture().await;
        let Ok(id) = parse_user_id("11111111-1111-1111-1111-111111111111") else {
            panic!("bad fixture id");
        };
        let result = f.client.get(id).await;
        assert!(matches!(result, Err(ClientError::NotFound(m)) if m == "user not found"));
    }

    #[tokio::test]
    async fn duplicate_email_is_bad_request_after_created_event() {
        let f = fixture().await;
        let Ok(mut events) = f.broker.subscribe(USER_EVENT_CREATED).await else {
            panic!("subscribe failed");
        };

        let Ok(first) = f.client.create(input("a@x.io")).await else {
            panic!("create failed");
        };
        let Ok(Some(msg)) = tokio::time::timeout(WAIT, events.next()).await else {
            panic!("no created event");
        };
        let Ok(created) = decode::<Event<User>>(&msg.payload) else {
            panic!("event does not decode");
        };
        assert_eq!(created.event_type, "user.created");
        assert_eq!(created.data, first);

        let second = f.client.create(input("a@x.io")).await;
        assert!(matches!(second, Err(ClientError::BadRequest(m)) if m == "email already exists"));
        assert_eq!(f.store.len().await, 1);
    }

    #[tokio::test]
    async fn update_and_delete_round_trip() {
        let f = fixture().await;
        let Ok(user) = f.client.create(input("u@x.io")).await else {
            panic!("create failed");
        };

        let changes = UpdateUserInput {
            last_name: Some("Smith".to_string()),
            ..UpdateUserInput::default()
        };
        let Ok(updated) = f.client.update(user.user_id, changes).await else {
            panic!("update failed");
        };
        assert_eq!(updated.last_name, "Smith");
        assert_eq!(updated.first_name, "Ana");

        let empty = f.client.update(user.user_id, UpdateUserInput::default()).await;
        assert!(matches!(
            empty,
            Err(ClientError::BadRequest(m)) if m == "at least one field is required"
        ));

        let Ok(deleted) = f.client.delete(user.user_id).await else {
            panic!("delete failed");
        };
        assert_eq!(deleted, DeleteResult::deleted());
        assert!(matches!(
            f.client.delete(user.user_id).await,
            Err(ClientError::NotFound(_))
        ));

        let Ok(all) = f.client.list().await else {
            panic!("list failed");
        };
        assert!(all.is_empty());
    }

    #[derive(Debug)]
    struct SlowStore;

    #[async_trait]
    impl UserStore for SlowStore {
        async fn create(&self, _: &CreateUserInput) -> Result<User, StoreError> {
            Err(StoreError::Other("unused".to_string()))
        }
        async fn list(&self) -> Result<Vec<User>, StoreError> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(Vec::new())
        }
        async fn get_by_id(&self, _: UserId) -> Result<User, StoreError> {
            Err(StoreError::Other("connection reset by peer".to_string()))
        }
        async fn update(&self, _: UserId, _: &UpdateUserInput) -> Result<User, StoreError> {
            Err(StoreError::NotFound)
        }
        async fn delete(&self, _: UserId) -> Result<(), StoreError> {
            Err(StoreError::NotFound)
        }
    }

    #[tokio::test]
    async fn slow_store_times_out_the_caller() {
        let broker = Arc::new(MemoryBroker::default());
        let server = CommandServer::new(
            Arc::new(SlowStore),
            Arc::clone(&broker) as Arc<dyn Broker>,
        );
        let Ok(_handle) = server.start().await else {
            panic!("server failed to start");
        };
        let client = UserClient::new(broker, Duration::from_millis(50));

        let started = std::time::Instant::now();
        let result = client.list().await;
        assert!(matches!(result, Err(ClientError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn internal_failure_hides_store_text() {
        let broker = Arc::new(MemoryBroker::default());
        let server = CommandServer::new(
            Arc::new(SlowStore),
            Arc::clone(&broker) as Arc<dyn Broker>,
        );
        let Ok(_handle) = server.start().await else {
            panic!("server failed to start");
        };
        let client = UserClient::new(broker, WAIT);

        let result = client.get(UserId::new()).await;
        assert!(matches!(
            result,
            Err(ClientError::Service {
                code: ErrorCode::Internal,
                message,
            }) if message == "failed to get user"
        ));
    }

    /// Broker whose publish always fails but whose requests work.
    #[derive(Debug, Default)]
    struct FlakyBroker {
        inner: MemoryBroker,
    }

    #[async_trait]
    impl Broker for FlakyBroker {
        async fn publish(&self, _: &str, _: Bytes) -> Result<(), BrokerError> {
            Err(BrokerError::Closed)
        }
        async fn subscribe(&self, channel: &str) -> Result<Subscription, BrokerError> {
            self.inner.subscribe(channel).await
        }
        async fn request(
            &self,
            channel: &str,
            payload: Bytes,
            timeout: Duration,
        ) -> Result<Bytes, BrokerError> {
            self.inner.request(channel, payload, timeout).await
        }
        async fn close(&self) {
            self.inner.close().await;
        }
    }

    #[tokio::test]
    async fn publish_failure_does_not_change_reply() {
        let broker: Arc<dyn Broker> = Arc::new(FlakyBroker::default());
        let store = Arc::new(MemoryUserStore::new());
        let server = CommandServer::new(
            Arc::clone(&store) as Arc<dyn UserStore>,
            Arc::clone(&broker),
        );
        let Ok(_handle) = server.start().await else {
            panic!("server failed to start");
        };
        let client = UserClient::new(broker, WAIT);

        let Ok(user) = client.create(input("f@x.io")).await else {
            panic!("create failed");
        };
        assert_eq!(store.len().await, 1);
        assert_eq!(user.email, "f@x.io");
    }
}
