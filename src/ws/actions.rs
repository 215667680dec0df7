//! Executes WebSocket actions through the [`UserClient`].

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::messages::{
    Action, BAD_REQUEST, INTERNAL_ERROR, IdPayload, RequestMessage, ResponseMessage, UpdatePayload,
};
use crate::client::{ClientError, UserClient};
use crate::domain::CreateUserInput;
use crate::validation::{parse_user_id, validate_create, validate_update};

enum Failure {
    Rejected(String),
    Client(ClientError),
    Encode(serde_json::Error),
}

impl From<ClientError> for Failure {
    fn from(err: ClientError) -> Self {
        Self::Client(err)
    }
}

/// Runs `request` and returns the parsed action (if known) with the reply.
pub async fn process(
    users: &UserClient,
    request: RequestMessage,
) -> (Option<Action>, ResponseMessage) {
    let RequestMessage {
        request_id,
        action,
        payload,
    } = request;

    let Ok(action) = action.parse::<Action>() else {
        return (
            None,
            ResponseMessage::fail(request_id, BAD_REQUEST, "unknown action"),
        );
    };

    let response = match execute(users, action, payload).await {
        Ok(data) => ResponseMessage::ok(request_id, data),
        Err(Failure::Rejected(message)) => ResponseMessage::fail(request_id, BAD_REQUEST, message),
        Err(Failure::Client(err)) => {
            if !matches!(err, ClientError::BadRequest(_) | ClientError::NotFound(_)) {
                tracing::warn!(action = %action, error = %err, "user command failed");
            }
            ResponseMessage::from_client_error(request_id, &err)
        }
        Err(Failure::Encode(err)) => {
            tracing::error!(action = %action, error = %err, "failed to encode reply data");
            ResponseMessage::fail(request_id, INTERNAL_ERROR, "internal server error")
        }
    };
    (Some(action), response)
}

async fn execute(
    users: &UserClient,
    action: Action,
    payload: serde_json::Value,
) -> Result<serde_json::Value, Failure> {
    match action {
        Action::Create => {
            let input: CreateUserInput = from_payload(payload)?;
            validate_create(&input).map_err(|e| Failure::Rejected(e.0))?;
            to_value(&users.create(input).await?)
        }
        Action::List => to_value(&users.list().await?),
        Action::Get => {
            let IdPayload { id } = from_payload(payload)?;
            let id = parse_user_id(&id).map_err(|e| Failure::Rejected(e.0))?;
            to_value(&users.get(id).await?)
        }
        Action::Update => {
            let UpdatePayload { id, changes } = from_payload(payload)?;
            validate_update(&changes).map_err(|e| Failure::Rejected(e.0))?;
            let id = parse_user_id(&id).map_err(|e| Failure::Rejected(e.0))?;
            to_value(&users.update(id, changes).await?)
        }
        Action::Delete => {
            let IdPayload { id } = from_payload(payload)?;
            let id = parse_user_id(&id).map_err(|e| Failure::Rejected(e.0))?;
            to_value(&users.delete(id).await?)
        }
    }
}

fn from_payload<T: DeserializeOwned>(payload: serde_json::Value) -> Result<T, Failure> {
    serde_json::from_value(payload).map_err(|_| Failure::Rejected("invalid payload".to_string()))
}

fn to_value<T: Serialize>(value: &T) -> Result<serde_json::Value, Failure> {
    serde_json::to_value(value).map_err(Failure::Encode)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::broker::{Broker, MemoryBroker};
    use crate::service::{CommandServer, ServerHandle};
    use crate::store::{MemoryUserStore, UserStore};
    use crate::ws::messages::{NOT_FOUND, should_reply_directly};

    async fn users() -> (UserClient, ServerHandle) {
        let broker: Arc<dyn Broker> = Arc::new(MemoryBroker::default());
        let store: Arc<dyn UserStore> = Arc::new(MemoryUserStore::new());
        let Ok(handle) = CommandServer::new(store, Arc::clone(&broker)).start().await else {
            panic!("server failed to start");
        };
        (UserClient::new(broker, Duration::from_secs(1)), handle)
    }

    fn request(action: &str, payload: serde_json::Value) -> RequestMessage {
        RequestMessage {
            request_id: "req-1".to_string(),
            action: action.to_string(),
            payload,
        }
    }

    fn error_of(response: &ResponseMessage) -> (&str, &str) {
        let Some(error) = &response.error else {
            panic!("expected an error reply");
        };
        (error.code.as_str(), error.message.as_str())
    }

    #[tokio::test]
    async fn unknown_action_is_rejected() {
        let (users, _server) = users().await;
        let (action, response) = process(&users, request("user.explode", json!({}))).await;
        assert_eq!(action, None);
        assert_eq!(response.request_id, "req-1");
        assert_eq!(error_of(&response), (BAD_REQUEST, "unknown action"));
    }

    #[tokio::test]
    async fn create_succeeds_without_direct_reply() {
        let (users, _server) = users().await;
        let payload = json!({"firstName": "Jo", "lastName": "Do", "email": "jo@x.com"});
        let (action, response) = process(&users, request("user.create", payload)).await;
        assert!(response.ok);
        assert!(!should_reply_directly(action, &response));
        assert_eq!(
            response.data.as_ref().and_then(|d| d.get("status")),
            Some(&json!("Active"))
        );
    }

    #[tokio::test]
    async fn invalid_payloads_are_bad_requests() {
        let (users, _server) = users().await;

        let (_, response) = process(&users, request("user.create", json!("nope"))).await;
        assert_eq!(error_of(&response), (BAD_REQUEST, "invalid payload"));

        let (_, response) = process(&users, request("user.get", json!({"id": "123"}))).await;
        assert_eq!(error_of(&response), (BAD_REQUEST, "id must be valid uuid"));

        let (action, response) =
            process(&users, request("user.update", json!({"id": "123"}))).await;
        assert_eq!(
            error_of(&response),
            (BAD_REQUEST, "at least one field is required")
        );
        assert!(should_reply_directly(action, &response));
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let (users, _server) = users().await;
        let payload = json!({"id": "11111111-1111-1111-1111-111111111111"});
        let (_, response) = process(&users, request("user.delete", payload)).await;
        assert_eq!(error_of(&response), (NOT_FOUND, "user not found"));
    }

    #[tokio::test]
    async fn list_replies_directly() {
        let (users, _server) = users().await;
        let (action, response) = process(&users, request("user.list", json!({}))).await;
        assert!(should_reply_directly(action, &response));
        assert_eq!(response.data, Some(json!([])));
    }
}
