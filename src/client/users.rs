//! Typed client for the five user commands.

use std::sync::Arc;
use std::time::Duration;

use super::{ClientError, CommandClient};
use crate::broker::Broker;
use crate::contract::{Command, DeleteResult, IdRequest, ListUsersRequest, UpdateUserRequest};
use crate::domain::{CreateUserInput, UpdateUserInput, User, UserId};

/// User command client shared by the REST and WebSocket surfaces.
#[derive(Debug, Clone)]
pub struct UserClient {
    inner: CommandClient,
}

impl UserClient {
    /// Creates a client over `broker` with the given per-call timeout.
    #[must_use]
    pub fn new(broker: Arc<dyn Broker>, timeout: Duration) -> Self {
        Self {
            inner: CommandClient::new(broker, timeout),
        }
    }

    /// Creates a user.
    ///
    /// # Errors
    ///
    /// [`ClientError::BadRequest`] on invalid input or a taken e-mail,
    /// otherwise see [`ClientError`].
    pub async fn create(&self, input: CreateUserInput) -> Result<User, ClientError> {
        self.inner.call(Command::Create.subject(), input).await
    }

    /// Lists all users. A reply without data is an empty list.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn list(&self) -> Result<Vec<User>, ClientError> {
        let users: Option<Vec<User>> = self
            .inner
            .call_optional(Command::List.subject(), ListUsersRequest::default())
            .await?;
        Ok(users.unwrap_or_default())
    }

    /// Fetches one user.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotFound`] if absent, otherwise see [`ClientError`].
    pub async fn get(&self, id: UserId) -> Result<User, ClientError> {
        self.inner
            .call(Command::Get.subject(), IdRequest::from(id))
            .await
    }

    /// Applies a partial update.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotFound`], [`ClientError::BadRequest`], otherwise see
    /// [`ClientError`].
    pub async fn update(&self, id: UserId, changes: UpdateUserInput) -> Result<User, ClientError> {
        let request = UpdateUserRequest {
            id: id.to_string(),
            changes,
        };
        self.inner.call(Command::Update.subject(), request).await
    }

    /// Deletes one user.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotFound`] if absent, otherwise see [`ClientError`].
    pub async fn delete(&self, id: UserId) -> Result<DeleteResult, ClientError> {
        let result: Option<DeleteResult> = self
            .inner
            .call_optional(Command::Delete.subject(), IdRequest::from(id))
            .await?;
        Ok(result.unwrap_or_else(DeleteResult::deleted))
    }
}
