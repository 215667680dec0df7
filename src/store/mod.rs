//! Persistence for user records.
//!
//! The command server only talks to the [`UserStore`] trait. Two
//! implementations are provided: [`MemoryUserStore`] for tests and
//! persistence-less deployments, and [`PostgresUserStore`] backed by
//! `sqlx::PgPool`.

pub mod memory;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;

use crate::domain::{CreateUserInput, UpdateUserInput, User, UserId};

pub use memory::MemoryUserStore;
pub use postgres::PostgresUserStore;

/// Categorical store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No user with the requested id exists.
    #[error("user not found")]
    NotFound,

    /// A uniqueness constraint was violated.
    #[error("{0}")]
    Conflict(String),

    /// Any other failure. The text is for logs only.
    #[error("store failure: {0}")]
    Other(String),
}

impl StoreError {
    /// The conflict raised when an e-mail address is already taken.
    #[must_use]
    pub fn email_taken() -> Self {
        Self::Conflict("email already exists".to_string())
    }
}

/// CRUD access to user records.
#[async_trait]
pub trait UserStore: Send + Sync + fmt::Debug {
    /// Inserts a new user and returns it with its assigned id and
    /// timestamps. A missing status defaults to `Active`; an empty phone is
    /// stored as absent.
    ///
    /// # Errors
    ///
    /// [`StoreError::Conflict`] if the e-mail is taken, [`StoreError::Other`]
    /// on backend failure.
    async fn create(&self, input: &CreateUserInput) -> Result<User, StoreError>;

    /// Returns every user, oldest first.
    ///
    /// # Errors
    ///
    /// [`StoreError::Other`] on backend failure.
    async fn list(&self) -> Result<Vec<User>, StoreError>;

    /// Fetches one user.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if absent, [`StoreError::Other`] on backend
    /// failure.
    async fn get_by_id(&self, id: UserId) -> Result<User, StoreError>;

    /// Applies the set fields of `changes` and bumps `updatedAt`.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`], [`StoreError::Conflict`] if the new e-mail
    /// is taken, or [`StoreError::Other`].
    async fn update(&self, id: UserId, changes: &UpdateUserInput) -> Result<User, StoreError>;

    /// Removes one user.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if absent, [`StoreError::Other`] on backend
    /// failure.
    async fn delete(&self, id: UserId) -> Result<(), StoreError>;
}

/// Normalizes an optional phone: empty means absent.
pub(crate) fn normalize_phone(phone: Option<&str>) -> Option<String> {
    phone.filter(|p| !p.is_empty()).map(str::to_string)
}
