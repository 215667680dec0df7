//! In-memory user store.
//!
//! A single `RwLock<Vec>` guards all records in insertion order; e-mail
//! uniqueness is checked under the write lock so concurrent creates cannot
//! both win.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{StoreError, UserStore, normalize_phone};
use crate::domain::{CreateUserInput, UpdateUserInput, User, UserId};

/// [`UserStore`] kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<Vec<User>>,
}

impl MemoryUserStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored users.
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    /// Returns `true` if no user is stored.
    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

fn email_taken(users: &[User], email: &str, except: Option<UserId>) -> bool {
    users
        .iter()
        .any(|u| Some(u.user_id) != except && u.email.eq_ignore_ascii_case(email))
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, input: &CreateUserInput) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if email_taken(&users, &input.email, None) {
            return Err(StoreError::email_taken());
        }

        let now = Utc::now();
        let user = User {
            user_id: UserId::new(),
            first_name: input.first_name.clone(),
            last_name: input.last_name.clone(),
            email: input.email.clone(),
            phone: normalize_phone(input.phone.as_deref()),
            age: input.age,
            status: input.status.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.users.read().await.clone())
    }

    async fn get_by_id(&self, id: UserId) -> Result<User, StoreError> {
        self.users
            .read()
            .await
            .iter()
            .find(|u| u.user_id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update(&self, id: UserId, changes: &UpdateUserInput) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if !users.iter().any(|u| u.user_id == id) {
            return Err(StoreError::NotFound);
        }
        if let Some(email) = &changes.email
            && email_taken(&users, email, Some(id))
        {
            return Err(StoreError::email_taken());
        }

        let user = users
            .iter_mut()
            .find(|u| u.user_id == id)
            .ok_or(StoreError::NotFound)?;
        if let Some(first_name) = &changes.first_name {
            user.first_name.clone_from(first_name);
        }
        if let Some(last_name) = &changes.last_name {
            user.last_name.clone_from(last_name);
        }
        if let Some(email) = &changes.email {
            user.email.clone_from(email);
        }
        if let Some(phone) = &changes.phone {
            user.phone = normalize_phone(Some(phone));
        }
        if let Some(age) = changes.age {
            user.age = Some(age);
        }
        if let Some(status) = changes.status {
            user.status = status;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn delete(&self, id: UserId) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let before = users.len();
        users.retain(|u| u.user_id != id);
        if users.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::UserStatus;

    fn input(email: &str) -> CreateUserInput {
        CreateUserInput {
            first_name: "Jo".to_string(),
            last_name: "Do".to_string(),
            email: email.to_string(),
            phone: Some(String::new()),
            age: None,
            status: None,
        }
    }

    #[tokio::test]
    async fn create_assigns_id_and_defaults() {
        let store = MemoryUserStore::new();
        let Ok(user) = store.create(&input("jo@x.com")).await else {
            panic!("create failed");
        };
        assert_eq!(user.status, UserStatus::Active);
        assert_eq!(user.phone, None);
        assert_eq!(user.created_at, user.updated_at);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let store = MemoryUserStore::new();
        let _ = store.create(&input("jo@x.com")).await;
        let result = store.create(&input("JO@x.com")).await;
        assert_eq!(result, Err(StoreError::email_taken()));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let store = MemoryUserStore::new();
        assert_eq!(
            store.get_by_id(UserId::new()).await,
            Err(StoreError::NotFound)
        );
    }

    #[tokio::test]
    async fn update_touches_only_set_fields() {
        let store = MemoryUserStore::new();
        let Ok(mut original) = store.create(&input("jo@x.com")).await else {
            panic!("create failed");
        };
        original.phone = Some("+1 555 0100".to_string());
        let _ = store
            .update(
                original.user_id,
                &UpdateUserInput {
                    phone: original.phone.clone(),
                    ..UpdateUserInput::default()
                },
            )
            .await;

        let changes = UpdateUserInput {
            last_name: Some("Doe".to_string()),
            status: Some(UserStatus::Inactive),
            ..UpdateUserInput::default()
        };
        let Ok(updated) = store.update(original.user_id, &changes).await else {
            panic!("update failed");
        };
        assert_eq!(updated.first_name, "Jo");
        assert_eq!(updated.last_name, "Doe");
        assert_eq!(updated.status, UserStatus::Inactive);
        assert_eq!(updated.phone.as_deref(), Some("+1 555 0100"));
        assert!(updated.updated_at >= original.updated_at);
    }

    #[tokio::test]
    async fn empty_phone_clears() {
        let store = MemoryUserStore::new();
        let mut with_phone = input("p@x.com");
        with_phone.phone = Some("+15550100".to_string());
        let Ok(user) = store.create(&with_phone).await else {
            panic!("create failed");
        };
        assert!(user.phone.is_some());

        let clear = UpdateUserInput {
            phone: Some(String::new()),
            ..UpdateUserInput::default()
        };
        let Ok(updated) = store.update(user.user_id, &clear).await else {
            panic!("update failed");
        };
        assert_eq!(updated.phone, None);
    }

    #[tokio::test]
    async fn update_to_taken_email_conflicts() {
        let store = MemoryUserStore::new();
        let _ = store.create(&input("a@x.com")).await;
        let Ok(b) = store.create(&input("b@x.com")).await else {
            panic!("create failed");
        };
        let changes = UpdateUserInput {
            email: Some("a@x.com".to_string()),
            ..UpdateUserInput::default()
        };
        assert_eq!(
            store.update(b.user_id, &changes).await,
            Err(StoreError::email_taken())
        );

        let same = UpdateUserInput {
            email: Some("b@x.com".to_string()),
            ..UpdateUserInput::default()
        };
        assert!(store.update(b.user_id, &same).await.is_ok());
    }

    #[tokio::test]
    async fn delete_then_missing() {
        let store = MemoryUserStore::new();
        let Ok(user) = store.create(&input("d@x.com")).await else {
            panic!("create failed");
        };
        assert_eq!(store.delete(user.user_id).await, Ok(()));
        assert_eq!(store.delete(user.user_id).await, Err(StoreError::NotFound));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn list_is_oldest_first() {
        let store = MemoryUserStore::new();
        let Ok(first) = store.create(&input("1@x.com")).await else {
            panic!("create failed");
        };
        let _ = store.create(&input("2@x.com")).await;
        let Ok(all) = store.list().await else {
            panic!("list failed");
        };
        assert_eq!(all.len(), 2);
        assert_eq!(all.first().map(|u| u.user_id), Some(first.user_id));
    }
}
