//! User directory access.
//!
//! The resolver only needs two lookups, so the directory sits behind a trait
//! and the database repository is one implementation of it.

use async_trait::async_trait;
use barrio_common::AppResult;
use barrio_db::entities::user;
use barrio_db::repositories::UserRepository;
use std::sync::Arc;

/// Read view of a user as seen by the notification pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserRecord {
    pub id: String,
    pub name: Option<String>,
    pub push_token: Option<String>,
    pub language: Option<String>,
    pub last_known_location_label: Option<String>,
}

impl From<user::Model> for UserRecord {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            push_token: model.push_token,
            language: model.language,
            last_known_location_label: model.last_known_location_label,
        }
    }
}

/// Lookup of user records.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Find a single user.
    async fn find_user(&self, id: &str) -> AppResult<Option<UserRecord>>;

    /// Every user, in a stable order.
    async fn all_users(&self) -> AppResult<Vec<UserRecord>>;
}

/// Type alias for a shared user directory.
pub type UserDirectoryService = Arc<dyn UserDirectory>;

#[async_trait]
impl UserDirectory for UserRepository {
    async fn find_user(&self, id: &str) -> AppResult<Option<UserRecord>> {
        Ok(self.find_by_id(id).await?.map(UserRecord::from))
    }

    async fn all_users(&self) -> AppResult<Vec<UserRecord>> {
        Ok(self
            .find_all()
            .await?
            .into_iter()
            .map(UserRecord::from)
            .collect())
    }
}
