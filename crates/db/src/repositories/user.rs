//! User repository.

use std::sync::Arc;

use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder};

use crate::entities::user::{Column, Entity, Model};
use barrio_common::{AppError, AppResult};

/// Read-only access to the user directory.
#[derive(Clone)]
pub struct UserRepository {
    db: Arc<DatabaseConnection>,
}

impl UserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a user by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<Model>> {
        Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Load every user record.
    ///
    /// Used by the new-post fan-out, which matches on the free-text location
    /// label and so cannot be pushed down into an index.
    pub async fn find_all(&self) -> AppResult<Vec<Model>> {
        Entity::find()
            .order_by_asc(Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
