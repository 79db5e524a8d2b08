//! Friend repository.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    sea_query::OnConflict,
};

use crate::entities::friend::{ActiveModel, Column, Entity};
use barrio_common::{AppError, AppResult, IdGenerator};

/// Repository for directed friendship edges.
#[derive(Clone)]
pub struct FriendRepository {
    db: Arc<DatabaseConnection>,
    id_gen: IdGenerator,
}

impl FriendRepository {
    /// Create a new friend repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            id_gen: IdGenerator::new(),
        }
    }

    /// Insert the edge `user_id -> friend_id` unless it already exists.
    ///
    /// Returns `true` when a row was written.
    pub async fn insert_if_absent(&self, user_id: &str, friend_id: &str) -> AppResult<bool> {
        let edge = ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id.to_string()),
            friend_id: Set(friend_id.to_string()),
            created_at: Set(Utc::now().into()),
        };

        let rows = Entity::insert(edge)
            .on_conflict(
                OnConflict::columns([Column::UserId, Column::FriendId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(rows > 0)
    }

    /// Delete the edge `user_id -> friend_id`.
    ///
    /// Returns `true` when a row was removed.
    pub async fn delete(&self, user_id: &str, friend_id: &str) -> AppResult<bool> {
        let result = Entity::delete_many()
            .filter(Column::UserId.eq(user_id))
            .filter(Column::FriendId.eq(friend_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected > 0)
    }
}
