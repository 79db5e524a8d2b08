//! Friendship symmetry maintenance.
//!
//! Friend edges are directed in storage. When one side is written the
//! mirrored edge is written too, so both users see each other.

use async_trait::async_trait;
use barrio_common::AppResult;
use barrio_db::repositories::FriendRepository;
use std::sync::Arc;
use tracing::{debug, info};

/// Storage for directed friend edges.
#[async_trait]
pub trait FriendshipStore: Send + Sync {
    /// Write `user_id -> friend_id` unless present. Returns whether it was written.
    async fn insert_if_absent(&self, user_id: &str, friend_id: &str) -> AppResult<bool>;

    /// Remove `user_id -> friend_id`. Returns whether it existed.
    async fn delete(&self, user_id: &str, friend_id: &str) -> AppResult<bool>;
}

/// Type alias for a shared friendship store.
pub type FriendshipStoreService = Arc<dyn FriendshipStore>;

#[async_trait]
impl FriendshipStore for FriendRepository {
    async fn insert_if_absent(&self, user_id: &str, friend_id: &str) -> AppResult<bool> {
        Self::insert_if_absent(self, user_id, friend_id).await
    }

    async fn delete(&self, user_id: &str, friend_id: &str) -> AppResult<bool> {
        Self::delete(self, user_id, friend_id).await
    }
}

/// Keeps friend edges symmetric.
#[derive(Clone)]
pub struct FriendshipService {
    store: FriendshipStoreService,
}

impl FriendshipService {
    /// Create a new friendship service.
    #[must_use]
    pub const fn new(store: FriendshipStoreService) -> Self {
        Self { store }
    }

    /// `user_id` added `friend_id`: make sure `friend_id -> user_id` exists.
    ///
    /// Returns `true` when the mirrored edge was written. Replaying the event,
    /// or receiving the echo of our own write, is a no-op.
    pub async fn mirror_added(&self, user_id: &str, friend_id: &str) -> AppResult<bool> {
        if user_id == friend_id {
            debug!(user_id = %user_id, "Ignoring self friendship");
            return Ok(false);
        }

        let written = self.store.insert_if_absent(friend_id, user_id).await?;
        if written {
            info!(user_id = %friend_id, friend_id = %user_id, "Mirrored friendship");
        }
        Ok(written)
    }

    /// `user_id` removed `friend_id`: remove `friend_id -> user_id` if present.
    pub async fn mirror_removed(&self, user_id: &str, friend_id: &str) -> AppResult<bool> {
        if user_id == friend_id {
            debug!(user_id = %user_id, "Ignoring self friendship");
            return Ok(false);
        }

        let removed = self.store.delete(friend_id, user_id).await?;
        if removed {
            info!(user_id = %friend_id, friend_id = %user_id, "Removed mirrored friendship");
        }
        Ok(removed)
    }
}
