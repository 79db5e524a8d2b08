//! In-memory collaborators for tests.
//!
//! Stand-ins for the user directory, the friendship store and the push
//! gateway, so handler behavior can be checked without Postgres or HTTP.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use barrio_common::{AppError, AppResult};

use crate::services::directory::{UserDirectory, UserRecord};
use crate::services::friendship::FriendshipStore;
use crate::services::gateway::{DeliveryReceipt, DeliveryTicket, PushGateway};
use crate::services::message::PushMessage;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// User directory backed by a vector, in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    users: Vec<UserRecord>,
    failing: bool,
    failing_ids: HashSet<String>,
}

impl InMemoryDirectory {
    /// Add a user.
    #[must_use]
    pub fn with_user(
        mut self,
        id: &str,
        name: Option<&str>,
        push_token: Option<&str>,
        language: Option<&str>,
        city: Option<&str>,
    ) -> Self {
        self.users.push(UserRecord {
            id: id.to_string(),
            name: name.map(str::to_string),
            push_token: push_token.map(str::to_string),
            language: language.map(str::to_string),
            last_known_location_label: city.map(str::to_string),
        });
        self
    }

    /// Make every lookup fail with a database error.
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Make lookups of `id` fail with a database error.
    #[must_use]
    pub fn failing_for(mut self, id: &str) -> Self {
        self.failing_ids.insert(id.to_string());
        self
    }

    fn check(&self) -> AppResult<()> {
        if self.failing {
            return Err(AppError::Database("directory unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn find_user(&self, id: &str) -> AppResult<Option<UserRecord>> {
        self.check()?;
        if self.failing_ids.contains(id) {
            return Err(AppError::Database(format!("lookup of {id} timed out")));
        }
        Ok(self.users.iter().find(|u| u.id == id).cloned())
    }

    async fn all_users(&self) -> AppResult<Vec<UserRecord>> {
        self.check()?;
        Ok(self.users.clone())
    }
}

/// Friendship store backed by a set of directed edges.
#[derive(Debug, Default)]
pub struct InMemoryFriendships {
    edges: Mutex<BTreeSet<(String, String)>>,
}

impl InMemoryFriendships {
    /// Seed an edge.
    #[must_use]
    pub fn with_edge(self, user_id: &str, friend_id: &str) -> Self {
        lock(&self.edges).insert((user_id.to_string(), friend_id.to_string()));
        self
    }

    /// Whether `user_id -> friend_id` is stored.
    #[must_use]
    pub fn contains(&self, user_id: &str, friend_id: &str) -> bool {
        lock(&self.edges).contains(&(user_id.to_string(), friend_id.to_string()))
    }

    /// Number of stored edges.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.edges).len()
    }

    /// Whether no edge is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.edges).is_empty()
    }
}

#[async_trait]
impl FriendshipStore for InMemoryFriendships {
    async fn insert_if_absent(&self, user_id: &str, friend_id: &str) -> AppResult<bool> {
        Ok(lock(&self.edges).insert((user_id.to_string(), friend_id.to_string())))
    }

    async fn delete(&self, user_id: &str, friend_id: &str) -> AppResult<bool> {
        Ok(lock(&self.edges).remove(&(user_id.to_string(), friend_id.to_string())))
    }
}

/// Push gateway that records every call.
///
/// Accepted messages get the ticket id `{to}-ticket`. Receipts are only
/// returned for ids registered with [`RecordingGateway::with_receipt`].
#[derive(Debug, Default)]
pub struct RecordingGateway {
    sends: Mutex<Vec<Vec<PushMessage>>>,
    receipt_requests: Mutex<Vec<Vec<String>>>,
    rejected: HashMap<String, String>,
    failing_chunks: HashSet<usize>,
    receipts: HashMap<String, DeliveryReceipt>,
    failing_receipts: bool,
    send_delay: Option<Duration>,
}

impl RecordingGateway {
    /// Answer messages to `token` with an error ticket carrying `code`.
    #[must_use]
    pub fn rejecting(mut self, token: &str, code: &str) -> Self {
        self.rejected.insert(token.to_string(), code.to_string());
        self
    }

    /// Fail the send call with this zero-based index.
    #[must_use]
    pub fn failing_chunk(mut self, index: usize) -> Self {
        self.failing_chunks.insert(index);
        self
    }

    /// Resolve ticket `id` to `receipt`.
    #[must_use]
    pub fn with_receipt(mut self, id: &str, receipt: DeliveryReceipt) -> Self {
        self.receipts.insert(id.to_string(), receipt);
        self
    }

    /// Fail every receipt lookup.
    #[must_use]
    pub fn failing_receipts(mut self) -> Self {
        self.failing_receipts = true;
        self
    }

    /// Sleep this long inside every send call.
    #[must_use]
    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = Some(delay);
        self
    }

    /// Chunks passed to `send`, in call order.
    #[must_use]
    pub fn send_calls(&self) -> Vec<Vec<PushMessage>> {
        lock(&self.sends).clone()
    }

    /// Id batches passed to `get_receipts`, in call order.
    #[must_use]
    pub fn receipt_calls(&self) -> Vec<Vec<String>> {
        lock(&self.receipt_requests).clone()
    }
}

#[async_trait]
impl PushGateway for RecordingGateway {
    async fn send(&self, messages: &[PushMessage]) -> AppResult<Vec<DeliveryTicket>> {
        let index = {
            let mut sends = lock(&self.sends);
            sends.push(messages.to_vec());
            sends.len() - 1
        };

        if let Some(delay) = self.send_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_chunks.contains(&index) {
            return Err(AppError::Gateway(format!("chunk {index} rejected")));
        }

        Ok(messages
            .iter()
            .map(|m| match self.rejected.get(&m.to) {
                Some(code) => DeliveryTicket::error(format!("{} rejected", m.to), code),
                None => DeliveryTicket::ok(format!("{}-ticket", m.to)),
            })
            .collect())
    }

    async fn get_receipts(&self, ids: &[String]) -> AppResult<HashMap<String, DeliveryReceipt>> {
        lock(&self.receipt_requests).push(ids.to_vec());

        if self.failing_receipts {
            return Err(AppError::Gateway("receipt lookup failed".to_string()));
        }

        Ok(ids
            .iter()
            .filter_map(|id| self.receipts.get(id).map(|r| (id.clone(), r.clone())))
            .collect())
    }
}
