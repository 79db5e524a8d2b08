//! Redis Pub/Sub change listener.
//!
//! Subscribes to the changes channel and routes every decoded event on its
//! own tracked task, so a slow handler never holds up the next event.

use std::sync::Arc;

use async_trait::async_trait;
use barrio_common::{AppError, AppResult, config::RedisConfig};
use barrio_core::{ChangeEvent, TriggerRouter};
use fred::clients::SubscriberClient;
use fred::interfaces::{ClientLike, EventInterface, PubsubInterface};
use fred::types::config::Config as FredConfig;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::tasks::EventTasks;

/// Receives decoded change events.
#[async_trait]
pub trait ChangeHandler: Send + Sync {
    /// Handle one event. Implementations log their own failures.
    async fn on_change(&self, event: ChangeEvent);
}

#[async_trait]
impl ChangeHandler for TriggerRouter {
    async fn on_change(&self, event: ChangeEvent) {
        self.route(event).await;
    }
}

/// Decode a Pub/Sub payload into a change event.
pub fn decode_change(payload: &str) -> AppResult<ChangeEvent> {
    Ok(serde_json::from_str(payload)?)
}

/// Decode `payload` and hand it to `handler` on a task tracked by `tasks`.
///
/// Returns whether a task was started. Undecodable payloads are logged and
/// dropped.
pub fn dispatch_payload(
    handler: &Arc<dyn ChangeHandler>,
    tasks: &EventTasks,
    payload: &str,
) -> bool {
    match decode_change(payload) {
        Ok(event) => {
            debug!(path = %event.path, kind = ?event.kind, "Received change event");
            let handler = handler.clone();
            tasks.spawn(async move { handler.on_change(event).await })
        }
        Err(e) => {
            warn!(error = %e, "Failed to parse change event");
            false
        }
    }
}

/// Listens for change events on a Redis channel.
#[derive(Clone)]
pub struct ChangeListener {
    subscriber: SubscriberClient,
    channel: String,
    handler: Arc<dyn ChangeHandler>,
    tasks: EventTasks,
}

impl ChangeListener {
    /// Connect to Redis. Events are spawned onto `tasks`.
    pub async fn connect(
        config: &RedisConfig,
        handler: Arc<dyn ChangeHandler>,
        tasks: EventTasks,
    ) -> AppResult<Self> {
        let redis_config = FredConfig::from_url(&config.url).map_err(redis_error)?;
        let subscriber = SubscriberClient::new(redis_config, None, None, None);
        subscriber.init().await.map_err(redis_error)?;

        info!(channel = %config.changes_channel, "Redis change listener connected");

        Ok(Self {
            subscriber,
            channel: config.changes_channel.clone(),
            handler,
            tasks,
        })
    }

    /// Subscribe to the changes channel and start the receive loop.
    ///
    /// The returned task ends when the connection's message stream closes.
    pub async fn start(&self) -> AppResult<JoinHandle<()>> {
        let mut messages = self.subscriber.message_rx();
        self.subscriber
            .subscribe(self.channel.as_str())
            .await
            .map_err(redis_error)?;

        info!(channel = %self.channel, "Subscribed to change events");

        let handler = self.handler.clone();
        let tasks = self.tasks.clone();
        Ok(tokio::spawn(async move {
            loop {
                match messages.recv().await {
                    Ok(message) => match message.value.as_string() {
                        Some(payload) => {
                            dispatch_payload(&handler, &tasks, &payload);
                        }
                        None => warn!("Ignoring non-text change message"),
                    },
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "Change listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Change event stream ended");
                        break;
                    }
                }
            }
        }))
    }

    /// Close the subscriber connection.
    pub async fn shutdown(&self) -> AppResult<()> {
        self.subscriber.quit().await.map_err(redis_error)?;
        info!("Redis change listener shut down");
        Ok(())
    }
}

fn redis_error(err: fred::error::Error) -> AppError {
    AppError::Redis(err.to_string())
}
