//! Redis integration tests.
//!
//! These tests require a running Redis instance.
//! Run with: `cargo test --test redis_integration -- --ignored`
//!
//! Set `REDIS_URL` environment variable to point to your Redis instance.
//! Default: <redis://localhost:6379>

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use barrio_common::Metrics;
use barrio_common::config::{PushConfig, RedisConfig};
use barrio_core::test_utils::{InMemoryDirectory, InMemoryFriendships, RecordingGateway};
use barrio_core::{
    FriendshipService, Locale, MessageBuilder, PushDispatcher, RecipientResolver, TriggerRouter,
};
use barrio_listener::{ChangeListener, EventTasks};
use fred::clients::Client;
use fred::interfaces::{ClientLike, PubsubInterface};
use fred::types::config::Config as FredConfig;

fn redis_config(channel: &str) -> RedisConfig {
    RedisConfig {
        url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string()),
        changes_channel: channel.to_string(),
    }
}

#[tokio::test]
#[ignore = "requires running Redis instance"]
async fn test_published_message_is_routed() {
    let config = redis_config("barrio:changes:test");
    let gateway = Arc::new(RecordingGateway::default());
    let directory = InMemoryDirectory::default().with_user(
        "u2",
        Some("Beto"),
        Some("ExpoPushToken[b]"),
        Some("es"),
        None,
    );
    let metrics = Arc::new(Metrics::new());
    let router = TriggerRouter::new(
        RecipientResolver::new(Arc::new(directory), MessageBuilder::default(), Locale::Es),
        PushDispatcher::new(gateway.clone(), &PushConfig::default(), metrics.clone()),
        FriendshipService::new(Arc::new(InMemoryFriendships::default())),
        metrics,
    );

    let tasks = EventTasks::new();
    let listener = ChangeListener::connect(&config, Arc::new(router), tasks.clone())
        .await
        .expect("Failed to connect to Redis");
    listener.start().await.expect("Failed to subscribe");

    let publisher = Client::new(FredConfig::from_url(&config.url).unwrap(), None, None, None);
    publisher.init().await.unwrap();
    let _: i64 = publisher
        .publish(
            config.changes_channel.as_str(),
            r#"{"kind":"created","path":"chats/c1/messages/m1","after":{"receiverId":"u2","text":"hola"}}"#,
        )
        .await
        .unwrap();

    let mut sent = Vec::new();
    for _ in 0..50 {
        sent = gateway.send_calls();
        if !sent.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0][0].body, "hola");

    publisher.quit().await.unwrap();
    listener.shutdown().await.unwrap();
    assert_eq!(tasks.drain(Duration::from_secs(5)).await, 0);
}

#[tokio::test]
async fn test_invalid_url_rejected() {
    let config = RedisConfig {
        url: "not-a-redis-url".to_string(),
        changes_channel: "barrio:changes".to_string(),
    };

    let result = ChangeListener::connect(&config, Arc::new(NoopHandler), EventTasks::new()).await;
    assert!(matches!(result, Err(barrio_common::AppError::Redis(_))));
}

struct NoopHandler;

#[async_trait::async_trait]
impl barrio_listener::ChangeHandler for NoopHandler {
    async fn on_change(&self, _event: barrio_core::ChangeEvent) {}
}
