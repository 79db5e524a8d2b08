//! Change event routing.
//!
//! Every change event is handled in isolation: it is typed, handed to the
//! matching handler, and whatever happens is logged and counted. Errors stop
//! here; the event source never sees them and nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use barrio_common::{AppError, AppResult, Config, IdGenerator, Metrics};
use tracing::{Instrument, debug, error, info_span, warn};

use crate::services::directory::UserDirectoryService;
use crate::services::dispatcher::{DispatchReport, PushDispatcher};
use crate::services::events::{ChangeEvent, TriggerEvent};
use crate::services::friendship::{FriendshipService, FriendshipStoreService};
use crate::services::gateway::PushGatewayService;
use crate::services::locale::Locale;
use crate::services::message::{DeepLinks, MessageBuilder};
use crate::services::recipients::RecipientResolver;

/// Result of routing one change event.
#[derive(Debug)]
pub enum RouteOutcome {
    /// No handler listens to this path and kind.
    Ignored,
    /// Push messages were resolved and dispatched.
    Notified(DispatchReport),
    /// A friendship edge was mirrored; `true` when storage changed.
    FriendshipMirrored(bool),
    /// The handler failed. Already logged.
    Failed(AppError),
    /// The invocation deadline passed before the handler finished.
    TimedOut,
}

/// Routes change events to their handlers.
#[derive(Clone)]
pub struct TriggerRouter {
    resolver: RecipientResolver,
    dispatcher: PushDispatcher,
    friendships: FriendshipService,
    metrics: Arc<Metrics>,
    id_gen: IdGenerator,
    invocation_timeout: Option<Duration>,
}

impl TriggerRouter {
    /// Create a router from its parts.
    #[must_use]
    pub const fn new(
        resolver: RecipientResolver,
        dispatcher: PushDispatcher,
        friendships: FriendshipService,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            resolver,
            dispatcher,
            friendships,
            metrics,
            id_gen: IdGenerator::new(),
            invocation_timeout: None,
        }
    }

    /// Wire a router from configuration and the external collaborators.
    pub fn from_config(
        config: &Config,
        directory: UserDirectoryService,
        friendships: FriendshipStoreService,
        gateway: PushGatewayService,
        metrics: Arc<Metrics>,
    ) -> AppResult<Self> {
        let default_locale = Locale::parse(&config.notifications.default_locale).ok_or_else(|| {
            AppError::Config(format!(
                "unsupported notifications.default_locale: {}",
                config.notifications.default_locale
            ))
        })?;
        let builder = MessageBuilder::new(DeepLinks::new(&config.notifications.deep_link_scheme));

        Ok(Self::new(
            RecipientResolver::new(directory, builder, default_locale),
            PushDispatcher::new(gateway, &config.push, metrics.clone()),
            FriendshipService::new(friendships),
            metrics,
        )
        .with_invocation_timeout(config.push.invocation_timeout()))
    }

    /// Abandon invocations that run longer than `timeout`.
    #[must_use]
    pub fn with_invocation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.invocation_timeout = timeout;
        self
    }

    /// Route one change event. Never fails; the outcome is for logging and tests.
    pub async fn route(&self, event: ChangeEvent) -> RouteOutcome {
        let event_id = self.id_gen.generate();
        let span = info_span!("change_event", event_id = %event_id, path = %event.path, kind = ?event.kind);
        self.route_in_span(&event).instrument(span).await
    }

    async fn route_in_span(&self, event: &ChangeEvent) -> RouteOutcome {
        let trigger = match TriggerEvent::from_change(event) {
            Ok(Some(trigger)) => trigger,
            Ok(None) => {
                debug!("No handler for change event");
                self.metrics.record_event(false, false);
                return RouteOutcome::Ignored;
            }
            Err(e) => {
                warn!(error = %e, "Dropping malformed change event");
                self.metrics.record_event(true, true);
                return RouteOutcome::Failed(e);
            }
        };

        let name = trigger.name();
        debug!(trigger = name, "Handling change event");
        let handled = self.handle(trigger);
        let result = match self.invocation_timeout {
            Some(limit) => {
                if let Ok(result) = tokio::time::timeout(limit, handled).await {
                    result
                } else {
                    warn!(trigger = name, timeout_ms = limit.as_millis() as u64, "Change event handler timed out");
                    self.metrics.record_event(true, true);
                    Metrics::add(&self.metrics.events_timed_out, 1);
                    return RouteOutcome::TimedOut;
                }
            }
            None => handled.await,
        };

        match result {
            Ok(outcome) => {
                self.metrics.record_event(true, false);
                outcome
            }
            Err(e) => {
                error!(trigger = name, error = %e, "Change event handler failed");
                self.metrics.record_event(true, true);
                RouteOutcome::Failed(e)
            }
        }
    }

    /// Run the handler for an already typed trigger.
    pub async fn handle(&self, trigger: TriggerEvent) -> AppResult<RouteOutcome> {
        let resolution = match trigger {
            TriggerEvent::MessageCreated {
                conversation_id,
                receiver_id,
                sender_name,
                text,
            } => {
                self.resolver
                    .for_new_message(
                        &receiver_id,
                        sender_name.as_deref(),
                        text.as_deref(),
                        &conversation_id,
                    )
                    .await?
            }
            TriggerEvent::PostCreated {
                post_id,
                city,
                author_id,
                author_name,
            } => {
                self.resolver
                    .for_new_post(&city, &author_id, author_name.as_deref(), &post_id)
                    .await?
            }
            TriggerEvent::PostUpdated {
                post_id,
                owner_id,
                before_liked_by,
                after_liked_by,
            } => {
                self.resolver
                    .for_new_likes(&owner_id, &before_liked_by, &after_liked_by, &post_id)
                    .await?
            }
            TriggerEvent::FriendAdded { user_id, friend_id } => {
                let written = self.friendships.mirror_added(&user_id, &friend_id).await?;
                return Ok(RouteOutcome::FriendshipMirrored(written));
            }
            TriggerEvent::FriendRemoved { user_id, friend_id } => {
                let removed = self.friendships.mirror_removed(&user_id, &friend_id).await?;
                return Ok(RouteOutcome::FriendshipMirrored(removed));
            }
        };

        Ok(RouteOutcome::Notified(self.dispatcher.dispatch(resolution).await))
    }
}
