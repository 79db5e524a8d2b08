//! Push message payloads and their builder.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::services::locale::{Locale, render};

/// What a push message is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    /// New chat message
    Message,
    /// New post near the recipient
    Post,
    /// Someone liked the recipient's post
    Like,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Message => "message",
            Self::Post => "post",
            Self::Like => "like",
        };
        write!(f, "{s}")
    }
}

/// Sound played on delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushSound {
    #[default]
    Default,
}

/// Data block the client uses for routing when the notification is tapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushData {
    /// Notification kind
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Conversation or post the notification points at
    pub entity_id: String,
    /// Deep link opened by the client
    #[serde(rename = "url")]
    pub deep_link: String,
}

/// One message for one device, in the gateway's wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMessage {
    /// Destination push token
    pub to: String,
    /// Delivery sound
    pub sound: PushSound,
    /// Notification title
    pub title: String,
    /// Notification body
    pub body: String,
    /// Routing data
    pub data: PushData,
}

#[allow(clippy::expect_used)] // Pattern is a compile-time constant
static PUSH_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:Expo(?:nent)?PushToken\[.+\]|(?i:[a-z\d]{8}-[a-z\d]{4}-[a-z\d]{4}-[a-z\d]{4}-[a-z\d]{12}))$")
        .expect("push token pattern is valid")
});

/// Check a push token against the gateway's accepted formats.
///
/// Accepts `ExponentPushToken[...]`, `ExpoPushToken[...]` and bare
/// UUID-shaped device ids.
#[must_use]
pub fn is_valid_push_token(token: &str) -> bool {
    PUSH_TOKEN_RE.is_match(token)
}

/// Deep links understood by the mobile client.
#[derive(Debug, Clone)]
pub struct DeepLinks {
    scheme: String,
}

impl DeepLinks {
    /// Create deep links under `scheme` (e.g. `app`).
    #[must_use]
    pub fn new(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
        }
    }

    /// `{scheme}://chat/{conversation_id}`
    #[must_use]
    pub fn chat(&self, conversation_id: &str) -> String {
        format!("{}://chat/{conversation_id}", self.scheme)
    }

    /// `{scheme}://post/{post_id}`
    #[must_use]
    pub fn post(&self, post_id: &str) -> String {
        format!("{}://post/{post_id}", self.scheme)
    }
}

impl Default for DeepLinks {
    fn default() -> Self {
        Self::new("app")
    }
}

/// Builds localized push messages for a resolved recipient.
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    links: DeepLinks,
}

impl MessageBuilder {
    /// Create a builder producing links from `links`.
    #[must_use]
    pub const fn new(links: DeepLinks) -> Self {
        Self { links }
    }

    /// Message for a new chat message.
    ///
    /// A blank or missing `text` is replaced with the localized
    /// "{name} sent a message" template.
    #[must_use]
    pub fn chat_message(
        &self,
        to: &str,
        locale: Locale,
        sender_name: Option<&str>,
        text: Option<&str>,
        conversation_id: &str,
    ) -> PushMessage {
        let strings = locale.strings();
        let name = display_name(sender_name, locale);
        let body = match text.map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => render(strings.message_fallback_body, &[("name", name)]),
        };

        PushMessage {
            to: to.to_string(),
            sound: PushSound::Default,
            title: strings.message_title.to_string(),
            body,
            data: PushData {
                kind: NotificationKind::Message,
                entity_id: conversation_id.to_string(),
                deep_link: self.links.chat(conversation_id),
            },
        }
    }

    /// Message announcing a post in the recipient's city.
    #[must_use]
    pub fn nearby_post(
        &self,
        to: &str,
        locale: Locale,
        author_name: Option<&str>,
        city: &str,
        post_id: &str,
    ) -> PushMessage {
        let strings = locale.strings();
        let name = display_name(author_name, locale);

        PushMessage {
            to: to.to_string(),
            sound: PushSound::Default,
            title: render(strings.post_title, &[("city", city)]),
            body: render(strings.post_body, &[("name", name)]),
            data: PushData {
                kind: NotificationKind::Post,
                entity_id: post_id.to_string(),
                deep_link: self.links.post(post_id),
            },
        }
    }

    /// Message telling a post owner about a new like.
    #[must_use]
    pub fn post_liked(
        &self,
        to: &str,
        locale: Locale,
        liker_name: Option<&str>,
        post_id: &str,
    ) -> PushMessage {
        let strings = locale.strings();
        let name = display_name(liker_name, locale);

        PushMessage {
            to: to.to_string(),
            sound: PushSound::Default,
            title: strings.like_title.to_string(),
            body: render(strings.like_body, &[("name", name)]),
            data: PushData {
                kind: NotificationKind::Like,
                entity_id: post_id.to_string(),
                deep_link: self.links.post(post_id),
            },
        }
    }
}

fn display_name(name: Option<&str>, locale: Locale) -> &str {
    match name.map(str::trim) {
        Some(n) if !n.is_empty() => n,
        _ => locale.strings().someone,
    }
}
