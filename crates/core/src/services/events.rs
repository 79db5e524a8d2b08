//! Change events and the typed triggers derived from them.

use barrio_common::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What happened to the document at `path`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// A document change as delivered by the data store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    /// Slash-separated document path, e.g. `posts/p1`.
    pub path: String,
    /// Document before the change. Absent on creation.
    #[serde(default)]
    pub before: Option<Value>,
    /// Document after the change. Absent on deletion.
    #[serde(default)]
    pub after: Option<Value>,
}

impl ChangeEvent {
    /// Build a `created` event.
    #[must_use]
    pub fn created(path: impl Into<String>, after: Value) -> Self {
        Self {
            kind: ChangeKind::Created,
            path: path.into(),
            before: None,
            after: Some(after),
        }
    }

    /// Build an `updated` event.
    #[must_use]
    pub fn updated(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self {
            kind: ChangeKind::Updated,
            path: path.into(),
            before: Some(before),
            after: Some(after),
        }
    }

    /// Build a `deleted` event.
    #[must_use]
    pub fn deleted(path: impl Into<String>, before: Option<Value>) -> Self {
        Self {
            kind: ChangeKind::Deleted,
            path: path.into(),
            before,
            after: None,
        }
    }
}

/// A change event the pipeline has a handler for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerEvent {
    /// A chat message was written.
    MessageCreated {
        conversation_id: String,
        receiver_id: String,
        sender_name: Option<String>,
        text: Option<String>,
    },
    /// A post was published.
    PostCreated {
        post_id: String,
        city: String,
        author_id: String,
        author_name: Option<String>,
    },
    /// A post changed; only its like list matters.
    PostUpdated {
        post_id: String,
        owner_id: String,
        before_liked_by: Vec<String>,
        after_liked_by: Vec<String>,
    },
    /// `user_id` added `friend_id`.
    FriendAdded { user_id: String, friend_id: String },
    /// `user_id` removed `friend_id`.
    FriendRemoved { user_id: String, friend_id: String },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageDoc {
    receiver_id: Option<String>,
    sender_name: Option<String>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostAuthor {
    uid: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostDoc {
    city: Option<String>,
    user: Option<PostAuthor>,
    liked_by: Option<Vec<String>>,
}

impl TriggerEvent {
    /// Short name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::MessageCreated { .. } => "message_created",
            Self::PostCreated { .. } => "post_created",
            Self::PostUpdated { .. } => "post_updated",
            Self::FriendAdded { .. } => "friend_added",
            Self::FriendRemoved { .. } => "friend_removed",
        }
    }

    /// Route a change event to its trigger.
    ///
    /// Returns `Ok(None)` for paths and kinds nothing listens to, and
    /// [`AppError::MalformedEvent`] when a routed document lacks a field its
    /// handler needs.
    pub fn from_change(event: &ChangeEvent) -> AppResult<Option<Self>> {
        let segments: Vec<&str> = event.path.trim_matches('/').split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Ok(None);
        }

        match (segments.as_slice(), event.kind) {
            (["chats", conversation_id, "messages", _], ChangeKind::Created) => {
                let doc: MessageDoc = document(event.after.as_ref(), "after")?;
                Ok(Some(Self::MessageCreated {
                    conversation_id: (*conversation_id).to_string(),
                    receiver_id: required(doc.receiver_id, "receiverId")?,
                    sender_name: doc.sender_name,
                    text: doc.text,
                }))
            }
            (["posts", post_id], ChangeKind::Created) => {
                let doc: PostDoc = document(event.after.as_ref(), "after")?;
                let author = doc
                    .user
                    .ok_or_else(|| AppError::MalformedEvent("missing field `user`".to_string()))?;
                Ok(Some(Self::PostCreated {
                    post_id: (*post_id).to_string(),
                    city: required(doc.city, "city")?,
                    author_id: required(author.uid, "user.uid")?,
                    author_name: author.name,
                }))
            }
            (["posts", post_id], ChangeKind::Updated) => {
                let before: PostDoc = document(event.before.as_ref(), "before")?;
                let after: PostDoc = document(event.after.as_ref(), "after")?;
                let owner = after
                    .user
                    .ok_or_else(|| AppError::MalformedEvent("missing field `user`".to_string()))?;
                Ok(Some(Self::PostUpdated {
                    post_id: (*post_id).to_string(),
                    owner_id: required(owner.uid, "user.uid")?,
                    before_liked_by: before.liked_by.unwrap_or_default(),
                    after_liked_by: after.liked_by.unwrap_or_default(),
                }))
            }
            (["users", user_id, "friends", friend_id], ChangeKind::Created) => {
                Ok(Some(Self::FriendAdded {
                    user_id: (*user_id).to_string(),
                    friend_id: (*friend_id).to_string(),
                }))
            }
            (["users", user_id, "friends", friend_id], ChangeKind::Deleted) => {
                Ok(Some(Self::FriendRemoved {
                    user_id: (*user_id).to_string(),
                    friend_id: (*friend_id).to_string(),
                }))
            }
            _ => Ok(None),
        }
    }
}

fn document<T: for<'de> Deserialize<'de>>(value: Option<&Value>, side: &str) -> AppResult<T> {
    let value = value.ok_or_else(|| AppError::MalformedEvent(format!("missing `{side}` document")))?;
    Ok(T::deserialize(value)?)
}

fn required(value: Option<String>, field: &str) -> AppResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::MalformedEvent(format!("missing field `{field}`"))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_change_event_wire_format() {
        let event: ChangeEvent = serde_json::from_value(json!({
            "kind": "created",
            "path": "posts/p1",
            "after": {"city": "Lima"}
        }))
        .unwrap();

        assert_eq!(event.kind, ChangeKind::Created);
        assert!(event.before.is_none());
        assert_eq!(event.after.unwrap()["city"], "Lima");
    }

    #[test]
    fn test_message_created() {
        let event = ChangeEvent::created(
            "chats/c1/messages/m1",
            json!({"receiverId": "u2", "senderName": "Ana", "text": "hi"}),
        );

        let trigger = TriggerEvent::from_change(&event).unwrap().unwrap();
        assert_eq!(
            trigger,
            TriggerEvent::MessageCreated {
                conversation_id: "c1".to_string(),
                receiver_id: "u2".to_string(),
                sender_name: Some("Ana".to_string()),
                text: Some("hi".to_string()),
            }
        );
        assert_eq!(trigger.name(), "message_created");
    }

    #[test]
    fn test_message_without_receiver_is_malformed() {
        let event = ChangeEvent::created("chats/c1/messages/m1", json!({"text": "hi"}));
        let result = TriggerEvent::from_change(&event);
        assert!(matches!(result, Err(AppError::MalformedEvent(_))));

        let event = ChangeEvent {
            kind: ChangeKind::Created,
            path: "chats/c1/messages/m1".to_string(),
            before: None,
            after: None,
        };
        assert!(matches!(
            TriggerEvent::from_change(&event),
            Err(AppError::MalformedEvent(_))
        ));
    }

    #[test]
    fn test_post_created() {
        let event = ChangeEvent::created(
            "posts/p1",
            json!({"city": "Lima", "user": {"uid": "u1", "name": "Luis"}}),
        );

        let trigger = TriggerEvent::from_change(&event).unwrap().unwrap();
        assert_eq!(
            trigger,
            TriggerEvent::PostCreated {
                post_id: "p1".to_string(),
                city: "Lima".to_string(),
                author_id: "u1".to_string(),
                author_name: Some("Luis".to_string()),
            }
        );
    }

    #[test]
    fn test_post_without_city_is_malformed() {
        let event = ChangeEvent::created("posts/p1", json!({"user": {"uid": "u1"}}));
        assert!(matches!(
            TriggerEvent::from_change(&event),
            Err(AppError::MalformedEvent(_))
        ));

        let event = ChangeEvent::created("posts/p1", json!({"city": "Lima"}));
        assert!(matches!(
            TriggerEvent::from_change(&event),
            Err(AppError::MalformedEvent(_))
        ));
    }

    #[test]
    fn test_post_updated() {
        let event = ChangeEvent::updated(
            "posts/p1",
            json!({"user": {"uid": "a"}, "likedBy": ["a", "b"]}),
            json!({"user": {"uid": "a"}, "likedBy": ["a", "b", "c", "d"]}),
        );

        let trigger = TriggerEvent::from_change(&event).unwrap().unwrap();
        assert_eq!(
            trigger,
            TriggerEvent::PostUpdated {
                post_id: "p1".to_string(),
                owner_id: "a".to_string(),
                before_liked_by: vec!["a".to_string(), "b".to_string()],
                after_liked_by: vec![
                    "a".to_string(),
                    "b".to_string(),
                    "c".to_string(),
                    "d".to_string()
                ],
            }
        );
    }

    #[test]
    fn test_post_updated_missing_likes_defaults_empty() {
        let event = ChangeEvent::updated(
            "posts/p1",
            json!({"user": {"uid": "a"}, "likedBy": null}),
            json!({"user": {"uid": "a"}}),
        );

        match TriggerEvent::from_change(&event).unwrap().unwrap() {
            TriggerEvent::PostUpdated {
                before_liked_by,
                after_liked_by,
                ..
            } => {
                assert!(before_liked_by.is_empty());
                assert!(after_liked_by.is_empty());
            }
            other => panic!("unexpected trigger {other:?}"),
        }
    }

    #[test]
    fn test_bad_like_list_is_malformed() {
        let event = ChangeEvent::updated(
            "posts/p1",
            json!({"user": {"uid": "a"}, "likedBy": []}),
            json!({"user": {"uid": "a"}, "likedBy": "c"}),
        );
        assert!(matches!(
            TriggerEvent::from_change(&event),
            Err(AppError::MalformedEvent(_))
        ));
    }

    #[test]
    fn test_friend_edges() {
        let added = ChangeEvent::created("users/u1/friends/u2", json!({}));
        assert_eq!(
            TriggerEvent::from_change(&added).unwrap(),
            Some(TriggerEvent::FriendAdded {
                user_id: "u1".to_string(),
                friend_id: "u2".to_string(),
            })
        );

        let removed = ChangeEvent::deleted("users/u1/friends/u2", None);
        assert_eq!(
            TriggerEvent::from_change(&removed).unwrap(),
            Some(TriggerEvent::FriendRemoved {
                user_id: "u1".to_string(),
                friend_id: "u2".to_string(),
            })
        );
    }

    #[test]
    fn test_unrouted_events_ignored() {
        let cases = [
            ChangeEvent::deleted("posts/p1", None),
            ChangeEvent::updated("chats/c1/messages/m1", json!({}), json!({})),
            ChangeEvent::created("reports/r1", json!({})),
            ChangeEvent::created("posts/p1/comments/k1", json!({})),
            ChangeEvent::updated("users/u1/friends/u2", json!({}), json!({})),
            ChangeEvent::created("posts//", json!({})),
            ChangeEvent::created("", json!({})),
        ];

        for event in &cases {
            assert_eq!(TriggerEvent::from_change(event).unwrap(), None, "{}", event.path);
        }
    }
}
