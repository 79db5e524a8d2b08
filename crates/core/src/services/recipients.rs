//! Recipient resolution.
//!
//! Turns a trigger into the push messages it should produce. Recipients
//! without a push token, or with one the gateway would reject, are dropped
//! here and counted so they never reach the dispatcher.

use std::collections::HashSet;

use barrio_common::AppResult;
use tracing::{debug, warn};

use crate::services::directory::{UserDirectoryService, UserRecord};
use crate::services::locale::Locale;
use crate::services::message::{MessageBuilder, PushMessage, is_valid_push_token};

/// A user that will receive a push message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRecipient {
    pub user_id: String,
    pub push_token: String,
    pub locale: Locale,
}

/// Messages built for a trigger, plus how many recipients were dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub messages: Vec<PushMessage>,
    pub skipped: usize,
}

impl Resolution {
    fn skip(&mut self, user_id: &str, reason: &'static str) {
        debug!(user_id = %user_id, reason, "Skipping recipient");
        self.skipped += 1;
    }
}

/// Resolves recipients through the user directory and builds their messages.
#[derive(Clone)]
pub struct RecipientResolver {
    directory: UserDirectoryService,
    builder: MessageBuilder,
    default_locale: Locale,
}

impl RecipientResolver {
    /// Create a new resolver.
    #[must_use]
    pub const fn new(
        directory: UserDirectoryService,
        builder: MessageBuilder,
        default_locale: Locale,
    ) -> Self {
        Self {
            directory,
            builder,
            default_locale,
        }
    }

    /// Turn a directory record into a recipient, if it has a usable token.
    #[must_use]
    pub fn recipient(&self, user: &UserRecord) -> Option<NotificationRecipient> {
        let token = user.push_token.as_deref()?;
        if !is_valid_push_token(token) {
            return None;
        }
        Some(NotificationRecipient {
            user_id: user.id.clone(),
            push_token: token.to_string(),
            locale: Locale::resolve(user.language.as_deref(), self.default_locale),
        })
    }

    /// One message to the receiver of a chat message.
    pub async fn for_new_message(
        &self,
        receiver_id: &str,
        sender_name: Option<&str>,
        text: Option<&str>,
        conversation_id: &str,
    ) -> AppResult<Resolution> {
        let mut resolution = Resolution::default();

        let Some(user) = self.directory.find_user(receiver_id).await? else {
            resolution.skip(receiver_id, "unknown user");
            return Ok(resolution);
        };
        let Some(recipient) = self.recipient(&user) else {
            resolution.skip(receiver_id, "missing or invalid push token");
            return Ok(resolution);
        };

        resolution.messages.push(self.builder.chat_message(
            &recipient.push_token,
            recipient.locale,
            sender_name,
            text,
            conversation_id,
        ));
        Ok(resolution)
    }

    /// One message to every user last seen in `city`, except the author.
    pub async fn for_new_post(
        &self,
        city: &str,
        author_id: &str,
        author_name: Option<&str>,
        post_id: &str,
    ) -> AppResult<Resolution> {
        let mut resolution = Resolution::default();

        for user in self.directory.all_users().await? {
            if user.id == author_id {
                continue;
            }
            match user.last_known_location_label.as_deref() {
                Some(label) if same_place(label, city) => {}
                _ => continue,
            }
            let Some(recipient) = self.recipient(&user) else {
                resolution.skip(&user.id, "missing or invalid push token");
                continue;
            };

            resolution.messages.push(self.builder.nearby_post(
                &recipient.push_token,
                recipient.locale,
                author_name,
                city.trim(),
                post_id,
            ));
        }

        Ok(resolution)
    }

    /// One message to the post owner per new liker other than the owner.
    pub async fn for_new_likes(
        &self,
        owner_id: &str,
        before_liked_by: &[String],
        after_liked_by: &[String],
        post_id: &str,
    ) -> AppResult<Resolution> {
        let mut resolution = Resolution::default();

        let likers: Vec<&str> = new_likers(before_liked_by, after_liked_by)
            .into_iter()
            .filter(|liker| *liker != owner_id)
            .collect();
        if likers.is_empty() {
            return Ok(resolution);
        }

        let owner = self.directory.find_user(owner_id).await?;
        let Some(recipient) = owner.as_ref().and_then(|o| self.recipient(o)) else {
            debug!(
                owner_id = %owner_id,
                likers = likers.len(),
                "Post owner has no usable push token"
            );
            resolution.skipped += likers.len();
            return Ok(resolution);
        };

        for liker in likers {
            // The name only decorates the body; a failed lookup falls back to "Someone".
            let name = match self.directory.find_user(liker).await {
                Ok(user) => user.and_then(|user| user.name),
                Err(e) => {
                    warn!(liker_id = %liker, error = %e, "Failed to look up liker name");
                    None
                }
            };
            resolution.messages.push(self.builder.post_liked(
                &recipient.push_token,
                recipient.locale,
                name.as_deref(),
                post_id,
            ));
        }

        Ok(resolution)
    }
}

/// Users present in `after` but not in `before`.
///
/// Duplicates collapse; the result follows first appearance in `after`.
#[must_use]
pub fn new_likers<'a>(before: &[String], after: &'a [String]) -> Vec<&'a str> {
    let before: HashSet<&str> = before.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    after
        .iter()
        .map(String::as_str)
        .filter(|id| !before.contains(id) && seen.insert(*id))
        .collect()
}

/// Location labels match ignoring case and surrounding whitespace.
#[must_use]
pub fn same_place(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    !a.is_empty() && a.to_lowercase() == b.to_lowercase()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::InMemoryDirectory;
    use std::sync::Arc;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| (*s).to_string()).collect()
    }

    fn resolver(directory: InMemoryDirectory) -> RecipientResolver {
        RecipientResolver::new(Arc::new(directory), MessageBuilder::default(), Locale::Es)
    }

    #[test]
    fn test_new_likers_set_difference() {
        let before = ids(&["a", "b"]);
        let after = ids(&["a", "b", "c", "d"]);
        assert_eq!(new_likers(&before, &after), vec!["c", "d"]);
    }

    #[test]
    fn test_new_likers_collapses_duplicates_and_ignores_order() {
        let before = ids(&["b", "a"]);
        let after = ids(&["d", "a", "c", "d", "b", "c"]);
        assert_eq!(new_likers(&before, &after), vec!["d", "c"]);

        assert!(new_likers(&ids(&["a", "b"]), &ids(&["b"])).is_empty());
        assert_eq!(new_likers(&[], &ids(&["x"])), vec!["x"]);
    }

    #[test]
    fn test_same_place() {
        assert!(same_place("Lima", "lima"));
        assert!(same_place(" LIMA ", "Lima"));
        assert!(!same_place("Lima", "Cusco"));
        assert!(!same_place("", ""));
        assert!(!same_place("  ", "  "));
    }

    #[test]
    fn test_recipient_requires_valid_token() {
        let resolver = resolver(InMemoryDirectory::default());

        let mut user = UserRecord {
            id: "u1".to_string(),
            push_token: Some("ExpoPushToken[a]".to_string()),
            language: Some("en-GB".to_string()),
            ..Default::default()
        };
        let recipient = resolver.recipient(&user).unwrap();
        assert_eq!(recipient.locale, Locale::En);

        user.push_token = Some("not-a-token".to_string());
        assert!(resolver.recipient(&user).is_none());

        user.push_token = None;
        assert!(resolver.recipient(&user).is_none());
    }

    #[tokio::test]
    async fn test_new_message_to_receiver() {
        let directory = InMemoryDirectory::default()
            .with_user("u2", Some("Beto"), Some("ExpoPushToken[b]"), Some("es"), None);
        let resolution = resolver(directory)
            .for_new_message("u2", Some("Ana"), Some("hi"), "c1")
            .await
            .unwrap();

        assert_eq!(resolution.skipped, 0);
        assert_eq!(resolution.messages.len(), 1);
        assert_eq!(resolution.messages[0].to, "ExpoPushToken[b]");
        assert_eq!(resolution.messages[0].body, "hi");
    }

    #[tokio::test]
    async fn test_new_message_unknown_or_tokenless_receiver_skipped() {
        let directory = InMemoryDirectory::default()
            .with_user("u2", None, None, None, None)
            .with_user("u3", None, Some("garbage"), None, None);
        let resolver = resolver(directory);

        for receiver in ["u2", "u3", "ghost"] {
            let resolution = resolver
                .for_new_message(receiver, Some("Ana"), Some("hi"), "c1")
                .await
                .unwrap();
            assert!(resolution.messages.is_empty());
            assert_eq!(resolution.skipped, 1);
        }
    }

    #[tokio::test]
    async fn test_new_post_matches_city_and_excludes_author() {
        let directory = InMemoryDirectory::default()
            .with_user("author", Some("Luis"), Some("ExpoPushToken[au]"), None, Some("Lima"))
            .with_user("u1", None, Some("ExpoPushToken[1]"), Some("en"), Some("lima "))
            .with_user("u2", None, Some("ExpoPushToken[2]"), None, Some("Cusco"))
            .with_user("u3", None, Some("bad"), None, Some("LIMA"))
            .with_user("u4", None, Some("ExpoPushToken[4]"), None, None);

        let resolution = resolver(directory)
            .for_new_post("Lima", "author", Some("Luis"), "p1")
            .await
            .unwrap();

        assert_eq!(resolution.messages.len(), 1);
        assert_eq!(resolution.skipped, 1);
        let msg = &resolution.messages[0];
        assert_eq!(msg.to, "ExpoPushToken[1]");
        assert_eq!(msg.title, "📍 New post in Lima");
        assert_eq!(msg.data.deep_link, "app://post/p1");
    }

    #[tokio::test]
    async fn test_likes_exclude_owner() {
        let directory = InMemoryDirectory::default()
            .with_user("a", Some("Ana"), Some("ExpoPushToken[a]"), Some("en"), None)
            .with_user("c", Some("Carla"), Some("ExpoPushToken[c]"), None, None);

        let resolution = resolver(directory)
            .for_new_likes("c", &ids(&["a", "b"]), &ids(&["a", "b", "c", "d"]), "p1")
            .await
            .unwrap();

        assert_eq!(resolution.messages.len(), 1);
        assert_eq!(resolution.messages[0].to, "ExpoPushToken[c]");
        assert_eq!(resolution.messages[0].body, "A Alguien le gustó tu publicación");
    }

    #[tokio::test]
    async fn test_likes_use_liker_names() {
        let directory = InMemoryDirectory::default()
            .with_user("a", Some("Ana"), Some("ExpoPushToken[a]"), Some("en"), None)
            .with_user("c", Some("Carla"), None, None, None);

        let resolution = resolver(directory)
            .for_new_likes("a", &ids(&["a", "b"]), &ids(&["a", "b", "c", "d"]), "p1")
            .await
            .unwrap();

        let bodies: Vec<&str> = resolution.messages.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["Carla liked your post", "Someone liked your post"]);
    }

    #[tokio::test]
    async fn test_liker_lookup_failure_keeps_other_likes() {
        let directory = InMemoryDirectory::default()
            .with_user("a", Some("Ana"), Some("ExpoPushToken[a]"), Some("en"), None)
            .with_user("c", Some("Carla"), None, None, None)
            .with_user("d", Some("Dani"), None, None, None)
            .failing_for("c");

        let resolution = resolver(directory)
            .for_new_likes("a", &ids(&["a"]), &ids(&["a", "c", "d"]), "p1")
            .await
            .unwrap();

        let bodies: Vec<&str> = resolution.messages.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["Someone liked your post", "Dani liked your post"]);
        assert_eq!(resolution.skipped, 0);
    }

    #[tokio::test]
    async fn test_owner_lookup_failure_is_an_error() {
        let directory = InMemoryDirectory::default()
            .with_user("a", Some("Ana"), Some("ExpoPushToken[a]"), None, None)
            .failing_for("a");

        let result = resolver(directory)
            .for_new_likes("a", &[], &ids(&["c"]), "p1")
            .await;

        assert!(matches!(result, Err(barrio_common::AppError::Database(_))));
    }

    #[tokio::test]
    async fn test_likes_owner_without_token_skips_all() {
        let directory = InMemoryDirectory::default().with_user("a", Some("Ana"), None, None, None);

        let resolution = resolver(directory)
            .for_new_likes("a", &[], &ids(&["b", "c"]), "p1")
            .await
            .unwrap();

        assert!(resolution.messages.is_empty());
        assert_eq!(resolution.skipped, 2);
    }

    #[tokio::test]
    async fn test_no_new_likes_no_lookup() {
        let resolution = resolver(InMemoryDirectory::default())
            .for_new_likes("a", &ids(&["a", "b"]), &ids(&["b", "a"]), "p1")
            .await
            .unwrap();

        assert_eq!(resolution, Resolution::default());
    }
}
