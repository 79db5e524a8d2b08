//! Notification strings and locale resolution.

use serde::{Deserialize, Serialize};

/// Locales with a translation table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Es,
    En,
}

/// Strings for one locale. `{name}` and `{city}` are substituted by [`render`].
#[derive(Debug)]
pub struct Strings {
    pub message_title: &'static str,
    pub message_fallback_body: &'static str,
    pub post_title: &'static str,
    pub post_body: &'static str,
    pub like_title: &'static str,
    pub like_body: &'static str,
    pub someone: &'static str,
}

static ES: Strings = Strings {
    message_title: "💬 Nuevo mensaje",
    message_fallback_body: "{name} te envió un mensaje",
    post_title: "📍 Nueva publicación en {city}",
    post_body: "{name} publicó algo cerca de ti",
    like_title: "❤️ Nuevo me gusta",
    like_body: "A {name} le gustó tu publicación",
    someone: "Alguien",
};

static EN: Strings = Strings {
    message_title: "💬 New message",
    message_fallback_body: "{name} sent a message",
    post_title: "📍 New post in {city}",
    post_body: "{name} posted something near you",
    like_title: "❤️ New like",
    like_body: "{name} liked your post",
    someone: "Someone",
};

impl Locale {
    /// Parse a language tag, matching on the primary subtag only.
    ///
    /// `"es"`, `"ES"`, `"es-PE"` and `"es_419"` all map to [`Locale::Es`].
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        let primary = tag.trim().split(['-', '_']).next().unwrap_or_default();
        match primary.to_ascii_lowercase().as_str() {
            "es" => Some(Self::Es),
            "en" => Some(Self::En),
            _ => None,
        }
    }

    /// Resolve a stored preference, falling back to `default`.
    #[must_use]
    pub fn resolve(preference: Option<&str>, default: Self) -> Self {
        preference.and_then(Self::parse).unwrap_or(default)
    }

    /// The translation table for this locale.
    #[must_use]
    pub const fn strings(self) -> &'static Strings {
        match self {
            Self::Es => &ES,
            Self::En => &EN,
        }
    }
}

/// Substitute `{key}` placeholders in `template`.
#[must_use]
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}
