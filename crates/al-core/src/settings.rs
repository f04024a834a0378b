//! Engine settings. Loaded by the `configs` crate; defaults match the hosted feed.

use std::time::Duration;

pub const MAX_TAG_LENGTH: usize = 32;
pub const MAX_TITLE_LENGTH: usize = 120;
pub const MAX_CONTENT_LENGTH: usize = 2000;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(15);

/// Length bounds, measured in chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_tag_length: usize,
    pub max_title_length: usize,
    pub max_content_length: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_tag_length: MAX_TAG_LENGTH,
            max_title_length: MAX_TITLE_LENGTH,
            max_content_length: MAX_CONTENT_LENGTH,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// Minimum interval between successful sends.
    pub cooldown: Duration,
    pub limits: Limits,
    pub popular_tags_limit: usize,
    pub messages_collection: String,
    pub bans_collection: String,
    /// Exact-match allow-list of verified admin emails.
    pub admin_emails: Vec<String>,
    /// Salt for locally derived fallback display names.
    pub name_salt: String,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            cooldown: DEFAULT_COOLDOWN,
            limits: Limits::default(),
            popular_tags_limit: 30,
            messages_collection: "messages".to_string(),
            bans_collection: "bans".to_string(),
            admin_emails: Vec::new(),
            name_salt: String::new(),
        }
    }
}
