use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timestamp;

/// Title every conversation carries until it is renamed or auto-titled.
pub const DEFAULT_TITLE: &str = "New conversation";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(rename = "user_id")]
    owner: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default, with = "timestamp::optional")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp::optional")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

impl Conversation {
    pub fn new(
        id: impl Into<String>,
        owner: impl Into<String>,
        title: impl Into<String>,
        created_at: Option<DateTime<Utc>>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: id.into(),
            owner: owner.into(),
            title: title.into(),
            created_at,
            updated_at,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_TITLE
    }

    /// Recency key; a missing `updated_at` sorts as the oldest possible.
    pub fn recency(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Stable sort, most recently touched first. Ties keep their input order.
pub fn sort_by_recency(conversations: &mut [Conversation]) {
    conversations.sort_by(|a, b| b.recency().cmp(&a.recency()));
}
