use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Conversation, HistoryMessage};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request rejected (HTTP {status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<anyhow::Error> for BackendError {
    fn from(err: anyhow::Error) -> Self {
        BackendError::Storage(format!("{:#}", err))
    }
}

/// Outcome of asking the backend to title a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedTitle {
    pub generated: bool,
    pub title: String,
    /// Set when the backend fell back to truncating the seed message.
    #[serde(default)]
    pub fallback: bool,
}

// --- Wire envelopes ---

#[derive(Debug, Deserialize)]
pub(crate) struct ListResponse {
    #[serde(default)]
    pub conversations: Vec<Conversation>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateResponse {
    pub conversation: Conversation,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryResponse {
    #[serde(default)]
    pub messages: Vec<HistoryMessage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BatchDeleteResponse {
    #[serde(default)]
    pub deleted_count: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    pub detail: Option<serde_json::Value>,
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TitleBody<'a> {
    pub title: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BatchDeleteBody<'a> {
    pub conversation_ids: &'a [String],
}

#[derive(Debug, Serialize)]
pub(crate) struct GenerateTitleBody<'a> {
    pub message: &'a str,
}
