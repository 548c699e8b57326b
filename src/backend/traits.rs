use async_trait::async_trait;

use super::types::{BackendError, GeneratedTitle};
use crate::models::{Conversation, HistoryMessage};

/// Conversation operations offered by the backend.
///
/// Implementations are bound to one principal when constructed; no method
/// takes a principal identifier.
#[async_trait]
pub trait ConversationBackend: Send + Sync {
    async fn list_conversations(&self) -> Result<Vec<Conversation>, BackendError>;

    async fn create_conversation(&self, title: Option<&str>)
        -> Result<Conversation, BackendError>;

    async fn update_title(&self, id: &str, title: &str) -> Result<(), BackendError>;

    async fn delete_conversation(&self, id: &str) -> Result<(), BackendError>;

    /// Returns how many conversations were actually removed.
    async fn delete_conversations(&self, ids: &[String]) -> Result<u64, BackendError>;

    async fn touch_conversation(&self, id: &str) -> Result<(), BackendError>;

    async fn generate_title(&self, id: &str, message: &str)
        -> Result<GeneratedTitle, BackendError>;

    async fn history(&self, id: &str) -> Result<Vec<HistoryMessage>, BackendError>;
}
