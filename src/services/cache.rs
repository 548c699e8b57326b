use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{Duration, Utc};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backend::{BackendError, ConversationBackend};
use crate::models::{sort_by_recency, Conversation, HistoryMessage};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("Conversation cache is closed")]
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    NoneSelected,
    Selected(String),
}

impl Selection {
    pub fn id(&self) -> Option<&str> {
        match self {
            Selection::NoneSelected => None,
            Selection::Selected(id) => Some(id.as_str()),
        }
    }
}

#[derive(Debug)]
struct CacheState {
    conversations: Vec<Conversation>,
    selection: Selection,
    loading: bool,
    /// Conversations a title has already been requested for this session.
    titles_requested: HashSet<String>,
}

/// Session-scoped view of the principal's conversations.
///
/// Structural changes (create, rename, delete) go to the backend first and
/// are followed by a full [`refresh`](Self::refresh). Only `touch` and
/// `generate_title` edit the cached list in place. State lives behind a
/// mutex that is never held across an await.
pub struct ConversationCache {
    backend: Arc<dyn ConversationBackend>,
    state: Mutex<CacheState>,
    closed: CancellationToken,
}

impl ConversationCache {
    pub fn new(backend: Arc<dyn ConversationBackend>) -> Self {
        Self {
            backend,
            state: Mutex::new(CacheState {
                conversations: Vec::new(),
                selection: Selection::NoneSelected,
                loading: true,
                titles_requested: HashSet::new(),
            }),
            closed: CancellationToken::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_open(&self) -> Result<(), CacheError> {
        if self.closed.is_cancelled() {
            return Err(CacheError::Closed);
        }
        Ok(())
    }

    /// Called once a backend response has arrived; a closed cache drops it.
    fn accept_response(&self, op: &str) -> Result<(), CacheError> {
        if self.closed.is_cancelled() {
            tracing::debug!("Discarding {} response after shutdown", op);
            return Err(CacheError::Closed);
        }
        Ok(())
    }

    fn backend_failure(op: &str, err: BackendError) -> CacheError {
        tracing::error!("Failed to {}: {}", op, err);
        CacheError::Backend(err)
    }

    // --- Reads ---

    pub fn conversations(&self) -> Vec<Conversation> {
        self.state().conversations.clone()
    }

    pub fn get(&self, id: &str) -> Option<Conversation> {
        self.state()
            .conversations
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    pub fn selection(&self) -> Selection {
        self.state().selection.clone()
    }

    pub fn current_id(&self) -> Option<String> {
        self.state().selection.id().map(str::to_string)
    }

    pub fn current(&self) -> Option<Conversation> {
        let state = self.state();
        let id = state.selection.id()?;
        state.conversations.iter().find(|c| c.id == id).cloned()
    }

    /// True until the first refresh has completed, successfully or not.
    pub fn is_loading(&self) -> bool {
        self.state().loading
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed.is_cancelled()
    }

    // --- Selection ---

    pub fn select(&self, id: &str) -> Result<(), CacheError> {
        self.ensure_open()?;
        let mut state = self.state();
        if !state.conversations.iter().any(|c| c.id == id) {
            return Err(CacheError::InvalidInput("unknown conversation"));
        }
        tracing::debug!("Selected conversation {}", id);
        state.selection = Selection::Selected(id.to_string());
        Ok(())
    }

    pub fn clear_selection(&self) {
        self.state().selection = Selection::NoneSelected;
    }

    /// Select a conversation and mark it active.
    pub fn open(&self, id: &str) -> Result<JoinHandle<Result<(), CacheError>>, CacheError> {
        self.select(id)?;
        Ok(self.touch(id))
    }

    // --- Backend-backed operations ---

    /// Replace the cached list with the backend's current set.
    pub async fn refresh(&self) -> Result<(), CacheError> {
        self.ensure_open()?;
        let result = self.backend.list_conversations().await;
        self.accept_response("list conversations")?;

        let mut state = self.state();
        state.loading = false;
        match result {
            Ok(mut conversations) => {
                sort_by_recency(&mut conversations);
                tracing::debug!("Loaded {} conversations", conversations.len());
                state.conversations = conversations;
                Ok(())
            }
            Err(e) => Err(Self::backend_failure("fetch conversations", e)),
        }
    }

    /// Refresh after a structural change. Failure is logged by `refresh`
    /// and leaves the last known list in place.
    async fn resync(&self) {
        if let Err(e) = self.refresh().await {
            tracing::warn!("Conversation list may be stale: {}", e);
        }
    }

    pub async fn create(&self, title: Option<&str>) -> Result<Conversation, CacheError> {
        self.ensure_open()?;
        let title = title.map(str::trim).filter(|t| !t.is_empty());
        let conversation = self
            .backend
            .create_conversation(title)
            .await
            .map_err(|e| Self::backend_failure("create conversation", e))?;
        self.accept_response("create conversation")?;

        self.resync().await;
        self.accept_response("create conversation")?;

        tracing::info!("Created conversation {}", conversation.id);
        self.state().selection = Selection::Selected(conversation.id.clone());
        Ok(conversation)
    }

    pub async fn rename(&self, id: &str, new_title: &str) -> Result<(), CacheError> {
        let title = new_title.trim();
        if title.is_empty() {
            tracing::debug!("Ignoring empty title for conversation {}", id);
            return Err(CacheError::InvalidInput("title must not be empty"));
        }
        self.ensure_open()?;

        self.backend
            .update_title(id, title)
            .await
            .map_err(|e| Self::backend_failure("update conversation", e))?;
        self.accept_response("update conversation")?;

        self.resync().await;
        Ok(())
    }

    /// Delete one conversation. Confirmation is the caller's job.
    pub async fn remove(&self, id: &str) -> Result<(), CacheError> {
        self.ensure_open()?;
        self.backend
            .delete_conversation(id)
            .await
            .map_err(|e| Self::backend_failure("delete conversation", e))?;
        self.accept_response("delete conversation")?;

        {
            let mut state = self.state();
            if state.selection.id() == Some(id) {
                state.selection = Selection::NoneSelected;
            }
            state.titles_requested.remove(id);
        }

        self.resync().await;
        Ok(())
    }

    /// Delete several conversations in one backend call.
    pub async fn remove_batch(&self, ids: &[String]) -> Result<u64, CacheError> {
        if ids.is_empty() {
            return Err(CacheError::InvalidInput("no conversations given"));
        }
        self.ensure_open()?;

        let deleted = self
            .backend
            .delete_conversations(ids)
            .await
            .map_err(|e| Self::backend_failure("delete conversations", e))?;
        self.accept_response("delete conversations")?;

        {
            let mut state = self.state();
            let cleared = matches!(state.selection.id(), Some(current) if ids.iter().any(|id| id == current));
            if cleared {
                state.selection = Selection::NoneSelected;
            }
            for id in ids {
                state.titles_requested.remove(id);
            }
        }

        tracing::info!("Deleted {} conversation(s)", deleted);
        self.resync().await;
        Ok(deleted)
    }

    /// Bump a conversation to the top of the list right away and tell the
    /// backend in the background.
    ///
    /// The returned handle resolves with the backend's answer; dropping it
    /// does not cancel the call.
    pub fn touch(&self, id: &str) -> JoinHandle<Result<(), CacheError>> {
        if !self.closed.is_cancelled() {
            self.bump_locally(id);
        }

        let backend = Arc::clone(&self.backend);
        let closed = self.closed.clone();
        let id = id.to_string();
        tokio::spawn(async move {
            if closed.is_cancelled() {
                return Err(CacheError::Closed);
            }
            backend
                .touch_conversation(&id)
                .await
                .map_err(|e| Self::backend_failure("touch conversation", e))
        })
    }

    fn bump_locally(&self, id: &str) {
        let mut state = self.state();
        let newest_other = state
            .conversations
            .iter()
            .filter(|c| c.id != id)
            .filter_map(|c| c.updated_at)
            .max();
        let Some(entry) = state.conversations.iter_mut().find(|c| c.id == id) else {
            return;
        };

        // Stay ahead of server clocks that run in front of ours.
        let mut bumped = Utc::now();
        if let Some(previous) = entry.updated_at {
            bumped = bumped.max(previous);
        }
        if let Some(newest) = newest_other {
            if newest >= bumped {
                bumped = newest
                    .checked_add_signed(Duration::milliseconds(1))
                    .unwrap_or(bumped);
            }
        }
        entry.updated_at = Some(bumped);
        sort_by_recency(&mut state.conversations);
    }

    /// Ask the backend to title a conversation from its first user message.
    ///
    /// Does nothing unless the cached title is still the placeholder, and
    /// asks at most once per conversation. Returns the applied title.
    pub async fn generate_title(
        &self,
        id: &str,
        first_message: &str,
    ) -> Result<Option<String>, CacheError> {
        if first_message.trim().is_empty() {
            return Err(CacheError::InvalidInput("message must not be empty"));
        }
        self.ensure_open()?;

        {
            let mut state = self.state();
            let eligible = state
                .conversations
                .iter()
                .any(|c| c.id == id && c.has_default_title());
            if !eligible || !state.titles_requested.insert(id.to_string()) {
                tracing::debug!("Skipping title generation for {}", id);
                return Ok(None);
            }
        }

        let generated = self
            .backend
            .generate_title(id, first_message)
            .await
            .map_err(|e| Self::backend_failure("generate title", e))?;
        self.accept_response("generate title")?;

        if !generated.generated {
            return Ok(None);
        }

        let mut state = self.state();
        match state.conversations.iter_mut().find(|c| c.id == id) {
            Some(entry) => {
                entry.title = generated.title.clone();
                Ok(Some(generated.title))
            }
            None => Ok(None),
        }
    }

    /// Message history of a conversation; not cached.
    pub async fn history(&self, id: &str) -> Result<Vec<HistoryMessage>, CacheError> {
        self.ensure_open()?;
        let messages = self
            .backend
            .history(id)
            .await
            .map_err(|e| Self::backend_failure("get history", e))?;
        self.accept_response("get history")?;
        Ok(messages)
    }

    /// Tear the cache down. Responses still in flight are discarded.
    pub fn shutdown(&self) {
        self.closed.cancel();
        let mut state = self.state();
        state.conversations.clear();
        state.selection = Selection::NoneSelected;
        state.titles_requested.clear();
    }
}
