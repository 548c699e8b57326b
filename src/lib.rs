pub mod backend;
pub mod config;
pub mod models;
pub mod services;
pub mod ui;

pub use backend::{BackendError, ConversationBackend, HttpBackend, LocalBackend, LocalStore};
pub use models::{Conversation, HistoryMessage, Principal, Role, DEFAULT_TITLE};
pub use services::{CacheError, ConversationCache, Selection, Session};
