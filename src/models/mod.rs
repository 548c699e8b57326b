pub mod conversation;
pub mod message;
pub mod principal;
pub mod timestamp;

pub use conversation::{sort_by_recency, Conversation, DEFAULT_TITLE};
pub use message::{HistoryMessage, Role};
pub use principal::Principal;
