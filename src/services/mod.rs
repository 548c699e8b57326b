pub mod access;
pub mod cache;
pub mod session;
pub mod title;

pub use access::{authorize, Access, AppRole, RouteDecision, RouteGuard};
pub use cache::{CacheError, ConversationCache, Selection};
pub use session::Session;
