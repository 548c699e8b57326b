pub mod http;
pub mod local;
pub mod traits;
pub mod types;

pub use http::HttpBackend;
pub use local::{LocalBackend, LocalStore};
pub use traits::ConversationBackend;
pub use types::{BackendError, GeneratedTitle};
