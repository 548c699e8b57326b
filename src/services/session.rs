use std::sync::Arc;

use crate::backend::ConversationBackend;
use crate::models::Principal;
use crate::services::access::{navigation, NavItem, RouteDecision, RouteGuard};
use crate::services::cache::ConversationCache;

/// One signed-in principal and the conversation cache that belongs to it.
///
/// Surfaces that list or select conversations take the cache from here so
/// they all read the same instance.
pub struct Session {
    principal: Principal,
    cache: Arc<ConversationCache>,
    guard: RouteGuard,
}

impl Session {
    /// Start a session and load the conversation list. A failing first load
    /// is logged and leaves the list empty.
    pub async fn sign_in(principal: Principal, backend: Arc<dyn ConversationBackend>) -> Self {
        tracing::info!("Signing in {}", principal.id);
        let cache = Arc::new(ConversationCache::new(backend));
        if let Err(e) = cache.refresh().await {
            tracing::warn!("Initial conversation load failed: {}", e);
        }
        Self {
            principal,
            cache,
            guard: RouteGuard::default(),
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn cache(&self) -> Arc<ConversationCache> {
        Arc::clone(&self.cache)
    }

    pub fn check_route(&self, path: &str) -> RouteDecision {
        self.guard.check(path, Some(&self.principal))
    }

    pub fn navigation(&self) -> Vec<NavItem> {
        navigation(&self.principal)
    }

    pub fn sign_out(self) {
        tracing::info!("Signing out {}", self.principal.id);
        self.cache.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalStore;
    use crate::services::cache::CacheError;

    #[tokio::test]
    async fn test_sign_in_loads_and_sign_out_closes() {
        let store = LocalStore::open_in_memory().unwrap();
        let backend = store.backend_for("u1");
        backend.create_conversation(Some("existing")).await.unwrap();

        let session = Session::sign_in(Principal::new("u1"), Arc::new(backend)).await;
        let cache = session.cache();
        assert!(!cache.is_loading());
        assert_eq!(cache.conversations().len(), 1);

        session.sign_out();
        assert!(cache.is_shut_down());
        assert!(cache.conversations().is_empty());
        assert!(matches!(cache.refresh().await, Err(CacheError::Closed)));
    }

    #[tokio::test]
    async fn test_sessions_do_not_share_conversations() {
        let store = LocalStore::open_in_memory().unwrap();
        let alice = Session::sign_in(Principal::new("alice"), Arc::new(store.backend_for("alice"))).await;
        let bob = Session::sign_in(Principal::new("bob"), Arc::new(store.backend_for("bob"))).await;

        alice.cache().create(Some("private")).await.unwrap();
        bob.cache().refresh().await.unwrap();
        assert!(bob.cache().conversations().is_empty());
        assert_eq!(alice.cache().conversations().len(), 1);
    }

    #[tokio::test]
    async fn test_route_checks_use_principal_roles() {
        let store = LocalStore::open_in_memory().unwrap();
        let admin = Principal::new("root").with_roles(["ADMIN"]);
        let session = Session::sign_in(admin, Arc::new(store.backend_for("root"))).await;
        assert_eq!(session.check_route("/admin"), RouteDecision::Allow);
        assert_eq!(session.navigation().len(), 3);
    }
}
