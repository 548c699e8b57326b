use crate::models::Principal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppRole {
    Admin,
    RagSupervisor,
}

impl AppRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppRole::Admin => "ADMIN",
            AppRole::RagSupervisor => "RAG_SUPERVISOR",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ADMIN" => Some(AppRole::Admin),
            "RAG_SUPERVISOR" => Some(AppRole::RagSupervisor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    Deny,
}

/// Allow when `required` is empty or the principal holds any of its roles.
pub fn authorize(required: &[AppRole], principal: &Principal) -> Access {
    if required.is_empty() || required.iter().any(|role| principal.has_role(role.as_str())) {
        Access::Allow
    } else {
        Access::Deny
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    Unauthenticated,
    Forbidden { required: Vec<AppRole> },
}

const ADMIN_ONLY: &[AppRole] = &[AppRole::Admin];
const KNOWLEDGE: &[AppRole] = &[AppRole::RagSupervisor, AppRole::Admin];

/// Which roles each path prefix needs; every check goes through [`authorize`].
#[derive(Debug, Clone)]
pub struct RouteGuard {
    rules: Vec<(String, Vec<AppRole>)>,
}

impl Default for RouteGuard {
    fn default() -> Self {
        let mut guard = Self::empty();
        for prefix in ["/admin", "/api/admin", "/api/users", "/api/groups"] {
            guard.require(prefix, ADMIN_ONLY);
        }
        for prefix in ["/knowledge", "/api/kb", "/api/knowledge"] {
            guard.require(prefix, KNOWLEDGE);
        }
        guard
    }
}

impl RouteGuard {
    /// Guard that only demands authentication.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn require(&mut self, prefix: &str, roles: &[AppRole]) -> &mut Self {
        let prefix = prefix.trim_end_matches('/').to_string();
        self.rules.retain(|(existing, _)| *existing != prefix);
        self.rules.push((prefix, roles.to_vec()));
        self
    }

    /// Roles demanded by the longest rule matching `path` on a segment
    /// boundary. Unlisted paths need no role.
    pub fn required_for(&self, path: &str) -> &[AppRole] {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        self.rules
            .iter()
            .filter(|(prefix, _)| {
                path == prefix
                    || path
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            })
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, roles)| roles.as_slice())
            .unwrap_or(&[])
    }

    pub fn check(&self, path: &str, principal: Option<&Principal>) -> RouteDecision {
        let Some(principal) = principal else {
            return RouteDecision::Unauthenticated;
        };
        let required = self.required_for(path);
        match authorize(required, principal) {
            Access::Allow => RouteDecision::Allow,
            Access::Deny => {
                tracing::debug!("Denied {} for principal {}", path, principal.id);
                RouteDecision::Forbidden {
                    required: required.to_vec(),
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavItem {
    pub title: &'static str,
    pub path: &'static str,
}

/// Sidebar sections visible to the principal.
pub fn navigation(principal: &Principal) -> Vec<NavItem> {
    let mut items = vec![NavItem {
        title: "Chat",
        path: "/",
    }];
    if authorize(KNOWLEDGE, principal) == Access::Allow {
        items.push(NavItem {
            title: "Knowledge",
            path: "/knowledge",
        });
    }
    if authorize(ADMIN_ONLY, principal) == Access::Allow {
        items.push(NavItem {
            title: "Admin",
            path: "/admin",
        });
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(roles: &[&str]) -> Principal {
        Principal::new("u1").with_roles(roles.iter().copied())
    }

    #[test]
    fn test_authorize_any_of() {
        let supervisor = principal(&["RAG_SUPERVISOR"]);
        assert_eq!(authorize(KNOWLEDGE, &supervisor), Access::Allow);
        assert_eq!(authorize(ADMIN_ONLY, &supervisor), Access::Deny);
        assert_eq!(authorize(&[], &principal(&[])), Access::Allow);
    }

    #[test]
    fn test_roles_are_case_sensitive() {
        assert_eq!(authorize(ADMIN_ONLY, &principal(&["admin"])), Access::Deny);
        assert_eq!(AppRole::from_str("admin"), None);
        assert_eq!(AppRole::from_str("ADMIN"), Some(AppRole::Admin));
    }

    #[test]
    fn test_route_guard_defaults() {
        let guard = RouteGuard::default();
        let admin = principal(&["ADMIN"]);
        let supervisor = principal(&["RAG_SUPERVISOR"]);
        let user = principal(&[]);

        assert_eq!(guard.check("/", Some(&user)), RouteDecision::Allow);
        assert_eq!(guard.check("/conversations", Some(&user)), RouteDecision::Allow);
        assert_eq!(guard.check("/admin/users", Some(&admin)), RouteDecision::Allow);
        assert_eq!(
            guard.check("/admin/users", Some(&supervisor)),
            RouteDecision::Forbidden {
                required: vec![AppRole::Admin]
            }
        );
        assert_eq!(guard.check("/knowledge", Some(&supervisor)), RouteDecision::Allow);
        assert_eq!(guard.check("/knowledge?tab=docs", Some(&admin)), RouteDecision::Allow);
        assert!(matches!(
            guard.check("/api/kb/abc/upload", Some(&user)),
            RouteDecision::Forbidden { .. }
        ));
        assert_eq!(guard.check("/admin", None), RouteDecision::Unauthenticated);
        assert_eq!(guard.check("/", None), RouteDecision::Unauthenticated);
    }

    #[test]
    fn test_prefix_matches_whole_segments_and_longest_wins() {
        let mut guard = RouteGuard::default();
        guard.require("/knowledge/public/", &[]);
        let user = principal(&[]);

        assert_eq!(guard.check("/administrator", Some(&user)), RouteDecision::Allow);
        assert_eq!(guard.check("/knowledge/public/faq", Some(&user)), RouteDecision::Allow);
        assert!(matches!(
            guard.check("/knowledge/private", Some(&user)),
            RouteDecision::Forbidden { .. }
        ));
    }

    #[test]
    fn test_navigation_by_role() {
        let titles = |p: &Principal| navigation(p).iter().map(|i| i.title).collect::<Vec<_>>();
        assert_eq!(titles(&principal(&[])), vec!["Chat"]);
        assert_eq!(titles(&principal(&["RAG_SUPERVISOR"])), vec!["Chat", "Knowledge"]);
        assert_eq!(titles(&principal(&["ADMIN"])), vec!["Chat", "Knowledge", "Admin"]);
    }
}
