use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The authenticated user, as handed over by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub roles: BTreeSet<String>,
    pub groups: Vec<String>,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            email: None,
            roles: BTreeSet::new(),
            groups: Vec::new(),
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Build a principal from verified ID-token claims.
    ///
    /// Realm roles (`realm_access.roles`) and the roles granted on
    /// `client_id` (`resource_access.<client_id>.roles`) are merged.
    /// Returns `None` when the token carries no `sub`.
    pub fn from_claims(claims: &Value, client_id: Option<&str>) -> Option<Self> {
        let id = claims.get("sub")?.as_str()?.to_string();

        let mut roles = BTreeSet::new();
        roles.extend(string_list(claims.pointer("/realm_access/roles")));
        if let Some(client) = client_id {
            let client_roles = claims
                .get("resource_access")
                .and_then(|access| access.get(client))
                .and_then(|entry| entry.get("roles"));
            roles.extend(string_list(client_roles));
        }

        Some(Self {
            id,
            name: claims.get("name").and_then(Value::as_str).map(str::to_string),
            email: claims.get("email").and_then(Value::as_str).map(str::to_string),
            roles,
            groups: string_list(claims.get("groups")),
        })
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_claims_merges_realm_and_client_roles() {
        let claims = json!({
            "sub": "kc-123",
            "email": "ada@example.com",
            "realm_access": { "roles": ["ADMIN", "offline_access"] },
            "resource_access": {
                "chat-frontend": { "roles": ["RAG_SUPERVISOR", "ADMIN"] },
                "other": { "roles": ["IGNORED"] }
            },
            "groups": ["/engineering"]
        });
        let p = Principal::from_claims(&claims, Some("chat-frontend")).unwrap();
        assert_eq!(p.id, "kc-123");
        assert_eq!(p.email.as_deref(), Some("ada@example.com"));
        assert_eq!(
            p.roles.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["ADMIN", "RAG_SUPERVISOR", "offline_access"]
        );
        assert!(!p.has_role("IGNORED"));
        assert_eq!(p.groups, vec!["/engineering".to_string()]);
    }

    #[test]
    fn test_from_claims_requires_subject() {
        assert!(Principal::from_claims(&json!({ "email": "x@y" }), None).is_none());
    }

    #[test]
    fn test_from_claims_without_role_sections() {
        let p = Principal::from_claims(&json!({ "sub": "u1" }), Some("chat-frontend")).unwrap();
        assert!(p.roles.is_empty());
        assert!(p.groups.is_empty());
    }
}
