use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing_subscriber::EnvFilter;

use convodesk::config::{BackendConfig, APP_NAME};
use convodesk::ui::Repl;
use convodesk::{ConversationBackend, HttpBackend, LocalStore, Principal, Session};

/// The identity provider hands us either verified ID-token claims as JSON
/// (`CONVODESK_CLAIMS`) or a bare subject with a role list.
fn principal_from_env(config: &BackendConfig) -> Result<Principal> {
    if let Ok(raw) = std::env::var("CONVODESK_CLAIMS") {
        let claims: serde_json::Value =
            serde_json::from_str(&raw).context("CONVODESK_CLAIMS is not valid JSON")?;
        return Principal::from_claims(&claims, config.oidc_client_id.as_deref())
            .context("CONVODESK_CLAIMS has no `sub` claim");
    }

    let Ok(id) = std::env::var("CONVODESK_USER") else {
        bail!("Set CONVODESK_USER or CONVODESK_CLAIMS to sign in");
    };
    let roles = std::env::var("CONVODESK_ROLES").unwrap_or_default();
    Ok(Principal::new(id).with_roles(
        roles
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let local = std::env::args().skip(1).any(|arg| arg == "--local");
    let config = BackendConfig::from_env()?;
    let principal = principal_from_env(&config)?;

    let backend: Arc<dyn ConversationBackend> = if local {
        tracing::info!("Using local store at {}", config.local_db_path.display());
        let store = LocalStore::open(&config.local_db_path)?;
        Arc::new(store.backend_for(principal.id.clone()))
    } else {
        tracing::info!("Using backend at {}", config.base_url);
        Arc::new(
            HttpBackend::new(&config, principal.id.clone())
                .context("Failed to set up backend client")?,
        )
    };

    println!("{}", APP_NAME);
    let session = Session::sign_in(principal, backend).await;
    Repl::new(session).run().await
}
