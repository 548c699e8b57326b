use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

pub const APP_NAME: &str = "Convodesk";

const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: Url,
    pub timeout: Option<Duration>,
    /// Client id whose `resource_access` roles are merged into the principal.
    pub oidc_client_id: Option<String>,
    pub local_db_path: PathBuf,
}

impl BackendConfig {
    pub fn from_env() -> Result<Self> {
        let raw_url =
            std::env::var("BACKEND_URL").unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string());
        let base_url = Url::parse(&raw_url)
            .with_context(|| format!("Invalid BACKEND_URL: {}", raw_url))?;

        let timeout = match std::env::var("BACKEND_TIMEOUT_SECS") {
            Ok(secs) => Some(Duration::from_secs(
                secs.trim()
                    .parse()
                    .with_context(|| format!("Invalid BACKEND_TIMEOUT_SECS: {}", secs))?,
            )),
            Err(_) => None,
        };

        let local_db_path = match std::env::var("CONVODESK_DB") {
            Ok(path) => PathBuf::from(path),
            Err(_) => Self::default_db_path()?,
        };

        Ok(Self {
            base_url,
            timeout,
            oidc_client_id: std::env::var("OIDC_CLIENT_ID").ok(),
            local_db_path,
        })
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = match std::env::var("XDG_DATA_HOME") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => {
                let home = std::env::var("HOME").context("HOME not set")?;
                PathBuf::from(home).join(".local/share")
            }
        };
        Ok(data_dir.join("convodesk").join("conversations.db"))
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BACKEND_URL).expect("default backend url is valid"),
            timeout: None,
            oidc_client_id: None,
            local_db_path: PathBuf::from("conversations.db"),
        }
    }
}
