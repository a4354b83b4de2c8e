//! Server configuration.
//!
//! Settings come from an optional YAML file (path in `BUDGET_CONFIG`,
//! `budget.yaml` by default) and are then overridden by environment
//! variables. A missing default file is not an error.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_CONFIG_FILE: &str = "budget.yaml";
const DEFAULT_SESSION_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// A user allowed to sign in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub database_url: String,
    /// Directory holding the built single-page app
    pub static_dir: PathBuf,
    /// Origin allowed to call the API during frontend development
    pub cors_origin: String,
    /// Lifetime of a login session, also sent as the cookie's Max-Age
    pub session_ttl_secs: u64,
    pub users: Vec<UserCredentials>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            database_url: "sqlite:budget.db".to_string(),
            static_dir: PathBuf::from("public"),
            cors_origin: "http://localhost:8080".to_string(),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            users: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load the configuration the server starts with
    pub fn load() -> Result<Self> {
        let explicit = std::env::var("BUDGET_CONFIG").ok();
        let path = PathBuf::from(explicit.as_deref().unwrap_or(DEFAULT_CONFIG_FILE));

        let config = if path.exists() {
            info!("Loading configuration from {}", path.display());
            Self::from_yaml_file(&path)?
        } else if explicit.is_some() {
            anyhow::bail!("Configuration file {} does not exist", path.display());
        } else {
            info!("No {} found, using default configuration", DEFAULT_CONFIG_FILE);
            Self::default()
        };

        let config = config.with_overrides(|name| std::env::var(name).ok())?;
        if config.users.is_empty() {
            warn!("No users configured, every login will be rejected");
        }
        Ok(config)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Apply `BUDGET_*` overrides looked up through `lookup`
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("BUDGET_ADDR") {
            self.addr = addr
                .parse()
                .with_context(|| format!("BUDGET_ADDR is not a socket address: {}", addr))?;
        }
        if let Some(url) = lookup("BUDGET_DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(dir) = lookup("BUDGET_STATIC_DIR") {
            self.static_dir = PathBuf::from(dir);
        }
        if let Some(ttl) = lookup("BUDGET_SESSION_TTL_SECS") {
            self.session_ttl_secs = ttl
                .parse()
                .with_context(|| format!("BUDGET_SESSION_TTL_SECS is not a number of seconds: {}", ttl))?;
        }
        Ok(self)
    }
}
