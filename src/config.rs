//! Configuration loaded from `blockflow.toml`.
//!
//! Layered file → environment → CLI. Every key is optional:
//!
//! ```toml
//! app_id = "my-app"
//! grid_size = 40
//! poll_interval_ms = 1000
//!
//! [backend]
//! kind = "firestore"          # "memory" | "local" | "firestore"
//! project_id = "my-project"
//!
//! [identity]
//! kind = "firebase"           # "local" | "firebase"
//! api_key = "..."
//!
//! [chat]
//! endpoint = "https://example.com/api/bot"
//! ```
//!
//! Environment overrides: `BLOCKFLOW_APP_ID`, `BLOCKFLOW_AUTH_TOKEN`,
//! `BLOCKFLOW_CHAT_ENDPOINT`.

use std::time::Duration;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::editor::GridSize;

pub const CONFIG_FILE: &str = "blockflow.toml";
pub const DEFAULT_APP_ID: &str = "default-app-id";
pub const DEFAULT_DATA_DIR: &str = ".blockflow";
pub const DEFAULT_CHAT_ENDPOINT: &str = "https://nursync-backend.onrender.com/api/bot";

pub const ENV_APP_ID: &str = "BLOCKFLOW_APP_ID";
pub const ENV_AUTH_TOKEN: &str = "BLOCKFLOW_AUTH_TOKEN";
pub const ENV_CHAT_ENDPOINT: &str = "BLOCKFLOW_CHAT_ENDPOINT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub app_id: String,
    pub grid_size: GridSize,
    /// Watch polling interval for polling backends. Backend default when unset.
    pub poll_interval_ms: Option<u64>,
    /// Pre-provisioned sign-in token.
    pub auth_token: Option<String>,
    pub backend: BackendConfig,
    pub identity: IdentityConfig,
    pub chat: ChatConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_id: DEFAULT_APP_ID.to_string(),
            grid_size: GridSize::default(),
            poll_interval_ms: None,
            auth_token: None,
            backend: BackendConfig::default(),
            identity: IdentityConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

/// Where the diagram document lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Process-local; nothing survives exit.
    Memory,
    /// JSON files under `root`.
    Local {
        #[serde(default = "default_data_dir")]
        root: Utf8PathBuf,
    },
    Firestore {
        project_id: String,
        #[serde(default)]
        base_url: Option<String>,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Local {
            root: default_data_dir(),
        }
    }
}

fn default_data_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_DATA_DIR)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IdentityConfig {
    #[default]
    Local,
    Firebase {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub endpoint: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_CHAT_ENDPOINT.to_string(),
        }
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse configuration")
    }

    /// Load from `path`, or from `blockflow.toml` in the working directory
    /// when no path is given. An explicit path must exist; the default file
    /// may be absent, which yields the defaults. Environment overrides are
    /// applied afterwards.
    pub fn load(path: Option<&Utf8Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_file(path)?,
            None => {
                let default_path = Utf8Path::new(CONFIG_FILE);
                if default_path.exists() {
                    Self::load_file(default_path)?
                } else {
                    tracing::debug!("No {} found, using defaults", CONFIG_FILE);
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_file(path: &Utf8Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        Self::from_toml_str(&content).with_context(|| format!("Invalid config file: {}", path))
    }

    /// Apply environment overrides through `lookup`. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(app_id) = get(ENV_APP_ID) {
            self.app_id = app_id;
        }
        if let Some(token) = get(ENV_AUTH_TOKEN) {
            self.auth_token = Some(token);
        }
        if let Some(endpoint) = get(ENV_CHAT_ENDPOINT) {
            self.chat.endpoint = endpoint;
        }
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval_ms.map(Duration::from_millis)
    }
}
