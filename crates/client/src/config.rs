//! Client configuration.
//!
//! Read from `<config_dir>/tareas/config.toml` when present, e.g.
//!
//! ```toml
//! base_url = "https://tareas.example.org"
//! session_dir = "/home/me/.local/state/tareas"
//! ```
//!
//! Every field is optional. No request deadline is configured; the HTTP
//! transport's defaults apply.

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::error::{ApiError, Result};

/// Backend address used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Configuration for the tareas client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the tareas backend
    pub base_url: String,

    /// Directory holding the persisted session
    pub session_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            session_dir: config_root(),
        }
    }
}

impl ClientConfig {
    /// Default location of the configuration file.
    pub fn default_path() -> PathBuf {
        config_root().join("config.toml")
    }

    /// Load from the default location, falling back to defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path())
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ApiError::Config(format!("{}: {}", path.display(), e))),
        };

        toml::from_str(&s).map_err(|e| ApiError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Override the backend address.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the session directory.
    pub fn with_session_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.session_dir = dir.into();
        self
    }

    /// Validated base URL without a trailing slash.
    pub(crate) fn api_root(&self) -> Result<String> {
        let url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| ApiError::Config(format!("base_url {:?}: {}", self.base_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ApiError::Config(format!(
                "base_url {:?}: unsupported scheme {}",
                self.base_url,
                url.scheme()
            )));
        }
        Ok(self.base_url.trim_end_matches('/').to_string())
    }
}

fn config_root() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tareas")
}
