//! JSON file token store.
//!
//! Keeps the token in `<root>/session.json` as a small JSON document keyed by
//! [`TOKEN_KEY`], alongside the time it was saved.

use std::path::{Path, PathBuf};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use super::{Result, TokenStore, TOKEN_KEY};

const SESSION_FILE: &str = "session.json";

/// File-based JSON token store.
#[derive(Debug, Clone)]
pub struct JsonTokenStore {
    root: PathBuf,
}

#[derive(Serialize, Deserialize)]
struct SessionFile {
    #[serde(rename = "access_token")]
    token: String,
    saved_at: chrono::DateTime<chrono::Utc>,
}

impl JsonTokenStore {
    /// Create a store rooted at `root`. The directory is created on first save.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Path of the session file.
    pub fn path(&self) -> PathBuf {
        self.root.join(SESSION_FILE)
    }
}

#[async_trait]
impl TokenStore for JsonTokenStore {
    async fn load(&self) -> Result<Option<String>> {
        let path = self.path();
        let s = match fs::read_to_string(&path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<SessionFile>(&s) {
            Ok(file) if !file.token.is_empty() => Ok(Some(file.token)),
            Ok(_) => Ok(None),
            Err(e) => {
                warn!("Ignoring unreadable {} in {}: {}", TOKEN_KEY, path.display(), e);
                Ok(None)
            }
        }
    }

    async fn save(&self, token: &str) -> Result<()> {
        fs::create_dir_all(&self.root).await?;

        let file = SessionFile {
            token: token.to_string(),
            saved_at: chrono::Utc::now(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        let path = self.path();

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut out = options.open(&path).await?;
        out.write_all(json.as_bytes()).await?;
        out.flush().await?;

        // `mode` only applies when the file is created.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        debug!("Saved {} to {}", TOKEN_KEY, path.display());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match fs::remove_file(self.path()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
