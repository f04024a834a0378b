//! # al-session-file
//!
//! Local filesystem implementation of `SessionStore`.
//! Keeps the session's key-value pairs in one JSON object on disk so the
//! anonymous id and the last-read marker survive restarts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use al_core::traits::SessionStore;
use anyhow::Context;
use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub struct FileSessionStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles on the file.
    lock: Mutex<()>,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> anyhow::Result<BTreeMap<String, String>> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e).with_context(|| format!("reading {}", self.path.display())),
        };
        match serde_json::from_slice(&raw) {
            Ok(map) => Ok(map),
            Err(e) => {
                // A damaged session file is replaced, like a cleared browser session.
                warn!(path = %self.path.display(), error = %e, "session file unreadable, starting fresh");
                Ok(BTreeMap::new())
            }
        }
    }

    async fn save(&self, entries: &BTreeMap<String, String>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let body = serde_json::to_vec_pretty(entries)?;
        let staging = self.path.with_extension("tmp");
        fs::write(&staging, body).await?;
        fs::rename(&staging, &self.path)
            .await
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries).await?;
        debug!(key, "session value stored");
        Ok(())
    }
}
