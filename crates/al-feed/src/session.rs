//! # Session Context
//!
//! Per-client state that outlives a single run (anonymous id, last-read
//! marker), behind the injectable [`SessionStore`] port.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tracing::warn;
use uuid::Uuid;

use al_core::{Result, SessionStore};

pub const ANON_ID_KEY: &str = "anon_log_user_id";
pub const LAST_READ_KEY: &str = "anon_log_last_read";

#[derive(Clone)]
pub struct SessionContext {
    store: Arc<dyn SessionStore>,
    started_at: DateTime<Utc>,
}

impl SessionContext {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store, started_at: Utc::now() }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns the persisted anonymous id, generating and persisting one on first use.
    ///
    /// Never fails: if the store is unreadable an ephemeral id is issued for
    /// this run, and a failed write is only logged.
    pub async fn anonymous_id(&self) -> String {
        match self.store.get(ANON_ID_KEY).await {
            Ok(Some(id)) if !id.trim().is_empty() => return id,
            Ok(_) => {}
            Err(err) => warn!(error = %err, "session store unreadable; issuing ephemeral anonymous id"),
        }

        let id = Uuid::new_v4().to_string();
        if let Err(err) = self.store.set(ANON_ID_KEY, &id).await {
            warn!(error = %err, "failed to persist anonymous id");
        }
        id
    }

    /// When the viewer last opened their dialogs. Unreadable markers read as `None`.
    pub async fn last_read(&self) -> Option<DateTime<Utc>> {
        let raw = match self.store.get(LAST_READ_KEY).await {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(error = %err, "failed to read last-read marker");
                return None;
            }
        };
        let millis = raw.trim().parse::<i64>().ok()?;
        Utc.timestamp_millis_opt(millis).single()
    }

    /// Baseline for the unread indicator: the stored marker, or the start of
    /// this session when dialogs were never opened.
    pub async fn unread_since(&self) -> DateTime<Utc> {
        self.last_read().await.unwrap_or(self.started_at)
    }

    pub async fn mark_read(&self, at: DateTime<Utc>) -> Result<()> {
        self.store.set(LAST_READ_KEY, &at.timestamp_millis().to_string()).await?;
        Ok(())
    }
}
