//! # Moderation Filter
//!
//! Ban records hide a sender's messages from every standard view without
//! touching the documents. Deletion is hard: no tombstone is left behind, so
//! replies to a deleted message keep a dangling `parent_id`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use al_core::{AuthorizationPolicy, BanRecord, Document, DocumentStore, Message, Result};

/// Sender ids currently excluded from the feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BanSet {
    records: HashMap<String, BanRecord>,
}

impl BanSet {
    pub fn from_records(records: impl IntoIterator<Item = BanRecord>) -> Self {
        Self { records: records.into_iter().map(|r| (r.user_id.clone(), r)).collect() }
    }

    /// Ban documents are keyed by sender id. A document whose body cannot be
    /// read still bans the sender named by its key.
    pub fn from_documents(docs: &[Document]) -> Self {
        let records = docs.iter().map(|doc| match BanRecord::from_document(doc) {
            Ok(record) => record,
            Err(err) => {
                warn!(id = %doc.id, error = %err, "undecodable ban record; banning by document key");
                BanRecord { user_id: doc.id.clone(), timestamp: Utc::now() }
            }
        });
        Self::from_records(records)
    }

    pub fn contains(&self, sender_id: &str) -> bool {
        self.records.contains_key(sender_id)
    }

    pub fn get(&self, sender_id: &str) -> Option<&BanRecord> {
        self.records.get(sender_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Every message whose sender is not banned, in input order.
pub fn visible(messages: &[Message], bans: &BanSet) -> Vec<Message> {
    messages.iter().filter(|m| !bans.contains(&m.sender_id)).cloned().collect()
}

/// Destructive moderation actions against the remote store.
pub struct Moderator {
    store: Arc<dyn DocumentStore>,
    messages_collection: String,
    bans_collection: String,
}

impl Moderator {
    pub fn new(store: Arc<dyn DocumentStore>, messages_collection: String, bans_collection: String) -> Self {
        Self { store, messages_collection, bans_collection }
    }

    /// Removes the message document. Callers on the sender's own path confirm first.
    pub async fn delete_message(&self, policy: &AuthorizationPolicy, message: &Message) -> Result<()> {
        policy.require_delete(message)?;
        self.store.delete(&self.messages_collection, &message.id).await?;
        info!(id = %message.id, by = %policy.subject(), admin = policy.is_admin(), "message deleted");
        Ok(())
    }

    pub async fn ban_sender(&self, policy: &AuthorizationPolicy, sender_id: &str) -> Result<()> {
        policy.require_moderator()?;
        let record = BanRecord { user_id: sender_id.to_string(), timestamp: Utc::now() };
        self.store.set(&self.bans_collection, sender_id, serde_json::to_value(&record)?).await?;
        info!(sender = %sender_id, by = %policy.subject(), "sender banned");
        Ok(())
    }

    pub async fn unban_sender(&self, policy: &AuthorizationPolicy, sender_id: &str) -> Result<()> {
        policy.require_moderator()?;
        self.store.delete(&self.bans_collection, sender_id).await?;
        info!(sender = %sender_id, by = %policy.subject(), "sender unbanned");
        Ok(())
    }
}
