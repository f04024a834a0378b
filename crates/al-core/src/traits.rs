//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be wired into the feed engine.

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::models::{Principal, UserProfile};

/// A stored document: store-assigned id plus its JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Ordering requested for a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn desc(field: &str) -> Self {
        Self { field: field.to_string(), direction: SortDirection::Descending }
    }

    pub fn asc(field: &str) -> Self {
        Self { field: field.to_string(), direction: SortDirection::Ascending }
    }
}

/// Live subscription. Every item is a full snapshot of the collection, or the
/// failure the store reported instead. Dropping the receiver unsubscribes.
pub type SnapshotStream = mpsc::UnboundedReceiver<anyhow::Result<Vec<Document>>>;

/// Real-time document store contract.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Opens a live subscription. The current contents are delivered as the first snapshot.
    async fn subscribe(&self, collection: &str, order: OrderBy) -> anyhow::Result<SnapshotStream>;

    /// Appends a document and returns the id the store assigned to it.
    async fn append(&self, collection: &str, data: serde_json::Value) -> anyhow::Result<String>;

    /// Creates or replaces the document stored under a caller-chosen id.
    async fn set(&self, collection: &str, id: &str, data: serde_json::Value) -> anyhow::Result<()>;

    /// Writes one nested field of an existing document. `None` removes the key.
    async fn update_field(
        &self,
        collection: &str,
        id: &str,
        path: &[String],
        value: Option<serde_json::Value>,
    ) -> anyhow::Result<()>;

    async fn delete(&self, collection: &str, id: &str) -> anyhow::Result<()>;
}

/// Profile persistence contract, keyed by principal uid.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, uid: &str) -> anyhow::Result<Option<UserProfile>>;
    async fn create_profile(&self, profile: UserProfile) -> anyhow::Result<()>;
}

/// Authentication collaborator contract.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait AuthCollaborator: Send + Sync {
    /// The logged-in principal, if any.
    fn current_principal(&self) -> Option<Principal>;

    /// Fires whenever the principal logs in or out.
    fn principal_changes(&self) -> watch::Receiver<Option<Principal>>;
}

/// Key-value persistence for per-client session state (anonymous id, read markers).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
}
