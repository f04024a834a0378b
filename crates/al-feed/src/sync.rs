//! # Feed Synchronizer
//!
//! Holds exactly two live subscriptions (messages by timestamp, newest first,
//! and ban records) and drives them from one task with `tokio::select!`, so
//! notifications are handled one at a time, each to completion.
//!
//! Every notification replaces the local copy wholesale; there is no
//! incremental merge. A failed notification is logged and the last good
//! snapshot stays published (stale but available).
//!
//! The write path (`append`, vote updates) goes straight to the store and
//! returns the store's error unchanged. Local state only changes when the
//! authoritative snapshot comes back.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use al_core::{Document, DocumentStore, FeedSettings, Message, OrderBy, Result, SnapshotStream, VoteDirection};

use crate::moderation::{visible, BanSet};
use crate::replies::FeedSnapshot;

/// What the synchronizer publishes after every notification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedState {
    /// Every decodable message in the latest snapshot, store order.
    pub all: Vec<Message>,
    pub bans: BanSet,
    /// `all` minus banned senders. The only view consumers should render.
    pub visible: FeedSnapshot,
    /// Set once the first message snapshot has arrived.
    pub loaded: bool,
}

impl FeedState {
    fn rebuild(all: Vec<Message>, bans: BanSet, loaded: bool) -> Self {
        let visible = FeedSnapshot::new(visible(&all, &bans));
        Self { all, bans, visible, loaded }
    }

    /// Looks in the moderated view first, then in the full snapshot.
    pub fn find(&self, id: &str) -> Option<&Message> {
        self.visible.get(id).or_else(|| self.all.iter().find(|m| m.id == id))
    }
}

pub struct FeedSynchronizer {
    store: Arc<dyn DocumentStore>,
    messages_collection: String,
    state_rx: watch::Receiver<Arc<FeedState>>,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl FeedSynchronizer {
    /// Subscribes to both collections and starts the sync loop.
    pub async fn start(store: Arc<dyn DocumentStore>, settings: &FeedSettings) -> Result<Self> {
        let messages = store
            .subscribe(&settings.messages_collection, OrderBy::desc("timestamp"))
            .await?;
        let bans = store
            .subscribe(&settings.bans_collection, OrderBy::asc("timestamp"))
            .await?;

        let (state_tx, state_rx) = watch::channel(Arc::new(FeedState::default()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_sync_loop(messages, bans, state_tx, shutdown_rx));

        info!(
            messages = %settings.messages_collection,
            bans = %settings.bans_collection,
            "feed synchronizer started"
        );

        Ok(Self {
            store,
            messages_collection: settings.messages_collection.clone(),
            state_rx,
            shutdown_tx,
            task: Mutex::new(Some(task)),
        })
    }

    /// The latest published state.
    pub fn state(&self) -> Arc<FeedState> {
        Arc::clone(&self.state_rx.borrow())
    }

    /// A receiver that fires on every snapshot replacement.
    pub fn subscribe(&self) -> watch::Receiver<Arc<FeedState>> {
        self.state_rx.clone()
    }

    /// Waits until the first message snapshot has been applied.
    pub async fn loaded(&self) -> Arc<FeedState> {
        let mut rx = self.state_rx.clone();
        let state = match rx.wait_for(|s| s.loaded).await {
            Ok(state) => Arc::clone(&state),
            // The loop is gone; hand back whatever was last published.
            Err(_) => self.state(),
        };
        state
    }

    /// Persists a new message and returns the store-assigned id.
    pub async fn append(&self, message: &Message) -> Result<String> {
        let data = message.to_document_data()?;
        let id = self.store.append(&self.messages_collection, data).await?;
        debug!(id = %id, seq = message.sequence_number, "message appended");
        Ok(id)
    }

    /// Writes a single voter's entry. `None` removes it. Other voters' entries
    /// are never rewritten, so concurrent voters do not overwrite each other.
    pub async fn write_vote(&self, message_id: &str, voter_id: &str, vote: Option<VoteDirection>) -> Result<()> {
        let path = ["votes".to_string(), voter_id.to_string()];
        let value = vote.map(|v| serde_json::Value::from(v.value()));
        self.store
            .update_field(&self.messages_collection, message_id, &path, value)
            .await?;
        Ok(())
    }

    /// Stops the loop and drops both subscriptions.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let task = self.task.lock().ok().and_then(|mut t| t.take());
        if let Some(task) = task {
            if let Err(err) = task.await {
                warn!(error = %err, "sync loop ended abnormally");
            }
        }
    }
}

impl Drop for FeedSynchronizer {
    fn drop(&mut self) {
        if let Ok(mut task) = self.task.lock() {
            if let Some(task) = task.take() {
                task.abort();
            }
        }
    }
}

fn decode_messages(docs: &[Document]) -> Vec<Message> {
    docs.iter()
        .filter_map(|doc| match Message::from_document(doc) {
            Ok(message) => Some(message),
            Err(err) => {
                warn!(id = %doc.id, error = %err, "skipping undecodable message document");
                None
            }
        })
        .collect()
}

async fn run_sync_loop(
    mut messages: SnapshotStream,
    mut bans: SnapshotStream,
    state_tx: watch::Sender<Arc<FeedState>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut all: Vec<Message> = Vec::new();
    let mut ban_set = BanSet::default();
    let mut loaded = false;

    loop {
        tokio::select! {
            // Shutdown first, then messages before bans when both are ready.
            biased;

            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
                continue;
            }
            next = messages.recv() => match next {
                Some(Ok(docs)) => {
                    all = decode_messages(&docs);
                    loaded = true;
                    debug!(count = all.len(), "message snapshot replaced");
                }
                Some(Err(err)) => {
                    warn!(error = %err, "message subscription failed; keeping last snapshot");
                    continue;
                }
                None => {
                    warn!("message subscription closed by store");
                    break;
                }
            },
            next = bans.recv() => match next {
                Some(Ok(docs)) => {
                    ban_set = BanSet::from_documents(&docs);
                    debug!(count = ban_set.len(), "ban snapshot replaced");
                }
                Some(Err(err)) => {
                    warn!(error = %err, "ban subscription failed; keeping last ban set");
                    continue;
                }
                None => {
                    warn!("ban subscription closed by store");
                    break;
                }
            },
        }

        state_tx.send_replace(Arc::new(FeedState::rebuild(all.clone(), ban_set.clone(), loaded)));
    }

    // Dropping the receivers here is the unsubscribe.
    info!("feed synchronizer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::message;
    use al_core::{FeedError, MockDocumentStore};
    use serde_json::json;
    use tokio::sync::mpsc;

    type Feeds = (
        mpsc::UnboundedSender<anyhow::Result<Vec<Document>>>,
        mpsc::UnboundedSender<anyhow::Result<Vec<Document>>>,
    );

    fn store_with_feeds() -> (MockDocumentStore, Feeds) {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let (ban_tx, ban_rx) = mpsc::unbounded_channel();
        let mut store = MockDocumentStore::new();
        let mut msg_rx = Some(msg_rx);
        let mut ban_rx = Some(ban_rx);
        store.expect_subscribe().times(2).returning(move |collection, order| {
            if collection == "messages" {
                assert_eq!(order, OrderBy::desc("timestamp"));
                msg_rx.take().ok_or_else(|| anyhow::anyhow!("subscribed twice"))
            } else {
                ban_rx.take().ok_or_else(|| anyhow::anyhow!("subscribed twice"))
            }
        });
        (store, (msg_tx, ban_tx))
    }

    fn doc(m: &Message) -> Document {
        Document { id: m.id.clone(), data: m.to_document_data().unwrap() }
    }

    fn ban_doc(user: &str) -> Document {
        Document { id: user.into(), data: json!({ "userId": user, "timestamp": 0 }) }
    }

    #[tokio::test]
    async fn test_snapshot_replaces_state_wholesale() {
        let (store, (msg_tx, _ban_tx)) = store_with_feeds();
        let sync = FeedSynchronizer::start(Arc::new(store), &FeedSettings::default()).await.unwrap();
        let mut rx = sync.subscribe();

        msg_tx.send(Ok(vec![doc(&message("a", 1, "u")), doc(&message("b", 2, "u"))])).unwrap();
        let state = sync.loaded().await;
        assert_eq!(state.all.len(), 2);

        msg_tx.send(Ok(vec![doc(&message("c", 3, "u"))])).unwrap();
        let state = rx.wait_for(|s| s.all.len() == 1).await.unwrap().clone();
        assert_eq!(state.all[0].id, "c");
        assert!(state.visible.get("a").is_none());

        sync.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_notification_keeps_last_snapshot() {
        let (store, (msg_tx, ban_tx)) = store_with_feeds();
        let sync = FeedSynchronizer::start(Arc::new(store), &FeedSettings::default()).await.unwrap();
        let mut rx = sync.subscribe();

        msg_tx.send(Ok(vec![doc(&message("a", 1, "u"))])).unwrap();
        sync.loaded().await;
        msg_tx.send(Err(anyhow::anyhow!("network down"))).unwrap();
        // A later ban snapshot proves the error was processed without clearing the feed.
        ban_tx.send(Ok(vec![ban_doc("nobody")])).unwrap();

        let state = rx.wait_for(|s| s.bans.len() == 1).await.unwrap().clone();
        assert_eq!(state.all.len(), 1);
        assert!(state.loaded);

        sync.shutdown().await;
    }

    #[tokio::test]
    async fn test_ban_snapshot_hides_without_deleting() {
        let (store, (msg_tx, ban_tx)) = store_with_feeds();
        let sync = FeedSynchronizer::start(Arc::new(store), &FeedSettings::default()).await.unwrap();
        let mut rx = sync.subscribe();

        msg_tx
            .send(Ok(vec![doc(&message("a", 1, "spam")), doc(&message("b", 2, "ok")), doc(&message("c", 3, "spam"))]))
            .unwrap();
        ban_tx.send(Ok(vec![ban_doc("spam")])).unwrap();

        let state = rx.wait_for(|s| s.loaded && s.bans.contains("spam")).await.unwrap().clone();
        assert_eq!(state.all.len(), 3);
        assert_eq!(state.visible.len(), 1);
        assert_eq!(state.visible.messages()[0].id, "b");
        assert_eq!(state.find("a").map(|m| m.sender_id.as_str()), Some("spam"));

        sync.shutdown().await;
    }

    #[tokio::test]
    async fn test_undecodable_documents_are_skipped() {
        let (store, (msg_tx, _ban_tx)) = store_with_feeds();
        let sync = FeedSynchronizer::start(Arc::new(store), &FeedSettings::default()).await.unwrap();

        msg_tx
            .send(Ok(vec![
                doc(&message("a", 1, "u")),
                Document { id: "broken".into(), data: json!({ "content": 7 }) },
            ]))
            .unwrap();
        let state = sync.loaded().await;
        assert_eq!(state.all.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(), vec!["a"]);

        sync.shutdown().await;
    }

    #[tokio::test]
    async fn test_append_failure_is_returned_to_caller() {
        let (mut store, _feeds) = store_with_feeds();
        store.expect_append().returning(|_, _| Err(anyhow::anyhow!("PERMISSION_DENIED")));
        let sync = FeedSynchronizer::start(Arc::new(store), &FeedSettings::default()).await.unwrap();

        let err = sync.append(&message("", 1, "u")).await.unwrap_err();
        assert!(matches!(err, FeedError::Transport(_)));
        assert_eq!(err.to_string(), "PERMISSION_DENIED");
        sync.shutdown().await;
    }

    #[tokio::test]
    async fn test_vote_write_targets_single_voter_key() {
        let (mut store, _feeds) = store_with_feeds();
        store
            .expect_update_field()
            .withf(|c, id, path, value| {
                c == "messages" && id == "m1" && path.len() == 2 && path[0] == "votes" && path[1] == "u9" && value.is_none()
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        let sync = FeedSynchronizer::start(Arc::new(store), &FeedSettings::default()).await.unwrap();

        tokio_test::assert_ok!(sync.write_vote("m1", "u9", None).await);
        sync.shutdown().await;
    }
}
