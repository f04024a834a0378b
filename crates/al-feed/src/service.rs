//! # FeedService
//!
//! The surface the presentation layer talks to. Orchestrates identity, rate
//! limiting, message construction, the synchronizer write path, moderation,
//! and voting.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use al_core::{
    AuthCollaborator, DocumentStore, FeedError, FeedSettings, Identity, Message, ProfileStore, Result,
    SessionStore, VoteDirection,
};

use crate::identity::IdentityProvider;
use crate::moderation::Moderator;
use crate::rate_limit::{ceil_secs, Countdown, RateLimiter};
use crate::replies::ParentContext;
use crate::sequence::next_sequence;
use crate::session::SessionContext;
use crate::sync::{FeedState, FeedSynchronizer};
use crate::tags::normalize_tags;
use crate::views::{self, FeedQuery, TagCount};
use crate::votes::next_vote;

/// A post as entered by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendRequest {
    pub content: String,
    pub title: Option<String>,
    pub parent_id: Option<String>,
    /// Raw tag input; entries may themselves be comma-separated.
    pub manual_tags: Vec<String>,
}

impl SendRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into(), ..Default::default() }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn reply_to(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.manual_tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Collaborators the service is assembled from.
pub struct FeedPorts {
    pub store: Arc<dyn DocumentStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub auth: Arc<dyn AuthCollaborator>,
    pub session: Arc<dyn SessionStore>,
}

pub struct FeedService {
    settings: FeedSettings,
    sync: FeedSynchronizer,
    moderator: Moderator,
    identities: Arc<IdentityProvider>,
    session: SessionContext,
    identity_tx: Arc<watch::Sender<Arc<Identity>>>,
    identity_task: std::sync::Mutex<Option<JoinHandle<()>>>,
    limiter: Mutex<RateLimiter>,
    countdown: Countdown,
}

impl FeedService {
    /// Resolves the identity, subscribes to the feed, and starts following
    /// principal changes.
    pub async fn start(settings: FeedSettings, ports: FeedPorts) -> Result<Self> {
        let session = SessionContext::new(ports.session);
        let identities = Arc::new(IdentityProvider::new(
            session.clone(),
            Arc::clone(&ports.auth),
            ports.profiles,
            settings.admin_emails.clone(),
            settings.name_salt.clone(),
        ));

        let identity = identities.current_identity().await;
        info!(id = %identity.id, anonymous = identity.is_anonymous(), admin = identity.policy.is_admin(), "identity resolved");
        let (identity_tx, _) = watch::channel(Arc::new(identity));
        let identity_tx = Arc::new(identity_tx);

        let sync = FeedSynchronizer::start(Arc::clone(&ports.store), &settings).await?;
        let moderator = Moderator::new(
            ports.store,
            settings.messages_collection.clone(),
            settings.bans_collection.clone(),
        );

        let identity_task = tokio::spawn(follow_principal(
            ports.auth.principal_changes(),
            Arc::clone(&identities),
            Arc::clone(&identity_tx),
        ));

        Ok(Self {
            limiter: Mutex::new(RateLimiter::new(settings.cooldown)),
            settings,
            sync,
            moderator,
            identities,
            session,
            identity_tx,
            identity_task: std::sync::Mutex::new(Some(identity_task)),
            countdown: Countdown::new(),
        })
    }

    pub fn settings(&self) -> &FeedSettings {
        &self.settings
    }

    pub fn identity(&self) -> Arc<Identity> {
        Arc::clone(&self.identity_tx.borrow())
    }

    pub fn identity_changes(&self) -> watch::Receiver<Arc<Identity>> {
        self.identity_tx.subscribe()
    }

    /// Re-resolves the identity now instead of waiting for a principal change.
    pub async fn refresh_identity(&self) -> Arc<Identity> {
        let identity = Arc::new(self.identities.current_identity().await);
        self.identity_tx.send_replace(Arc::clone(&identity));
        identity
    }

    /// Latest moderated state.
    pub fn snapshot(&self) -> Arc<FeedState> {
        self.sync.state()
    }

    pub fn updates(&self) -> watch::Receiver<Arc<FeedState>> {
        self.sync.subscribe()
    }

    pub async fn loaded(&self) -> Arc<FeedState> {
        self.sync.loaded().await
    }

    /// Whole seconds left before the next send is accepted.
    pub fn cooldown_remaining(&self) -> u64 {
        self.countdown.remaining()
    }

    pub fn cooldown(&self) -> watch::Receiver<u64> {
        self.countdown.subscribe()
    }

    /// Builds and persists a post. Returns the store-assigned id.
    ///
    /// On failure nothing is recorded against the cooldown, so the caller can
    /// keep the input and retry.
    pub async fn send(&self, request: SendRequest) -> Result<String> {
        let mut limiter = self.limiter.lock().await;
        let now = Instant::now();
        if !limiter.allows(now) {
            return Err(FeedError::RateLimitExceeded { remaining_secs: limiter.remaining_secs(now) });
        }

        let identity = self.identity();
        let message = self.build_message(&identity, request)?;
        let id = self.sync.append(&message).await?;

        limiter.record(now);
        self.countdown.start(ceil_secs(limiter.cooldown()));
        info!(id = %id, seq = message.sequence_number, sender = %identity.id, tags = ?message.tags, "message sent");
        Ok(id)
    }

    fn build_message(&self, identity: &Identity, request: SendRequest) -> Result<Message> {
        let limits = &self.settings.limits;

        let content = request.content.trim();
        if content.is_empty() {
            return Err(FeedError::ValidationError("content must not be empty".into()));
        }
        if content.chars().count() > limits.max_content_length {
            return Err(FeedError::ValidationError(format!(
                "content exceeds {} characters",
                limits.max_content_length
            )));
        }

        let title = request
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        if title.as_ref().is_some_and(|t| t.chars().count() > limits.max_title_length) {
            return Err(FeedError::ValidationError(format!(
                "title exceeds {} characters",
                limits.max_title_length
            )));
        }

        let parent_id = request.parent_id.filter(|p| !p.trim().is_empty());
        let state = self.sync.state();
        if let Some(parent) = parent_id.as_deref() {
            if state.find(parent).is_none() {
                debug!(parent = %parent, "replying to a message not in the local snapshot");
            }
        }

        Ok(Message {
            id: String::new(),
            title,
            content: content.to_string(),
            timestamp: Utc::now(),
            sequence_number: next_sequence(&state.all),
            sender_id: identity.id.clone(),
            sender_name: identity.display_name().map(str::to_string),
            sender_avatar: identity.avatar().map(str::to_string),
            parent_id,
            tags: normalize_tags(content, &request.manual_tags, limits.max_tag_length),
            is_admin: (!identity.is_anonymous()).then(|| identity.policy.is_admin()),
            votes: Default::default(),
            community: None,
            media: None,
            comment_count: None,
            share_count: None,
        })
    }

    /// Toggles the current identity's vote on a message.
    pub async fn vote(&self, message_id: &str, direction: VoteDirection) -> Result<()> {
        let identity = self.identity();
        let state = self.sync.state();
        let message = state
            .visible
            .get(message_id)
            .ok_or_else(|| FeedError::NotFound("message".into(), message_id.into()))?;

        let vote = next_vote(message.vote_of(&identity.id), direction);
        self.sync.write_vote(message_id, &identity.id, vote).await?;
        debug!(id = %message_id, voter = %identity.id, vote = ?vote, "vote written");
        Ok(())
    }

    /// Admins may delete any message, senders their own.
    pub async fn delete_message(&self, message_id: &str) -> Result<()> {
        let identity = self.identity();
        let state = self.sync.state();
        let message = state
            .find(message_id)
            .ok_or_else(|| FeedError::NotFound("message".into(), message_id.into()))?;
        self.moderator.delete_message(&identity.policy, message).await
    }

    pub async fn block_sender(&self, sender_id: &str) -> Result<()> {
        let identity = self.identity();
        self.moderator.ban_sender(&identity.policy, sender_id).await
    }

    pub async fn unblock_sender(&self, sender_id: &str) -> Result<()> {
        let identity = self.identity();
        self.moderator.unban_sender(&identity.policy, sender_id).await
    }

    pub fn resolve_parent(&self, message: &Message) -> Option<ParentContext> {
        self.sync.state().visible.resolve_parent(message)
    }

    /// Moderated feed filtered and sorted for display.
    pub fn list(&self, query: &FeedQuery) -> Vec<Message> {
        let state = self.sync.state();
        let viewer = self.identity();
        views::query(state.visible.messages(), &viewer.id, query)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn popular_tags(&self) -> Vec<TagCount> {
        views::popular_tags(self.sync.state().visible.messages(), self.settings.popular_tags_limit)
    }

    /// Opens the viewer's dialogs and moves the last-read marker to now.
    pub async fn open_dialogs(&self) -> Result<Vec<Message>> {
        let dialogs = self.list(&FeedQuery { dialogs_only: true, ..Default::default() });
        self.session.mark_read(Utc::now()).await?;
        Ok(dialogs)
    }

    /// Whether someone replied in the viewer's dialogs since they were last
    /// opened, or since this session started if they never were.
    pub async fn has_unread_dialogs(&self) -> bool {
        let since = self.session.unread_since().await;
        let viewer = self.identity();
        views::has_unread(self.sync.state().visible.messages(), &viewer.id, since)
    }

    /// Session end: unsubscribes from both collections and stops background tasks.
    pub async fn shutdown(&self) {
        self.countdown.stop();
        let task = self.identity_task.lock().ok().and_then(|mut t| t.take());
        if let Some(task) = task {
            task.abort();
        }
        self.sync.shutdown().await;
        info!("feed service stopped");
    }
}

impl Drop for FeedService {
    fn drop(&mut self) {
        if let Ok(mut task) = self.identity_task.lock() {
            if let Some(task) = task.take() {
                task.abort();
            }
        }
    }
}

async fn follow_principal(
    mut changes: watch::Receiver<Option<al_core::Principal>>,
    identities: Arc<IdentityProvider>,
    identity_tx: Arc<watch::Sender<Arc<Identity>>>,
) {
    while changes.changed().await.is_ok() {
        let identity = identities.current_identity().await;
        info!(id = %identity.id, admin = identity.policy.is_admin(), "identity changed");
        identity_tx.send_replace(Arc::new(identity));
    }
    warn!("auth collaborator stopped reporting principal changes");
}
