//! Shared fixtures: a feed service wired to the in-memory store, the simple
//! auth provider, and an in-memory session.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use al_auth_simple::SimpleAuthProvider;
use al_core::{FeedSettings, Identity, Message};
use al_feed::session::ANON_ID_KEY;
use al_feed::{FeedPorts, FeedService, FeedState};
use al_store_memory::{MemoryDocumentStore, MemorySessionStore};
use al_core::SessionStore;
use chrono::{DateTime, Utc};

pub const ADMIN_EMAIL: &str = "admin@anonlog.dev";
pub const ADMIN_PASSWORD: &str = "correct horse";

pub struct Harness {
    pub store: Arc<MemoryDocumentStore>,
    pub auth: Arc<SimpleAuthProvider>,
    pub session: Arc<MemorySessionStore>,
    pub service: FeedService,
}

pub fn settings() -> FeedSettings {
    FeedSettings {
        cooldown: Duration::ZERO,
        admin_emails: vec![ADMIN_EMAIL.to_string()],
        name_salt: "test-salt".to_string(),
        ..Default::default()
    }
}

pub struct Builder {
    settings: FeedSettings,
    store: Arc<MemoryDocumentStore>,
    auth: Arc<SimpleAuthProvider>,
    session: Arc<MemorySessionStore>,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            settings: settings(),
            store: Arc::new(MemoryDocumentStore::new()),
            auth: Arc::new(SimpleAuthProvider::new()),
            session: Arc::new(MemorySessionStore::new()),
        }
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.settings.cooldown = cooldown;
        self
    }

    pub fn store(mut self, store: Arc<MemoryDocumentStore>) -> Self {
        self.store = store;
        self
    }

    pub fn auth(mut self, auth: Arc<SimpleAuthProvider>) -> Self {
        self.auth = auth;
        self
    }

    /// Pins the anonymous id the session will report.
    pub async fn anonymous_as(self, id: &str) -> Self {
        self.session.set(ANON_ID_KEY, id).await.expect("memory session");
        self
    }

    pub async fn start(self) -> Harness {
        let service = FeedService::start(
            self.settings,
            FeedPorts {
                store: self.store.clone(),
                profiles: self.store.clone(),
                auth: self.auth.clone(),
                session: self.session.clone(),
            },
        )
        .await
        .expect("service starts");
        service.loaded().await;
        Harness { store: self.store, auth: self.auth, session: self.session, service }
    }
}

impl Harness {
    pub async fn anonymous() -> Self {
        Builder::new().start().await
    }

    /// Waits (bounded) until the published feed state satisfies `pred`.
    pub async fn wait_for(&self, pred: impl FnMut(&Arc<FeedState>) -> bool) -> Arc<FeedState> {
        let mut updates = self.service.updates();
        let state = tokio::time::timeout(Duration::from_secs(5), updates.wait_for(pred))
            .await
            .expect("feed state reached in time")
            .expect("synchronizer running");
        Arc::clone(&state)
    }

    pub async fn wait_for_identity(&self, pred: impl FnMut(&Arc<Identity>) -> bool) -> Arc<Identity> {
        let mut changes = self.service.identity_changes();
        let identity = tokio::time::timeout(Duration::from_secs(5), changes.wait_for(pred))
            .await
            .expect("identity reached in time")
            .expect("identity task running");
        Arc::clone(&identity)
    }

    /// Registers, verifies, and signs in the allow-listed admin, then waits for the service to pick it up.
    pub async fn sign_in_admin(&self) -> Arc<Identity> {
        self.auth.register(ADMIN_EMAIL, ADMIN_PASSWORD, Some("root")).expect("register admin");
        self.auth.mark_verified(ADMIN_EMAIL).expect("verify admin");
        self.auth.sign_in(ADMIN_EMAIL, ADMIN_PASSWORD).expect("sign in admin");
        self.wait_for_identity(|i| i.policy.is_admin()).await
    }
}

pub fn at(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).expect("valid timestamp")
}

pub fn message(seq: u64, sender: &str, content: &str) -> Message {
    Message {
        id: String::new(),
        title: None,
        content: content.to_string(),
        timestamp: at(1_700_000_000_000 + seq as i64 * 1_000),
        sequence_number: seq,
        sender_id: sender.to_string(),
        sender_name: None,
        sender_avatar: None,
        parent_id: None,
        tags: Vec::new(),
        is_admin: None,
        votes: Default::default(),
        community: None,
        media: None,
        comment_count: None,
        share_count: None,
    }
}

/// Writes a message straight into the store, bypassing the service. Returns its id.
pub async fn seed(store: &MemoryDocumentStore, message: &Message) -> String {
    use al_core::DocumentStore;
    let data = message.to_document_data().expect("encodable message");
    store.append("messages", data).await.expect("seed message")
}
