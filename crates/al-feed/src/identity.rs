//! # Identity Provider
//!
//! Resolves who the current client is. An authenticated principal wins over
//! the anonymous session id. The caller always gets an identity: profile-store
//! failures degrade to a locally derived profile.

use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use al_core::{AuthCollaborator, AuthorizationPolicy, Identity, Principal, ProfileStore, UserProfile};

use crate::session::SessionContext;

/// Stable, non-reversible display name for a uid (e.g. `anon_3f9a01bc`).
pub fn derive_display_name(salt: &str, uid: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(uid.as_bytes());
    let hash = hex::encode(hasher.finalize());
    format!("anon_{}", &hash[..8])
}

pub struct IdentityProvider {
    session: SessionContext,
    auth: Arc<dyn AuthCollaborator>,
    profiles: Arc<dyn ProfileStore>,
    admin_emails: Vec<String>,
    name_salt: String,
}

impl IdentityProvider {
    pub fn new(
        session: SessionContext,
        auth: Arc<dyn AuthCollaborator>,
        profiles: Arc<dyn ProfileStore>,
        admin_emails: Vec<String>,
        name_salt: String,
    ) -> Self {
        Self { session, auth, profiles, admin_emails, name_salt }
    }

    pub async fn current_identity(&self) -> Identity {
        match self.auth.current_principal() {
            Some(principal) => self.resolve_principal(&principal).await,
            None => Identity::anonymous(self.session.anonymous_id().await),
        }
    }

    async fn resolve_principal(&self, principal: &Principal) -> Identity {
        let policy = AuthorizationPolicy::evaluate(principal, &self.admin_emails);
        let profile = match self.load_or_create_profile(principal).await {
            Ok(profile) => profile,
            Err(err) => {
                warn!(uid = %principal.uid, error = %err, "profile store unavailable; using derived profile");
                self.derived_profile(principal)
            }
        };
        Identity { id: principal.uid.clone(), profile: Some(profile), policy }
    }

    async fn load_or_create_profile(&self, principal: &Principal) -> anyhow::Result<UserProfile> {
        if let Some(profile) = self.profiles.get_profile(&principal.uid).await? {
            return Ok(profile);
        }
        let profile = self.derived_profile(principal);
        self.profiles.create_profile(profile.clone()).await?;
        info!(uid = %principal.uid, "created profile");
        Ok(profile)
    }

    fn derived_profile(&self, principal: &Principal) -> UserProfile {
        UserProfile {
            uid: principal.uid.clone(),
            display_name: principal
                .display_name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .or_else(|| Some(derive_display_name(&self.name_salt, &principal.uid))),
            photo_url: principal.photo_url.clone(),
            email: principal.email.clone(),
            karma: 0,
            created_at: Utc::now(),
            email_verified: principal.email_verified,
        }
    }
}
