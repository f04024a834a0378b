//! # al-auth-simple
//!
//! Argon2-based email/password implementation of `AuthCollaborator`.
//! Holds the accounts in memory, tracks the signed-in principal, and reports
//! every sign-in and sign-out through a watch channel.

use al_core::traits::AuthCollaborator;
use al_core::Principal;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use dashmap::DashMap;
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("an account for {0} already exists")]
    EmailTaken(String),
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("no account for {0}")]
    UnknownAccount(String),
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

#[derive(Debug, Clone)]
struct Account {
    uid: String,
    email: String,
    password_hash: String,
    display_name: Option<String>,
    photo_url: Option<String>,
    email_verified: bool,
}

impl Account {
    fn principal(&self) -> Principal {
        Principal {
            uid: self.uid.clone(),
            email: Some(self.email.clone()),
            display_name: self.display_name.clone(),
            photo_url: self.photo_url.clone(),
            email_verified: self.email_verified,
        }
    }
}

pub struct SimpleAuthProvider {
    /// Keyed by lowercased email.
    accounts: DashMap<String, Account>,
    current: watch::Sender<Option<Principal>>,
}

impl SimpleAuthProvider {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self { accounts: DashMap::new(), current }
    }

    /// Creates an account. The new principal is not signed in.
    pub fn register(&self, email: &str, password: &str, display_name: Option<&str>) -> Result<Principal, AuthError> {
        let key = email.trim().to_lowercase();
        if self.accounts.contains_key(&key) {
            return Err(AuthError::EmailTaken(key));
        }
        let account = Account {
            uid: Uuid::new_v4().simple().to_string(),
            email: key.clone(),
            password_hash: hash_password(password)?,
            display_name: display_name.map(str::to_string),
            photo_url: None,
            email_verified: false,
        };
        let principal = account.principal();
        self.accounts.insert(key, account);
        info!(uid = %principal.uid, "account registered");
        Ok(principal)
    }

    /// Verifies the password and makes the account the current principal.
    pub fn sign_in(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        let key = email.trim().to_lowercase();
        let principal = {
            let account = self.accounts.get(&key).ok_or(AuthError::InvalidCredentials)?;
            if !verify_password(password, &account.password_hash) {
                return Err(AuthError::InvalidCredentials);
            }
            account.principal()
        };
        info!(uid = %principal.uid, "signed in");
        self.current.send_replace(Some(principal.clone()));
        Ok(principal)
    }

    pub fn sign_out(&self) {
        if self.current.send_replace(None).is_some() {
            info!("signed out");
        }
    }

    /// Marks the account's email as confirmed, refreshing the current principal if it is that account.
    pub fn mark_verified(&self, email: &str) -> Result<(), AuthError> {
        let key = email.trim().to_lowercase();
        let principal = {
            let mut account = self.accounts.get_mut(&key).ok_or_else(|| AuthError::UnknownAccount(key.clone()))?;
            account.email_verified = true;
            account.principal()
        };
        self.refresh_current(principal);
        Ok(())
    }

    pub fn set_avatar(&self, email: &str, photo_url: &str) -> Result<(), AuthError> {
        let key = email.trim().to_lowercase();
        let principal = {
            let mut account = self.accounts.get_mut(&key).ok_or_else(|| AuthError::UnknownAccount(key.clone()))?;
            account.photo_url = Some(photo_url.to_string());
            account.principal()
        };
        self.refresh_current(principal);
        Ok(())
    }

    fn refresh_current(&self, principal: Principal) {
        self.current.send_if_modified(|current| match current {
            Some(p) if p.uid == principal.uid => {
                *p = principal;
                true
            }
            _ => false,
        });
    }
}

impl Default for SimpleAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthCollaborator for SimpleAuthProvider {
    fn current_principal(&self) -> Option<Principal> {
        self.current.borrow().clone()
    }

    fn principal_changes(&self) -> watch::Receiver<Option<Principal>> {
        self.current.subscribe()
    }
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes()).map_err(|e| AuthError::Hashing(e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Verifies a password against a stored Argon2 hash.
fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(p) => p,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}
