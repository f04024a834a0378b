//! # Identity & Authorization
//!
//! The resolved identity of the current client and the one place where
//! moderation privilege is decided.

use crate::error::{FeedError, Result};
use crate::models::{Message, Principal, UserProfile};

/// Who the current client is, resolved once per principal change.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    /// Anonymous id or authenticated uid; becomes `Message::sender_id`.
    pub id: String,
    pub profile: Option<UserProfile>,
    pub policy: AuthorizationPolicy,
}

impl Identity {
    pub fn anonymous(id: String) -> Self {
        let policy = AuthorizationPolicy::anonymous(&id);
        Self { id, profile: None, policy }
    }

    pub fn is_anonymous(&self) -> bool {
        self.profile.is_none()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.profile.as_ref().and_then(|p| p.display_name.as_deref())
    }

    pub fn avatar(&self) -> Option<&str> {
        self.profile.as_ref().and_then(|p| p.photo_url.as_deref())
    }
}

/// Capability object threaded through every moderation action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationPolicy {
    subject: String,
    admin: bool,
}

impl AuthorizationPolicy {
    pub fn anonymous(subject: &str) -> Self {
        Self { subject: subject.to_string(), admin: false }
    }

    /// Admin iff the principal's email is verified and matches an allow-list
    /// entry exactly. Nothing else elevates.
    pub fn evaluate(principal: &Principal, admin_emails: &[String]) -> Self {
        let admin = principal.email_verified
            && principal
                .email
                .as_deref()
                .is_some_and(|email| admin_emails.iter().any(|allowed| allowed == email));
        Self { subject: principal.uid.clone(), admin }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn is_admin(&self) -> bool {
        self.admin
    }

    /// Admins may delete anything; everyone else only their own messages.
    pub fn can_delete(&self, message: &Message) -> bool {
        self.admin || message.sender_id == self.subject
    }

    pub fn can_ban(&self) -> bool {
        self.admin
    }

    pub fn require_delete(&self, message: &Message) -> Result<()> {
        if self.can_delete(message) {
            Ok(())
        } else {
            Err(FeedError::Unauthorized(format!(
                "{} may not delete message {}",
                self.subject, message.id
            )))
        }
    }

    pub fn require_moderator(&self) -> Result<()> {
        if self.admin {
            Ok(())
        } else {
            Err(FeedError::Unauthorized(format!("{} is not a moderator", self.subject)))
        }
    }
}
