//! # Domain Models
//!
//! These structs represent the documents the feed exchanges with the remote store.
//! Field names are camelCase on the wire; timestamps travel as epoch milliseconds.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::traits::Document;

/// The feed's unit of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Assigned by the remote store; lives on the document, not in its body.
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
    /// Sender wall-clock reading at post time.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub sequence_number: u64,
    pub sender_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
    /// voter -> -1 | +1. A missing key means "no vote".
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub votes: BTreeMap<String, i32>,

    // Extension fields, carried through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_count: Option<u64>,
}

impl Message {
    /// Maps a stored document onto a `Message`, taking the id from the document.
    pub fn from_document(doc: &Document) -> Result<Self, serde_json::Error> {
        let mut message: Message = serde_json::from_value(doc.data.clone())?;
        message.id = doc.id.clone();
        Ok(message)
    }

    /// Document body for the append path. The id is never part of the body.
    pub fn to_document_data(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Sum of all recorded votes.
    pub fn score(&self) -> i64 {
        self.votes.values().map(|v| i64::from(*v)).sum()
    }

    pub fn vote_of(&self, voter_id: &str) -> Option<VoteDirection> {
        self.votes.get(voter_id).copied().and_then(VoteDirection::from_value)
    }

    /// Human-readable label, e.g. `#007`.
    pub fn display_label(&self) -> String {
        format!("#{:03}", self.sequence_number)
    }

    pub fn is_reply(&self) -> bool {
        self.parent_id.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// Direction of a single vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    /// The value stored in the votes map.
    pub fn value(self) -> i32 {
        match self {
            VoteDirection::Up => 1,
            VoteDirection::Down => -1,
        }
    }

    pub fn from_value(value: i32) -> Option<Self> {
        match value {
            1 => Some(VoteDirection::Up),
            -1 => Some(VoteDirection::Down),
            _ => None,
        }
    }
}

/// Profile record keyed by the authenticated principal's uid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub display_name: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub email: Option<String>,
    /// Mutated externally; the feed only reads it.
    #[serde(default)]
    pub karma: i64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub email_verified: bool,
}

/// Presence of a record for a sender hides every message from that sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BanRecord {
    pub user_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl BanRecord {
    pub fn from_document(doc: &Document) -> Result<Self, serde_json::Error> {
        serde_json::from_value(doc.data.clone())
    }
}

/// A logged-in principal as reported by the authentication collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub email_verified: bool,
}
