//! Builders shared by unit tests.

use chrono::{DateTime, TimeZone, Utc};

use al_core::Message;

pub(crate) fn at(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}

pub(crate) fn message(id: &str, seq: u64, sender: &str) -> Message {
    Message {
        id: id.to_string(),
        title: None,
        content: format!("message {id}"),
        timestamp: at(seq as i64 * 1_000),
        sequence_number: seq,
        sender_id: sender.to_string(),
        sender_name: None,
        sender_avatar: None,
        parent_id: None,
        tags: vec![],
        is_admin: None,
        votes: Default::default(),
        community: None,
        media: None,
        comment_count: None,
        share_count: None,
    }
}

pub(crate) fn reply(id: &str, seq: u64, sender: &str, parent: &str) -> Message {
    Message { parent_id: Some(parent.to_string()), ..message(id, seq, sender) }
}
