//! # Reply Resolver
//!
//! Parent lookups for display and "jump to parent" navigation. [`FeedSnapshot`]
//! keeps an id index rebuilt with every snapshot, so resolution is a hash
//! lookup instead of a scan per reply per render.

use std::collections::HashMap;

use al_core::Message;

/// What a reply shows about its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentContext {
    pub id: String,
    pub sequence_number: u64,
    pub sender_id: String,
    pub content: String,
}

impl From<&Message> for ParentContext {
    fn from(parent: &Message) -> Self {
        Self {
            id: parent.id.clone(),
            sequence_number: parent.sequence_number,
            sender_id: parent.sender_id.clone(),
            content: parent.content.clone(),
        }
    }
}

/// Linear lookup of `message.parent_id` in `all`. `None` for top-level
/// posts and for dangling references (deleted, hidden, or not yet synced).
pub fn resolve_parent(message: &Message, all: &[Message]) -> Option<ParentContext> {
    let parent_id = message.parent_id.as_deref()?;
    all.iter().find(|m| m.id == parent_id).map(ParentContext::from)
}

/// An ordered message list with an id index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedSnapshot {
    messages: Vec<Message>,
    index: HashMap<String, usize>,
}

impl FeedSnapshot {
    pub fn new(messages: Vec<Message>) -> Self {
        let index = messages.iter().enumerate().map(|(i, m)| (m.id.clone(), i)).collect();
        Self { messages, index }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.index.get(id).map(|&i| &self.messages[i])
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn resolve_parent(&self, message: &Message) -> Option<ParentContext> {
        let parent_id = message.parent_id.as_deref()?;
        self.get(parent_id).map(ParentContext::from)
    }

    /// Direct replies to `id`, in snapshot order.
    pub fn replies_to<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Message> + 'a {
        self.messages.iter().filter(move |m| m.parent_id.as_deref() == Some(id))
    }
}

impl<'a> IntoIterator for &'a FeedSnapshot {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}
