//! Read-side views over the moderated feed: search, tag filter, sort order,
//! popular tags, and the viewer's dialogs.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use al_core::Message;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    /// Highest score first, newest first among equals.
    Best,
}

/// What the presentation layer asks for when listing the feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedQuery {
    pub search: Option<String>,
    pub tag: Option<String>,
    pub sort: SortOrder,
    /// Restrict to the viewer's own messages and replies to them.
    pub dialogs_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

/// Case-insensitive substring match on content, sequence number, or any tag.
/// A blank query matches everything.
pub fn matches_search(message: &Message, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return true;
    }
    message.content.to_lowercase().contains(&query)
        || message.sequence_number.to_string().contains(&query)
        || message.tags.iter().any(|t| t.to_lowercase().contains(&query))
}

pub fn has_tag(message: &Message, tag: &str) -> bool {
    let wanted = tag.trim().to_lowercase();
    let wanted = if wanted.starts_with('#') { wanted } else { format!("#{wanted}") };
    message.tags.iter().any(|t| t.to_lowercase() == wanted)
}

pub fn sort_messages(messages: &mut [&Message], order: SortOrder) {
    match order {
        SortOrder::Newest => messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp)),
        SortOrder::Oldest => messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp)),
        SortOrder::Best => messages.sort_by(|a, b| {
            b.score().cmp(&a.score()).then_with(|| b.timestamp.cmp(&a.timestamp))
        }),
    }
}

/// Messages sent by `viewer`, plus replies to them.
pub fn my_dialogs<'a>(messages: &'a [Message], viewer: &str) -> Vec<&'a Message> {
    let mine: HashSet<&str> = messages
        .iter()
        .filter(|m| m.sender_id == viewer)
        .map(|m| m.id.as_str())
        .collect();
    messages
        .iter()
        .filter(|m| m.sender_id == viewer || m.parent_id.as_deref().is_some_and(|p| mine.contains(p)))
        .collect()
}

/// Whether someone else wrote into the viewer's dialogs after `last_read`.
pub fn has_unread(messages: &[Message], viewer: &str, last_read: DateTime<Utc>) -> bool {
    my_dialogs(messages, viewer)
        .into_iter()
        .any(|m| m.sender_id != viewer && m.timestamp > last_read)
}

/// Tag usage across `messages`, most used first, ties alphabetical.
pub fn popular_tags(messages: &[Message], limit: usize) -> Vec<TagCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for tag in messages.iter().flat_map(|m| m.tags.iter()) {
        *counts.entry(tag.as_str()).or_default() += 1;
    }
    let mut ranked: Vec<TagCount> = counts
        .into_iter()
        .map(|(tag, count)| TagCount { tag: tag.to_string(), count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    ranked.truncate(limit);
    ranked
}

/// Applies a [`FeedQuery`] to the moderated feed.
pub fn query<'a>(messages: &'a [Message], viewer: &str, q: &FeedQuery) -> Vec<&'a Message> {
    let base: Vec<&Message> = if q.dialogs_only {
        my_dialogs(messages, viewer)
    } else {
        messages.iter().collect()
    };

    let mut out: Vec<&Message> = base
        .into_iter()
        .filter(|m| q.search.as_deref().map_or(true, |s| matches_search(m, s)))
        .filter(|m| q.tag.as_deref().map_or(true, |t| has_tag(m, t)))
        .collect();
    sort_messages(&mut out, q.sort);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, message, reply};

    fn tagged(id: &str, seq: u64, tags: &[&str]) -> Message {
        Message { tags: tags.iter().map(|t| t.to_string()).collect(), ..message(id, seq, "u") }
    }

    #[test]
    fn test_search_hits_content_sequence_and_tags() {
        let m = Message { content: "Rust is Fun".into(), ..tagged("a", 42, &["#lang"]) };
        assert!(matches_search(&m, "fun"));
        assert!(matches_search(&m, "42"));
        assert!(matches_search(&m, "#LANG"));
        assert!(matches_search(&m, "   "));
        assert!(!matches_search(&m, "python"));
    }

    #[test]
    fn test_tag_filter_accepts_with_or_without_hash() {
        let m = tagged("a", 1, &["#rust", "#мир"]);
        assert!(has_tag(&m, "#Rust"));
        assert!(has_tag(&m, "rust"));
        assert!(has_tag(&m, "#МИР"));
        assert!(!has_tag(&m, "#rus"));
    }

    #[test]
    fn test_sort_orders() {
        let mut low = message("low", 1, "u");
        low.votes.insert("x".into(), -1);
        let mut high = message("high", 2, "u");
        high.votes.insert("x".into(), 1);
        let newest = message("newest", 3, "u");
        let all = vec![low, high, newest];

        let ids = |order| {
            let mut refs: Vec<&Message> = all.iter().collect();
            sort_messages(&mut refs, order);
            refs.iter().map(|m| m.id.clone()).collect::<Vec<_>>()
        };
        assert_eq!(ids(SortOrder::Newest), vec!["newest", "high", "low"]);
        assert_eq!(ids(SortOrder::Oldest), vec!["low", "high", "newest"]);
        assert_eq!(ids(SortOrder::Best), vec!["high", "newest", "low"]);
    }

    #[test]
    fn test_dialogs_include_replies_to_viewer() {
        let all = vec![
            message("mine", 1, "me"),
            reply("to-me", 2, "bob", "mine"),
            message("other", 3, "bob"),
            reply("to-other", 4, "carol", "other"),
        ];
        let ids: Vec<&str> = my_dialogs(&all, "me").iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["mine", "to-me"]);
    }

    #[test]
    fn test_unread_ignores_own_messages_and_old_replies() {
        let all = vec![message("mine", 1, "me"), reply("to-me", 5, "bob", "mine")];
        assert!(has_unread(&all, "me", at(4_000)));
        assert!(!has_unread(&all, "me", at(5_000)));
        let only_mine = vec![message("mine", 9, "me")];
        assert!(!has_unread(&only_mine, "me", at(0)));
    }

    #[test]
    fn test_popular_tags_ranked_and_limited() {
        let all = vec![
            tagged("1", 1, &["#b", "#a"]),
            tagged("2", 2, &["#b"]),
            tagged("3", 3, &["#c", "#a", "#b"]),
        ];
        let top = popular_tags(&all, 2);
        assert_eq!(
            top,
            vec![TagCount { tag: "#b".into(), count: 3 }, TagCount { tag: "#a".into(), count: 2 }]
        );
    }

    #[test]
    fn test_query_combines_filters() {
        let all = vec![
            Message { content: "hello world".into(), ..tagged("1", 1, &["#x"]) },
            Message { content: "hello there".into(), ..tagged("2", 2, &["#y"]) },
            Message { content: "bye".into(), ..tagged("3", 3, &["#x"]) },
        ];
        let q = FeedQuery { search: Some("hello".into()), tag: Some("x".into()), ..Default::default() };
        let ids: Vec<&str> = query(&all, "u", &q).iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1"]);
    }
}
