//! # Tag Normalizer
//!
//! Hashtags found in the body are merged with explicitly entered tags into an
//! ordered, case-insensitively unique, lower-cased, length-bounded set.
//! Automatic tags come first, in the order they appear.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// `#` followed by word characters of any script (`\w` is Unicode-aware).
static HASHTAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#\w+").expect("hashtag pattern is valid"));

/// Every `#` followed by at least one word character, in order of appearance.
pub fn extract_hashtags(content: &str) -> Vec<&str> {
    HASHTAG.find_iter(content).map(|m| m.as_str()).collect()
}

/// Splits comma-separated manual entries, trims them, and prefixes `#` where missing.
fn manual_tags(entries: &[String]) -> impl Iterator<Item = String> + '_ {
    entries
        .iter()
        .flat_map(|entry| entry.split(','))
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            if segment.starts_with('#') {
                segment.to_string()
            } else {
                format!("#{segment}")
            }
        })
}

pub fn normalize_tags(content: &str, manual: &[String], max_tag_length: usize) -> Vec<String> {
    let automatic = extract_hashtags(content).into_iter().map(str::to_string);

    let mut seen = HashSet::new();
    let mut tags = Vec::new();
    for tag in automatic.chain(manual_tags(manual)) {
        let lowered = tag.to_lowercase();
        let len = lowered.chars().count();
        // A lone "#" carries no tag.
        if len < 2 || len > max_tag_length {
            continue;
        }
        if seen.insert(lowered.clone()) {
            tags.push(lowered);
        }
    }
    tags
}
