//! # Vote Aggregator
//!
//! Each voter holds at most one entry, `+1` or `-1`. Repeating a direction
//! removes the entry; `0` is never stored.

use std::collections::BTreeMap;

use al_core::VoteDirection;

/// The vote a voter ends up with after clicking `requested`.
pub fn next_vote(previous: Option<VoteDirection>, requested: VoteDirection) -> Option<VoteDirection> {
    if previous == Some(requested) {
        None
    } else {
        Some(requested)
    }
}

/// Returns the updated votes map after `voter_id` clicks `direction`.
pub fn toggle_vote(
    votes: &BTreeMap<String, i32>,
    voter_id: &str,
    direction: VoteDirection,
) -> BTreeMap<String, i32> {
    let previous = votes.get(voter_id).copied().and_then(VoteDirection::from_value);
    let mut updated = votes.clone();
    match next_vote(previous, direction) {
        Some(vote) => updated.insert(voter_id.to_string(), vote.value()),
        None => updated.remove(voter_id),
    };
    updated
}

pub fn score(votes: &BTreeMap<String, i32>) -> i64 {
    votes.values().map(|v| i64::from(*v)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use VoteDirection::{Down, Up};

    fn apply(clicks: &[VoteDirection]) -> BTreeMap<String, i32> {
        clicks.iter().fold(BTreeMap::new(), |votes, d| toggle_vote(&votes, "u1", *d))
    }

    #[test]
    fn test_same_direction_twice_removes_the_vote() {
        assert!(apply(&[Up, Up]).is_empty());
        assert!(apply(&[Down, Down]).is_empty());
    }

    #[test]
    fn test_opposite_direction_flips_the_vote() {
        assert_eq!(apply(&[Up, Down]).get("u1"), Some(&-1));
        assert_eq!(apply(&[Down, Up]).get("u1"), Some(&1));
    }

    #[test]
    fn test_unvote_drops_score_to_zero() {
        let votes = BTreeMap::from([("u1".to_string(), 1)]);
        assert_eq!(score(&votes), 1);
        let updated = toggle_vote(&votes, "u1", Up);
        assert!(updated.is_empty());
        assert_eq!(score(&updated), 0);
    }

    #[test]
    fn test_other_voters_are_untouched() {
        let votes = BTreeMap::from([("u1".to_string(), 1), ("u2".to_string(), -1)]);
        let updated = toggle_vote(&votes, "u3", Up);
        assert_eq!(updated.len(), 3);
        assert_eq!(score(&updated), 1);
        assert!(updated.values().all(|v| *v == 1 || *v == -1));
    }
}
