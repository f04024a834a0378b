//! # al-feed
//!
//! The feed synchronization and moderation engine: keeps a live, moderated,
//! ordered view of the shared message collection and implements the write
//! operations the presentation layer is allowed to perform.

pub mod identity;
pub mod moderation;
pub mod rate_limit;
pub mod replies;
pub mod sequence;
pub mod service;
pub mod session;
pub mod sync;
pub mod tags;
pub mod views;
pub mod votes;

#[cfg(test)]
pub(crate) mod test_support;

pub use identity::{derive_display_name, IdentityProvider};
pub use moderation::{visible, BanSet, Moderator};
pub use rate_limit::{Countdown, RateLimiter};
pub use replies::{resolve_parent, FeedSnapshot, ParentContext};
pub use sequence::next_sequence;
pub use service::{FeedPorts, FeedService, SendRequest};
pub use session::SessionContext;
pub use sync::{FeedState, FeedSynchronizer};
pub use tags::normalize_tags;
pub use views::{FeedQuery, SortOrder, TagCount};
pub use votes::{score, toggle_vote};
