mod common;

use std::time::Duration;

use al_feed::{FeedQuery, SendRequest};
use chrono::Utc;
use common::{message, seed, Builder};

#[tokio::test]
async fn test_reply_resolves_parent_context() {
    let h = Builder::new().anonymous_as("me").await.start().await;
    let parent = seed(&h.store, &message(7, "op", "original post")).await;
    h.wait_for(|s| s.all.len() == 1).await;

    let reply = h.service.send(SendRequest::new("agreed").reply_to(&parent)).await.unwrap();
    let state = h.wait_for(|s| s.visible.get(&reply).is_some()).await;
    let reply = state.visible.get(&reply).unwrap();

    assert!(reply.is_reply());
    let ctx = h.service.resolve_parent(reply).unwrap();
    assert_eq!(ctx.id, parent);
    assert_eq!(ctx.sequence_number, 7);
    assert_eq!(ctx.content, "original post");
    assert_eq!(state.visible.replies_to(&parent).count(), 1);
}

#[tokio::test]
async fn test_reply_to_missing_parent_is_accepted_and_renders_without_context() {
    let h = Builder::new().start().await;
    let id = h.service.send(SendRequest::new("into the void").reply_to("deleted-long-ago")).await.unwrap();

    let state = h.wait_for(|s| s.visible.get(&id).is_some()).await;
    let orphan = state.visible.get(&id).unwrap();
    assert_eq!(orphan.parent_id.as_deref(), Some("deleted-long-ago"));
    assert!(h.service.resolve_parent(orphan).is_none());
}

#[tokio::test]
async fn test_parent_from_banned_sender_does_not_resolve() {
    let h = Builder::new().start().await;
    let parent = seed(&h.store, &message(1, "troll", "bait")).await;
    let mut child = message(2, "someone", "reply");
    child.parent_id = Some(parent.clone());
    let child = seed(&h.store, &child).await;
    h.wait_for(|s| s.all.len() == 2).await;

    h.sign_in_admin().await;
    h.service.block_sender("troll").await.unwrap();
    let state = h.wait_for(|s| s.bans.contains("troll")).await;
    let child = state.visible.get(&child).unwrap();
    assert!(h.service.resolve_parent(child).is_none());
}

#[tokio::test]
async fn test_dialogs_and_unread_marker() {
    let h = Builder::new().anonymous_as("me").await.start().await;
    let mine = h.service.send(SendRequest::new("anyone there?")).await.unwrap();
    seed(&h.store, &message(50, "stranger", "unrelated")).await;
    h.wait_for(|s| s.all.len() == 2).await;

    // Never opened, and no reply since the session started.
    assert!(!h.service.has_unread_dialogs().await);
    let dialogs = h.service.open_dialogs().await.unwrap();
    assert_eq!(dialogs.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(), vec![mine.as_str()]);
    assert!(!h.service.has_unread_dialogs().await);

    tokio::time::sleep(Duration::from_millis(5)).await;
    let mut answer = message(51, "stranger", "yes!");
    answer.parent_id = Some(mine.clone());
    answer.timestamp = Utc::now();
    seed(&h.store, &answer).await;
    h.wait_for(|s| s.all.len() == 3).await;

    assert!(h.service.has_unread_dialogs().await);
    let listed = h.service.list(&FeedQuery { dialogs_only: true, ..Default::default() });
    assert_eq!(listed.len(), 2);

    tokio::time::sleep(Duration::from_millis(5)).await;
    h.service.open_dialogs().await.unwrap();
    assert!(!h.service.has_unread_dialogs().await);
}

#[tokio::test]
async fn test_live_reply_on_fresh_client_is_unread() {
    let h = Builder::new().anonymous_as("me").await.start().await;
    let mine = h.service.send(SendRequest::new("first post")).await.unwrap();

    // Written before this session began: already seen.
    let mut stale = message(1, "stranger", "old answer");
    stale.parent_id = Some(mine.clone());
    seed(&h.store, &stale).await;
    h.wait_for(|s| s.all.len() == 2).await;
    assert!(!h.service.has_unread_dialogs().await);

    tokio::time::sleep(Duration::from_millis(5)).await;
    let mut live = message(2, "stranger", "welcome!");
    live.parent_id = Some(mine.clone());
    live.timestamp = Utc::now();
    seed(&h.store, &live).await;
    h.wait_for(|s| s.all.len() == 3).await;

    assert!(h.service.has_unread_dialogs().await);
}
