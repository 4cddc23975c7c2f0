#![cfg(feature = "test-utils")]

// Notification fan-out, read-state mutations, and live subscriptions.
//
// Requirements: Docker (for Neo4j via testcontainers)
//
// Run with: cargo test -p canopy-graph --features test-utils --test notification_test

use std::time::Duration;

use canopy_common::{NewComment, NewPost, NewProfile, NotificationKind};
use canopy_graph::{
    subscribe_notifications, subscribe_unread_count, SocialGraphReader, SocialGraphWriter,
};

async fn setup() -> (impl std::any::Any, SocialGraphWriter, SocialGraphReader) {
    let (container, client) = canopy_graph::testutil::neo4j_container().await;
    let writer = SocialGraphWriter::new(client.clone());
    let reader = SocialGraphReader::new(client);
    (container, writer, reader)
}

async fn seed_users(writer: &SocialGraphWriter, uids: &[&str]) {
    for uid in uids {
        writer
            .upsert_profile(&NewProfile {
                uid: uid.to_string(),
                display_name: format!("User {uid}"),
                email: format!("{uid}@example.com"),
                photo_url: None,
                bio: None,
                expertise_tags: vec![],
            })
            .await
            .expect("seed user");
    }
}

async fn seed_post(writer: &SocialGraphWriter, author: &str) -> uuid::Uuid {
    writer
        .create_post(&NewPost {
            author_id: author.to_string(),
            content: "a post".to_string(),
            media_url: None,
        })
        .await
        .expect("seed post")
        .id
}

#[tokio::test]
async fn like_fans_out_to_the_author() {
    let (_c, writer, reader) = setup().await;
    seed_users(&writer, &["author", "fan"]).await;
    let post_id = seed_post(&writer, "author").await;

    writer.toggle_like(post_id, "fan").await.unwrap();

    let items = reader.list_notifications("author", 10).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].kind, NotificationKind::Like);
    assert_eq!(items[0].actor_id, "fan");
    assert_eq!(items[0].ref_id, post_id.to_string());
    assert!(!items[0].read);
}

#[tokio::test]
async fn self_engagement_does_not_notify() {
    let (_c, writer, reader) = setup().await;
    seed_users(&writer, &["author"]).await;
    let post_id = seed_post(&writer, "author").await;

    writer.toggle_like(post_id, "author").await.unwrap();
    writer
        .create_comment(&NewComment {
            post_id,
            author_id: "author".to_string(),
            content: "replying to myself".to_string(),
        })
        .await
        .unwrap();

    assert!(reader.list_notifications("author", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn unlike_does_not_notify() {
    let (_c, writer, reader) = setup().await;
    seed_users(&writer, &["author", "fan"]).await;
    let post_id = seed_post(&writer, "author").await;

    writer.toggle_like(post_id, "fan").await.unwrap();
    writer.toggle_like(post_id, "fan").await.unwrap();

    // Only the original like notification exists
    let items = reader.list_notifications("author", 10).await.unwrap();
    assert_eq!(items.len(), 1);
}

#[tokio::test]
async fn follow_fans_out_once() {
    let (_c, writer, reader) = setup().await;
    seed_users(&writer, &["a", "b"]).await;

    writer.follow_user("a", "b").await.unwrap();
    writer.follow_user("a", "b").await.unwrap(); // no-op, no second notification

    let items = reader.list_notifications("b", 10).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].kind, NotificationKind::Follow);
    assert_eq!(items[0].actor_id, "a");
}

#[tokio::test]
async fn read_state_mutations_are_idempotent() {
    let (_c, writer, reader) = setup().await;
    seed_users(&writer, &["recipient"]).await;

    let n1 = writer
        .push_notification("recipient", NotificationKind::Message, "m1", "someone")
        .await
        .unwrap();
    writer
        .push_notification("recipient", NotificationKind::Message, "m2", "someone")
        .await
        .unwrap();

    assert_eq!(reader.unread_count("recipient").await.unwrap(), 2);

    writer.mark_notification_read(n1.id).await.unwrap();
    writer.mark_notification_read(n1.id).await.unwrap(); // no-op
    assert_eq!(reader.unread_count("recipient").await.unwrap(), 1);

    writer.mark_all_notifications_read("recipient").await.unwrap();
    assert_eq!(reader.unread_count("recipient").await.unwrap(), 0);

    writer.delete_notification(n1.id).await.unwrap();
    writer.delete_notification(n1.id).await.unwrap(); // no-op
    assert_eq!(reader.list_notifications("recipient", 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn paged_notifications_are_newest_first_and_complete() {
    let (_c, writer, reader) = setup().await;
    seed_users(&writer, &["recipient"]).await;

    for i in 0..12 {
        writer
            .push_notification("recipient", NotificationKind::Message, &format!("m{i}"), "actor")
            .await
            .unwrap();
    }

    let mut collected = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = reader
            .list_notifications_paged("recipient", 5, cursor.as_deref())
            .await
            .unwrap();
        collected.extend(page.items);
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    assert_eq!(collected.len(), 12);
    for pair in collected.windows(2) {
        assert!(pair[0].created_at >= pair[1].created_at);
    }
}

#[tokio::test]
async fn unread_count_subscription_pushes_changes() {
    let (_c, writer, reader) = setup().await;
    seed_users(&writer, &["recipient"]).await;

    let mut sub = subscribe_unread_count(reader.clone(), "recipient", Duration::from_millis(50));

    // Initial snapshot
    assert_eq!(sub.next().await, Some(0));

    writer
        .push_notification("recipient", NotificationKind::Message, "m1", "actor")
        .await
        .unwrap();
    assert_eq!(sub.next().await, Some(1));

    writer.mark_all_notifications_read("recipient").await.unwrap();
    assert_eq!(sub.next().await, Some(0));

    sub.unsubscribe();
}

#[tokio::test]
async fn notification_subscription_dedupes_snapshots() {
    let (_c, writer, reader) = setup().await;
    seed_users(&writer, &["recipient"]).await;

    let mut sub =
        subscribe_notifications(reader.clone(), "recipient", 10, Duration::from_millis(50));

    let first = sub.next().await.unwrap();
    assert!(first.is_empty());

    let pushed = writer
        .push_notification("recipient", NotificationKind::Message, "m1", "actor")
        .await
        .unwrap();
    let snapshot = sub.next().await.unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, pushed.id);

    // Read-state change is a new snapshot
    writer.mark_notification_read(pushed.id).await.unwrap();
    let snapshot = sub.next().await.unwrap();
    assert!(snapshot[0].read);
}
