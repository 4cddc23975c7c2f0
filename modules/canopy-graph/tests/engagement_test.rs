#![cfg(feature = "test-utils")]

// Engagement ledger integration tests: like toggles, follow edges, and
// the counter-consistency invariant, against a real Neo4j.
//
// Requirements: Docker (for Neo4j via testcontainers)
//
// Run with: cargo test -p canopy-graph --features test-utils --test engagement_test

use futures::future::join_all;
use uuid::Uuid;

use canopy_common::{CanopyError, NewComment, NewPost, NewProfile};
use canopy_graph::{SocialGraphReader, SocialGraphWriter};

async fn setup() -> (impl std::any::Any, SocialGraphWriter, SocialGraphReader) {
    let (container, client) = canopy_graph::testutil::neo4j_container().await;
    let writer = SocialGraphWriter::new(client.clone());
    let reader = SocialGraphReader::new(client);
    (container, writer, reader)
}

fn profile(uid: &str) -> NewProfile {
    NewProfile {
        uid: uid.to_string(),
        display_name: format!("User {uid}"),
        email: format!("{uid}@example.com"),
        photo_url: None,
        bio: None,
        expertise_tags: vec![],
    }
}

async fn seed_users(writer: &SocialGraphWriter, uids: &[&str]) {
    for uid in uids {
        writer.upsert_profile(&profile(uid)).await.expect("seed user");
    }
}

async fn seed_post(writer: &SocialGraphWriter, author: &str, content: &str) -> Uuid {
    writer
        .create_post(&NewPost {
            author_id: author.to_string(),
            content: content.to_string(),
            media_url: None,
        })
        .await
        .expect("seed post")
        .id
}

// --- Likes ---

#[tokio::test]
async fn toggle_like_flips_edge_and_counter() {
    let (_c, writer, reader) = setup().await;
    seed_users(&writer, &["author", "fan"]).await;
    let post_id = seed_post(&writer, "author", "hello").await;

    let on = writer.toggle_like(post_id, "fan").await.unwrap();
    assert!(on.liked);
    assert_eq!(on.like_count, 1);
    assert!(reader.has_liked(post_id, "fan").await.unwrap());
    assert_eq!(reader.count_likes(post_id).await.unwrap(), 1);

    let off = writer.toggle_like(post_id, "fan").await.unwrap();
    assert!(!off.liked);
    assert_eq!(off.like_count, 0);
    assert!(!reader.has_liked(post_id, "fan").await.unwrap());
    assert_eq!(reader.count_likes(post_id).await.unwrap(), 0);
}

#[tokio::test]
async fn toggle_like_twice_is_idempotent() {
    let (_c, writer, reader) = setup().await;
    seed_users(&writer, &["author", "fan"]).await;
    let post_id = seed_post(&writer, "author", "double tap").await;

    let before = reader.get_post(post_id).await.unwrap().unwrap().like_count;
    writer.toggle_like(post_id, "fan").await.unwrap();
    writer.toggle_like(post_id, "fan").await.unwrap();
    let after = reader.get_post(post_id).await.unwrap().unwrap().like_count;
    assert_eq!(before, after);
}

#[tokio::test]
async fn like_on_missing_post_is_not_found() {
    let (_c, writer, _reader) = setup().await;
    seed_users(&writer, &["fan"]).await;

    let err = writer.toggle_like(Uuid::new_v4(), "fan").await.unwrap_err();
    assert!(matches!(err, CanopyError::NotFound(_)));
}

#[tokio::test]
async fn counter_matches_ledger_after_mixed_toggles() {
    let (_c, writer, reader) = setup().await;
    seed_users(&writer, &["author", "u1", "u2", "u3"]).await;
    let post_id = seed_post(&writer, "author", "busy post").await;

    // u1 likes, u2 likes, u1 unlikes, u3 likes, u3 unlikes, u3 likes
    for uid in ["u1", "u2", "u1", "u3", "u3", "u3"] {
        writer.toggle_like(post_id, uid).await.unwrap();
    }

    let post = reader.get_post(post_id).await.unwrap().unwrap();
    let edges = reader.count_likes(post_id).await.unwrap();
    assert_eq!(post.like_count, edges);
    assert_eq!(edges, 2); // u2 and u3
}

#[tokio::test]
async fn concurrent_toggles_keep_counter_consistent() {
    let (_c, writer, reader) = setup().await;
    let users: Vec<String> = (0..8).map(|i| format!("liker{i}")).collect();
    let mut uids: Vec<&str> = users.iter().map(String::as_str).collect();
    uids.push("author");
    seed_users(&writer, &uids).await;
    let post_id = seed_post(&writer, "author", "contended").await;

    let tasks = users.iter().map(|uid| {
        let writer = writer.clone();
        let uid = uid.clone();
        async move { writer.toggle_like(post_id, &uid).await }
    });
    for result in join_all(tasks).await {
        result.expect("toggle under contention");
    }

    let post = reader.get_post(post_id).await.unwrap().unwrap();
    let edges = reader.count_likes(post_id).await.unwrap();
    assert_eq!(post.like_count, edges);
    assert_eq!(edges, 8);
}

// --- Follows ---

#[tokio::test]
async fn self_follow_is_rejected() {
    let (_c, writer, reader) = setup().await;
    seed_users(&writer, &["solo"]).await;

    let err = writer.follow_user("solo", "solo").await.unwrap_err();
    assert!(matches!(err, CanopyError::InvalidOperation(_)));
    let counts = reader.get_follow_counts("solo").await.unwrap();
    assert_eq!(counts.followers, 0);
    assert_eq!(counts.following, 0);
}

#[tokio::test]
async fn repeat_follow_creates_one_edge() {
    let (_c, writer, reader) = setup().await;
    seed_users(&writer, &["a", "b"]).await;

    assert!(writer.follow_user("a", "b").await.unwrap());
    assert!(!writer.follow_user("a", "b").await.unwrap());
    assert!(!writer.follow_user("a", "b").await.unwrap());

    assert!(reader.is_following("a", "b").await.unwrap());
    let counts = reader.get_follow_counts("b").await.unwrap();
    assert_eq!(counts.followers, 1);
}

#[tokio::test]
async fn concurrent_follows_create_one_edge() {
    let (_c, writer, reader) = setup().await;
    seed_users(&writer, &["a", "b"]).await;

    let tasks = (0..10).map(|_| {
        let writer = writer.clone();
        async move { writer.follow_user("a", "b").await }
    });
    for result in join_all(tasks).await {
        result.expect("follow under contention");
    }

    let counts = reader.get_follow_counts("b").await.unwrap();
    assert_eq!(counts.followers, 1);
}

#[tokio::test]
async fn unfollow_removes_the_edge() {
    let (_c, writer, reader) = setup().await;
    seed_users(&writer, &["a", "b"]).await;

    writer.follow_user("a", "b").await.unwrap();
    let removed = writer.unfollow_user("a", "b").await.unwrap();
    assert_eq!(removed, 1);
    assert!(!reader.is_following("a", "b").await.unwrap());

    // Unfollowing again is a no-op
    assert_eq!(writer.unfollow_user("a", "b").await.unwrap(), 0);
}

#[tokio::test]
async fn follow_counts_example() {
    let (_c, writer, reader) = setup().await;
    seed_users(&writer, &["t", "u1", "u2", "u3", "u4", "u5"]).await;

    for follower in ["u1", "u2", "u3"] {
        writer.follow_user(follower, "t").await.unwrap();
    }
    for following in ["u4", "u5"] {
        writer.follow_user("t", following).await.unwrap();
    }

    let counts = reader.get_follow_counts("t").await.unwrap();
    assert_eq!(counts.followers, 3);
    assert_eq!(counts.following, 2);
}

#[tokio::test]
async fn follow_missing_user_is_not_found() {
    let (_c, writer, _reader) = setup().await;
    seed_users(&writer, &["a"]).await;

    let err = writer.follow_user("a", "ghost").await.unwrap_err();
    assert!(matches!(err, CanopyError::NotFound(_)));
}

// --- Companies ---

#[tokio::test]
async fn company_follower_count_tracks_edges() {
    let (_c, writer, reader) = setup().await;
    seed_users(&writer, &["a", "b"]).await;
    let company = writer.create_company("Green Thumb Labs").await.unwrap();

    assert!(writer.follow_company("a", company.id).await.unwrap());
    assert!(!writer.follow_company("a", company.id).await.unwrap());
    assert!(writer.follow_company("b", company.id).await.unwrap());

    let c = reader.get_company(company.id).await.unwrap().unwrap();
    assert_eq!(c.follower_count, 2);

    writer.unfollow_company("a", company.id).await.unwrap();
    let c = reader.get_company(company.id).await.unwrap().unwrap();
    assert_eq!(c.follower_count, 1);
}

// --- Comments ---

#[tokio::test]
async fn comment_creation_bumps_counter_atomically() {
    let (_c, writer, reader) = setup().await;
    seed_users(&writer, &["author", "replier"]).await;
    let post_id = seed_post(&writer, "author", "discuss").await;

    for i in 0..3 {
        writer
            .create_comment(&NewComment {
                post_id,
                author_id: "replier".to_string(),
                content: format!("reply {i}"),
            })
            .await
            .unwrap();
    }

    let post = reader.get_post(post_id).await.unwrap().unwrap();
    assert_eq!(post.comment_count, 3);
    assert_eq!(reader.list_comments(post_id, 50).await.unwrap().len(), 3);
}

#[tokio::test]
async fn comment_on_missing_post_is_not_found() {
    let (_c, writer, _reader) = setup().await;
    seed_users(&writer, &["replier"]).await;

    let err = writer
        .create_comment(&NewComment {
            post_id: Uuid::new_v4(),
            author_id: "replier".to_string(),
            content: "into the void".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CanopyError::NotFound(_)));
}
