use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Member,
    Expert,
    Moderator,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Member => write!(f, "member"),
            Role::Expert => write!(f, "expert"),
            Role::Moderator => write!(f, "moderator"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Like,
    Comment,
    Follow,
    Message,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationKind::Like => write!(f, "like"),
            NotificationKind::Comment => write!(f, "comment"),
            NotificationKind::Follow => write!(f, "follow"),
            NotificationKind::Message => write!(f, "message"),
        }
    }
}

impl NotificationKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "like" => Some(NotificationKind::Like),
            "comment" => Some(NotificationKind::Comment),
            "follow" => Some(NotificationKind::Follow),
            "message" => Some(NotificationKind::Message),
            _ => None,
        }
    }
}

// --- Profiles ---

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UserProfile {
    /// External identity from the auth provider. Unique.
    pub uid: String,
    pub display_name: String,
    pub email: String,
    pub photo_url: Option<String>,
    pub bio: Option<String>,
    pub roles: Vec<Role>,
    pub expertise_tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied at sign-in. Mutable fields overwrite on repeat sign-ins;
/// `uid`, `email`, and `created_at` are fixed after first creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProfile {
    pub uid: String,
    pub display_name: String,
    pub email: String,
    pub photo_url: Option<String>,
    pub bio: Option<String>,
    pub expertise_tags: Vec<String>,
}

// --- Content ---

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Post {
    pub id: Uuid,
    pub author_id: String,
    pub content: String,
    pub media_url: Option<String>,
    pub like_count: i64,
    pub comment_count: i64,
    pub tags: Vec<String>,
    pub hidden: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPost {
    pub author_id: String,
    pub content: String,
    pub media_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Article {
    pub id: Uuid,
    pub author_id: String,
    pub title: String,
    pub content: String,
    pub like_count: i64,
    pub comment_count: i64,
    pub tags: Vec<String>,
    pub hidden: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewArticle {
    pub author_id: String,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewComment {
    pub post_id: Uuid,
    pub author_id: String,
    pub content: String,
}

// --- Companies ---

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub follower_count: i64,
    pub created_at: DateTime<Utc>,
}

// --- Engagement ---

/// Result of a like toggle: the state after the flip and the post's
/// counter as written in the same transaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
pub struct LikeOutcome {
    pub liked: bool,
    pub like_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FollowCounts {
    pub followers: i64,
    pub following: i64,
}

// --- Notifications ---

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Notification {
    pub id: Uuid,
    /// Recipient.
    pub user_id: String,
    pub kind: NotificationKind,
    /// The entity the notification points at (post, comment, profile...).
    pub ref_id: String,
    pub actor_id: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

// --- Topics ---

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Topic {
    /// Normalized lowercase tag, no leading `#`.
    pub id: String,
    /// Display form, with the `#`.
    pub name: String,
    pub post_count: i64,
    pub article_count: i64,
}

// --- Pagination ---

/// One page of a descending-time-ordered scan. `next_cursor` is None when
/// the scan is exhausted. Hidden items are filtered after the fetch, so a
/// page may hold fewer than the requested number of items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}
