pub mod bug_report;
pub mod publish;

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use canopy_common::CanopyError;

use crate::age_gate;
use crate::AppState;

// --- Query structs ---

#[derive(Deserialize)]
pub struct PageQuery {
    limit: Option<i64>,
    cursor: Option<String>,
}

#[derive(Deserialize)]
pub struct NotificationsQuery {
    user_id: String,
    limit: Option<i64>,
    cursor: Option<String>,
}

#[derive(Deserialize)]
pub struct ActorBody {
    user_id: String,
}

#[derive(Deserialize)]
pub struct FollowBody {
    follower_id: String,
    following_id: String,
}

const DEFAULT_PAGE_SIZE: i64 = 20;

// --- Error mapping ---

/// Map the error taxonomy onto HTTP. Validation and invalid-operation
/// errors carry their message to the caller; everything else degrades to
/// a generic body so internals never leak.
pub fn error_response(e: CanopyError) -> Response {
    let (status, message) = match &e {
        CanopyError::Validation(m) => (StatusCode::BAD_REQUEST, m.clone()),
        CanopyError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
        CanopyError::InvalidOperation(m) => (StatusCode::UNPROCESSABLE_ENTITY, m.clone()),
        CanopyError::Transient(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "temporarily unavailable, please retry".to_string(),
        ),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string()),
    };
    if status.is_server_error() {
        error!(error = %e, "request failed");
    }
    (status, Json(serde_json::json!({"error": message}))).into_response()
}

fn parse_uuid(s: &str, what: &str) -> Result<Uuid, Response> {
    Uuid::parse_str(s).map_err(|_| {
        error_response(CanopyError::Validation(format!("invalid {what} id")))
    })
}

// --- Age verification ---

pub async fn api_age_verify() -> impl IntoResponse {
    (
        [(header::SET_COOKIE, age_gate::verified_cookie())],
        Json(serde_json::json!({"success": true})),
    )
}

pub async fn age_check_page(Query(q): Query<AgeCheckQuery>) -> impl IntoResponse {
    let next = q.next.unwrap_or_else(|| "/".to_string());
    Json(serde_json::json!({
        "message": "age verification required",
        "verify": "/api/age-verify",
        "next": next,
    }))
}

#[derive(Deserialize)]
pub struct AgeCheckQuery {
    next: Option<String>,
}

// --- Profiles ---

pub async fn api_upsert_profile(
    State(state): State<Arc<AppState>>,
    Json(body): Json<canopy_common::NewProfile>,
) -> Response {
    match state.writer.upsert_profile(&body).await {
        Ok(profile) => Json(profile).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn api_get_profile(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
) -> Response {
    match state.reader.get_profile(&uid).await {
        Ok(Some(profile)) => Json(profile).into_response(),
        Ok(None) => error_response(CanopyError::NotFound(format!("user {uid}"))),
        Err(e) => error_response(e),
    }
}

// --- Feeds ---

pub async fn api_feed(
    State(state): State<Arc<AppState>>,
    Query(q): Query<PageQuery>,
) -> Response {
    let limit = q.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    match state.reader.fetch_global_feed(limit, q.cursor.as_deref()).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn api_posts_by_tag(
    State(state): State<Arc<AppState>>,
    Path(tag): Path<String>,
    Query(q): Query<PageQuery>,
) -> Response {
    let limit = q.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    match state
        .reader
        .list_posts_by_tag(&tag, limit, q.cursor.as_deref())
        .await
    {
        Ok(page) => Json(page).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn api_articles_by_tag(
    State(state): State<Arc<AppState>>,
    Path(tag): Path<String>,
    Query(q): Query<PageQuery>,
) -> Response {
    let limit = q.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    match state
        .reader
        .list_articles_by_tag(&tag, limit, q.cursor.as_deref())
        .await
    {
        Ok(page) => Json(page).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn api_posts_by_author(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
    Query(q): Query<PageQuery>,
) -> Response {
    let limit = q.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    match state
        .reader
        .list_posts_by_author(&uid, limit, q.cursor.as_deref())
        .await
    {
        Ok(page) => Json(page).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn api_get_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_uuid(&id, "post") {
        Ok(id) => id,
        Err(r) => return r,
    };
    match state.reader.get_post(id).await {
        Ok(Some(post)) => Json(post).into_response(),
        Ok(None) => error_response(CanopyError::NotFound(format!("post {id}"))),
        Err(e) => error_response(e),
    }
}

pub async fn api_list_comments(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_uuid(&id, "post") {
        Ok(id) => id,
        Err(r) => return r,
    };
    match state.reader.list_comments(id, 100).await {
        Ok(comments) => Json(comments).into_response(),
        Err(e) => error_response(e),
    }
}

// --- Engagement ---

pub async fn api_toggle_like(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ActorBody>,
) -> Response {
    let id = match parse_uuid(&id, "post") {
        Ok(id) => id,
        Err(r) => return r,
    };
    match state.writer.toggle_like(id, &body.user_id).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn api_follow(
    State(state): State<Arc<AppState>>,
    Json(body): Json<FollowBody>,
) -> Response {
    match state
        .writer
        .follow_user(&body.follower_id, &body.following_id)
        .await
    {
        Ok(created) => Json(serde_json::json!({"following": true, "created": created})).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn api_unfollow(
    State(state): State<Arc<AppState>>,
    Json(body): Json<FollowBody>,
) -> Response {
    match state
        .writer
        .unfollow_user(&body.follower_id, &body.following_id)
        .await
    {
        Ok(removed) => Json(serde_json::json!({"following": false, "removed": removed})).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn api_follow_counts(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
) -> Response {
    match state.reader.get_follow_counts(&uid).await {
        Ok(counts) => Json(counts).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn api_is_following(
    State(state): State<Arc<AppState>>,
    Path((uid, target)): Path<(String, String)>,
) -> Response {
    match state.reader.is_following(&uid, &target).await {
        Ok(following) => Json(serde_json::json!({"is_following": following})).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn api_follow_company(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ActorBody>,
) -> Response {
    let id = match parse_uuid(&id, "company") {
        Ok(id) => id,
        Err(r) => return r,
    };
    match state.writer.follow_company(&body.user_id, id).await {
        Ok(created) => Json(serde_json::json!({"following": true, "created": created})).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn api_unfollow_company(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ActorBody>,
) -> Response {
    let id = match parse_uuid(&id, "company") {
        Ok(id) => id,
        Err(r) => return r,
    };
    match state.writer.unfollow_company(&body.user_id, id).await {
        Ok(removed) => Json(serde_json::json!({"following": false, "removed": removed})).into_response(),
        Err(e) => error_response(e),
    }
}

// --- Notifications ---

pub async fn api_notifications(
    State(state): State<Arc<AppState>>,
    Query(q): Query<NotificationsQuery>,
) -> Response {
    let limit = q.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    match state
        .reader
        .list_notifications_paged(&q.user_id, limit, q.cursor.as_deref())
        .await
    {
        Ok(page) => Json(page).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn api_unread_count(
    State(state): State<Arc<AppState>>,
    Query(q): Query<NotificationsQuery>,
) -> Response {
    match state.reader.unread_count(&q.user_id).await {
        Ok(unread) => Json(serde_json::json!({"unread": unread})).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn api_mark_notification_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_uuid(&id, "notification") {
        Ok(id) => id,
        Err(r) => return r,
    };
    match state.writer.mark_notification_read(id).await {
        Ok(()) => Json(serde_json::json!({"success": true})).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn api_mark_all_notifications_read(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ActorBody>,
) -> Response {
    match state.writer.mark_all_notifications_read(&body.user_id).await {
        Ok(()) => Json(serde_json::json!({"success": true})).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn api_delete_notification(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_uuid(&id, "notification") {
        Ok(id) => id,
        Err(r) => return r,
    };
    match state.writer.delete_notification(id).await {
        Ok(()) => Json(serde_json::json!({"success": true})).into_response(),
        Err(e) => error_response(e),
    }
}
