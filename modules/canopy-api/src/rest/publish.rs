//! Content publication: creation endpoints that pass drafts through the
//! external moderation service before they reach the store.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use uuid::Uuid;

use canopy_common::{NewArticle, NewComment, NewPost};
use moderation_client::{ContentType, ModerationRequest};

use super::error_response;
use crate::AppState;

#[derive(Deserialize)]
pub struct PostBody {
    author_id: String,
    content: String,
    media_url: Option<String>,
}

#[derive(Deserialize)]
pub struct ArticleBody {
    author_id: String,
    title: String,
    content: String,
}

#[derive(Deserialize)]
pub struct CommentBody {
    author_id: String,
    content: String,
}

/// Run a draft through moderation. Returns the blocking response when the
/// verdict is negative; the surfaced message carries the provider's
/// reason so the author knows why publication was refused.
async fn check_moderation(
    state: &AppState,
    text: &str,
    author_id: &str,
    content_type: ContentType,
) -> Result<(), Response> {
    let verdict = state
        .moderator
        .moderate(&ModerationRequest {
            text: text.to_string(),
            author_id: author_id.to_string(),
            content_type,
        })
        .await
        .map_err(error_response)?;

    if verdict.is_appropriate {
        return Ok(());
    }
    let reason = verdict
        .reason
        .unwrap_or_else(|| "content did not pass moderation".to_string());
    Err((
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(serde_json::json!({"error": reason, "blocked": true})),
    )
        .into_response())
}

pub async fn api_create_post(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PostBody>,
) -> Response {
    if let Err(blocked) =
        check_moderation(&state, &body.content, &body.author_id, ContentType::Post).await
    {
        return blocked;
    }
    match state
        .writer
        .create_post(&NewPost {
            author_id: body.author_id,
            content: body.content,
            media_url: body.media_url,
        })
        .await
    {
        Ok(post) => (StatusCode::CREATED, Json(post)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn api_create_article(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ArticleBody>,
) -> Response {
    let text = format!("{}\n{}", body.title, body.content);
    if let Err(blocked) =
        check_moderation(&state, &text, &body.author_id, ContentType::Article).await
    {
        return blocked;
    }
    match state
        .writer
        .create_article(&NewArticle {
            author_id: body.author_id,
            title: body.title,
            content: body.content,
        })
        .await
    {
        Ok(article) => (StatusCode::CREATED, Json(article)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn api_create_comment(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<String>,
    Json(body): Json<CommentBody>,
) -> Response {
    let post_id = match Uuid::parse_str(&post_id) {
        Ok(id) => id,
        Err(_) => {
            return error_response(canopy_common::CanopyError::Validation(
                "invalid post id".to_string(),
            ))
        }
    };
    if let Err(blocked) =
        check_moderation(&state, &body.content, &body.author_id, ContentType::Comment).await
    {
        return blocked;
    }
    match state
        .writer
        .create_comment(&NewComment {
            post_id,
            author_id: body.author_id,
            content: body.content,
        })
        .await
    {
        Ok(comment) => (StatusCode::CREATED, Json(comment)).into_response(),
        Err(e) => error_response(e),
    }
}
