//! Client for the managed content-moderation API. The model behind it is
//! opaque; callers only see an allow/block verdict with an optional reason.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use canopy_common::CanopyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Post,
    Article,
    Comment,
    Bio,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModerationRequest {
    pub text: String,
    pub author_id: String,
    pub content_type: ContentType,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModerationVerdict {
    pub is_appropriate: bool,
    pub reason: Option<String>,
}

/// Seam for the external moderation service. The HTTP implementation is
/// the production path; tests swap in [`AllowAll`] or [`DenyAll`].
#[async_trait]
pub trait ContentModerator: Send + Sync {
    async fn moderate(&self, req: &ModerationRequest) -> Result<ModerationVerdict, CanopyError>;
}

#[derive(Debug, Clone)]
pub struct ModerationClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl ModerationClient {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl ContentModerator for ModerationClient {
    async fn moderate(&self, req: &ModerationRequest) -> Result<ModerationVerdict, CanopyError> {
        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(req)
            .send()
            .await
            .map_err(|e| CanopyError::ExternalService(format!("moderation request: {e}")))?;

        if !response.status().is_success() {
            return Err(CanopyError::ExternalService(format!(
                "moderation API returned {}",
                response.status()
            )));
        }

        response
            .json::<ModerationVerdict>()
            .await
            .map_err(|e| CanopyError::ExternalService(format!("moderation response: {e}")))
    }
}

/// Test double that approves everything.
pub struct AllowAll;

#[async_trait]
impl ContentModerator for AllowAll {
    async fn moderate(&self, _req: &ModerationRequest) -> Result<ModerationVerdict, CanopyError> {
        Ok(ModerationVerdict {
            is_appropriate: true,
            reason: None,
        })
    }
}

/// Test double that blocks everything with a fixed reason.
pub struct DenyAll;

#[async_trait]
impl ContentModerator for DenyAll {
    async fn moderate(&self, _req: &ModerationRequest) -> Result<ModerationVerdict, CanopyError> {
        Ok(ModerationVerdict {
            is_appropriate: false,
            reason: Some("content flagged by moderation".to_string()),
        })
    }
}
