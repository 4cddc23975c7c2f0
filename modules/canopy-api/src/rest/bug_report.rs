//! Bug-report endpoint: validates the payload field by field, escapes
//! everything before it lands in an email body, and never echoes internal
//! error detail back to the reporter.

use std::sync::Arc;
use std::sync::LazyLock;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use canopy_mailer::EmailMessage;

use crate::AppState;

const DESCRIPTION_MIN: usize = 10;
const DESCRIPTION_MAX: usize = 5000;
const BROWSER_MAX: usize = 500;
const CONSOLE_LOG_MAX: usize = 20_000;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap());

#[derive(Deserialize)]
pub struct BugReportRequest {
    pub description: String,
    pub email: String,
    pub page_url: String,
    pub browser: Option<String>,
    pub console_log: Option<String>,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

pub fn validate(req: &BugReportRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();

    let desc_len = req.description.trim().chars().count();
    if !(DESCRIPTION_MIN..=DESCRIPTION_MAX).contains(&desc_len) {
        errors.push(FieldError {
            field: "description",
            message: format!(
                "description must be between {DESCRIPTION_MIN} and {DESCRIPTION_MAX} characters"
            ),
        });
    }

    if !EMAIL_RE.is_match(req.email.trim()) {
        errors.push(FieldError {
            field: "email",
            message: "a valid email address is required".to_string(),
        });
    }

    match url::Url::parse(req.page_url.trim()) {
        Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {}
        _ => errors.push(FieldError {
            field: "page_url",
            message: "page_url must be a valid http or https URL".to_string(),
        }),
    }

    if let Some(browser) = &req.browser {
        if browser.chars().count() > BROWSER_MAX {
            errors.push(FieldError {
                field: "browser",
                message: format!("browser must be at most {BROWSER_MAX} characters"),
            });
        }
    }

    if let Some(log) = &req.console_log {
        if log.chars().count() > CONSOLE_LOG_MAX {
            errors.push(FieldError {
                field: "console_log",
                message: format!("console_log must be at most {CONSOLE_LOG_MAX} characters"),
            });
        }
    }

    errors
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// All user-supplied fields pass through `html_escape` before they are
/// embedded in the email body.
pub fn render_report_email(report_id: Uuid, req: &BugReportRequest) -> String {
    format!(
        "<h2>Bug report {id}</h2>\
         <p><strong>From:</strong> {email}</p>\
         <p><strong>Page:</strong> {page_url}</p>\
         <p><strong>Browser:</strong> {browser}</p>\
         <h3>Description</h3><p>{description}</p>\
         <h3>Console log</h3><pre>{console_log}</pre>",
        id = report_id,
        email = html_escape(req.email.trim()),
        page_url = html_escape(req.page_url.trim()),
        browser = html_escape(req.browser.as_deref().unwrap_or("not provided")),
        description = html_escape(req.description.trim()),
        console_log = html_escape(req.console_log.as_deref().unwrap_or("")),
    )
}

pub async fn api_bug_report(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BugReportRequest>,
) -> Response {
    let errors = validate(&body);
    if !errors.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"success": false, "errors": errors})),
        )
            .into_response();
    }

    let report_id = Uuid::new_v4();
    let outcome = state
        .mailer
        .send_notification_email(&EmailMessage {
            to: state.bug_report_to.clone(),
            subject: format!("Bug report {report_id}"),
            html_body: render_report_email(report_id, &body),
            reply_to: Some(body.email.trim().to_string()),
        })
        .await;

    if !outcome.success {
        // Logged with detail; the reporter only sees a generic failure
        warn!(%report_id, error = ?outcome.error, "bug report email failed");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"success": false, "error": "failed to submit bug report"})),
        )
            .into_response();
    }

    info!(%report_id, "bug report submitted");
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "data": {"report_id": report_id.to_string()},
        })),
    )
        .into_response()
}
