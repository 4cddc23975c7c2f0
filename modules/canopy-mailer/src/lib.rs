//! Transactional email via the provider's HTTP API.
//!
//! Email is best-effort everywhere it is used: a failed send is reported
//! as an [`EmailOutcome`] value, never as an error the caller has to
//! handle. Primary writes must not fail because a notification email did.

use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct MailerOptions {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub reply_to: Option<String>,
}

/// Result of a send attempt. `error` is set when `success` is false.
#[derive(Debug, Clone, Serialize)]
pub struct EmailOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl EmailOutcome {
    fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Serialize)]
struct SendPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct Mailer {
    http: reqwest::Client,
    options: MailerOptions,
}

impl Mailer {
    pub fn new(options: MailerOptions) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("reqwest client");
        Self { http, options }
    }

    /// Send a notification email. Provider and transport failures are
    /// caught and degraded to `{success: false, error}`.
    pub async fn send_notification_email(&self, msg: &EmailMessage) -> EmailOutcome {
        let payload = SendPayload {
            from: &self.options.from,
            to: &msg.to,
            subject: &msg.subject,
            html: &msg.html_body,
            reply_to: msg.reply_to.as_deref(),
        };

        let response = self
            .http
            .post(&self.options.api_url)
            .bearer_auth(&self.options.api_key)
            .json(&payload)
            .send()
            .await;

        match response {
            Ok(r) if r.status().is_success() => EmailOutcome::ok(),
            Ok(r) => {
                let status = r.status();
                warn!(to = %msg.to, %status, "email provider rejected send");
                EmailOutcome::failed(format!("email provider returned {status}"))
            }
            Err(e) => {
                warn!(to = %msg.to, error = %e, "email send failed");
                EmailOutcome::failed(format!("email send failed: {e}"))
            }
        }
    }
}
