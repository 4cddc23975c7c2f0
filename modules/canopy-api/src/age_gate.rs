//! Age gate: a request-level check for the `ageVerified` cookie.
//! Unverified requests to non-public paths are redirected to the age-check
//! page with a `next` continuation parameter.

use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

// Cookie name is an external contract shared with the web client.
pub const COOKIE_NAME: &str = "ageVerified";
const MAX_AGE_SECS: i64 = 30 * 24 * 3600; // 30 days

/// Paths reachable without age verification.
const EXEMPT_PATHS: &[&str] = &["/", "/age-check", "/api/age-verify"];

pub async fn age_gate(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if is_exempt(&path) || is_verified(cookie_header(&request)) {
        return next.run(request).await;
    }
    Redirect::to(&format!("/age-check?next={}", urlencoding::encode(&path))).into_response()
}

fn cookie_header(request: &Request) -> &str {
    request
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

pub fn is_exempt(path: &str) -> bool {
    EXEMPT_PATHS.contains(&path)
}

pub fn is_verified(cookie_header: &str) -> bool {
    parse_cookie(cookie_header, COOKIE_NAME) == Some("1")
}

/// Build the Set-Cookie header value marking the visitor as verified.
/// In release builds, adds `Secure` to prevent transmission over HTTP.
pub fn verified_cookie() -> String {
    let secure = if cfg!(debug_assertions) { "" } else { "; Secure" };
    format!("{COOKIE_NAME}=1; Path=/; HttpOnly; SameSite=Lax; Max-Age={MAX_AGE_SECS}{secure}")
}

/// Parse a specific cookie from the Cookie header string.
fn parse_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    for part in header.split(';') {
        let part = part.trim();
        if let Some(value) = part.strip_prefix(name) {
            if let Some(value) = value.strip_prefix('=') {
                return Some(value);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    #[test]
    fn parse_cookie_finds_value() {
        assert_eq!(parse_cookie("ageVerified=1; other=x", COOKIE_NAME), Some("1"));
        assert_eq!(parse_cookie("other=x; ageVerified=1", COOKIE_NAME), Some("1"));
        assert_eq!(parse_cookie("other=x", COOKIE_NAME), None);
    }

    #[test]
    fn only_exact_value_verifies() {
        assert!(is_verified("ageVerified=1"));
        assert!(!is_verified("ageVerified=0"));
        assert!(!is_verified("ageVerified=true"));
        assert!(!is_verified(""));
    }

    #[test]
    fn exempt_paths() {
        assert!(is_exempt("/"));
        assert!(is_exempt("/age-check"));
        assert!(is_exempt("/api/age-verify"));
        assert!(!is_exempt("/api/feed"));
        assert!(!is_exempt("/api/posts"));
    }

    #[test]
    fn cookie_carries_thirty_day_expiry() {
        let cookie = verified_cookie();
        assert!(cookie.starts_with("ageVerified=1;"));
        assert!(cookie.contains("Max-Age=2592000"));
    }

    fn gated_app() -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .route("/api/feed", get(|| async { "feed" }))
            .layer(middleware::from_fn(age_gate))
    }

    #[tokio::test]
    async fn unverified_request_redirects_with_encoded_next() {
        let response = gated_app()
            .oneshot(Request::builder().uri("/api/feed").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers().get(header::LOCATION).unwrap();
        assert_eq!(location.to_str().unwrap(), "/age-check?next=%2Fapi%2Ffeed");
    }

    #[tokio::test]
    async fn verified_cookie_passes_the_gate() {
        let response = gated_app()
            .oneshot(
                Request::builder()
                    .uri("/api/feed")
                    .header(header::COOKIE, "ageVerified=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn exempt_path_needs_no_cookie() {
        let response = gated_app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
