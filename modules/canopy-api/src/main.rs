use std::sync::Arc;

use anyhow::Result;
use axum::{
    http::{header, HeaderValue},
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use canopy_common::Config;
use canopy_graph::{GraphClient, SocialGraphReader, SocialGraphWriter};
use canopy_mailer::{Mailer, MailerOptions};
use moderation_client::{ContentModerator, ModerationClient};

mod age_gate;
mod rest;

pub struct AppState {
    pub reader: SocialGraphReader,
    pub writer: SocialGraphWriter,
    pub moderator: Arc<dyn ContentModerator>,
    pub mailer: Mailer,
    pub bug_report_to: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("canopy=info".parse()?))
        .init();

    let config = Config::from_env();

    let client =
        GraphClient::connect(&config.neo4j_uri, &config.neo4j_user, &config.neo4j_password)
            .await?;

    let state = Arc::new(AppState {
        reader: SocialGraphReader::new(client.clone()),
        writer: SocialGraphWriter::new(client),
        moderator: Arc::new(ModerationClient::new(
            config.moderation_api_url.clone(),
            config.moderation_api_key.clone(),
        )),
        mailer: Mailer::new(MailerOptions {
            api_url: config.email_api_url.clone(),
            api_key: config.email_api_key.clone(),
            from: config.email_from.clone(),
        }),
        bug_report_to: config.bug_report_to.clone(),
    });

    let app = Router::new()
        // Health check
        .route("/", get(|| async { "ok" }))
        // Age gate
        .route("/age-check", get(rest::age_check_page))
        .route("/api/age-verify", post(rest::api_age_verify))
        // Profiles
        .route("/api/profiles", post(rest::api_upsert_profile))
        .route("/api/profiles/{uid}", get(rest::api_get_profile))
        // Content
        .route("/api/posts", post(rest::publish::api_create_post))
        .route("/api/posts/{id}", get(rest::api_get_post))
        .route("/api/articles", post(rest::publish::api_create_article))
        .route(
            "/api/posts/{id}/comments",
            get(rest::api_list_comments).post(rest::publish::api_create_comment),
        )
        // Feeds
        .route("/api/feed", get(rest::api_feed))
        .route("/api/tags/{tag}/posts", get(rest::api_posts_by_tag))
        .route("/api/tags/{tag}/articles", get(rest::api_articles_by_tag))
        .route("/api/users/{uid}/posts", get(rest::api_posts_by_author))
        // Engagement
        .route("/api/posts/{id}/like", post(rest::api_toggle_like))
        .route("/api/follows", post(rest::api_follow).delete(rest::api_unfollow))
        .route("/api/users/{uid}/follow-counts", get(rest::api_follow_counts))
        .route(
            "/api/users/{uid}/following/{target}",
            get(rest::api_is_following),
        )
        .route(
            "/api/companies/{id}/follow",
            post(rest::api_follow_company).delete(rest::api_unfollow_company),
        )
        // Notifications
        .route("/api/notifications", get(rest::api_notifications))
        .route("/api/notifications/unread-count", get(rest::api_unread_count))
        .route(
            "/api/notifications/{id}/read",
            post(rest::api_mark_notification_read),
        )
        .route(
            "/api/notifications/read-all",
            post(rest::api_mark_all_notifications_read),
        )
        .route(
            "/api/notifications/{id}",
            delete(rest::api_delete_notification),
        )
        // Bug reports
        .route("/api/bug-report", post(rest::bug_report::api_bug_report))
        .layer(middleware::from_fn(age_gate::age_gate))
        .with_state(state)
        // CORS
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        // No caching of personalized responses
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        // Logging layer: method + path + status + latency only
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        );

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!("Canopy API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
