use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Neo4j
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,

    // Content moderation
    pub moderation_api_url: String,
    pub moderation_api_key: String,

    // Transactional email
    pub email_api_url: String,
    pub email_api_key: String,
    pub email_from: String,
    pub bug_report_to: String,

    // Web server
    pub web_host: String,
    pub web_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            neo4j_uri: required_env("NEO4J_URI"),
            neo4j_user: required_env("NEO4J_USER"),
            neo4j_password: required_env("NEO4J_PASSWORD"),
            moderation_api_url: required_env("MODERATION_API_URL"),
            moderation_api_key: required_env("MODERATION_API_KEY"),
            email_api_url: env::var("EMAIL_API_URL")
                .unwrap_or_else(|_| "https://api.resend.com/emails".to_string()),
            email_api_key: required_env("EMAIL_API_KEY"),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "notifications@canopy.social".to_string()),
            bug_report_to: env::var("BUG_REPORT_TO")
                .unwrap_or_else(|_| "bugs@canopy.social".to_string()),
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: env::var("WEB_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("WEB_PORT must be a number"),
        }
    }

}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
