//! Service configuration

use crate::gateway::GatewayConfig;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone)]
pub struct Config {
    /// Environment: development | staging | production
    pub environment: String,
    pub http_port: u16,
    /// redb database file
    pub database_path: String,
    /// HS256 secret shared with the sign-in service
    pub jwt_secret: String,
    pub gateway: GatewayConfig,
    /// Push endpoint; notifications are only logged when unset
    pub push_endpoint: Option<String>,
    pub push_server_key: String,
    /// Accounts promoted to HQ at startup
    pub hq_bootstrap_emails: Vec<String>,
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let push_endpoint = std::env::var("PUSH_ENDPOINT").ok().filter(|s| !s.is_empty());
        let push_server_key = if push_endpoint.is_some() {
            Self::require_secret("PUSH_SERVER_KEY", &environment)?
        } else {
            std::env::var("PUSH_SERVER_KEY").unwrap_or_default()
        };

        Ok(Self {
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "data/order-cloud.redb".into()),
            jwt_secret: Self::require_secret("JWT_SECRET", &environment)?,
            gateway: GatewayConfig {
                mid: std::env::var("GATEWAY_MID").unwrap_or_else(|_| "INIpayTest".into()),
                api_key: Self::require_secret("GATEWAY_API_KEY", &environment)?,
                sign_key: Self::require_secret("GATEWAY_SIGN_KEY", &environment)?,
                webhook_secret: Self::require_secret("GATEWAY_WEBHOOK_SECRET", &environment)?,
                base_url: std::env::var("GATEWAY_BASE_URL")
                    .unwrap_or_else(|_| "https://iniapi.inicis.com".into()),
                timeout_secs: std::env::var("GATEWAY_TIMEOUT_SECS")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(5),
            },
            push_endpoint,
            push_server_key,
            hq_bootstrap_emails: parse_email_list(
                &std::env::var("HQ_BOOTSTRAP_EMAILS").unwrap_or_default(),
            ),
            environment,
        })
    }
}

/// Comma-separated list, normalized and de-duplicated
fn parse_email_list(raw: &str) -> Vec<String> {
    let mut emails: Vec<String> = raw
        .split(',')
        .map(shared::util::normalize_email)
        .filter(|e| e.contains('@'))
        .collect();
    emails.sort();
    emails.dedup();
    emails
}
