//! Environment-driven configuration.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Slack OAuth endpoints and scopes. Fixed, not configurable.
pub const SLACK_AUTH_URL: &str = "https://slack.com/oauth/v2/authorize";
pub const SLACK_TOKEN_URL: &str = "https://slack.com/api/oauth.v2.access";
pub const SLACK_USER_SCOPE: &str = "channels:read,groups:read,im:read,mpim:read,users:read,chat:write,channels:history,groups:history,mpim:history,im:history,files:read";
pub const SLACK_BOT_SCOPE: &str = "chat:write,files:read";

/// Slack application credentials.
#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: String,
}

impl SlackConfig {
    /// The authorize URL the browser is sent to, with scopes and redirect.
    pub fn authorize_url(&self) -> String {
        format!(
            "{SLACK_AUTH_URL}?client_id={}&user_scope={SLACK_USER_SCOPE}&bot_scope={SLACK_BOT_SCOPE}&redirect_uri={}",
            self.client_id, self.redirect_uri
        )
    }
}

/// Omi memory API credentials.
#[derive(Debug, Clone)]
pub struct OmiConfig {
    pub app_id: String,
    pub api_key: SecretString,
    pub api_url: String,
}

/// Full bridge configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub slack: SlackConfig,
    pub omi: OmiConfig,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Messages fetched per conversation history call.
    pub history_limit: u32,
    /// Sessions idle longer than this are evicted.
    pub session_idle_timeout: Duration,
}

fn required(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

impl Config {
    /// Read configuration from the environment. Fails on missing required vars.
    pub fn from_env() -> Result<Self, ConfigError> {
        let slack = SlackConfig {
            client_id: required("SLACK_CLIENT_ID")?,
            client_secret: SecretString::from(required("SLACK_CLIENT_SECRET")?),
            redirect_uri: required("SLACK_REDIRECT_URI")?,
        };

        let omi = OmiConfig {
            app_id: required("OMI_APP_ID")?,
            api_key: SecretString::from(required("OMI_API_KEY")?),
            api_url: std::env::var("OMI_API_URL")
                .unwrap_or_else(|_| "https://api.omi.me/v2".to_string()),
        };

        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080);

        Ok(Self {
            slack,
            omi,
            port,
            history_limit: 150,
            session_idle_timeout: Duration::from_secs(3600),
        })
    }
}
