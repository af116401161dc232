//! Slack Web API client.
//!
//! The [`SlackApi`] trait is the seam the routes talk through; tests stub it,
//! production uses [`SlackClient`] over reqwest.

use async_trait::async_trait;
use secrecy::ExposeSecret;

use crate::config::{SLACK_TOKEN_URL, SlackConfig};
use crate::error::SlackError;
use crate::slack::types::{Conversation, OauthTokens, SlackMessage, SlackUser};

/// Conversation types requested from `conversations.list`.
const CONVERSATION_TYPES: &str = "public_channel,private_channel,mpim,im";

/// Slack `ok: false` codes that mean the user token is no longer usable.
const TOKEN_ERROR_CODES: &[&str] = &[
    "token_expired",
    "token_revoked",
    "invalid_auth",
    "not_authed",
    "account_inactive",
];

/// A downloaded file body plus its upstream content type.
#[derive(Debug, Clone)]
pub struct FileDownload {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// The Slack operations the bridge needs.
#[async_trait]
pub trait SlackApi: Send + Sync {
    /// Exchange an OAuth authorization code for a user token.
    async fn exchange_code(&self, code: &str) -> Result<OauthTokens, SlackError>;

    /// List the user's conversations (channels, groups, MPIMs, IMs).
    async fn list_conversations(&self, token: &str) -> Result<Vec<Conversation>, SlackError>;

    /// Look up a user by id.
    async fn user_info(&self, token: &str, user_id: &str) -> Result<SlackUser, SlackError>;

    /// Fetch the most recent messages of a conversation, newest first.
    async fn conversation_history(
        &self,
        token: &str,
        channel_id: &str,
        limit: u32,
    ) -> Result<Vec<SlackMessage>, SlackError>;

    /// Download a Slack-hosted file with the user's token.
    async fn download_file(&self, token: &str, url: &str) -> Result<FileDownload, SlackError>;
}

/// reqwest-backed [`SlackApi`] implementation.
pub struct SlackClient {
    config: SlackConfig,
    client: reqwest::Client,
}

impl SlackClient {
    pub fn new(config: SlackConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(method: &str) -> String {
        format!("https://slack.com/api/{method}")
    }

    /// Call a Web API method and unwrap Slack's `ok`/`error` envelope,
    /// returning the named payload field.
    async fn call(
        &self,
        token: &str,
        method: &str,
        query: &[(&str, &str)],
        payload_field: &str,
    ) -> Result<serde_json::Value, SlackError> {
        let resp = self
            .client
            .get(Self::api_url(method))
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|e| SlackError::Http(e.to_string()))?;

        let envelope: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| SlackError::InvalidResponse(e.to_string()))?;

        if !envelope.get("ok").and_then(serde_json::Value::as_bool).unwrap_or(false) {
            let code = envelope
                .get("error")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown_error")
                .to_string();
            return Err(classify_api_error(code));
        }

        envelope
            .get(payload_field)
            .cloned()
            .ok_or_else(|| SlackError::InvalidResponse(format!("missing field `{payload_field}`")))
    }
}

/// Map a Slack `ok: false` code to a typed error.
fn classify_api_error(code: String) -> SlackError {
    if TOKEN_ERROR_CODES.contains(&code.as_str()) {
        SlackError::TokenExpired { code }
    } else {
        SlackError::Api { code }
    }
}

#[async_trait]
impl SlackApi for SlackClient {
    async fn exchange_code(&self, code: &str) -> Result<OauthTokens, SlackError> {
        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose_secret()),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        let resp = self
            .client
            .post(SLACK_TOKEN_URL)
            .form(&form)
            .send()
            .await
            .map_err(|e| SlackError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(SlackError::Http(format!(
                "token endpoint returned {}",
                resp.status()
            )));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| SlackError::InvalidResponse(e.to_string()))?;

        if !body.get("ok").and_then(serde_json::Value::as_bool).unwrap_or(false) {
            let code = body
                .get("error")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown_error")
                .to_string();
            tracing::warn!(code, "Slack OAuth exchange refused");
            return Err(SlackError::Api { code });
        }

        let authed = body
            .get("authed_user")
            .ok_or_else(|| SlackError::InvalidResponse("missing field `authed_user`".into()))?;

        let access_token = authed
            .get("access_token")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| SlackError::InvalidResponse("missing `authed_user.access_token`".into()))?;
        let user_id = authed
            .get("id")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| SlackError::InvalidResponse("missing `authed_user.id`".into()))?;

        Ok(OauthTokens {
            access_token: access_token.to_string(),
            user_id: user_id.to_string(),
        })
    }

    async fn list_conversations(&self, token: &str) -> Result<Vec<Conversation>, SlackError> {
        let channels = self
            .call(
                token,
                "conversations.list",
                &[("types", CONVERSATION_TYPES)],
                "channels",
            )
            .await?;
        serde_json::from_value(channels).map_err(|e| SlackError::InvalidResponse(e.to_string()))
    }

    async fn user_info(&self, token: &str, user_id: &str) -> Result<SlackUser, SlackError> {
        let user = self
            .call(token, "users.info", &[("user", user_id)], "user")
            .await?;
        serde_json::from_value(user).map_err(|e| SlackError::InvalidResponse(e.to_string()))
    }

    async fn conversation_history(
        &self,
        token: &str,
        channel_id: &str,
        limit: u32,
    ) -> Result<Vec<SlackMessage>, SlackError> {
        let limit = limit.to_string();
        let messages = self
            .call(
                token,
                "conversations.history",
                &[
                    ("channel", channel_id),
                    ("limit", limit.as_str()),
                    ("include_all_metadata", "true"),
                ],
                "messages",
            )
            .await?;
        serde_json::from_value(messages).map_err(|e| SlackError::InvalidResponse(e.to_string()))
    }

    async fn download_file(&self, token: &str, url: &str) -> Result<FileDownload, SlackError> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SlackError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(SlackError::Download {
                status: resp.status().as_u16(),
            });
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| SlackError::Http(e.to_string()))?
            .to_vec();

        Ok(FileDownload {
            content_type,
            bytes,
        })
    }
}
