//! Serde types for the Slack Web API payloads the bridge touches.

use serde::{Deserialize, Serialize};

/// One entry from `conversations.list`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_im: bool,
    #[serde(default)]
    pub is_mpim: bool,
    /// Counterpart user id for IMs.
    #[serde(default)]
    pub user: Option<String>,
}

/// A user record from `users.info`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SlackUser {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub real_name: Option<String>,
}

impl SlackUser {
    /// Display name preference: real name, falling back to the handle.
    pub fn display_name(&self) -> &str {
        match self.real_name.as_deref() {
            Some(real) if !real.is_empty() => real,
            _ => &self.name,
        }
    }
}

/// A file attached to a message.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SlackFile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub filetype: Option<String>,
    #[serde(default)]
    pub url_private: Option<String>,
}

/// A layout block on a message. Only `image` blocks matter here; everything
/// else deserializes but is ignored.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MessageBlock {
    #[serde(rename = "type", default)]
    pub block_type: String,
    #[serde(default)]
    pub block_id: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub alt_text: Option<String>,
}

/// One message from `conversations.history`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SlackMessage {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub files: Vec<SlackFile>,
    #[serde(default)]
    pub blocks: Vec<MessageBlock>,
}

/// The token pair a successful `oauth.v2.access` exchange yields.
#[derive(Debug, Clone)]
pub struct OauthTokens {
    pub access_token: String,
    pub user_id: String,
}
