//! Omi memory-ingestion API client.

use async_trait::async_trait;
use secrecy::ExposeSecret;

use crate::config::OmiConfig;
use crate::error::OmiError;
use crate::formatter::MemoryRecord;

/// Destination for formatted memories. Production posts to Omi; tests
/// record what would have been sent.
#[async_trait]
pub trait MemorySink: Send + Sync {
    /// Forward one conversation's memories for the given Omi user.
    async fn send_memories(
        &self,
        uid: &str,
        memories: &[MemoryRecord],
        text: &str,
    ) -> Result<(), OmiError>;
}

/// reqwest-backed [`MemorySink`] posting to the Omi integrations endpoint.
pub struct OmiClient {
    config: OmiConfig,
    client: reqwest::Client,
}

impl OmiClient {
    pub fn new(config: OmiConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn memories_url(&self) -> String {
        format!(
            "{}/integrations/{}/user/memories",
            self.config.api_url, self.config.app_id
        )
    }
}

#[async_trait]
impl MemorySink for OmiClient {
    async fn send_memories(
        &self,
        uid: &str,
        memories: &[MemoryRecord],
        text: &str,
    ) -> Result<(), OmiError> {
        let body = serde_json::json!({
            "memories": memories,
            "text_source": "other",
            "text": text,
        });

        let resp = self
            .client
            .post(self.memories_url())
            .query(&[("uid", uid)])
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| OmiError::Http(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::OK {
            tracing::info!(uid, count = memories.len(), "memories imported to Omi");
            return Ok(());
        }

        let details = resp
            .json::<serde_json::Value>()
            .await
            .unwrap_or(serde_json::Value::Null);
        tracing::warn!(uid, status = status.as_u16(), "Omi import rejected");
        Err(OmiError::Rejected {
            status: status.as_u16(),
            details,
        })
    }
}
