//! Browser session state and its in-process store.
//!
//! Sessions hold the Omi user id, the Slack user token, and per-channel
//! usage counts. The store is an explicit key-value map keyed by a random
//! cookie id, with idle-timeout eviction run by a background sweep task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Per-browser session state.
///
/// Lifecycle: `Anonymous` (nothing set) → `Linked` (`omi_uid` set) →
/// `SlackAuthorized` (`slack_token` set). A Slack token failure drops the
/// session back to `Linked`.
#[derive(Debug, Clone)]
pub struct Session {
    /// Omi user id the imports are attributed to.
    pub omi_uid: Option<String>,
    /// Slack user OAuth token.
    pub slack_token: Option<String>,
    /// The authenticated user's own Slack id.
    pub slack_user_id: Option<String>,
    /// Channel id → interaction count, used to sort the channel list.
    pub channel_usage: HashMap<String, u32>,
    /// Whether the user has recorded consent.
    pub consent_given: bool,
    last_seen: DateTime<Utc>,
}

impl Session {
    fn new() -> Self {
        Self {
            omi_uid: None,
            slack_token: None,
            slack_user_id: None,
            channel_usage: HashMap::new(),
            consent_given: false,
            last_seen: Utc::now(),
        }
    }

    pub fn is_linked(&self) -> bool {
        self.omi_uid.is_some()
    }

    pub fn is_slack_authorized(&self) -> bool {
        self.slack_token.is_some()
    }

    /// Drop back to `Linked`: forget the Slack token and user id.
    pub fn clear_slack(&mut self) {
        self.slack_token = None;
        self.slack_user_id = None;
    }

    /// Bump a channel's usage count.
    pub fn track_channel(&mut self, channel_id: &str) {
        *self.channel_usage.entry(channel_id.to_string()).or_insert(0) += 1;
    }

    pub fn usage_count(&self, channel_id: &str) -> u32 {
        self.channel_usage.get(channel_id).copied().unwrap_or(0)
    }
}

/// In-process session store with idle-timeout eviction.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            idle_timeout,
        }
    }

    /// Create a fresh session, returning its id.
    pub async fn create(&self) -> String {
        let sid = Uuid::new_v4().to_string();
        self.sessions
            .write()
            .await
            .insert(sid.clone(), Session::new());
        sid
    }

    /// Return the session id to use for a request: the presented id if it
    /// names a live session, otherwise a new one. The bool is true when a
    /// new session was created (the caller sets the cookie then).
    pub async fn ensure(&self, presented: Option<&str>) -> (String, bool) {
        if let Some(sid) = presented
            && self.sessions.read().await.contains_key(sid)
        {
            return (sid.to_string(), false);
        }
        (self.create().await, true)
    }

    /// Read a snapshot of a session, touching its last-seen time.
    pub async fn get(&self, sid: &str) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(sid)?;
        session.last_seen = Utc::now();
        Some(session.clone())
    }

    /// Mutate a session in place. Returns `None` when the id is unknown.
    pub async fn update<R>(&self, sid: &str, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(sid)?;
        session.last_seen = Utc::now();
        Some(f(session))
    }

    /// Replace a session with a fresh one under a new id (fixation guard on
    /// the auth-initiation route). The old id stops working.
    pub async fn rotate(&self, old_sid: &str) -> String {
        let sid = Uuid::new_v4().to_string();
        let mut sessions = self.sessions.write().await;
        sessions.remove(old_sid);
        sessions.insert(sid.clone(), Session::new());
        sid
    }

    pub async fn remove(&self, sid: &str) {
        self.sessions.write().await.remove(sid);
    }

    /// Evict sessions idle past the timeout. Returns the eviction count.
    pub async fn sweep(&self) -> usize {
        self.sweep_at(Utc::now()).await
    }

    async fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| {
            (now - s.last_seen).to_std().unwrap_or_default() <= self.idle_timeout
        });
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Spawn the periodic eviction sweep.
pub fn spawn_sweeper(store: SessionStore, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately
        loop {
            ticker.tick().await;
            let evicted = store.sweep().await;
            if evicted > 0 {
                tracing::debug!(evicted, "evicted idle sessions");
            }
        }
    })
}
