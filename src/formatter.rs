//! Message-to-memory formatting.
//!
//! Turns a fetched Slack conversation history into Omi memory records:
//! one record per message that has both text and a sender, with mention
//! tokens rewritten to display names, media annotations appended, and
//! content-derived tags attached.

use std::collections::HashMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::{Captures, Regex};
use serde::Serialize;

use crate::error::SlackError;
use crate::media::message_attachments;
use crate::slack::types::SlackMessage;

/// Recipient used when a message mentions nobody (or the lookup fails).
pub const DEFAULT_RECIPIENT: &str = "the channel";

/// Slack mention token: `<@U12345>`.
static MENTION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<@([A-Z0-9]+)>").unwrap());

/// One memory record, the Omi ingestion unit.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryRecord {
    pub content: String,
    pub tags: Vec<String>,
}

/// Resolves a Slack user id to a display name.
///
/// In production this is the Slack client bound to a session token; tests
/// use an in-memory map.
#[async_trait]
pub trait UserResolver: Send + Sync {
    async fn display_name(&self, user_id: &str) -> Result<String, SlackError>;
}

/// Format a conversation history into memory records.
///
/// Messages lacking text or a sender are silently skipped. Lookup failures
/// never fail the batch: a failed sender lookup falls back to the raw user
/// id, a failed mention lookup leaves the token as written and the
/// recipient at its default.
pub async fn format_messages_to_memories(
    messages: &[SlackMessage],
    resolver: &dyn UserResolver,
) -> Vec<MemoryRecord> {
    let mut memories = Vec::new();
    // One lookup per user id per batch; `None` records a failed lookup so
    // it is not retried.
    let mut names: HashMap<String, Option<String>> = HashMap::new();

    for msg in messages {
        let (Some(text), Some(user)) = (msg.text.as_deref(), msg.user.as_deref()) else {
            continue;
        };

        let sender = resolve_cached(resolver, &mut names, user)
            .await
            .unwrap_or_else(|| user.to_string());

        // Resolve every mentioned user up front.
        let mention_ids: Vec<String> = MENTION_RE
            .captures_iter(text)
            .map(|c| c[1].to_string())
            .collect();
        for id in &mention_ids {
            resolve_cached(resolver, &mut names, id).await;
        }

        let recipient = mention_ids
            .first()
            .and_then(|id| names.get(id).cloned().flatten())
            .unwrap_or_else(|| DEFAULT_RECIPIENT.to_string());

        // Rewrite each mention token to @name with its own resolved name;
        // unresolved tokens stay as written.
        let rewritten = MENTION_RE.replace_all(text, |caps: &Captures| {
            match names.get(&caps[1]).cloned().flatten() {
                Some(name) => format!("@{name}"),
                None => caps[0].to_string(),
            }
        });

        // The trailing-? check runs before annotations so attached media
        // never masks the questions tag.
        let ends_with_question = rewritten.ends_with('?');

        let attachments = message_attachments(msg);
        let mut full_text = rewritten.into_owned();
        if !attachments.is_empty() {
            let annotations: Vec<String> =
                attachments.iter().map(|a| a.annotation()).collect();
            full_text.push(' ');
            full_text.push_str(&annotations.join(" "));
        }

        let content = format!("{sender} said to {recipient}: {full_text}");

        let mut tags: Vec<String> = vec!["conversation".into(), "slack".into()];
        let lower = full_text.to_lowercase();
        if lower.contains("meeting") || lower.contains("schedule") {
            tags.push("meetings".into());
        }
        if lower.contains("deadline") || lower.contains("due") {
            tags.push("deadlines".into());
        }
        if lower.contains("question") || ends_with_question {
            tags.push("questions".into());
        }
        if !attachments.is_empty() {
            tags.push("media".into());
            for kind in [
                crate::media::MediaKind::Image,
                crate::media::MediaKind::Video,
                crate::media::MediaKind::Audio,
                crate::media::MediaKind::File,
            ] {
                if attachments.iter().any(|a| a.kind == kind) {
                    tags.push(kind.tag().into());
                }
            }
        }

        memories.push(MemoryRecord { content, tags });
    }

    memories
}

/// Resolve a user id through the per-batch cache.
async fn resolve_cached(
    resolver: &dyn UserResolver,
    cache: &mut HashMap<String, Option<String>>,
    user_id: &str,
) -> Option<String> {
    if let Some(cached) = cache.get(user_id) {
        return cached.clone();
    }
    let resolved = match resolver.display_name(user_id).await {
        Ok(name) => Some(name),
        Err(e) => {
            tracing::debug!(user_id, error = %e, "user lookup failed");
            None
        }
    };
    cache.insert(user_id.to_string(), resolved.clone());
    resolved
}

/// Join memory contents into the flat `text` field of the Omi payload.
pub fn join_memory_text(memories: &[MemoryRecord]) -> String {
    if memories.is_empty() {
        return "No messages found".to_string();
    }
    memories
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join(" and then, ")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::slack::types::SlackFile;

    /// Map-backed resolver that counts lookups.
    struct MapResolver {
        names: HashMap<String, String>,
        calls: AtomicUsize,
    }

    impl MapResolver {
        fn new(pairs: &[(&str, &str)]) -> Self {
            Self {
                names: pairs
                    .iter()
                    .map(|(id, name)| (id.to_string(), name.to_string()))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl UserResolver for MapResolver {
        async fn display_name(&self, user_id: &str) -> Result<String, SlackError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.names
                .get(user_id)
                .cloned()
                .ok_or_else(|| SlackError::Api {
                    code: "user_not_found".into(),
                })
        }
    }

    fn msg(user: Option<&str>, text: Option<&str>) -> SlackMessage {
        SlackMessage {
            user: user.map(String::from),
            text: text.map(String::from),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn skips_messages_without_text_or_sender() {
        let resolver = MapResolver::new(&[("U1", "alice")]);
        let messages = vec![
            msg(Some("U1"), None),
            msg(None, Some("orphan text")),
            msg(Some("U1"), Some("kept")),
        ];
        let memories = format_messages_to_memories(&messages, &resolver).await;
        assert_eq!(memories.len(), 1);
        assert_eq!(memories[0].content, "alice said to the channel: kept");
    }

    #[tokio::test]
    async fn no_mention_defaults_recipient() {
        let resolver = MapResolver::new(&[("U1", "alice")]);
        let memories =
            format_messages_to_memories(&[msg(Some("U1"), Some("hello world"))], &resolver).await;
        assert_eq!(
            memories[0].content,
            "alice said to the channel: hello world"
        );
    }

    #[tokio::test]
    async fn first_mention_becomes_recipient() {
        let resolver = MapResolver::new(&[("U1", "alice"), ("U2", "bob")]);
        let memories = format_messages_to_memories(
            &[msg(Some("U1"), Some("<@U2> can you review this"))],
            &resolver,
        )
        .await;
        assert_eq!(
            memories[0].content,
            "alice said to bob: @bob can you review this"
        );
    }

    #[tokio::test]
    async fn each_mention_rewritten_with_its_own_name() {
        let resolver = MapResolver::new(&[("U1", "alice"), ("U2", "bob"), ("U3", "carol")]);
        let memories = format_messages_to_memories(
            &[msg(Some("U1"), Some("<@U2> and <@U3> please sync up"))],
            &resolver,
        )
        .await;
        assert_eq!(
            memories[0].content,
            "alice said to bob: @bob and @carol please sync up"
        );
    }

    #[tokio::test]
    async fn failed_mention_lookup_keeps_token_and_default_recipient() {
        let resolver = MapResolver::new(&[("U1", "alice")]);
        let memories = format_messages_to_memories(
            &[msg(Some("U1"), Some("ping <@U9>"))],
            &resolver,
        )
        .await;
        assert_eq!(
            memories[0].content,
            "alice said to the channel: ping <@U9>"
        );
    }

    #[tokio::test]
    async fn failed_sender_lookup_falls_back_to_id() {
        let resolver = MapResolver::new(&[]);
        let memories =
            format_messages_to_memories(&[msg(Some("U7"), Some("hi"))], &resolver).await;
        assert_eq!(memories[0].content, "U7 said to the channel: hi");
    }

    #[tokio::test]
    async fn trailing_question_mark_tags_questions() {
        let resolver = MapResolver::new(&[("U1", "alice")]);
        let memories =
            format_messages_to_memories(&[msg(Some("U1"), Some("ready yet?"))], &resolver).await;
        assert!(memories[0].tags.contains(&"questions".to_string()));
    }

    #[tokio::test]
    async fn trailing_question_survives_media_annotations() {
        let resolver = MapResolver::new(&[("U1", "alice")]);
        let mut message = msg(Some("U1"), Some("what is this?"));
        message.files = vec![SlackFile {
            id: "F1".into(),
            name: Some("thing.png".into()),
            filetype: Some("png".into()),
            url_private: Some("https://files.test/thing.png".into()),
        }];
        let memories = format_messages_to_memories(&[message], &resolver).await;
        assert!(memories[0].tags.contains(&"questions".to_string()));
    }

    #[tokio::test]
    async fn png_attachment_yields_image_tags_and_annotation() {
        let resolver = MapResolver::new(&[("U1", "alice")]);
        let mut message = msg(Some("U1"), Some("see attached"));
        message.files = vec![SlackFile {
            id: "F1".into(),
            name: Some("chart.png".into()),
            filetype: Some("png".into()),
            url_private: Some("https://files.test/chart.png".into()),
        }];
        let memories = format_messages_to_memories(&[message], &resolver).await;
        let mem = &memories[0];
        assert!(mem.tags.contains(&"media".to_string()));
        assert!(mem.tags.contains(&"images".to_string()));
        assert!(
            mem.content
                .contains("[Image: chart.png - https://files.test/chart.png]")
        );
    }

    #[tokio::test]
    async fn keyword_tags_are_case_insensitive() {
        let resolver = MapResolver::new(&[("U1", "alice")]);
        let memories = format_messages_to_memories(
            &[
                msg(Some("U1"), Some("Team MEETING at noon")),
                msg(Some("U1"), Some("report is Due tomorrow")),
                msg(Some("U1"), Some("good Question indeed")),
            ],
            &resolver,
        )
        .await;
        assert!(memories[0].tags.contains(&"meetings".to_string()));
        assert!(memories[1].tags.contains(&"deadlines".to_string()));
        assert!(memories[2].tags.contains(&"questions".to_string()));
    }

    #[tokio::test]
    async fn base_tags_always_present() {
        let resolver = MapResolver::new(&[("U1", "alice")]);
        let memories =
            format_messages_to_memories(&[msg(Some("U1"), Some("plain"))], &resolver).await;
        assert_eq!(memories[0].tags, vec!["conversation", "slack"]);
    }

    #[tokio::test]
    async fn lookups_are_cached_per_batch() {
        let resolver = MapResolver::new(&[("U1", "alice"), ("U2", "bob")]);
        let messages = vec![
            msg(Some("U1"), Some("one <@U2>")),
            msg(Some("U1"), Some("two <@U2>")),
            msg(Some("U1"), Some("three")),
        ];
        format_messages_to_memories(&messages, &resolver).await;
        // U1 and U2 each resolved exactly once.
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn joined_text_uses_and_then_separator() {
        let memories = vec![
            MemoryRecord {
                content: "a".into(),
                tags: vec![],
            },
            MemoryRecord {
                content: "b".into(),
                tags: vec![],
            },
        ];
        assert_eq!(join_memory_text(&memories), "a and then, b");
    }

    #[test]
    fn joined_text_empty_fallback() {
        assert_eq!(join_memory_text(&[]), "No messages found");
    }
}
