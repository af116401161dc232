//! Conversation categorization for the channel list page.

use std::collections::HashMap;

use crate::session::Session;
use crate::slack::types::Conversation;

/// A row on the channel list page.
#[derive(Debug, Clone)]
pub struct ChannelEntry {
    pub id: String,
    pub label: String,
    pub is_own_dm: bool,
    pub usage: u32,
}

/// Conversations bucketed for display.
#[derive(Debug, Default)]
pub struct CategorizedChannels {
    pub direct_messages: Vec<ChannelEntry>,
    pub group_chats: Vec<ChannelEntry>,
    pub public_channels: Vec<ChannelEntry>,
}

/// Bucket conversations into DMs / group chats / public channels.
///
/// DM labels come from the resolved display names (`"Unknown User"` when the
/// lookup yielded nothing). The user's own DM leads the DM list; within each
/// bucket, rows sort by session usage count, most used first.
pub fn categorize_conversations(
    conversations: &[Conversation],
    dm_names: &HashMap<String, String>,
    current_user_id: Option<&str>,
    session: &Session,
) -> CategorizedChannels {
    let mut categorized = CategorizedChannels::default();

    for convo in conversations {
        let usage = session.usage_count(&convo.id);
        if convo.is_im {
            let user = convo.user.as_deref().unwrap_or("");
            let label = dm_names
                .get(user)
                .cloned()
                .unwrap_or_else(|| "Unknown User".to_string());
            let is_own_dm = current_user_id.is_some_and(|me| me == user);
            let entry = ChannelEntry {
                id: convo.id.clone(),
                label,
                is_own_dm,
                usage,
            };
            if is_own_dm {
                categorized.direct_messages.insert(0, entry);
            } else {
                categorized.direct_messages.push(entry);
            }
        } else {
            let entry = ChannelEntry {
                id: convo.id.clone(),
                label: convo.name.clone().unwrap_or_else(|| convo.id.clone()),
                is_own_dm: false,
                usage,
            };
            if convo.is_mpim {
                categorized.group_chats.push(entry);
            } else {
                categorized.public_channels.push(entry);
            }
        }
    }

    // Stable sort: the own-DM stays ahead of equally-used DMs.
    for bucket in [
        &mut categorized.direct_messages,
        &mut categorized.group_chats,
        &mut categorized.public_channels,
    ] {
        bucket.sort_by_key(|e| std::cmp::Reverse(e.usage));
    }

    categorized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn im(id: &str, user: &str) -> Conversation {
        Conversation {
            id: id.into(),
            name: None,
            is_im: true,
            is_mpim: false,
            user: Some(user.into()),
        }
    }

    fn channel(id: &str, name: &str, is_mpim: bool) -> Conversation {
        Conversation {
            id: id.into(),
            name: Some(name.into()),
            is_im: false,
            is_mpim,
            user: None,
        }
    }

    fn session_with_usage(pairs: &[(&str, u32)]) -> Session {
        // Build through the public surface so the counts are real.
        let mut session = None;
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        rt.block_on(async {
            let store = crate::session::SessionStore::new(std::time::Duration::from_secs(60));
            let sid = store.create().await;
            for (id, n) in pairs {
                for _ in 0..*n {
                    store.update(&sid, |s| s.track_channel(id)).await;
                }
            }
            session = store.get(&sid).await;
        });
        session.unwrap()
    }

    #[test]
    fn buckets_by_conversation_kind() {
        let convos = vec![
            channel("C1", "general", false),
            channel("G1", "mpdm-group", true),
            im("D1", "U2"),
        ];
        let categorized = categorize_conversations(
            &convos,
            &HashMap::from([("U2".to_string(), "bob".to_string())]),
            Some("U1"),
            &session_with_usage(&[]),
        );
        assert_eq!(categorized.public_channels.len(), 1);
        assert_eq!(categorized.group_chats.len(), 1);
        assert_eq!(categorized.direct_messages.len(), 1);
        assert_eq!(categorized.direct_messages[0].label, "bob");
    }

    #[test]
    fn unknown_dm_user_gets_placeholder_label() {
        let categorized = categorize_conversations(
            &[im("D1", "U9")],
            &HashMap::new(),
            Some("U1"),
            &session_with_usage(&[]),
        );
        assert_eq!(categorized.direct_messages[0].label, "Unknown User");
    }

    #[test]
    fn own_dm_leads_the_dm_list() {
        let names = HashMap::from([
            ("U1".to_string(), "me".to_string()),
            ("U2".to_string(), "bob".to_string()),
        ]);
        let categorized = categorize_conversations(
            &[im("D1", "U2"), im("D2", "U1")],
            &names,
            Some("U1"),
            &session_with_usage(&[]),
        );
        assert!(categorized.direct_messages[0].is_own_dm);
        assert_eq!(categorized.direct_messages[0].id, "D2");
    }

    #[test]
    fn buckets_sort_by_usage_descending() {
        let categorized = categorize_conversations(
            &[
                channel("C1", "alpha", false),
                channel("C2", "beta", false),
                channel("C3", "gamma", false),
            ],
            &HashMap::new(),
            None,
            &session_with_usage(&[("C2", 5), ("C3", 2)]),
        );
        let ids: Vec<&str> = categorized
            .public_channels
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(ids, vec!["C2", "C3", "C1"]);
    }

    #[test]
    fn channel_without_name_falls_back_to_id() {
        let convo = Conversation {
            id: "C9".into(),
            name: None,
            is_im: false,
            is_mpim: false,
            user: None,
        };
        let categorized = categorize_conversations(
            &[convo],
            &HashMap::new(),
            None,
            &session_with_usage(&[]),
        );
        assert_eq!(categorized.public_channels[0].label, "C9");
    }
}
