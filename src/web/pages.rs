//! Inline HTML rendering for the two pages the bridge serves.

use crate::web::channels::{CategorizedChannels, ChannelEntry};

/// Minimal HTML escaping for text interpolated into pages.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn error_banner(error: Option<&str>) -> String {
    match error {
        Some(msg) => format!(r#"<p class="error">{}</p>"#, escape(msg)),
        None => String::new(),
    }
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>{}</body></html>",
        escape(title),
        body
    )
}

/// The login page: an authorize link plus any error banner.
pub fn login_page(auth_url: &str, error: Option<&str>) -> String {
    let body = format!(
        r#"{}<h1>Import Slack conversations to Omi</h1>
<a class="login" href="{}">Sign in with Slack</a>"#,
        error_banner(error),
        escape(auth_url)
    );
    page("Slack → Omi", &body)
}

fn channel_rows(entries: &[ChannelEntry]) -> String {
    entries
        .iter()
        .map(|e| {
            let marker = if e.is_own_dm { " (you)" } else { "" };
            format!(
                r#"<li data-channel="{id}">{label}{marker} <a href="/fetch_messages/{id}" data-import="{id}">Import</a> <a href="/fetch_media/{id}">Media</a></li>"#,
                id = escape(&e.id),
                label = escape(&e.label),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The authenticated channel list page.
pub fn channels_page(channels: &CategorizedChannels, error: Option<&str>) -> String {
    let body = format!(
        r#"{banner}<h1>Your conversations</h1>
<p><a href="/logout">Log out</a></p>
<h2>Direct messages</h2>
<ul>{dms}</ul>
<h2>Group chats</h2>
<ul>{groups}</ul>
<h2>Channels</h2>
<ul>{publics}</ul>
<script>
document.querySelectorAll("[data-import]").forEach(function (link) {{
  link.addEventListener("click", function () {{
    navigator.sendBeacon("/track_channel_usage/" + link.dataset.import);
  }});
}});
</script>"#,
        banner = error_banner(error),
        dms = channel_rows(&channels.direct_messages),
        groups = channel_rows(&channels.group_chats),
        publics = channel_rows(&channels.public_channels),
    );
    page("Slack → Omi", &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_covers_html_metacharacters() {
        assert_eq!(
            escape(r#"<a href="x">&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn login_page_links_authorize_url() {
        let html = login_page("https://slack.com/oauth/v2/authorize?client_id=1", None);
        assert!(html.contains(r#"href="https://slack.com/oauth/v2/authorize?client_id=1""#));
        assert!(!html.contains("class=\"error\""));
    }

    #[test]
    fn login_page_shows_error_banner() {
        let html = login_page("https://auth", Some("Invalid session"));
        assert!(html.contains("Invalid session"));
        assert!(html.contains("class=\"error\""));
    }

    #[test]
    fn channels_page_renders_all_sections() {
        let channels = CategorizedChannels {
            direct_messages: vec![ChannelEntry {
                id: "D1".into(),
                label: "bob".into(),
                is_own_dm: false,
                usage: 0,
            }],
            group_chats: vec![],
            public_channels: vec![ChannelEntry {
                id: "C1".into(),
                label: "general <test>".into(),
                is_own_dm: false,
                usage: 3,
            }],
        };
        let html = channels_page(&channels, None);
        assert!(html.contains("/fetch_messages/D1"));
        assert!(html.contains("/fetch_media/C1"));
        // Labels are escaped.
        assert!(html.contains("general &lt;test&gt;"));
        assert!(!html.contains("general <test>"));
    }

    #[test]
    fn own_dm_is_marked() {
        let channels = CategorizedChannels {
            direct_messages: vec![ChannelEntry {
                id: "D2".into(),
                label: "me".into(),
                is_own_dm: true,
                usage: 0,
            }],
            ..Default::default()
        };
        let html = channels_page(&channels, None);
        assert!(html.contains("me (you)"));
    }
}
