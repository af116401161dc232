//! Media classification and extraction from Slack messages.

use serde::Serialize;

use crate::slack::types::{SlackFile, SlackMessage};

/// Coarse media kind derived from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    File,
}

impl MediaKind {
    /// Classify a Slack `filetype` (extension, any case).
    pub fn from_filetype(filetype: &str) -> Self {
        match filetype.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "gif" => MediaKind::Image,
            "mp4" | "mov" | "avi" => MediaKind::Video,
            "mp3" | "wav" | "ogg" => MediaKind::Audio,
            _ => MediaKind::File,
        }
    }

    /// Label used inside bracketed annotations: `[Image: ...]` etc.
    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::Image => "Image",
            MediaKind::Video => "Video",
            MediaKind::Audio => "Audio",
            MediaKind::File => "File",
        }
    }

    /// Tag added to a memory record when this kind is present.
    pub fn tag(&self) -> &'static str {
        match self {
            MediaKind::Image => "images",
            MediaKind::Video => "videos",
            MediaKind::Audio => "audio",
            MediaKind::File => "files",
        }
    }
}

/// A media descriptor as returned by the media-list route.
#[derive(Debug, Clone, Serialize)]
pub struct MediaFile {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub url: String,
    pub timestamp: String,
}

/// A classified attachment, before it becomes an annotation or descriptor.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub id: String,
    pub name: String,
    pub kind: MediaKind,
    pub url: String,
}

impl Attachment {
    fn from_file(file: &SlackFile) -> Self {
        Self {
            id: file.id.clone(),
            name: file
                .name
                .clone()
                .unwrap_or_else(|| "unnamed file".to_string()),
            kind: MediaKind::from_filetype(file.filetype.as_deref().unwrap_or("")),
            url: file.url_private.clone().unwrap_or_default(),
        }
    }

    /// Bracketed annotation appended to memory text: `[Image: name - url]`.
    pub fn annotation(&self) -> String {
        format!("[{}: {} - {}]", self.kind.label(), self.name, self.url)
    }
}

/// Collect attachments from a message's two independent sources: file
/// attachments and inline image blocks.
pub fn message_attachments(msg: &SlackMessage) -> Vec<Attachment> {
    let mut attachments: Vec<Attachment> = msg.files.iter().map(Attachment::from_file).collect();

    for block in &msg.blocks {
        if block.block_type == "image" {
            attachments.push(Attachment {
                id: block.block_id.clone(),
                name: block
                    .alt_text
                    .clone()
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| "image".to_string()),
                kind: MediaKind::Image,
                url: block.image_url.clone().unwrap_or_default(),
            });
        }
    }

    attachments
}

/// Flatten a message history into media descriptors for the media-list route.
pub fn collect_media_files(messages: &[SlackMessage]) -> Vec<MediaFile> {
    let mut media = Vec::new();
    for msg in messages {
        let ts = msg.ts.clone().unwrap_or_default();
        for att in message_attachments(msg) {
            media.push(MediaFile {
                id: att.id,
                name: att.name,
                kind: att.kind,
                url: att.url,
                timestamp: ts.clone(),
            });
        }
    }
    media
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slack::types::MessageBlock;

    fn file(name: &str, filetype: &str) -> SlackFile {
        SlackFile {
            id: "F1".into(),
            name: Some(name.into()),
            filetype: Some(filetype.into()),
            url_private: Some(format!("https://files.test/{name}")),
        }
    }

    #[test]
    fn filetype_classification() {
        assert_eq!(MediaKind::from_filetype("png"), MediaKind::Image);
        assert_eq!(MediaKind::from_filetype("JPG"), MediaKind::Image);
        assert_eq!(MediaKind::from_filetype("mov"), MediaKind::Video);
        assert_eq!(MediaKind::from_filetype("wav"), MediaKind::Audio);
        assert_eq!(MediaKind::from_filetype("pdf"), MediaKind::File);
        assert_eq!(MediaKind::from_filetype(""), MediaKind::File);
    }

    #[test]
    fn annotation_format() {
        let att = Attachment::from_file(&file("cat.png", "png"));
        assert_eq!(
            att.annotation(),
            "[Image: cat.png - https://files.test/cat.png]"
        );
    }

    #[test]
    fn unnamed_file_gets_placeholder() {
        let att = Attachment::from_file(&SlackFile::default());
        assert_eq!(att.name, "unnamed file");
        assert_eq!(att.kind, MediaKind::File);
    }

    #[test]
    fn attachments_merge_files_and_image_blocks() {
        let msg = SlackMessage {
            files: vec![file("demo.mp4", "mp4")],
            blocks: vec![
                MessageBlock {
                    block_type: "section".into(),
                    ..Default::default()
                },
                MessageBlock {
                    block_type: "image".into(),
                    block_id: "b1".into(),
                    image_url: Some("https://files.test/inline.png".into()),
                    alt_text: Some("inline pic".into()),
                },
            ],
            ..Default::default()
        };

        let atts = message_attachments(&msg);
        assert_eq!(atts.len(), 2);
        assert_eq!(atts[0].kind, MediaKind::Video);
        assert_eq!(atts[1].kind, MediaKind::Image);
        assert_eq!(atts[1].name, "inline pic");
        assert_eq!(atts[1].id, "b1");
    }

    #[test]
    fn collect_media_carries_message_timestamp() {
        let msg = SlackMessage {
            ts: Some("1700000000.000100".into()),
            files: vec![file("notes.pdf", "pdf")],
            ..Default::default()
        };
        let media = collect_media_files(&[msg]);
        assert_eq!(media.len(), 1);
        assert_eq!(media[0].timestamp, "1700000000.000100");
        assert_eq!(media[0].kind, MediaKind::File);
    }

    #[test]
    fn media_file_serializes_kind_lowercase() {
        let media = MediaFile {
            id: "F1".into(),
            name: "cat.png".into(),
            kind: MediaKind::Image,
            url: "https://files.test/cat.png".into(),
            timestamp: "1".into(),
        };
        let value = serde_json::to_value(&media).unwrap();
        assert_eq!(value["type"], "image");
    }
}
