//! Slack Web API integration.

pub mod client;
pub mod types;

pub use client::{FileDownload, SlackApi, SlackClient};
pub use types::{Conversation, MessageBlock, OauthTokens, SlackFile, SlackMessage, SlackUser};
