//! Slack → Omi bridge: OAuth login, channel listing, and conversation
//! import into the Omi memory API.

pub mod config;
pub mod error;
pub mod formatter;
pub mod media;
pub mod omi;
pub mod session;
pub mod slack;
pub mod web;
