//! Web layer: router, handlers, channel list rendering.

pub mod channels;
pub mod pages;
pub mod routes;

pub use routes::{AppState, router};
