use std::sync::Arc;

use omi_slack_bridge::config::Config;
use omi_slack_bridge::omi::OmiClient;
use omi_slack_bridge::session::{self, SessionStore};
use omi_slack_bridge::slack::SlackClient;
use omi_slack_bridge::web::{AppState, router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env()?;

    let sessions = SessionStore::new(config.session_idle_timeout);
    let _sweeper = session::spawn_sweeper(sessions.clone(), std::time::Duration::from_secs(60));

    let state = AppState {
        slack: Arc::new(SlackClient::new(config.slack.clone())),
        sink: Arc::new(OmiClient::new(config.omi.clone())),
        sessions,
        config,
    };

    let addr = format!("0.0.0.0:{}", state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Slack → Omi bridge listening");
    axum::serve(listener, router(state)).await?;

    Ok(())
}
