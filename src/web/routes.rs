//! HTTP surface: route handlers and the router.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Path, Query, RawQuery, State};
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::{ApiError, SlackError};
use crate::formatter::{UserResolver, format_messages_to_memories, join_memory_text};
use crate::media::collect_media_files;
use crate::omi::MemorySink;
use crate::session::{Session, SessionStore};
use crate::slack::SlackApi;
use crate::web::channels::categorize_conversations;
use crate::web::pages;

const SESSION_COOKIE: &str = "sid";

/// Shared state for all routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub slack: Arc<dyn SlackApi>,
    pub sink: Arc<dyn MemorySink>,
    pub sessions: SessionStore,
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/auth", get(auth))
        .route("/auth/callback", get(auth_callback))
        .route("/logout", get(logout))
        .route("/fetch_messages/{channel_id}", get(fetch_messages))
        .route("/fetch_media/{channel_id}", get(fetch_media))
        .route("/proxy_media", get(proxy_media))
        .route("/track_channel_usage/{channel_id}", post(track_channel_usage))
        .route("/consent", post(consent))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Cookie plumbing ─────────────────────────────────────────────────

fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

fn session_cookie(sid: &str) -> String {
    format!("{SESSION_COOKIE}={sid}; Path=/; HttpOnly; SameSite=Lax")
}

/// Attach a session cookie when a new session id was minted.
fn with_cookie(mut resp: Response, new_sid: Option<&str>) -> Response {
    if let Some(sid) = new_sid
        && let Ok(value) = HeaderValue::from_str(&session_cookie(sid))
    {
        resp.headers_mut().append(header::SET_COOKIE, value);
    }
    resp
}

/// Look up the live session named by the request's cookie.
async fn current_session(state: &AppState, headers: &HeaderMap) -> Option<(String, Session)> {
    let sid = session_id_from_headers(headers)?;
    let session = state.sessions.get(&sid).await?;
    Some((sid, session))
}

// ── Redirect helpers ────────────────────────────────────────────────

/// Percent-encode a query-string value.
fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Decode a percent-encoded query-string value (`+` means space).
/// Malformed escapes pass through as written.
fn urldecode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                let decoded = bytes.get(i + 1).zip(bytes.get(i + 2)).and_then(|(hi, lo)| {
                    let hi = (*hi as char).to_digit(16)?;
                    let lo = (*lo as char).to_digit(16)?;
                    Some((hi * 16 + lo) as u8)
                });
                match decoded {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn redirect_with_error(message: &str) -> Redirect {
    Redirect::to(&format!("/?error={}", urlencode(message)))
}

// ── Formatter resolver bound to a session token ─────────────────────

/// Resolves user ids through Slack with the session's token. Memory
/// content uses the plain handle, matching the `sender`/`recipient`
/// wording of imported conversations.
struct SessionResolver {
    slack: Arc<dyn SlackApi>,
    token: String,
}

#[async_trait]
impl UserResolver for SessionResolver {
    async fn display_name(&self, user_id: &str) -> Result<String, SlackError> {
        let user = self.slack.user_info(&self.token, user_id).await?;
        Ok(user.name)
    }
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET / — login page, or the categorized channel list once authorized.
async fn index(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let error_message = params.get("error").map(String::as_str);
    let (sid, created) = state
        .sessions
        .ensure(session_id_from_headers(&headers).as_deref())
        .await;
    let Some(session) = state.sessions.get(&sid).await else {
        // Swept between ensure and get; the retry will mint a new session.
        return Redirect::to("/").into_response();
    };
    let new_sid = created.then_some(sid.as_str());

    let Some(token) = session.slack_token.clone() else {
        let html = pages::login_page(&state.config.slack.authorize_url(), error_message);
        return with_cookie(Html(html).into_response(), new_sid);
    };

    if !session.is_linked() {
        // A Slack token without an Omi uid is not a valid state.
        state.sessions.remove(&sid).await;
        return redirect_with_error("Invalid session. Please authenticate through the correct Omi link.")
            .into_response();
    }

    match state.slack.list_conversations(&token).await {
        Ok(conversations) => {
            // Resolve display names for DM counterparts.
            let mut dm_names: HashMap<String, String> = HashMap::new();
            for convo in &conversations {
                if convo.is_im
                    && let Some(user) = convo.user.as_deref()
                    && !dm_names.contains_key(user)
                    && let Ok(info) = state.slack.user_info(&token, user).await
                {
                    dm_names.insert(user.to_string(), info.display_name().to_string());
                }
            }
            let categorized = categorize_conversations(
                &conversations,
                &dm_names,
                session.slack_user_id.as_deref(),
                &session,
            );
            with_cookie(
                Html(pages::channels_page(&categorized, error_message)).into_response(),
                new_sid,
            )
        }
        Err(e) => {
            tracing::warn!(error = %e, "conversation listing failed; clearing Slack token");
            state.sessions.update(&sid, Session::clear_slack).await;
            if e.invalidates_token() {
                Redirect::to("/").into_response()
            } else {
                redirect_with_error(&format!("Failed to fetch conversations: {e}")).into_response()
            }
        }
    }
}

/// GET /auth?uid= — link the session to an Omi user and start OAuth.
///
/// Rejects anything but exactly one `uid` query parameter.
async fn auth(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    let query = query.unwrap_or_default();
    let pairs: Vec<(&str, &str)> = query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|p| p.split_once('=').unwrap_or((p, "")))
        .collect();
    let uid = pairs
        .iter()
        .find(|(k, _)| *k == "uid")
        .map(|(_, v)| urldecode(v))
        .filter(|v| !v.is_empty());

    let (Some(uid), 1) = (uid, pairs.len()) else {
        return redirect_with_error("Invalid authentication URL. Please use the correct link from Omi.")
            .into_response();
    };

    // Rotate the session id before privileging it (fixation guard).
    let new_sid = match session_id_from_headers(&headers) {
        Some(old) => state.sessions.rotate(&old).await,
        None => state.sessions.create().await,
    };
    tracing::info!(uid = %uid, "auth initiated");
    state
        .sessions
        .update(&new_sid, |s| s.omi_uid = Some(uid))
        .await;
    with_cookie(
        Redirect::to(&state.config.slack.authorize_url()).into_response(),
        Some(&new_sid),
    )
}

/// GET /auth/callback?code= — exchange the OAuth code for a user token.
async fn auth_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some((sid, session)) = current_session(&state, &headers).await else {
        return redirect_with_error("Invalid authentication flow. Please start from the Omi link.")
            .into_response();
    };
    if !session.is_linked() {
        return redirect_with_error("Invalid authentication flow. Please start from the Omi link.")
            .into_response();
    }

    let Some(code) = params.get("code") else {
        return Redirect::to("/").into_response();
    };

    match state.slack.exchange_code(code).await {
        Ok(tokens) => {
            state
                .sessions
                .update(&sid, |s| {
                    s.slack_token = Some(tokens.access_token);
                    s.slack_user_id = Some(tokens.user_id);
                })
                .await;
            Redirect::to("/").into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "OAuth exchange failed");
            Redirect::to("/").into_response()
        }
    }
}

/// GET /logout — forget the Slack token, keep the Omi link.
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Redirect {
    if let Some(sid) = session_id_from_headers(&headers) {
        state.sessions.update(&sid, Session::clear_slack).await;
    }
    Redirect::to("/")
}

/// Pull the Slack token out of a session, or fail the JSON route.
async fn require_slack(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<(String, Session, String), ApiError> {
    let Some((sid, session)) = current_session(state, headers).await else {
        return Err(ApiError::SlackAuthRequired);
    };
    let Some(token) = session.slack_token.clone() else {
        return Err(ApiError::SlackAuthRequired);
    };
    Ok((sid, session, token))
}

/// Fetch a conversation history, demoting the session on token failure.
async fn fetch_history(
    state: &AppState,
    sid: &str,
    token: &str,
    channel_id: &str,
) -> Result<Vec<crate::slack::SlackMessage>, ApiError> {
    match state
        .slack
        .conversation_history(token, channel_id, state.config.history_limit)
        .await
    {
        Ok(messages) => Ok(messages),
        Err(e) => {
            if e.invalidates_token() {
                state.sessions.update(sid, Session::clear_slack).await;
            }
            Err(e.into())
        }
    }
}

/// GET /fetch_messages/{channel_id} — format a history and forward it to Omi.
async fn fetch_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(channel_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (sid, session, token) = require_slack(&state, &headers).await?;
    let Some(uid) = session.omi_uid.clone() else {
        return Err(ApiError::OmiAuthRequired);
    };

    let messages = fetch_history(&state, &sid, &token, &channel_id).await?;

    let resolver = SessionResolver {
        slack: Arc::clone(&state.slack),
        token,
    };
    let memories = format_messages_to_memories(&messages, &resolver).await;
    let text = join_memory_text(&memories);

    state
        .sink
        .send_memories(&uid, &memories, &text)
        .await
        .map_err(ApiError::Omi)?;

    tracing::info!(channel_id, count = memories.len(), "conversation imported");
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Successfully imported conversation to Omi",
    })))
}

/// GET /fetch_media/{channel_id} — list media descriptors from a history.
async fn fetch_media(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(channel_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (sid, _, token) = require_slack(&state, &headers).await?;
    let messages = fetch_history(&state, &sid, &token, &channel_id).await?;
    let media_files = collect_media_files(&messages);
    Ok(Json(serde_json::json!({
        "success": true,
        "media_files": media_files,
    })))
}

/// GET /proxy_media?url= — fetch a Slack-hosted file with the session token.
async fn proxy_media(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let (_, _, token) = require_slack(&state, &headers).await?;
    let Some(url) = params.get("url") else {
        return Err(ApiError::BadRequest("No URL provided".into()));
    };

    let download = state
        .slack
        .download_file(&token, url)
        .await
        .map_err(|e| match e {
            SlackError::Download { status } => {
                ApiError::Upstream(format!("Failed to fetch media: {status}"))
            }
            other => ApiError::Slack(other),
        })?;

    Ok((
        [(header::CONTENT_TYPE, download.content_type)],
        download.bytes,
    )
        .into_response())
}

/// POST /track_channel_usage/{channel_id} — bump the session usage counter.
async fn track_channel_usage(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(channel_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (sid, _, _) = require_slack(&state, &headers).await?;
    state
        .sessions
        .update(&sid, |s| s.track_channel(&channel_id))
        .await;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// POST /consent — record consent on the session.
async fn consent(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (sid, created) = state
        .sessions
        .ensure(session_id_from_headers(&headers).as_deref())
        .await;
    state.sessions.update(&sid, |s| s.consent_given = true).await;
    with_cookie(
        Json(serde_json::json!({ "success": true })).into_response(),
        created.then_some(sid.as_str()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_header_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; sid=abc-123; lang=en"),
        );
        assert_eq!(session_id_from_headers(&headers).as_deref(), Some("abc-123"));
    }

    #[test]
    fn missing_cookie_yields_none() {
        assert!(session_id_from_headers(&HeaderMap::new()).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark"));
        assert!(session_id_from_headers(&headers).is_none());
    }

    #[test]
    fn set_cookie_attributes() {
        let cookie = session_cookie("abc");
        assert_eq!(cookie, "sid=abc; Path=/; HttpOnly; SameSite=Lax");
    }

    #[test]
    fn urlencode_escapes_reserved_characters() {
        assert_eq!(urlencode("a b&c"), "a%20b%26c");
        assert_eq!(urlencode("plain-text_1.~"), "plain-text_1.~");
    }

    #[test]
    fn urldecode_unescapes_values() {
        assert_eq!(urldecode("user%2B1"), "user+1");
        assert_eq!(urldecode("a+b"), "a b");
        assert_eq!(urldecode("%41%62c"), "Abc");
    }

    #[test]
    fn urldecode_passes_malformed_escapes_through() {
        assert_eq!(urldecode("%zz"), "%zz");
        assert_eq!(urldecode("100%"), "100%");
        assert_eq!(urldecode("%4"), "%4");
    }
}
