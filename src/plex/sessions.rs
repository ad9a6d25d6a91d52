use std::time::Duration;

use reqwest::{header, Client as HttpClient};

use super::payload::{self, RawItem};
use super::{PlaybackRecord, ServerEndpoint, TOKEN_HEADER};
use crate::error::{Error, Result};

const SESSIONS_PATH: &str = "/status/sessions";

/// List active sessions on the server.
pub async fn list_sessions(
    http: &HttpClient,
    endpoint: &ServerEndpoint,
    timeout: Duration,
) -> Result<Vec<RawItem>> {
    let response = http
        .get(endpoint.url(SESSIONS_PATH))
        .header(header::ACCEPT, "application/json")
        .header(TOKEN_HEADER, &endpoint.access_token)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| Error::fetch(SESSIONS_PATH, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::fetch(SESSIONS_PATH, format!("status {status}")));
    }

    let body = response
        .text()
        .await
        .map_err(|e| Error::fetch(SESSIONS_PATH, e))?;
    payload::parse_entries(SESSIONS_PATH, &body)
}

/// The first session eligible for `filter_user`, normalized. An eligible
/// session without a title yields `None` rather than a later session.
///
/// Without an explicit filter the server owner's sessions are the eligible
/// ones; when the owner is unknown too, any session is.
pub fn pick_session(
    sessions: &[RawItem],
    endpoint: &ServerEndpoint,
    filter_user: Option<&str>,
) -> Option<PlaybackRecord> {
    let filter = filter_user.or(endpoint.owner.as_deref());
    sessions
        .iter()
        .find(|s| filter.is_none() || s.user_name() == filter)?
        .normalize(endpoint, "playing", None)
}

pub async fn fetch_current(
    http: &HttpClient,
    endpoint: &ServerEndpoint,
    filter_user: Option<&str>,
    timeout: Duration,
) -> Option<PlaybackRecord> {
    match list_sessions(http, endpoint, timeout).await {
        Ok(sessions) => {
            let record = pick_session(&sessions, endpoint, filter_user);
            tracing::debug!(
                sessions = sessions.len(),
                matched = record.is_some(),
                "listed active sessions"
            );
            record
        }
        Err(e) => {
            tracing::warn!("Could not list sessions: {}", e);
            None
        }
    }
}
