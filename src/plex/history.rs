//! Recently played music.
//!
//! Plex exposes playback history under different paths depending on server
//! version and account type, with different payload shapes. Candidates are
//! tried in a fixed order, most specific first, and the first one that
//! yields any music wins. Probing is sequential: running candidates in
//! parallel would change which source wins.

use std::time::Duration;

use reqwest::{header, Client as HttpClient};

use super::payload;
use super::{PlaybackRecord, ServerEndpoint, TOKEN_HEADER};
use crate::error::{Error, Result};

/// Plex library type id for music tracks.
const MUSIC_TRACK_TYPE: &str = "10";

pub const HISTORY_CANDIDATES: &[&str] = &[
    "/status/sessions/history/all",
    "/system/history/all",
    "/library/recentlyViewed",
    "/library/recentlyViewedItems",
    "/library/recentlyViewedItems?type=10",
];

/// One history endpoint to try.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryCandidate {
    pub path: String,
}

impl HistoryCandidate {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Fetch and normalize up to `limit` music entries from this endpoint.
    async fn attempt(
        &self,
        http: &HttpClient,
        endpoint: &ServerEndpoint,
        limit: usize,
        label_user: Option<&str>,
        timeout: Duration,
    ) -> Result<Vec<PlaybackRecord>> {
        let limit_param = limit.to_string();
        let response = http
            .get(endpoint.url(&self.path))
            .header(header::ACCEPT, "application/xml")
            .query(&[
                (TOKEN_HEADER, endpoint.access_token.as_str()),
                ("limit", limit_param.as_str()),
                ("type", MUSIC_TRACK_TYPE),
            ])
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Error::fetch(&self.path, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(&self.path, format!("status {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::fetch(&self.path, e))?;

        Ok(collect_music(&payload::parse_entries(&self.path, &body)?, endpoint, limit, label_user))
    }
}

/// Keep music entries only, normalized, stopping at `limit`.
///
/// Every record is labelled with `label_user`, whatever account the entry
/// itself names.
pub fn collect_music(
    items: &[payload::RawItem],
    endpoint: &ServerEndpoint,
    limit: usize,
    label_user: Option<&str>,
) -> Vec<PlaybackRecord> {
    items
        .iter()
        .filter(|item| item.is_music())
        .filter_map(|item| item.normalize(endpoint, "stopped", label_user))
        .map(|mut record| {
            record.user = label_user.map(str::to_string);
            record
        })
        .take(limit)
        .collect()
}

/// Ordered walk over [`HistoryCandidate`]s.
#[derive(Debug, Clone)]
pub struct HistoryFetcher {
    candidates: Vec<HistoryCandidate>,
    timeout: Duration,
}

impl HistoryFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self::with_candidates(
            HISTORY_CANDIDATES.iter().copied().map(HistoryCandidate::new).collect(),
            timeout,
        )
    }

    pub fn with_candidates(candidates: Vec<HistoryCandidate>, timeout: Duration) -> Self {
        Self { candidates, timeout }
    }

    pub fn candidates(&self) -> &[HistoryCandidate] {
        &self.candidates
    }

    /// Records are labelled with `filter_user`, or the server owner.
    pub async fn fetch_history(
        &self,
        http: &HttpClient,
        endpoint: &ServerEndpoint,
        limit: usize,
        filter_user: Option<&str>,
    ) -> Vec<PlaybackRecord> {
        if limit == 0 {
            return Vec::new();
        }
        let label_user = filter_user.or(endpoint.owner.as_deref());

        for candidate in &self.candidates {
            match candidate
                .attempt(http, endpoint, limit, label_user, self.timeout)
                .await
            {
                Ok(items) if !items.is_empty() => {
                    tracing::info!(endpoint = %candidate.path, count = items.len(), "history fetched");
                    return items;
                }
                Ok(_) => {
                    tracing::debug!(endpoint = %candidate.path, "no music in history endpoint");
                }
                Err(e) => {
                    tracing::warn!(endpoint = %candidate.path, "Skipping history endpoint: {}", e);
                }
            }
        }

        tracing::info!("no history endpoint yielded music");
        Vec::new()
    }
}
