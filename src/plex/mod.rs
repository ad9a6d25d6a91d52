//! Plex upstream access.
//!
//! - [`directory`]: resolves a credential to a reachable [`ServerEndpoint`]
//! - [`sessions`]: the live "now playing" session, if any
//! - [`history`]: recently played music, tried across several endpoints
//! - [`payload`]: XML/JSON payload sniffing and normalization shared by both
//!
//! The resolver only sees the [`PlaybackSource`] trait; [`PlexClient`] is
//! the production implementation bound to one discovered server.

pub mod directory;
pub mod history;
pub mod payload;
pub mod sessions;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, Url};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Result;

pub use directory::Directory;
pub use history::HistoryFetcher;

/// Header carrying the access credential on every Plex request.
pub const TOKEN_HEADER: &str = "X-Plex-Token";

/// A playback occurrence, live or historical, normalized across payload shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackRecord {
    pub title: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    /// Absolute URL once the record has left this module.
    #[serde(default, rename = "thumb")]
    pub thumbnail: Option<String>,
    #[serde(rename = "type")]
    pub media_type: String,
    #[serde(rename = "state")]
    pub playback_state: String,
    /// Kept for diagnostics only, never rendered.
    #[serde(default)]
    pub user: Option<String>,
}

impl PlaybackRecord {
    pub fn is_music(&self) -> bool {
        is_music_type(&self.media_type) || self.artist.as_deref().is_some_and(|a| !a.is_empty())
    }
}

pub(crate) fn is_music_type(kind: &str) -> bool {
    matches!(
        kind.trim().to_ascii_lowercase().as_str(),
        "track" | "song" | "audio"
    )
}

/// The server picked during discovery. Immutable for the client's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    pub base_url: String,
    pub access_token: String,
    pub version: Option<String>,
    pub owner: Option<String>,
    pub name: Option<String>,
}

impl ServerEndpoint {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Absolute URLs pass through; server paths get the base URL and the
    /// percent-encoded token.
    pub fn resolve_thumb(&self, thumb: &str) -> String {
        if thumb.starts_with("http://") || thumb.starts_with("https://") {
            return thumb.to_string();
        }
        let url = self.url(thumb);
        if self.access_token.is_empty() {
            return url;
        }
        match Url::parse(&url) {
            Ok(mut parsed) => {
                parsed
                    .query_pairs_mut()
                    .append_pair(TOKEN_HEADER, &self.access_token);
                parsed.to_string()
            }
            Err(e) => {
                tracing::debug!("Thumbnail URL does not parse, leaving it unauthenticated: {}", e);
                url
            }
        }
    }
}

/// Where the resolver gets live and historical playback from.
#[async_trait]
pub trait PlaybackSource: Send + Sync {
    /// Owning account of the server, the default user filter.
    fn owner(&self) -> Option<&str>;

    /// First active session matching `user` (or the owner when `None`).
    async fn current_session(&self, user: Option<&str>) -> Option<PlaybackRecord>;

    /// Recently played music, most recent first. Never fails; empty on error.
    async fn recent_history(&self, user: Option<&str>, limit: usize) -> Vec<PlaybackRecord>;
}

/// Plex client bound to one discovered server.
pub struct PlexClient {
    endpoint: ServerEndpoint,
    http: HttpClient,
    history: HistoryFetcher,
    timeout: Duration,
}

impl PlexClient {
    /// Discover the server visible to `credential` and bind to it.
    pub async fn connect(http: HttpClient, config: &Config, credential: &str) -> Result<Self> {
        let directory = Directory::new(
            http.clone(),
            &config.plex.directory_url,
            &config.plex.client_identifier,
            Duration::from_secs(config.plex.discovery_timeout_secs),
        );
        let endpoint = directory.discover(credential).await?;
        let timeout = Duration::from_secs(config.history.request_timeout_secs);
        Ok(Self::with_endpoint(http, endpoint, timeout))
    }

    pub fn with_endpoint(http: HttpClient, endpoint: ServerEndpoint, timeout: Duration) -> Self {
        Self {
            endpoint,
            http,
            history: HistoryFetcher::new(timeout),
            timeout,
        }
    }

    pub fn endpoint(&self) -> &ServerEndpoint {
        &self.endpoint
    }

    /// Number of active sessions on the server, 0 when it cannot be listed.
    pub async fn session_count(&self) -> usize {
        sessions::list_sessions(&self.http, &self.endpoint, self.timeout)
            .await
            .map(|items| items.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl PlaybackSource for PlexClient {
    fn owner(&self) -> Option<&str> {
        self.endpoint.owner.as_deref()
    }

    async fn current_session(&self, user: Option<&str>) -> Option<PlaybackRecord> {
        sessions::fetch_current(&self.http, &self.endpoint, user, self.timeout).await
    }

    async fn recent_history(&self, user: Option<&str>, limit: usize) -> Vec<PlaybackRecord> {
        self.history
            .fetch_history(&self.http, &self.endpoint, limit, user)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> ServerEndpoint {
        ServerEndpoint {
            base_url: "https://10-0-0-2.plex.direct:32400/".to_string(),
            access_token: "abc123".to_string(),
            version: None,
            owner: None,
            name: None,
        }
    }

    fn record(media_type: &str, artist: Option<&str>) -> PlaybackRecord {
        PlaybackRecord {
            title: "Song".to_string(),
            artist: artist.map(str::to_string),
            album: None,
            thumbnail: None,
            media_type: media_type.to_string(),
            playback_state: "stopped".to_string(),
            user: None,
        }
    }

    #[test]
    fn test_relative_thumb_gets_base_and_token() {
        assert_eq!(
            endpoint().resolve_thumb("/library/metadata/42/thumb/1700000000"),
            "https://10-0-0-2.plex.direct:32400/library/metadata/42/thumb/1700000000?X-Plex-Token=abc123"
        );
    }

    #[test]
    fn test_absolute_thumb_passes_through() {
        let url = "https://images.example.com/cover.jpg";
        assert_eq!(endpoint().resolve_thumb(url), url);
    }

    #[test]
    fn test_thumb_with_query_appends_token() {
        assert_eq!(
            endpoint().resolve_thumb("/photo/:/transcode?width=160"),
            "https://10-0-0-2.plex.direct:32400/photo/:/transcode?width=160&X-Plex-Token=abc123"
        );
    }

    #[test]
    fn test_thumb_token_is_percent_encoded() {
        let mut ep = endpoint();
        ep.access_token = "a&b+c=d".to_string();
        assert_eq!(
            ep.resolve_thumb("/library/metadata/42/thumb"),
            "https://10-0-0-2.plex.direct:32400/library/metadata/42/thumb?X-Plex-Token=a%26b%2Bc%3Dd"
        );
    }

    #[test]
    fn test_empty_token_adds_no_query() {
        let mut ep = endpoint();
        ep.access_token.clear();
        assert_eq!(
            ep.resolve_thumb("/library/metadata/42/thumb"),
            "https://10-0-0-2.plex.direct:32400/library/metadata/42/thumb"
        );
    }

    #[test]
    fn test_is_music() {
        assert!(record("track", None).is_music());
        assert!(record("Audio", None).is_music());
        assert!(record("", Some("Radiohead")).is_music());
        assert!(!record("episode", None).is_music());
        assert!(!record("movie", Some("")).is_music());
    }

    #[test]
    fn test_record_serializes_with_wire_names() {
        let json = serde_json::to_value(record("track", Some("Björk"))).unwrap();
        assert_eq!(json["type"], "track");
        assert_eq!(json["state"], "stopped");
        assert!(json.get("thumb").is_some());
    }
}
