//! HTTP surface: the SVG card plus status and cache maintenance endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::header::{self, HeaderName};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::cover_art::CoverArtCache;
use crate::plex::{PlaybackSource, PlexClient};
use crate::render::{self, CardOptions, Theme};
use crate::resolver::{ResolveState, Resolver};
use crate::selection::OffsetSpec;
use crate::storage::{history_key, HistoryCache};

const SVG_CONTENT_TYPE: &str = "image/svg+xml";
const RESOLVE_STATE_HEADER: HeaderName = HeaderName::from_static("x-resolve-state");
const CACHE_SHORT: &str = "public, max-age=5, must-revalidate";
const CACHE_NONE: &str = "no-store";

pub struct AppState {
    pub config: Config,
    pub http: reqwest::Client,
    pub resolver: Resolver,
    pub covers: CoverArtCache,
    /// Unix seconds, drives history rotation when no offset is given
    pub clock: fn() -> i64,
}

impl AppState {
    pub fn new(config: Config, http: reqwest::Client, cache: Arc<HistoryCache>) -> Self {
        let resolver = Resolver::new(
            cache,
            config.history.limit,
            Duration::from_secs(config.cache.ttl_seconds),
        );
        let covers = CoverArtCache::new(http.clone(), &config.cover);
        Self {
            config,
            http,
            resolver,
            covers,
            clock: || chrono::Utc::now().timestamp(),
        }
    }

    /// An explicit offset wins; otherwise the pick rotates with the clock.
    fn offset(&self, raw: Option<&str>) -> OffsetSpec {
        match raw {
            Some(raw) => OffsetSpec::parse(Some(raw)),
            None => rotating_offset(
                (self.clock)(),
                self.config.server.rotation_period_secs,
                self.config.server.rotation_window,
            ),
        }
    }

    /// Request token, else the configured one.
    fn credential<'a>(&'a self, token: Option<&'a str>) -> Option<&'a str> {
        token
            .filter(|t| !t.is_empty())
            .or(self.config.plex.token.as_deref())
            .filter(|t| !t.is_empty())
    }

    async fn connect(&self, credential: &str) -> Option<PlexClient> {
        match PlexClient::connect(self.http.clone(), &self.config, credential).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!("Plex not connected: {}", e);
                None
            }
        }
    }
}

/// Index of the history item shown at `now_secs`, stepping once per
/// `period` seconds through the first `window` items.
pub fn rotating_offset(now_secs: i64, period: u64, window: u64) -> OffsetSpec {
    let now = u64::try_from(now_secs).unwrap_or(0);
    OffsetSpec::Index((now / period.max(1)) % window.max(1))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/now-playing", get(now_playing))
        .route("/api/now-playing-svg", get(now_playing))
        .route("/api/now-playing-png", get(now_playing))
        .route("/api/status", get(status))
        .route("/api/cache/clear", get(clear_cache))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct NowPlayingParams {
    pub token: Option<String>,
    pub user: Option<String>,
    pub offset: Option<String>,
    pub theme: Option<String>,
    /// Kept as strings so a malformed value falls back to the default
    /// instead of rejecting the request.
    pub width: Option<String>,
    pub height: Option<String>,
    pub refresh: Option<String>,
}

impl NowPlayingParams {
    fn card_options(&self, config: &Config) -> CardOptions {
        let theme = self.theme.as_deref().unwrap_or(&config.server.default_theme);
        let width = self
            .width
            .as_deref()
            .and_then(|w| w.trim().parse().ok())
            .unwrap_or(config.server.image_width);
        let height = self
            .height
            .as_deref()
            .and_then(|h| h.trim().parse().ok())
            .unwrap_or(config.server.image_height);
        CardOptions::new(width, height, Theme::from_name(theme))
    }

    fn refresh(&self) -> bool {
        self.refresh
            .as_deref()
            .is_some_and(|r| r.eq_ignore_ascii_case("true") || r == "1")
    }
}

fn svg_response(svg: String, state: Option<ResolveState>, refresh: bool) -> Response {
    let cache_control = if refresh { CACHE_NONE } else { CACHE_SHORT };
    let state = state.map(|s| s.as_str()).unwrap_or("error");
    (
        [
            (header::CONTENT_TYPE, SVG_CONTENT_TYPE),
            (header::CACHE_CONTROL, cache_control),
            (RESOLVE_STATE_HEADER, state),
        ],
        svg,
    )
        .into_response()
}

fn error_card(message: &str, opts: &CardOptions) -> Response {
    svg_response(render::error_svg(message, opts.width, opts.height), None, true)
}

pub async fn now_playing(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NowPlayingParams>,
) -> Response {
    let opts = params.card_options(&state.config);

    let Some(credential) = state.credential(params.token.as_deref()) else {
        tracing::error!("No Plex credential in request or configuration");
        return error_card("Error: Plex not configured", &opts);
    };
    let Some(client) = state.connect(credential).await else {
        return error_card("Error: Plex server unreachable", &opts);
    };

    let user = params.user.as_deref().filter(|u| !u.is_empty());
    let offset = state.offset(params.offset.as_deref());
    let resolution = state.resolver.resolve(&client, user, &offset).await;
    tracing::info!(state = %resolution.state, "resolved now playing");

    let cover = match resolution.record.as_ref().and_then(|r| r.thumbnail.as_deref()) {
        Some(url) => state.covers.cover(url).await,
        None => None,
    };

    let svg = render::now_playing_svg(resolution.record.as_ref(), cover.as_ref(), &opts);
    svg_response(svg, Some(resolution.state), params.refresh())
}

const INDEX_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Now Playing</title>
<style>
body { font-family: -apple-system, Segoe UI, Helvetica, Arial, sans-serif; margin: 2rem; color: #0b1220; }
figure { margin: 0 0 1.5rem 0; }
figcaption { font-size: 0.85rem; color: #586273; margin-bottom: 0.25rem; }
code { background: #f0f2f5; padding: 0.1rem 0.3rem; }
</style>
</head>
<body>
<h1>Now Playing</h1>
<p id="status">Checking Plex connection&hellip;</p>
<p>Embed <code>/api/now-playing?theme=NAME</code> as an image. Optional parameters:
<code>user</code>, <code>offset</code>, <code>width</code>, <code>height</code>, <code>refresh</code>.</p>
"#;

const INDEX_TAIL: &str = r#"<script>
fetch('/api/status').then(r => r.json()).then(s => {
  const el = document.getElementById('status');
  el.textContent = s.connected
    ? `Connected to ${s.server_name || 'Plex'} (${s.sessions_count} active, cache: ${s.cache_backend})`
    : `Not connected (cache: ${s.cache_backend})`;
}).catch(() => { document.getElementById('status').textContent = 'Status unavailable'; });
</script>
</body>
</html>
"#;

/// Landing page with a live preview of every theme.
pub async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    let (width, height) = (state.config.server.image_width, state.config.server.image_height);
    let mut page = String::from(INDEX_HEAD);
    for theme in Theme::ALL {
        let name = theme.name();
        page.push_str(&format!(
            "<figure><figcaption>{name}</figcaption>\
             <img src=\"/api/now-playing?theme={name}\" width=\"{width}\" height=\"{height}\" alt=\"{name}\"></figure>\n"
        ));
    }
    page.push_str(INDEX_TAIL);
    Html(page)
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusParams {
    pub token: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct SessionSummary {
    pub title: String,
    #[serde(rename = "type")]
    pub media_type: String,
    pub state: String,
    pub user: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct StatusReport {
    pub connected: bool,
    pub server_name: Option<String>,
    pub version: Option<String>,
    pub sessions_count: usize,
    pub owner: Option<String>,
    pub current_session: Option<SessionSummary>,
    pub cache_backend: String,
}

pub async fn status(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StatusParams>,
) -> Json<StatusReport> {
    let mut report = StatusReport {
        cache_backend: state.resolver.cache().backend_name().to_string(),
        ..Default::default()
    };

    let client = match state.credential(params.token.as_deref()) {
        Some(credential) => state.connect(credential).await,
        None => None,
    };
    let Some(client) = client else {
        return Json(report);
    };

    let endpoint = client.endpoint();
    report.connected = true;
    report.server_name = endpoint.name.clone();
    report.version = endpoint.version.clone();
    report.owner = endpoint.owner.clone();
    report.sessions_count = client.session_count().await;
    report.current_session = client.current_session(None).await.map(|r| SessionSummary {
        title: r.title,
        media_type: r.media_type,
        state: r.playback_state,
        user: r.user,
    });

    Json(report)
}

#[derive(Debug, Default, Deserialize)]
pub struct ClearParams {
    pub token: Option<String>,
    pub user: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClearReport {
    pub success: bool,
    pub key: String,
}

pub async fn clear_cache(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ClearParams>,
) -> Json<ClearReport> {
    let key = match params.user.as_deref().filter(|u| !u.is_empty()) {
        Some(user) => history_key(Some(user)),
        // Default key is the owner's, which takes a discovery round trip.
        None => {
            let client = match state.credential(params.token.as_deref()) {
                Some(credential) => state.connect(credential).await,
                None => None,
            };
            match client {
                Some(client) => Resolver::cache_key(&client, None),
                None => history_key(None),
            }
        }
    };

    state.resolver.cache().invalidate(&key).await;
    Json(ClearReport { success: true, key })
}
