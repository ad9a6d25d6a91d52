//! Decides what the card shows for one request.
//!
//! The chain runs once per call and stops at the first source that yields
//! something: live session, cached history, fetched history, nothing.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::plex::{PlaybackRecord, PlaybackSource};
use crate::selection::{self, OffsetSpec};
use crate::storage::{history_key, HistoryCache};

/// Terminal state of a resolve call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveState {
    LiveSessionFound,
    HistoryCacheHit,
    HistoryFetched,
    NoData,
}

impl ResolveState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolveState::LiveSessionFound => "live-session",
            ResolveState::HistoryCacheHit => "history-cache-hit",
            ResolveState::HistoryFetched => "history-fetched",
            ResolveState::NoData => "no-data",
        }
    }
}

impl fmt::Display for ResolveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub state: ResolveState,
    pub record: Option<PlaybackRecord>,
}

impl Resolution {
    fn found(state: ResolveState, record: PlaybackRecord) -> Self {
        Self {
            state,
            record: Some(record),
        }
    }

    fn no_data() -> Self {
        Self {
            state: ResolveState::NoData,
            record: None,
        }
    }
}

pub struct Resolver {
    cache: Arc<HistoryCache>,
    limit: usize,
    ttl: Duration,
}

impl Resolver {
    pub fn new(cache: Arc<HistoryCache>, limit: usize, ttl: Duration) -> Self {
        Self { cache, limit, ttl }
    }

    pub fn cache(&self) -> &HistoryCache {
        &self.cache
    }

    /// Cache key for `user`, falling back to the source's owning account.
    pub fn cache_key(source: &dyn PlaybackSource, user: Option<&str>) -> String {
        history_key(user.filter(|u| !u.is_empty()).or(source.owner()))
    }

    pub async fn resolve(
        &self,
        source: &dyn PlaybackSource,
        user: Option<&str>,
        offset: &OffsetSpec,
    ) -> Resolution {
        if let Some(record) = source.current_session(user).await {
            tracing::debug!(title = %record.title, "live session found");
            return Resolution::found(ResolveState::LiveSessionFound, record);
        }

        let key = Self::cache_key(source, user);

        if let Some(items) = self.cache.get(&key).await {
            return match selection::select(&items, offset) {
                Some(record) => Resolution::found(ResolveState::HistoryCacheHit, record.clone()),
                None => Resolution::no_data(),
            };
        }

        let items = source.recent_history(user, self.limit).await;
        if items.is_empty() {
            tracing::debug!(key = %key, "no session and no history");
            return Resolution::no_data();
        }

        self.cache.put(&key, &items, self.ttl).await;
        tracing::debug!(key = %key, count = items.len(), "history fetched");
        match selection::select(&items, offset) {
            Some(record) => Resolution::found(ResolveState::HistoryFetched, record.clone()),
            None => Resolution::no_data(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn record(title: &str) -> PlaybackRecord {
        PlaybackRecord {
            title: title.to_string(),
            artist: Some("Artist".to_string()),
            album: Some("Album".to_string()),
            thumbnail: None,
            media_type: "track".to_string(),
            playback_state: "stopped".to_string(),
            user: Some("owner".to_string()),
        }
    }

    /// Playback source double with canned answers and call counters.
    #[derive(Default)]
    struct FakeSource {
        owner: Option<String>,
        session: Option<PlaybackRecord>,
        history: Vec<PlaybackRecord>,
        session_calls: AtomicUsize,
        history_calls: AtomicUsize,
    }

    #[async_trait]
    impl PlaybackSource for FakeSource {
        fn owner(&self) -> Option<&str> {
            self.owner.as_deref()
        }

        async fn current_session(&self, _user: Option<&str>) -> Option<PlaybackRecord> {
            self.session_calls.fetch_add(1, Ordering::SeqCst);
            self.session.clone()
        }

        async fn recent_history(&self, _user: Option<&str>, limit: usize) -> Vec<PlaybackRecord> {
            self.history_calls.fetch_add(1, Ordering::SeqCst);
            self.history.iter().take(limit).cloned().collect()
        }
    }

    fn resolver() -> Resolver {
        Resolver::new(Arc::new(HistoryCache::local_only()), 25, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_live_session_wins_without_touching_history() {
        let resolver = resolver();
        let cached = vec![record("cached")];
        resolver.cache().put("history:owner", &cached, Duration::from_secs(60)).await;

        let mut live = record("live");
        live.playback_state = "playing".to_string();
        let source = FakeSource {
            owner: Some("owner".to_string()),
            session: Some(live.clone()),
            history: vec![record("old")],
            ..Default::default()
        };

        let resolution = resolver.resolve(&source, None, &OffsetSpec::Absent).await;

        assert_eq!(resolution.state, ResolveState::LiveSessionFound);
        assert_eq!(resolution.record, Some(live));
        assert_eq!(source.session_calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.history_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_history_fetch() {
        let resolver = resolver();
        let cached = vec![record("a"), record("b"), record("c")];
        resolver.cache().put("history:alice", &cached, Duration::from_secs(60)).await;

        let source = FakeSource {
            owner: Some("owner".to_string()),
            history: vec![record("fresh")],
            ..Default::default()
        };

        let resolution = resolver
            .resolve(&source, Some("alice"), &OffsetSpec::Index(4))
            .await;

        assert_eq!(resolution.state, ResolveState::HistoryCacheHit);
        assert_eq!(resolution.record, Some(record("b")));
        assert_eq!(source.history_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fetched_history_is_cached_under_owner_key() {
        let resolver = resolver();
        let history = vec![record("a"), record("b")];
        let source = FakeSource {
            owner: Some("owner".to_string()),
            history: history.clone(),
            ..Default::default()
        };

        let first = resolver.resolve(&source, None, &OffsetSpec::Index(0)).await;
        assert_eq!(first.state, ResolveState::HistoryFetched);
        assert_eq!(first.record, Some(record("a")));
        assert_eq!(resolver.cache().get("history:owner").await, Some(history));

        let second = resolver.resolve(&source, None, &OffsetSpec::Index(1)).await;
        assert_eq!(second.state, ResolveState::HistoryCacheHit);
        assert_eq!(second.record, Some(record("b")));
        assert_eq!(source.history_calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.session_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_data_when_everything_is_empty() {
        let resolver = resolver();
        let source = FakeSource::default();

        let resolution = resolver.resolve(&source, Some("bob"), &OffsetSpec::Random).await;

        assert_eq!(resolution, Resolution::no_data());
        assert_eq!(source.history_calls.load(Ordering::SeqCst), 1);
        assert!(resolver.cache().get("history:bob").await.is_none());
    }

    #[tokio::test]
    async fn test_random_offset_picks_from_history() {
        let resolver = resolver();
        let history: Vec<_> = ["a", "b", "c", "d", "e"].into_iter().map(record).collect();
        let source = FakeSource {
            history: history.clone(),
            ..Default::default()
        };

        let resolution = resolver.resolve(&source, None, &OffsetSpec::Random).await;
        assert_eq!(resolution.state, ResolveState::HistoryFetched);
        assert!(history.contains(&resolution.record.unwrap()));
    }

    #[test]
    fn test_cache_key_fallbacks() {
        let source = FakeSource {
            owner: Some("owner".to_string()),
            ..Default::default()
        };
        assert_eq!(Resolver::cache_key(&source, Some("alice")), "history:alice");
        assert_eq!(Resolver::cache_key(&source, Some("")), "history:owner");
        assert_eq!(Resolver::cache_key(&source, None), "history:owner");
        assert_eq!(Resolver::cache_key(&FakeSource::default(), None), "history:unknown");
    }

    #[test]
    fn test_state_names() {
        assert_eq!(ResolveState::HistoryCacheHit.to_string(), "history-cache-hit");
        assert_eq!(ResolveState::NoData.as_str(), "no-data");
    }
}
