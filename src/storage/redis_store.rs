//! Shared Redis tier.
//!
//! ```text
//! {prefix}history:{user}   → JSON [PlaybackRecord], expires via SETEX
//! ```
//!
//! Every command is bounded by a short timeout so a slow or dead Redis
//! degrades to a miss instead of stalling the request.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::HistoryStore;
use crate::error::{Error, Result};
use crate::plex::PlaybackRecord;

pub struct RedisStore {
    conn: ConnectionManager,
    /// Namespace prepended to every key, e.g. `nowplaying:`.
    prefix: String,
    timeout: Duration,
}

impl RedisStore {
    pub async fn connect(url: &str, prefix: &str, timeout: Duration) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = bounded(timeout, client.get_connection_manager()).await?;

        // Verify connectivity
        let mut ping = conn.clone();
        let pong: String = bounded(timeout, redis::cmd("PING").query_async(&mut ping)).await?;
        if pong != "PONG" {
            return Err(Error::Cache(format!("unexpected ping response: {pong}")));
        }

        Ok(Self {
            conn,
            prefix: prefix.to_string(),
            timeout,
        })
    }

    fn key(&self, key: &str) -> String {
        store_key(&self.prefix, key)
    }
}

/// Namespaced Redis key.
fn store_key(prefix: &str, key: &str) -> String {
    format!("{prefix}{key}")
}

/// SETEX rejects 0; sub-second TTLs round up.
fn setex_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

fn encode(items: &[PlaybackRecord]) -> Result<String> {
    Ok(serde_json::to_string(items)?)
}

fn decode(json: &str) -> Result<Vec<PlaybackRecord>> {
    Ok(serde_json::from_str(json)?)
}

async fn bounded<T, F>(timeout: Duration, op: F) -> Result<T>
where
    F: Future<Output = redis::RedisResult<T>>,
{
    tokio::time::timeout(timeout, op)
        .await
        .map_err(|_| Error::Cache(format!("redis did not answer within {timeout:?}")))?
        .map_err(Error::from)
}

#[async_trait]
impl HistoryStore for RedisStore {
    fn backend_name(&self) -> &str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<PlaybackRecord>>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = bounded(self.timeout, conn.get(self.key(key))).await?;
        match value {
            Some(json) => decode(&json).map(Some),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, items: &[PlaybackRecord], ttl: Duration) -> Result<()> {
        let json = encode(items)?;
        let mut conn = self.conn.clone();
        bounded(self.timeout, conn.set_ex::<_, _, ()>(self.key(key), json, setex_seconds(ttl))).await
    }

    async fn invalidate(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        bounded(self.timeout, conn.del::<_, ()>(self.key(key))).await
    }
}
