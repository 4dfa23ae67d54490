//! Write-through HTTP session store.
//!
//! Layers a TTL read cache over the gateway's session table so an
//! authenticated request does not cost a database round trip. Writes go
//! through an atomic upsert before the cache changes; `touch` refreshes
//! only the in-memory expiry, letting the durable expiry lag until the
//! next `set`. A periodic sweep bounds growth from abandoned sessions
//! independent of request traffic.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use metrics::{counter, gauge};
use serde_json::Value as JsonValue;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::application::repos::{RepoError, SessionStoreRepo};
use crate::domain::entities::StoredSession;

use super::entry::TimeBoxed;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::session_store";

pub struct SessionStore {
    repo: Arc<dyn SessionStoreRepo>,
    ttl: Duration,
    cache: RwLock<HashMap<String, TimeBoxed<StoredSession>>>,
}

impl SessionStore {
    pub fn new(repo: Arc<dyn SessionStoreRepo>, ttl: Duration) -> Self {
        Self {
            repo,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Idempotent bootstrap of the backing table.
    pub async fn bootstrap(&self) -> Result<(), RepoError> {
        self.repo.ensure_schema().await
    }

    pub async fn get(&self, sid: &str) -> Result<Option<StoredSession>, RepoError> {
        let now = OffsetDateTime::now_utc();
        let cached = rw_read(&self.cache, SOURCE, "get").get(sid).cloned();
        if let Some(entry) = cached {
            if entry.is_fresh() && entry.value().expires_at > now {
                return Ok(Some(entry.value().clone()));
            }
            rw_write(&self.cache, SOURCE, "get.expired").remove(sid);
        }

        let Some(session) = self.repo.load_session(sid).await? else {
            return Ok(None);
        };
        if session.expires_at <= now {
            return Ok(None);
        }
        rw_write(&self.cache, SOURCE, "get.fill")
            .insert(sid.to_string(), TimeBoxed::new(session.clone(), self.ttl));
        Ok(Some(session))
    }

    /// Persist via atomic upsert, then cache. Two concurrent sets for a
    /// new sid both succeed; last write wins.
    pub async fn set(
        &self,
        sid: &str,
        payload: JsonValue,
        expires_at: OffsetDateTime,
    ) -> Result<(), RepoError> {
        self.repo.upsert_session(sid, &payload, expires_at).await?;
        let session = StoredSession {
            sid: sid.to_string(),
            payload,
            expires_at,
        };
        rw_write(&self.cache, SOURCE, "set")
            .insert(sid.to_string(), TimeBoxed::new(session, self.ttl));
        Ok(())
    }

    pub async fn destroy(&self, sid: &str) -> Result<(), RepoError> {
        self.repo.purge_session(sid).await?;
        rw_write(&self.cache, SOURCE, "destroy").remove(sid);
        Ok(())
    }

    /// Refresh liveness cheaply: only the resident expiry moves. The
    /// durable expiry catches up on the next `set`.
    pub fn touch(&self, sid: &str, expires_at: OffsetDateTime) {
        let mut cache = rw_write(&self.cache, SOURCE, "touch");
        if let Some(entry) = cache.get_mut(sid) {
            let mut session = entry.value().clone();
            session.expires_at = expires_at;
            *entry = TimeBoxed::new(session, self.ttl);
        }
    }

    pub async fn len(&self) -> Result<u64, RepoError> {
        self.repo.count_sessions().await
    }

    pub async fn clear(&self) -> Result<(), RepoError> {
        self.repo.clear_sessions().await?;
        rw_write(&self.cache, SOURCE, "clear").clear();
        Ok(())
    }

    /// Remove cache entries past their freshness window or their recorded
    /// expiry. Returns the number removed.
    pub fn sweep(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        let mut cache = rw_write(&self.cache, SOURCE, "sweep");
        let before = cache.len();
        cache.retain(|_, entry| entry.is_fresh() && entry.value().expires_at > now);
        let removed = before - cache.len();
        if removed > 0 {
            counter!("songstudio_session_sweep_removed_total").increment(removed as u64);
        }
        gauge!("songstudio_session_cache_len").set(cache.len() as f64);
        removed
    }

    /// Spawn the periodic sweep task. The handle is aborted on shutdown.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // Skip the first immediate tick
            loop {
                ticker.tick().await;
                let removed = store.sweep();
                if removed > 0 {
                    debug!(removed, "session sweep removed expired entries");
                } else {
                    tracing::trace!("session sweep found nothing to remove");
                }
            }
        })
    }

    /// Number of entries currently resident, fresh or not.
    pub fn resident_len(&self) -> usize {
        rw_read(&self.cache, SOURCE, "resident_len").len()
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        if self.resident_len() > 0 {
            warn!(
                resident = self.resident_len(),
                "session store dropped with resident entries; durable rows are authoritative"
            );
        }
    }
}
