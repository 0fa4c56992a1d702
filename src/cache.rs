//! Per-endpoint public key cache, refreshed as a unit.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::error::{FetchError, VerifyError};
use crate::http::{get_json, Deadline};
use crate::keys::{convert, KeyEntry, KeySet, PublicKey};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(3600);

/// Where a key set comes from.
pub trait KeySource: Send + Sync {
    fn fetch(&self, deadline: Deadline) -> Result<KeySet, FetchError>;
    fn endpoint(&self) -> &str;
}

/// Published JWKS document over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpKeySource {
    agent: ureq::Agent,
    url: String,
}

impl HttpKeySource {
    pub fn new(url: &str) -> Self {
        Self::with_agent(ureq::AgentBuilder::new().build(), url)
    }

    pub fn with_agent(agent: ureq::Agent, url: &str) -> Self {
        Self { agent, url: url.to_string() }
    }
}

impl KeySource for HttpKeySource {
    fn fetch(&self, deadline: Deadline) -> Result<KeySet, FetchError> {
        get_json(&self.agent, &self.url, &[], deadline)
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

/// Fixed key set for offline use.
#[derive(Debug, Clone)]
pub struct StaticKeySource(pub KeySet);

impl KeySource for StaticKeySource {
    fn fetch(&self, _deadline: Deadline) -> Result<KeySet, FetchError> {
        Ok(self.0.clone())
    }

    fn endpoint(&self) -> &str {
        "static"
    }
}

/// A complete converted key set. Never mutated after construction; a
/// refresh replaces the whole value.
#[derive(Debug)]
pub struct KeyCacheState {
    keys: HashMap<String, Arc<PublicKey>>,
    expires_at: OffsetDateTime,
}

impl KeyCacheState {
    pub fn get(&self, kid: &str) -> Option<Arc<PublicKey>> {
        self.keys.get(kid).cloned()
    }

    pub fn expires_at(&self) -> OffsetDateTime {
        self.expires_at
    }

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key ids, sorted.
    pub fn key_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

pub struct KeyCache {
    name: &'static str,
    source: Arc<dyn KeySource>,
    ttl: Duration,
    state: RwLock<Option<Arc<KeyCacheState>>>,
    refresh_lock: Mutex<()>,
}

impl std::fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCache")
            .field("name", &self.name)
            .field("endpoint", &self.source.endpoint())
            .field("ttl", &self.ttl)
            .field("state", &*self.state.read())
            .finish()
    }
}

impl KeyCache {
    /// Empty cache; the first lookup fetches.
    pub fn new(name: &'static str, source: Arc<dyn KeySource>) -> Self {
        Self { name, source, ttl: DEFAULT_REFRESH_INTERVAL, state: RwLock::new(None), refresh_lock: Mutex::new(()) }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current state, expired or not.
    pub fn snapshot(&self) -> Option<Arc<KeyCacheState>> {
        self.state.read().clone()
    }

    /// Lock-protected lookup against unexpired state. No I/O.
    pub fn get(&self, kid: &str) -> Option<Arc<PublicKey>> {
        let state = self.state.read();
        match state.as_ref() {
            Some(s) if !s.is_expired(OffsetDateTime::now_utc()) => s.get(kid),
            _ => None,
        }
    }

    /// Converts `set` and swaps it in. Unreadable entries, entries of
    /// unsupported type and entries with bad material are dropped.
    pub fn install(&self, set: &KeySet) -> Arc<KeyCacheState> {
        let mut keys = HashMap::with_capacity(set.keys.len());
        for (index, entry) in set.keys.iter().enumerate() {
            let record = match entry {
                KeyEntry::Record(record) => record,
                KeyEntry::Unreadable(_) => {
                    warn!(cache = self.name, index, "discarding unreadable key entry");
                    continue;
                }
            };
            match convert(record) {
                Ok(Some(key)) => {
                    keys.insert(record.kid.clone(), Arc::new(key));
                }
                Ok(None) => debug!(cache = self.name, kid = %record.kid, kty = %record.kty, "skipping unsupported key type"),
                Err(err) => warn!(cache = self.name, kid = %record.kid, error = %err, "discarding key record"),
            }
        }
        let state = Arc::new(KeyCacheState { keys, expires_at: OffsetDateTime::now_utc() + self.ttl });
        *self.state.write() = Some(state.clone());
        state
    }

    /// Fetches the full set and swaps it in. On failure the existing state
    /// is left untouched.
    pub fn refresh(&self, deadline: Deadline) -> Result<Arc<KeyCacheState>, VerifyError> {
        let set = self.source.fetch(deadline).map_err(|e| {
            warn!(cache = self.name, endpoint = self.source.endpoint(), error = %e, "key refresh failed");
            VerifyError::KeyFetchFailed(e.to_string())
        })?;
        let state = self.install(&set);
        info!(cache = self.name, keys = state.len(), offered = set.keys.len(), "key set refreshed");
        Ok(state)
    }

    /// Cache lookup with a single refresh-and-retry on miss or expiry.
    pub fn lookup(&self, kid: &str, deadline: Deadline) -> Result<Arc<PublicKey>, VerifyError> {
        if let Some(key) = self.get(kid) {
            debug!(cache = self.name, kid, "key cache hit");
            return Ok(key);
        }

        let wait = deadline.remaining().unwrap_or(Duration::ZERO);
        let Some(_guard) = self.refresh_lock.try_lock_for(wait) else {
            return self.stale_or(kid, VerifyError::KeyFetchFailed("deadline exceeded waiting for refresh".into()));
        };
        // Another caller may have refreshed while we waited.
        if let Some(key) = self.get(kid) {
            return Ok(key);
        }

        match self.refresh(deadline) {
            Ok(state) => state.get(kid).ok_or_else(|| VerifyError::KeyNotFound(kid.to_string())),
            Err(err) => self.stale_or(kid, err),
        }
    }

    fn stale_or(&self, kid: &str, err: VerifyError) -> Result<Arc<PublicKey>, VerifyError> {
        match self.snapshot() {
            Some(state) => match state.get(kid) {
                Some(key) => {
                    warn!(cache = self.name, kid, "serving stale key after failed refresh");
                    Ok(key)
                }
                None => Err(VerifyError::KeyNotFound(kid.to_string())),
            },
            None => Err(err),
        }
    }
}
