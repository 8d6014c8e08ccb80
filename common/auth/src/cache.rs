//! Cached signing keys with single-flight refresh.
//!
//! Readers share the current [`SigningKeySet`] through an `RwLock`. Refreshes
//! are serialized by `fetch_lock`; a caller that waited on the lock while
//! another caller's fetch completed reuses that outcome instead of issuing a
//! second request.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::DecodingKey;
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult};
use crate::jwks::JwksFetcher;

/// While a stale set exists, failed fetches are not retried more often than this.
const FAILURE_BACKOFF: Duration = Duration::from_secs(5);

/// Public keys published by the identity provider, keyed by `kid`.
pub struct SigningKeySet {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Instant,
    generation: u64,
}

impl SigningKeySet {
    pub fn get(&self, kid: &str) -> Option<&DecodingKey> {
        self.keys.get(kid)
    }

    pub fn contains(&self, kid: &str) -> bool {
        self.keys.contains_key(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn kids(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    /// Increases by one with every successful fetch.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

#[derive(Default)]
struct CacheState {
    keys: Option<Arc<SigningKeySet>>,
    last_attempt_at: Option<Instant>,
    last_failure: Option<(Instant, AuthError)>,
}

pub struct KeyCache {
    fetcher: JwksFetcher,
    ttl: Duration,
    fetch_timeout: Duration,
    state: RwLock<CacheState>,
    fetch_lock: Mutex<()>,
    fetch_attempts: AtomicU64,
}

impl KeyCache {
    pub fn new(fetcher: JwksFetcher, ttl: Duration, fetch_timeout: Duration) -> Self {
        Self {
            fetcher,
            ttl,
            fetch_timeout,
            state: RwLock::new(CacheState::default()),
            fetch_lock: Mutex::new(()),
            fetch_attempts: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &JwtConfig) -> Self {
        Self::new(
            JwksFetcher::new(config.jwks_url()),
            config.key_ttl,
            config.fetch_timeout,
        )
    }

    pub fn jwks_url(&self) -> &str {
        self.fetcher.url()
    }

    /// Number of network fetches issued so far.
    pub fn fetch_attempts(&self) -> u64 {
        self.fetch_attempts.load(Ordering::Relaxed)
    }

    /// Current key set. Fetches when the cache is empty or older than the
    /// freshness window; on fetch failure the previous set is served and the
    /// error only surfaces when nothing was ever fetched.
    pub async fn get_keys(&self) -> AuthResult<Arc<SigningKeySet>> {
        let requested_at = Instant::now();
        if let Some(keys) = self.fresh_keys().await {
            return Ok(keys);
        }

        let _guard = self.fetch_lock.lock().await;
        {
            let state = self.state.read().await;
            if let Some(keys) = state.keys.as_ref() {
                if keys.is_fresh(self.ttl) {
                    return Ok(keys.clone());
                }
            }
            if let Some(outcome) = coalesced_outcome(&state, requested_at) {
                return outcome;
            }
            if let Some(keys) = backing_off(&state) {
                return Ok(keys);
            }
        }
        self.fetch_or_stale().await
    }

    /// Forced refresh after a key lookup miss. Concurrent callers share one
    /// fetch: if an attempt finished while this caller waited, its outcome is
    /// returned without another request. During the failure back-off the stale
    /// set is returned as is.
    pub async fn refresh(&self) -> AuthResult<Arc<SigningKeySet>> {
        let requested_at = Instant::now();
        let _guard = self.fetch_lock.lock().await;
        {
            let state = self.state.read().await;
            if let Some(outcome) = coalesced_outcome(&state, requested_at) {
                return outcome;
            }
            if let Some(keys) = backing_off(&state) {
                return Ok(keys);
            }
        }
        self.fetch_or_stale().await
    }

    async fn fresh_keys(&self) -> Option<Arc<SigningKeySet>> {
        let state = self.state.read().await;
        state
            .keys
            .as_ref()
            .filter(|keys| keys.is_fresh(self.ttl))
            .cloned()
    }

    /// Caller must hold `fetch_lock`.
    async fn fetch_or_stale(&self) -> AuthResult<Arc<SigningKeySet>> {
        self.fetch_attempts.fetch_add(1, Ordering::Relaxed);
        let result = match timeout(self.fetch_timeout, self.fetcher.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(AuthError::KeyFetchTimeout(self.fetch_timeout.as_secs())),
        };
        // A document without a single usable key must not evict the last good set.
        let result = result.and_then(|entries| {
            if entries.is_empty() {
                Err(AuthError::KeyProviderUnavailable(
                    "no usable signing keys in key document".into(),
                ))
            } else {
                Ok(entries)
            }
        });

        let mut state = self.state.write().await;
        let now = Instant::now();
        state.last_attempt_at = Some(now);
        match result {
            Ok(entries) => {
                let generation = state.keys.as_ref().map_or(1, |keys| keys.generation + 1);
                let keys = Arc::new(SigningKeySet {
                    keys: entries.into_iter().collect(),
                    fetched_at: now,
                    generation,
                });
                info!(
                    key_count = keys.len(),
                    generation,
                    jwks_url = %self.fetcher.url(),
                    "signing key cache refreshed"
                );
                state.keys = Some(keys.clone());
                state.last_failure = None;
                Ok(keys)
            }
            Err(err) => {
                state.last_failure = Some((now, err.clone()));
                match state.keys.as_ref() {
                    Some(stale) => {
                        warn!(
                            error = %err,
                            age_secs = stale.fetched_at.elapsed().as_secs(),
                            jwks_url = %self.fetcher.url(),
                            "key fetch failed; serving stale signing keys"
                        );
                        Ok(stale.clone())
                    }
                    None => {
                        warn!(error = %err, jwks_url = %self.fetcher.url(), "key fetch failed with no cached keys");
                        Err(err)
                    }
                }
            }
        }
    }
}

/// Stale set to serve while a recent failure is inside the back-off window.
fn backing_off(state: &CacheState) -> Option<Arc<SigningKeySet>> {
    match (&state.keys, &state.last_failure) {
        (Some(keys), Some((failed_at, _))) if failed_at.elapsed() < FAILURE_BACKOFF => {
            Some(keys.clone())
        }
        _ => None,
    }
}

/// Outcome of a fetch that completed after `requested_at`, if any.
fn coalesced_outcome(
    state: &CacheState,
    requested_at: Instant,
) -> Option<AuthResult<Arc<SigningKeySet>>> {
    let attempted_at = state.last_attempt_at?;
    if attempted_at <= requested_at {
        return None;
    }
    match (&state.keys, &state.last_failure) {
        (Some(keys), _) => Some(Ok(keys.clone())),
        (None, Some((_, err))) => Some(Err(err.clone())),
        (None, None) => None,
    }
}
