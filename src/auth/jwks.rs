//! Signing key discovery.
//!
//! Keys are fetched from the tenant's published key set, cached by key id, and
//! re-fetched on a cache miss. Discovery calls are bounded to five per minute;
//! a miss while the window is exhausted is rejected without going upstream.

use crate::auth::AuthError;
use jsonwebtoken::DecodingKey;
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

/// Discovery requests allowed per window.
const DISCOVERY_LIMIT: usize = 5;
/// Length of the discovery rate-limit window.
const DISCOVERY_WINDOW: Duration = Duration::from_secs(60);

/// A single key from the published key set
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type (e.g., "RSA")
    pub kty: String,
    /// Key ID
    #[serde(default)]
    pub kid: Option<String>,
    /// Algorithm (e.g., "RS256")
    #[serde(default)]
    pub alg: Option<String>,
    /// Key use (e.g., "sig")
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
    /// Modulus (Base64URL encoded)
    pub n: String,
    /// Exponent (Base64URL encoded)
    pub e: String,
}

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

/// Cached view of the tenant's signing keys. Cheap to clone; clones share
/// the cache and the rate-limit window.
#[derive(Clone)]
pub struct KeyStore {
    inner: Arc<KeyStoreInner>,
}

struct KeyStoreInner {
    http: Client,
    jwks_url: String,
    /// Key id to key, replaced wholesale on every discovery fetch.
    keys: RwLock<HashMap<String, Jwk>>,
    /// Instants of recent discovery fetches, oldest first.
    fetches: Mutex<VecDeque<Instant>>,
}

impl KeyStore {
    pub fn new(http: Client, jwks_url: String) -> Self {
        Self {
            inner: Arc::new(KeyStoreInner {
                http,
                jwks_url,
                keys: RwLock::new(HashMap::new()),
                fetches: Mutex::new(VecDeque::new()),
            }),
        }
    }

    /// Resolve the decoding key for a key id, fetching the key set when the
    /// id is not cached.
    pub async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        if let Some(key) = self.cached_key(kid).await? {
            return Ok(key);
        }
        self.refresh_for(kid).await?;
        match self.cached_key(kid).await? {
            Some(key) => Ok(key),
            None => Err(AuthError::UnknownSigningKey),
        }
    }

    async fn cached_key(&self, kid: &str) -> Result<Option<DecodingKey>, AuthError> {
        match self.inner.keys.read().await.get(kid) {
            Some(jwk) => DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
                .map(Some)
                .map_err(|e| AuthError::KeyDiscovery(format!("unusable signing key: {e}"))),
            None => Ok(None),
        }
    }

    /// Fetch the key set because `kid` was not cached.
    ///
    /// The fetch lock is held for the duration so concurrent misses collapse
    /// into one request. Every upstream attempt counts against the
    /// five-per-minute window whether or not it succeeds.
    async fn refresh_for(&self, kid: &str) -> Result<(), AuthError> {
        let mut fetches = self.inner.fetches.lock().await;

        // A concurrent miss may have refreshed the set while we waited.
        if self.inner.keys.read().await.contains_key(kid) {
            return Ok(());
        }

        let now = Instant::now();
        while fetches
            .front()
            .is_some_and(|t| now.duration_since(*t) >= DISCOVERY_WINDOW)
        {
            fetches.pop_front();
        }
        if fetches.len() >= DISCOVERY_LIMIT {
            warn!(
                "Signing key discovery rate limit reached, not fetching {}",
                self.inner.jwks_url
            );
            return Err(AuthError::KeyDiscovery("rate limit reached".to_string()));
        }
        fetches.push_back(now);

        debug!("Fetching signing keys from {}", self.inner.jwks_url);
        let response = self
            .inner
            .http
            .get(&self.inner.jwks_url)
            .send()
            .await
            .map_err(|e| AuthError::KeyDiscovery(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::KeyDiscovery(format!(
                "key set endpoint returned {status}"
            )));
        }

        let set: JwkSet = response
            .json()
            .await
            .map_err(|e| AuthError::KeyDiscovery(e.to_string()))?;

        let keys: HashMap<String, Jwk> = set
            .keys
            .into_iter()
            .filter(|k| k.kty == "RSA")
            .filter(|k| k.key_use.as_deref().map_or(true, |u| u == "sig"))
            .filter(|k| k.alg.as_deref().map_or(true, |a| a == "RS256"))
            .filter_map(|k| k.kid.clone().map(|kid| (kid, k)))
            .collect();
        debug!("Cached {} signing key(s)", keys.len());
        *self.inner.keys.write().await = keys;
        Ok(())
    }
}
