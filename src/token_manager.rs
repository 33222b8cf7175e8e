//! Lifecycle of the machine-to-machine credential for the upstream management API.
//!
//! The manager holds at most one live credential. A successful fetch schedules
//! a refresh ten minutes before the token expires; a failed fetch clears the
//! credential and schedules nothing, leaving recovery to the next caller that
//! observes the empty slot. Fetches are single-flight: concurrent triggers
//! collapse into one request to the token endpoint.

use crate::config::auth0::Auth0Config;
use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

/// Seconds before expiry at which the credential is refreshed.
const REFRESH_MARGIN_SECS: u64 = 600;

/// Errors that can occur while fetching the management API credential
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Token endpoint returned {0}")]
    UpstreamStatus(reqwest::StatusCode),
    #[error("Malformed token response: {0}")]
    MalformedResponse(String),
}

/// Successful response of the OAuth token endpoint
#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    expires_in: u64,
}

/// The machine-to-machine credential for the management API
#[derive(Debug, Clone)]
pub struct Credential {
    pub token: String,
    /// Unix seconds at which the token expires
    pub expires_at: u64,
}

/// Owns the credential lifecycle. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<Inner>,
}

struct Inner {
    http: Client,
    config: Auth0Config,
    credential: RwLock<Option<Credential>>,
    /// Single-flight gate: at most one fetch is in flight at any time.
    fetch_gate: Mutex<()>,
    /// Handle of the scheduled refresh task, if one is live.
    refresh_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl TokenManager {
    /// Create a new token manager. No fetch happens until [`ensure_token`]
    /// (or a scheduled refresh) runs.
    ///
    /// [`ensure_token`]: TokenManager::ensure_token
    pub fn new(http: Client, config: Auth0Config) -> Self {
        Self {
            inner: Arc::new(Inner {
                http,
                config,
                credential: RwLock::new(None),
                fetch_gate: Mutex::new(()),
                refresh_task: std::sync::Mutex::new(None),
            }),
        }
    }

    /// Current access token, if a credential is held.
    pub async fn access_token(&self) -> Option<String> {
        self.inner
            .credential
            .read()
            .await
            .as_ref()
            .map(|c| c.token.clone())
    }

    /// Current credential, if one is held.
    pub async fn credential(&self) -> Option<Credential> {
        self.inner.credential.read().await.clone()
    }

    /// Fetch a credential if none is held.
    ///
    /// A no-op while a credential is present. Concurrent callers that all
    /// observe an empty slot share one fetch; the losers of the race return
    /// once the winner's fetch has settled.
    pub async fn ensure_token(&self) {
        if self.inner.credential.read().await.is_some() {
            return;
        }
        let _gate = self.inner.fetch_gate.lock().await;
        // A competing caller may have filled the slot while we waited.
        if self.inner.credential.read().await.is_some() {
            return;
        }
        if let Err(e) = self.fetch_token().await {
            warn!("Credential fetch failed: {}", e);
        }
    }

    /// Unconditional refresh, driven by the scheduled timer.
    async fn refresh_now(&self) {
        let _gate = self.inner.fetch_gate.lock().await;
        if let Err(e) = self.fetch_token().await {
            warn!("Scheduled credential refresh failed: {}", e);
        }
    }

    /// One call to the token endpoint. Callers must hold the fetch gate.
    ///
    /// On success the credential is overwritten and the next refresh is
    /// scheduled `expires_in - 600` seconds out, clamped to zero so that
    /// short-lived tokens refresh immediately instead of never. On failure the
    /// credential is cleared and nothing is scheduled; there is no backoff and
    /// no retry budget.
    async fn fetch_token(&self) -> Result<(), TokenError> {
        debug!(
            "Fetching management API credential from {}",
            self.inner.config.token_url()
        );

        match self.request_token().await {
            Ok(response) => {
                let credential = Credential {
                    token: response.access_token,
                    expires_at: unix_now() + response.expires_in,
                };
                let expires_at = credential.expires_at;
                *self.inner.credential.write().await = Some(credential);

                let delay = refresh_delay(response.expires_in);
                self.schedule_refresh(delay);
                info!(
                    "Obtained management API credential, valid until {} (refresh in {}s)",
                    expires_at,
                    delay.as_secs()
                );
                Ok(())
            }
            Err(e) => {
                *self.inner.credential.write().await = None;
                self.cancel_refresh();
                Err(e)
            }
        }
    }

    async fn request_token(&self) -> Result<TokenEndpointResponse, TokenError> {
        let config = &self.inner.config;
        let body = serde_json::json!({
            "client_id": config.client_id,
            "client_secret": config.client_secret,
            "audience": config.audience,
            "grant_type": config.grant_type,
        });

        let response = self
            .inner
            .http
            .post(config.token_url())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TokenError::UpstreamStatus(status));
        }

        response
            .json::<TokenEndpointResponse>()
            .await
            .map_err(|e| TokenError::MalformedResponse(e.to_string()))
    }

    /// Replace the scheduled refresh so exactly one timer is live.
    fn schedule_refresh(&self, delay: Duration) {
        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let manager = TokenManager { inner };
            // Detach our own handle first so the refresh can slot a new timer
            // without aborting the task it runs on.
            manager.take_refresh_task();
            manager.refresh_now().await;
        });

        let mut slot = self
            .inner
            .refresh_task
            .lock()
            .expect("refresh task lock poisoned");
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }

    fn cancel_refresh(&self) {
        if let Some(previous) = self.take_refresh_task() {
            previous.abort();
        }
    }

    fn take_refresh_task(&self) -> Option<JoinHandle<()>> {
        self.inner
            .refresh_task
            .lock()
            .expect("refresh task lock poisoned")
            .take()
    }

    /// Whether a refresh is currently scheduled.
    #[cfg(test)]
    pub fn refresh_scheduled(&self) -> bool {
        self.inner
            .refresh_task
            .lock()
            .expect("refresh task lock poisoned")
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

/// Delay until the next refresh: ten minutes before expiry, immediate for
/// tokens that live 600 seconds or less.
fn refresh_delay(expires_in: u64) -> Duration {
    Duration::from_secs(expires_in.saturating_sub(REFRESH_MARGIN_SECS))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
