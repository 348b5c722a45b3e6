// Session token manager
// Owns the token pair and coordinates the single-flight refresh exchange

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use reqwest::Client;
use tokio::sync::oneshot;

use super::claims;
use super::refresh;
use super::types::TokenPair;
use crate::error::{AuthError, Result};
use crate::events::{AuthEvent, AuthEventBus};
use crate::store::{
    CredentialStore, ACCESS_TOKEN_KEY, LEGACY_TOKEN_KEY, REFRESH_TOKEN_KEY,
};

/// In-flight refresh bookkeeping.
///
/// Checked and updated under the lock, before any await point, so at most
/// one exchange runs at a time. Waiters are settled in join order, each
/// exactly once, and the queue is always drained before the flag resets.
struct RefreshFlight {
    is_refreshing: bool,
    waiters: VecDeque<oneshot::Sender<Result<String>>>,
}

/// Session token manager
///
/// Guarantees that any caller needing an authenticated request can obtain a
/// currently-valid access token, performing at most one concurrent refresh
/// exchange and signalling permanent session loss when refresh is
/// impossible.
pub struct SessionTokenManager {
    /// Durable session storage; this manager is its sole writer for token
    /// keys.
    store: Arc<dyn CredentialStore>,

    /// Shared HTTP client for refresh requests.
    client: Client,

    /// Fully-qualified refresh endpoint URL.
    refresh_url: String,

    /// Lifecycle event bus (session-ended signal).
    events: AuthEventBus,

    /// Single-flight state for the refresh exchange.
    flight: Mutex<RefreshFlight>,
}

impl SessionTokenManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        client: Client,
        base_url: &str,
        events: AuthEventBus,
    ) -> Self {
        Self {
            store,
            client,
            refresh_url: format!(
                "{}/api/v1/auth/refresh-token",
                base_url.trim_end_matches('/')
            ),
            events,
            flight: Mutex::new(RefreshFlight {
                is_refreshing: false,
                waiters: VecDeque::new(),
            }),
        }
    }

    fn lock_flight(&self) -> MutexGuard<'_, RefreshFlight> {
        self.flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_key(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("credential store read failed for {}: {}", key, e);
                None
            }
        }
    }

    /// Raw stored access token, without validation.
    pub fn access_token(&self) -> Option<String> {
        self.read_key(ACCESS_TOKEN_KEY)
    }

    /// Raw stored refresh token.
    pub fn refresh_token(&self) -> Option<String> {
        self.read_key(REFRESH_TOKEN_KEY)
    }

    /// True iff a refresh token is present in the store.
    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token().is_some()
    }

    /// Current stored pair, when a session exists.
    pub fn tokens(&self) -> Option<TokenPair> {
        let access_token = self.access_token()?;
        Some(TokenPair {
            access_token,
            refresh_token: self.refresh_token(),
        })
    }

    /// Persist a new access token, and the refresh token when one was
    /// supplied (refresh responses omit an unchanged refresh token). Both
    /// keys land in a single atomic store write.
    pub fn set_tokens(&self, access_token: &str, refresh_token: Option<&str>) -> Result<()> {
        match refresh_token {
            Some(refresh_token) => self.store.set_many(&[
                (ACCESS_TOKEN_KEY, access_token),
                (REFRESH_TOKEN_KEY, refresh_token),
            ]),
            None => self.store.set(ACCESS_TOKEN_KEY, access_token),
        }
    }

    /// Remove access, refresh, and legacy token keys. Idempotent.
    pub fn clear_tokens(&self) -> Result<()> {
        self.store
            .remove_many(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, LEGACY_TOKEN_KEY])
    }

    /// Fail-closed expiry check on an arbitrary token string.
    pub fn is_token_expired(&self, token: &str) -> bool {
        claims::is_token_expired(token)
    }

    /// Get a currently-valid access token, refreshing if necessary.
    ///
    /// Returns the stored token without a network call when it is still
    /// valid, and fails fast (again without a network call) when the session
    /// cannot be recovered.
    pub async fn get_valid_token(&self) -> Result<String> {
        let access_token = self.access_token().ok_or(AuthError::NoAccessToken)?;

        if !claims::is_token_expired(&access_token) {
            return Ok(access_token);
        }

        if !self.has_refresh_token() {
            return Err(AuthError::SessionExpired);
        }

        self.refresh_access_token().await
    }

    /// Perform the refresh exchange, single-flight.
    ///
    /// If an exchange is already in flight the caller joins its waiter queue
    /// and receives that exchange's outcome; no second network call is made.
    /// On failure the stored tokens are cleared and the session-ended event
    /// is emitted once, before any waiter settles.
    pub async fn refresh_access_token(&self) -> Result<String> {
        let waiter = {
            let mut flight = self.lock_flight();
            if flight.is_refreshing {
                let (tx, rx) = oneshot::channel();
                flight.waiters.push_back(tx);
                Some(rx)
            } else {
                flight.is_refreshing = true;
                None
            }
        };

        if let Some(rx) = waiter {
            tracing::debug!("refresh already in flight, waiting for its outcome");
            return rx
                .await
                .map_err(|_| AuthError::RefreshFailed("in-flight refresh was dropped".to_string()))?;
        }

        let outcome = self.run_refresh_exchange().await;

        if let Err(e) = &outcome {
            tracing::error!("token refresh failed: {}", e);
            if let Err(clear_err) = self.clear_tokens() {
                tracing::warn!("failed to clear tokens after refresh failure: {}", clear_err);
            }
            self.events.emit(AuthEvent::RefreshFailed {
                reason: e.to_string(),
            });
        }

        // Settle every waiter in join order with the identical outcome, then
        // return to idle.
        let waiters = {
            let mut flight = self.lock_flight();
            flight.is_refreshing = false;
            std::mem::take(&mut flight.waiters)
        };
        for tx in waiters {
            let _ = tx.send(outcome.clone());
        }

        outcome
    }

    async fn run_refresh_exchange(&self) -> Result<String> {
        let refresh_token = self.refresh_token().ok_or(AuthError::SessionExpired)?;

        let payload = refresh::exchange(&self.client, &self.refresh_url, &refresh_token).await?;

        self.set_tokens(&payload.access_token, payload.refresh_token.as_deref())?;
        tracing::info!("access token refreshed");

        Ok(payload.access_token)
    }
}
