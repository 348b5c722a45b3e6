// Session state
// Answers "who is signed in", persists sign-ins, and reacts to external
// storage changes

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;

use super::user::{SigninData, UserProfile};
use crate::error::{AuthError, Result};
use crate::events::{AuthEvent, AuthEventBus};
use crate::store::{
    CredentialStore, ACCESS_TOKEN_KEY, LEGACY_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY,
};
use crate::token::{claims, SessionTokenManager};

/// Current authentication status.
#[derive(Debug, Clone)]
pub enum AuthStatus {
    SignedIn(UserProfile),
    SignedOut,
}

/// Session state derived from the credential store.
pub struct SessionState {
    store: Arc<dyn CredentialStore>,
    manager: Arc<SessionTokenManager>,
    events: AuthEventBus,
}

impl SessionState {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        manager: Arc<SessionTokenManager>,
        events: AuthEventBus,
    ) -> Self {
        Self {
            store,
            manager,
            events,
        }
    }

    /// Persist a successful sign-in: tokens (including the legacy key) and
    /// the profile in one atomic write, then notify listeners.
    pub fn save_signin(&self, data: &SigninData) -> Result<UserProfile> {
        let profile = UserProfile {
            username: data.username.clone(),
            email: data.email.clone(),
            role: data.role(),
            buyer_id: data.buyer_id.clone(),
            seller_id: data.seller_id.clone(),
        };

        let user_json = serde_json::to_string(&profile)
            .map_err(|e| AuthError::Store(format!("failed to serialize profile: {}", e)))?;

        let mut entries = vec![
            (ACCESS_TOKEN_KEY, data.access_token.as_str()),
            (LEGACY_TOKEN_KEY, data.access_token.as_str()),
            (USER_KEY, user_json.as_str()),
        ];
        if let Some(ref refresh_token) = data.refresh_token {
            entries.push((REFRESH_TOKEN_KEY, refresh_token.as_str()));
        }
        self.store.set_many(&entries)?;

        tracing::info!(username = %profile.username, role = ?profile.role, "sign-in persisted");
        self.events.emit(AuthEvent::StatusChanged);
        Ok(profile)
    }

    /// Stored profile, if any.
    pub fn current_user(&self) -> Option<UserProfile> {
        let raw = self.store.get(USER_KEY).ok().flatten()?;
        serde_json::from_str(&raw).ok()
    }

    /// True when a stored access token decodes and is not expired.
    pub fn is_authenticated(&self) -> bool {
        match self.store.get(ACCESS_TOKEN_KEY) {
            Ok(Some(token)) => !claims::is_token_expired(&token),
            _ => false,
        }
    }

    /// Derive the auth status, silently refreshing an expired session when a
    /// refresh token is still available so a sign-in survives a reload.
    /// Clears all auth data when that silent refresh fails.
    pub async fn check_auth_status(&self) -> AuthStatus {
        if self.is_authenticated() {
            return match self.current_user() {
                Some(user) => AuthStatus::SignedIn(user),
                None => AuthStatus::SignedOut,
            };
        }

        if self.manager.has_refresh_token() {
            match self.manager.refresh_access_token().await {
                Ok(_) => {
                    if let Some(user) = self.current_user() {
                        return AuthStatus::SignedIn(user);
                    }
                }
                Err(e) => {
                    tracing::warn!("silent refresh failed: {}", e);
                    if let Err(clear_err) = self.clear_auth_data() {
                        tracing::warn!("failed to clear auth data: {}", clear_err);
                    }
                }
            }
        }

        AuthStatus::SignedOut
    }

    /// Remove every session key. Idempotent.
    pub fn clear_auth_data(&self) -> Result<()> {
        self.store.remove_many(&[
            ACCESS_TOKEN_KEY,
            REFRESH_TOKEN_KEY,
            LEGACY_TOKEN_KEY,
            USER_KEY,
        ])?;
        self.events.emit(AuthEvent::StatusChanged);
        Ok(())
    }

    /// Sign out. Terminal for the session.
    pub fn logout(&self) -> Result<()> {
        self.clear_auth_data()
    }

    /// Consume storage-change notifications published by other browsing
    /// contexts and re-derive auth status when a session key changes. Runs
    /// until the event bus is dropped.
    pub async fn watch(&self) {
        let mut rx = self.events.subscribe();
        loop {
            match rx.recv().await {
                Ok(AuthEvent::StorageChanged { key })
                    if key == ACCESS_TOKEN_KEY || key == USER_KEY =>
                {
                    let status = self.check_auth_status().await;
                    tracing::debug!(
                        signed_in = matches!(status, AuthStatus::SignedIn(_)),
                        "auth status re-derived after external storage change"
                    );
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("storage watcher lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use chrono::Utc;
    use reqwest::Client;

    fn make_token(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{}}}"#, exp).as_bytes());
        format!("{}.{}.sig", header, payload)
    }

    fn build_session() -> (Arc<MemoryStore>, AuthEventBus, SessionState) {
        let store = Arc::new(MemoryStore::new());
        let events = AuthEventBus::new();
        let manager = Arc::new(SessionTokenManager::new(
            store.clone() as Arc<dyn CredentialStore>,
            Client::new(),
            "http://127.0.0.1:1",
            events.clone(),
        ));
        let session = SessionState::new(
            store.clone() as Arc<dyn CredentialStore>,
            manager,
            events.clone(),
        );
        (store, events, session)
    }

    fn signin_data(access_token: &str) -> SigninData {
        serde_json::from_value(serde_json::json!({
            "accessToken": access_token,
            "refreshToken": "r1",
            "username": "nguyen",
            "email": "nguyen@example.com",
            "buyerId": "b-12"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_save_signin_persists_tokens_profile_and_legacy_key() {
        let (store, events, session) = build_session();
        let mut rx = events.subscribe();
        let token = make_token(Utc::now().timestamp() + 3600);

        let profile = session.save_signin(&signin_data(&token)).unwrap();
        assert_eq!(profile.username, "nguyen");
        assert!(profile.is_buyer());

        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some(token.as_str()));
        assert_eq!(store.get(LEGACY_TOKEN_KEY).unwrap().as_deref(), Some(token.as_str()));
        assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("r1"));
        assert!(store.get(USER_KEY).unwrap().is_some());

        assert_eq!(rx.try_recv().unwrap(), AuthEvent::StatusChanged);
    }

    #[tokio::test]
    async fn test_check_auth_status_with_valid_token() {
        let (_store, _events, session) = build_session();
        let token = make_token(Utc::now().timestamp() + 3600);
        session.save_signin(&signin_data(&token)).unwrap();

        assert!(session.is_authenticated());
        match session.check_auth_status().await {
            AuthStatus::SignedIn(user) => assert_eq!(user.username, "nguyen"),
            AuthStatus::SignedOut => panic!("expected a signed-in session"),
        }
    }

    #[tokio::test]
    async fn test_failed_silent_refresh_signs_out_and_clears() {
        let (store, _events, session) = build_session();
        // Expired access token plus a refresh token, but the refresh
        // endpoint is unroutable: the silent refresh fails and the session
        // is wiped.
        let token = make_token(Utc::now().timestamp() - 10);
        session.save_signin(&signin_data(&token)).unwrap();

        match session.check_auth_status().await {
            AuthStatus::SignedOut => {}
            AuthStatus::SignedIn(_) => panic!("expected a signed-out session"),
        }
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), None);
        assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap(), None);
        assert_eq!(store.get(USER_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_logout_clears_every_session_key() {
        let (store, _events, session) = build_session();
        let token = make_token(Utc::now().timestamp() + 3600);
        session.save_signin(&signin_data(&token)).unwrap();

        session.logout().unwrap();
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), None);
        assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap(), None);
        assert_eq!(store.get(LEGACY_TOKEN_KEY).unwrap(), None);
        assert_eq!(store.get(USER_KEY).unwrap(), None);

        // Idempotent
        session.logout().unwrap();
        assert!(!session.is_authenticated());
    }
}
