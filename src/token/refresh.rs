// Refresh token exchange

use reqwest::Client;

use super::types::{RefreshRequest, RefreshResponse, TokenPayload};
use crate::error::{AuthError, Result};

/// Client fingerprint for the User-Agent header, derived from the hostname.
fn machine_fingerprint() -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    let mut hasher = DefaultHasher::new();
    hostname.hash(&mut hasher);
    format!("{:x}", hasher.finish())
}

/// Exchange the refresh token for a new access/refresh pair.
///
/// Every failure mode (transport error, non-success status, malformed or
/// empty payload) maps to `RefreshFailed` so queued waiters all observe the
/// same terminal error.
pub async fn exchange(client: &Client, url: &str, refresh_token: &str) -> Result<TokenPayload> {
    tracing::debug!("sending refresh request");

    let request = RefreshRequest {
        refresh_token: refresh_token.to_string(),
    };

    let response = client
        .post(url)
        .header("Content-Type", "application/json")
        .header(
            "User-Agent",
            format!(
                "EvMarket-{}-{}",
                env!("CARGO_PKG_VERSION"),
                machine_fingerprint()
            ),
        )
        .json(&request)
        .send()
        .await
        .map_err(|e| AuthError::RefreshFailed(format!("failed to send refresh request: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(AuthError::RefreshFailed(format!(
            "{} - {}",
            status, error_text
        )));
    }

    let data: RefreshResponse = response
        .json()
        .await
        .map_err(|e| AuthError::RefreshFailed(format!("failed to parse refresh response: {}", e)))?;

    let payload = data.into_payload();
    if payload.access_token.is_empty() {
        return Err(AuthError::RefreshFailed(
            "refresh response does not contain accessToken".to_string(),
        ));
    }

    Ok(payload)
}
