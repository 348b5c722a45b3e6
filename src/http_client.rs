// Authenticated request layer
//
// Wraps the shared HTTP client for the rest of the marketplace client:
// attaches a bearer token obtained from the token manager to every
// non-public request, retries once after a forced refresh on 401, and
// normalizes error responses into a single message.

use std::sync::Arc;

use reqwest::{Client, Method, Response, StatusCode};
use serde::Serialize;

use crate::error::{AuthError, Result};
use crate::token::SessionTokenManager;

/// Endpoints that never carry a bearer token: the sign-in funnel, the VNPay
/// return path (the payment gateway redirects there unauthenticated), and
/// the public product listing.
const PUBLIC_ENDPOINTS: &[&str] = &[
    "/api/v1/auth/signup",
    "/api/v1/auth/signin",
    "/api/v1/auth/signin-google",
    "/api/v1/auth/verify-otp",
    "/api/v1/auth/verify-username-forgot-password",
    "/api/v1/auth/verify-otp-forgot-password",
    "/api/v1/auth/forgot-password",
    "/api/v1/vnpay/return",
    "/api/v1/post-product",
];

/// HTTP client for the marketplace API with token attachment.
pub struct ApiClient {
    /// Shared HTTP client with connection pooling.
    client: Client,

    /// API base URL, no trailing slash.
    base_url: String,

    /// Token manager consulted before every authenticated request.
    token_manager: Arc<SessionTokenManager>,
}

impl ApiClient {
    pub fn new(client: Client, base_url: &str, token_manager: Arc<SessionTokenManager>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token_manager,
        }
    }

    /// True when the path belongs to the public endpoint list.
    pub fn is_public_endpoint(path: &str) -> bool {
        PUBLIC_ENDPOINTS.iter().any(|p| path.starts_with(p))
    }

    pub async fn get(&self, path: &str) -> Result<Response> {
        self.request(Method::GET, path, None::<&()>).await
    }

    pub async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<Response> {
        self.request(Method::POST, path, Some(body)).await
    }

    /// Execute a request against the API.
    ///
    /// Non-public paths get a bearer token from `get_valid_token()` first;
    /// when that fails the request is aborted unsent. A 401 response forces
    /// one refresh and one retry with the new token, then aborts.
    pub async fn request<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response> {
        let request_id = uuid::Uuid::new_v4().to_string()[..8].to_string();
        let url = format!("{}{}", self.base_url, path);
        let public = Self::is_public_endpoint(path);

        let token = if public {
            None
        } else {
            Some(self.token_manager.get_valid_token().await?)
        };

        tracing::debug!(request_id = %request_id, method = %method, path, public, "sending API request");

        let response = self.execute(&method, &url, body, token.as_deref()).await?;

        if response.status() == StatusCode::UNAUTHORIZED && !public {
            tracing::warn!(request_id = %request_id, path, "received 401, refreshing token and retrying");
            let fresh = self.token_manager.refresh_access_token().await?;
            let retried = self.execute(&method, &url, body, Some(fresh.as_str())).await?;
            return Self::check_status(retried, &request_id, path).await;
        }

        Self::check_status(response, &request_id, path).await
    }

    async fn execute<B: Serialize>(
        &self,
        method: &Method,
        url: &str,
        body: Option<&B>,
        token: Option<&str>,
    ) -> Result<Response> {
        let mut builder = self.client.request(method.clone(), url);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }
        builder
            .send()
            .await
            .map_err(|e| AuthError::Http(format!("request to {} failed: {}", url, e)))
    }

    async fn check_status(response: Response, request_id: &str, path: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body_text = response.text().await.unwrap_or_default();
        tracing::error!(
            request_id = %request_id,
            path,
            status = status.as_u16(),
            "API request failed"
        );
        Err(normalize_api_error(status.as_u16(), &body_text))
    }
}

/// Map a non-success response to a single user-facing message: the body's
/// `message`, `error`, or `error_description` field, falling back to a
/// status-derived message.
pub(crate) fn normalize_api_error(status: u16, body: &str) -> AuthError {
    let from_body = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            ["message", "error", "error_description"]
                .iter()
                .find_map(|field| {
                    json.get(field)
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string())
                })
        });

    let message = from_body.unwrap_or_else(|| match status {
        401 => "not authenticated".to_string(),
        403 => "access denied".to_string(),
        404 => "resource not found".to_string(),
        500 => "server error, please try again later".to_string(),
        _ => format!("unexpected error from server ({})", status),
    });

    AuthError::Api { status, message }
}
