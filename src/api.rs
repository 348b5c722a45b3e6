// Public auth endpoints
// Thin typed wrappers over the sign-in funnel. These endpoints are public,
// so no bearer token is attached.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AuthError, Result};
use crate::http_client::normalize_api_error;
use crate::session::SigninData;

/// Response envelope used across the auth endpoints. The backend wraps
/// payloads under `data`; older deployments returned them flat.
#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Enveloped { data: T },
    Flat(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Envelope::Enveloped { data } => data,
            Envelope::Flat(payload) => payload,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SigninRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

/// Client for the public auth endpoints.
pub struct AuthApi {
    client: Client,
    base_url: String,
}

impl AuthApi {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// POST /api/v1/auth/signin
    pub async fn signin(&self, request: &SigninRequest) -> Result<SigninData> {
        self.post_json("/api/v1/auth/signin", request).await
    }

    /// POST /api/v1/auth/signup
    pub async fn signup(&self, request: &SignupRequest) -> Result<Value> {
        self.post_json("/api/v1/auth/signup", request).await
    }

    /// POST /api/v1/auth/verify-otp
    pub async fn verify_otp(&self, request: &VerifyOtpRequest) -> Result<Value> {
        self.post_json("/api/v1/auth/verify-otp", request).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| AuthError::Http(format!("request to {} failed: {}", path, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(normalize_api_error(status.as_u16(), &body_text));
        }

        let envelope: Envelope<T> = response.json().await.map_err(|e| {
            AuthError::Http(format!("failed to parse response from {}: {}", path, e))
        })?;
        Ok(envelope.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_unwraps_both_shapes() {
        let enveloped: Envelope<Value> =
            serde_json::from_str(r#"{ "success": true, "data": { "x": 1 } }"#).unwrap();
        assert_eq!(enveloped.into_inner()["x"], 1);

        let flat: Envelope<Value> = serde_json::from_str(r#"{ "x": 1 }"#).unwrap();
        assert_eq!(flat.into_inner()["x"], 1);
    }

    #[tokio::test]
    async fn test_signin_parses_enveloped_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/auth/signin")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "success": true,
                    "message": "signed in",
                    "data": {
                        "accessToken": "a1",
                        "refreshToken": "r1",
                        "username": "nguyen",
                        "buyerId": "b-12"
                    }
                }"#,
            )
            .create_async()
            .await;

        let api = AuthApi::new(Client::new(), &server.url());
        let data = api
            .signin(&SigninRequest {
                username: "nguyen".to_string(),
                password: "secret".to_string(),
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(data.access_token, "a1");
        assert_eq!(data.refresh_token.as_deref(), Some("r1"));
        assert_eq!(data.username, "nguyen");
    }

    #[tokio::test]
    async fn test_signin_error_uses_normalized_message() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v1/auth/signin")
            .with_status(401)
            .with_body(r#"{ "message": "wrong password" }"#)
            .create_async()
            .await;

        let api = AuthApi::new(Client::new(), &server.url());
        let err = api
            .signin(&SigninRequest {
                username: "nguyen".to_string(),
                password: "oops".to_string(),
            })
            .await
            .unwrap_err();

        assert_eq!(
            err,
            AuthError::Api {
                status: 401,
                message: "wrong password".to_string()
            }
        );
    }
}
