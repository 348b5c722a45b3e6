// Token exchange types

use serde::{Deserialize, Serialize};

/// Access/refresh token pair as stored in the credential store. Both are
/// opaque bearer strings; only the access token's expiry claim is ever
/// decoded.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// Refresh request body.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Token payload carried by a refresh response. The refresh token is
/// optional: the backend omits it when it is unchanged.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPayload {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Refresh response.
///
/// The backend wraps the payload in a `data` envelope; older deployments
/// returned it flat. The envelope is canonical and tried first, the flat
/// shape is a compatibility shim.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RefreshResponse {
    Enveloped { data: TokenPayload },
    Flat(TokenPayload),
}

impl RefreshResponse {
    pub fn into_payload(self) -> TokenPayload {
        match self {
            RefreshResponse::Enveloped { data } => data,
            RefreshResponse::Flat(payload) => payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_enveloped_response() {
        let body = r#"{
            "success": true,
            "message": "refreshed",
            "data": { "accessToken": "A2", "refreshToken": "R2" }
        }"#;

        let response: RefreshResponse = serde_json::from_str(body).unwrap();
        let payload = response.into_payload();
        assert_eq!(payload.access_token, "A2");
        assert_eq!(payload.refresh_token.as_deref(), Some("R2"));
    }

    #[test]
    fn test_parse_flat_response() {
        let body = r#"{ "accessToken": "A2", "refreshToken": "R2" }"#;

        let response: RefreshResponse = serde_json::from_str(body).unwrap();
        let payload = response.into_payload();
        assert_eq!(payload.access_token, "A2");
        assert_eq!(payload.refresh_token.as_deref(), Some("R2"));
    }

    #[test]
    fn test_refresh_token_may_be_omitted() {
        let body = r#"{ "data": { "accessToken": "A2" } }"#;

        let payload: TokenPayload = serde_json::from_str::<RefreshResponse>(body)
            .unwrap()
            .into_payload();
        assert_eq!(payload.access_token, "A2");
        assert_eq!(payload.refresh_token, None);
    }

    #[test]
    fn test_refresh_request_is_camel_case() {
        let request = RefreshRequest {
            refresh_token: "R1".to_string(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["refreshToken"], "R1");
    }
}
