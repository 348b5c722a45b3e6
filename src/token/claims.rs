// Access token claims decoding
//
// The session core only inspects the expiry claim; signature validation is
// the backend's job.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use serde::Deserialize;

/// Decoded access token payload. Only the fields the session core reads.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    /// Expiry as Unix seconds.
    pub exp: i64,

    /// Subject (account id), when present.
    #[serde(default)]
    pub sub: Option<String>,
}

/// Decode the claims segment of a JWT.
///
/// Returns `None` on any malformed input: wrong segment count, invalid
/// base64url, invalid JSON, or a payload without an `exp` claim.
pub fn decode_claims(token: &str) -> Option<Claims> {
    let mut segments = token.split('.');
    let _header = segments.next()?;
    let payload = segments.next()?;
    // The signature segment must at least be present
    segments.next()?;

    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Fail-closed expiry check: a token that cannot be decoded counts as
/// expired, and a token whose `exp` equals the current second is already
/// expired.
pub fn is_token_expired(token: &str) -> bool {
    match decode_claims(token) {
        Some(claims) => claims.exp <= Utc::now().timestamp(),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn make_token(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload =
            URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{},"sub":"user-1"}}"#, exp).as_bytes());
        format!("{}.{}.signature", header, payload)
    }

    #[test]
    fn test_decode_claims_reads_expiry() {
        let token = make_token(1_900_000_000);
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.exp, 1_900_000_000);
        assert_eq!(claims.sub.as_deref(), Some("user-1"));
    }

    #[test]
    fn test_unexpired_token() {
        let token = make_token(Utc::now().timestamp() + 3600);
        assert!(!is_token_expired(&token));
    }

    #[test]
    fn test_expired_token() {
        let token = make_token(Utc::now().timestamp() - 10);
        assert!(is_token_expired(&token));
    }

    #[test]
    fn test_expiry_at_current_second_counts_as_expired() {
        let token = make_token(Utc::now().timestamp());
        assert!(is_token_expired(&token));
    }

    #[test]
    fn test_malformed_tokens_fail_closed() {
        assert!(is_token_expired(""));
        assert!(is_token_expired("not-a-jwt"));
        assert!(is_token_expired("only.two"));
        assert!(is_token_expired("bad.!!!not-base64!!!.sig"));

        // Valid base64 but not JSON
        let garbage = URL_SAFE_NO_PAD.encode(b"garbage");
        assert!(is_token_expired(&format!("h.{}.s", garbage)));

        // Valid JSON but no exp claim
        let no_exp = URL_SAFE_NO_PAD.encode(br#"{"sub":"user-1"}"#);
        assert!(is_token_expired(&format!("h.{}.s", no_exp)));
    }

    proptest! {
        #[test]
        fn prop_expiry_check_never_panics(s in ".*") {
            let _ = is_token_expired(&s);
        }

        #[test]
        fn prop_strings_without_segments_are_expired(s in "[^.]*") {
            // No dot separators means no claims segment to decode
            prop_assert!(decode_claims(&s).is_none());
            prop_assert!(is_token_expired(&s));
        }
    }
}
