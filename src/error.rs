// Error handling module
// Defines the session error taxonomy

use thiserror::Error;

/// Errors surfaced by the session core.
///
/// Cloneable so the outcome of a single refresh exchange can be fanned out
/// to every caller that was queued waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No session was ever established. Callers should redirect to sign-in.
    #[error("no access token available")]
    NoAccessToken,

    /// Access token expired and no refresh token exists. Terminal for the
    /// session, never retried.
    #[error("access token expired and no refresh token available")]
    SessionExpired,

    /// The refresh exchange itself failed. Tokens are cleared as a side
    /// effect and the session-ended event is emitted.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// Normalized non-success response from the backend.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Credential store failure.
    #[error("credential store error: {0}")]
    Store(String),

    /// Transport-level failure.
    #[error("HTTP error: {0}")]
    Http(String),
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, AuthError>;
