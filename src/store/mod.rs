// Credential storage
// Durable key-value storage for session material

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::Result;

/// Store key for the current access token.
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Store key for the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Store key for the serialized signed-in user profile.
pub const USER_KEY: &str = "user";

/// Legacy single-token key. Still written on sign-in because older client
/// components and the websocket layer read it; removed on clear.
pub const LEGACY_TOKEN_KEY: &str = "token";

/// Durable key-value storage for session material.
///
/// The token manager is the sole writer of the token keys. Multi-key
/// operations are atomic: a reader never observes a partial update.
pub trait CredentialStore: Send + Sync {
    /// Read a value by key.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a single key.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a single key. Removing an absent key is a no-op success.
    fn remove(&self, key: &str) -> Result<()>;

    /// Write several keys in one atomic step.
    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()>;

    /// Remove several keys in one atomic step. Absent keys are not an error.
    fn remove_many(&self, keys: &[&str]) -> Result<()>;
}
