// Signed-in session state
// Profile persistence and auth-status derivation

mod state;
mod user;

pub use state::{AuthStatus, SessionState};
pub use user::{Role, SigninData, UserProfile};
