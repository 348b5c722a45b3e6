use anyhow::{Context, Result};
use std::sync::Arc;

use evmarket_session::api::{AuthApi, SigninRequest};
use evmarket_session::config::Config;
use evmarket_session::events::AuthEventBus;
use evmarket_session::http_client::ApiClient;
use evmarket_session::session::{AuthStatus, SessionState, UserProfile};
use evmarket_session::store::{CredentialStore, SqliteStore};
use evmarket_session::token::{claims, SessionTokenManager};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    config.validate()?;

    // Initialize logging with the configured level
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    tracing::info!("EV Market session agent starting");
    tracing::debug!("API base URL: {}", config.base_url);

    let store: Arc<dyn CredentialStore> = Arc::new(
        SqliteStore::open(&config.store_file).context("failed to open session store")?,
    );

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.http_timeout))
        .build()
        .context("failed to create HTTP client")?;

    let events = AuthEventBus::new();
    let manager = Arc::new(SessionTokenManager::new(
        store.clone(),
        client.clone(),
        &config.base_url,
        events.clone(),
    ));
    let session = SessionState::new(store, manager.clone(), events.clone());

    if config.logout {
        session.logout().context("failed to clear session")?;
        println!("Signed out. Session store cleared.");
        return Ok(());
    }

    // Surface refresh failures the way the storefront header would
    let mut event_rx = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            if let evmarket_session::events::AuthEvent::RefreshFailed { reason } = event {
                eprintln!("Session ended: {} - please sign in again", reason);
            }
        }
    });

    let profile = match session.check_auth_status().await {
        AuthStatus::SignedIn(profile) => profile,
        AuthStatus::SignedOut => interactive_signin(&client, &config, &session).await?,
    };

    // Exercise the token path once so an expired-but-refreshable session is
    // silently refreshed before reporting
    let token = manager
        .get_valid_token()
        .await
        .context("stored session is unusable")?;

    let api_client = ApiClient::new(client, &config.base_url, manager.clone());
    print_session_status(&profile, &token, &manager, &api_client).await;

    Ok(())
}

/// Prompt for credentials and sign in against the marketplace backend.
async fn interactive_signin(
    client: &reqwest::Client,
    config: &Config,
    session: &SessionState,
) -> Result<UserProfile> {
    use dialoguer::{Input, Password};

    println!();
    println!("No session found. Sign in to EV Market.");
    println!();

    let username: String = Input::new()
        .with_prompt("Username")
        .interact_text()
        .context("failed to read username")?;

    let password: String = Password::new()
        .with_prompt("Password")
        .interact()
        .context("failed to read password")?;

    let auth_api = AuthApi::new(client.clone(), &config.base_url);
    let data = auth_api
        .signin(&SigninRequest { username, password })
        .await
        .context("sign-in failed")?;

    let profile = session
        .save_signin(&data)
        .context("failed to persist sign-in")?;

    println!();
    println!("Signed in as {} ({:?})", profile.username, profile.role);
    Ok(profile)
}

/// Print the session status report.
async fn print_session_status(
    profile: &UserProfile,
    token: &str,
    manager: &SessionTokenManager,
    api_client: &ApiClient,
) {
    println!();
    println!("  EV Market session status");
    println!("  ------------------------");
    println!("  User:     {} ({:?})", profile.username, profile.role);
    if let Some(ref email) = profile.email {
        println!("  Email:    {}", email);
    }
    println!("  Token:    {}...", &token[..12.min(token.len())]);
    if let Some(decoded) = claims::decode_claims(token) {
        if let Some(expires) = chrono::DateTime::from_timestamp(decoded.exp, 0) {
            println!("  Expires:  {}", expires.to_rfc3339());
        }
    }
    let refresh = if manager.has_refresh_token() {
        "present"
    } else {
        "absent"
    };
    println!("  Refresh:  {}", refresh);

    // Round-trip through an authenticated endpoint to prove the session
    // works end to end
    match api_client.get("/api/v1/users/me").await {
        Ok(_) => println!("  Backend:  reachable, token accepted"),
        Err(e) => println!("  Backend:  check failed ({})", e),
    }
    println!();
}
