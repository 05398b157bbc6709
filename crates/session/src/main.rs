//! Restore (and optionally open) a session from configuration, then report
//! where the user would land.

use std::sync::Arc;

use anyhow::Context;

use schoolerp_session::{HttpAuthApi, SessionConfig, SessionPhase, SessionStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = SessionConfig::from_env().context("invalid configuration")?;
    schoolerp_observability::init(config.log_format);

    tracing::info!(api_url = %config.api_url, storage = ?config.storage, "starting session");

    let api = HttpAuthApi::new(config.api_url.clone(), config.http_timeout)
        .context("failed to build HTTP client")?;
    let storage = config.storage.open().await?;
    let store = SessionStore::new(Arc::new(api), storage).into_handle();

    store.start().await;

    let identifier = std::env::var("SCHOOLERP_LOGIN_IDENTIFIER").ok();
    let password = std::env::var("SCHOOLERP_LOGIN_PASSWORD").ok();
    if let (Some(identifier), Some(password)) = (identifier, password) {
        if let Err(err) = store.login(&identifier, &password).await {
            tracing::warn!("login from environment failed: {err}");
        }
    }

    let session = store.snapshot();
    match session.phase() {
        SessionPhase::Authenticated(user) => {
            let home = store.dashboard().map(|d| d.home_route()).unwrap_or_default();
            tracing::info!(user_id = %user.id, role = %user.role, home, "signed in");
        }
        SessionPhase::Error(reason) => tracing::warn!(reason, "session error"),
        SessionPhase::Unauthenticated | SessionPhase::Resolving => {
            tracing::info!(route = schoolerp_auth::LOGIN_ROUTE, "not signed in");
        }
    }

    store.shutdown();
    Ok(())
}
