use std::sync::Arc;

use policy_onboard::config::AppConfig;
use policy_onboard::onboarding::SessionRegistry;
use policy_onboard::onboarding::registry::spawn_expiry_task;
use policy_onboard::server::build_app;
use policy_onboard::store::open_store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env()?;

    eprintln!("📋 Policy Onboard v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Store: {:?}", config.backend);
    eprintln!("   Onboarding API: http://0.0.0.0:{}/api/onboarding/sessions", config.port);
    eprintln!("   Policies API: http://0.0.0.0:{}/api/policies", config.port);

    let store = open_store(&config).await?;
    let sessions = SessionRegistry::with_ttl(config.session_ttl);
    let _expiry_handle = spawn_expiry_task(Arc::clone(&sessions));
    let app = build_app(sessions, Arc::clone(&store));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, store = store.name(), "Listening");

    axum::serve(listener, app).await?;
    Ok(())
}
