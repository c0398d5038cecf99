//! Gatehouse Server - standalone authentication gateway.

use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gatehouse_server::{
    cleanup_task, create_router, AppState, Args, ListenerCatalog, ProviderRegistry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting gatehouse server"
    );

    let config = args.into_config();

    tracing::info!(
        listen = %config.listen_addr,
        user_mapping = ?config.user_mapping,
        auth_provider = %config.auth_provider,
        event_listeners = ?config.event_listeners,
        session_timeout_secs = config.session_timeout.as_secs(),
        secure_cookie = config.secure_cookie,
        "configuration loaded"
    );

    let state = AppState::from_config(
        config.clone(),
        &ProviderRegistry::with_builtins(),
        &ListenerCatalog::with_builtins(),
    )?;

    // Sweep idle sessions in the background
    tokio::spawn(cleanup_task(state.sessions.clone(), config.cleanup_interval));

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!("listening on {}", config.listen_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl+c");
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal");
}
