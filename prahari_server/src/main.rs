//! Prahari Server entry point

use prahari_server::{config, routes, sweep};
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,prahari_server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!("Starting Prahari gate on {}:{}", config.host, config.port);
    if config.hcaptcha_secret.is_none() {
        tracing::warn!("HCAPTCHA_SECRET_KEY not set - CAPTCHA verification disabled");
    }
    if config.admin_token.is_none() {
        tracing::warn!("ADMIN_TOKEN not set - admin surface disabled");
    }

    let cleanup_interval = Duration::from_millis(config.cleanup_interval_ms);
    let state = routes::AppState::new(config.clone());

    // Start the periodic sweep
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let sweeper = sweep::spawn_sweeper(
        state.blocker.clone(),
        state.throttle.clone(),
        cleanup_interval,
        shutdown_rx,
    );

    // Build the router
    let app = routes::app(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutdown signal received");
    })
    .await?;

    // Stop the sweeper before exiting
    shutdown_tx.send(true).ok();
    sweeper.await.ok();

    Ok(())
}
