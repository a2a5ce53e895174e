mod api_doc;
mod auth;
mod error;
mod handlers;
mod routes;
mod setup;
mod state;
mod telemetry;

use vidgate_core::Config;

// Use mimalloc as the global allocator for better performance and lower
// fragmentation, especially when running on musl-based systems inside
// containers.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = Config::from_env()?;

    telemetry::init_tracing();

    // Initialize repositories, services, and routes
    let (state, router) = setup::initialize_app(config.clone()).await?;

    // Background sweep of stale upload sessions
    let reaper_handle = state.reaper.clone().start();

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!(%addr, backend = %config.backend, "Starting vidgate-api");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    reaper_handle.abort();
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to install shutdown signal handler");
    }
    tracing::info!("Shutdown signal received");
}
