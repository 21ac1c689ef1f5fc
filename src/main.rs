use std::net::SocketAddr;

use anyhow::Result;
use dotenvy::dotenv;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use fleet_ops::build_router;
use fleet_ops::config::{DatabaseConfig, EnvironmentConfig};
use fleet_ops::database::DatabaseConnection;
use fleet_ops::repositories::Repositories;
use fleet_ops::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = EnvironmentConfig::from_env()?;
    let db_config = DatabaseConfig::from_env()?;
    info!(
        "🚚 Fleet ops starting ({}) with database {}",
        config.environment,
        db_config.masked_url()
    );

    let db = DatabaseConnection::connect(&db_config).await?;
    let repos = Repositories::postgres(db.pool().clone());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let (state, workers) = AppState::build(repos, config);
    let app = build_router(state);

    info!("🌐 Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Server error: {}", e);
    }

    // El router ya soltó los emisores; los workers drenan lo pendiente
    let _ = tokio::join!(workers.notifications, workers.gps);
    info!("👋 Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("🛑 Ctrl+C received, shutting down"),
        _ = terminate => info!("🛑 Termination signal received, shutting down"),
    }
}
