pub mod api;
pub mod classifier;
pub mod config;
pub mod deploy;
pub mod error;
pub mod job;
pub mod logging;
pub mod signature;
pub mod webhook;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use config::DeployConfig;
use deploy::{DeployTrigger, ShellRunner};
use error::Result;

pub struct AppState {
    pub config: Arc<DeployConfig>,
    pub deployer: DeployTrigger,
    pub start_time: Instant,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Arc<DeployConfig>, deployer: DeployTrigger) -> Self {
        Self {
            config,
            deployer,
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<AppState>;

/// Runs the server until a shutdown signal arrives, then waits for running
/// deployments up to the configured grace period.
pub async fn serve(config: DeployConfig) -> Result<()> {
    let config = Arc::new(config);
    let deployer = DeployTrigger::new(Arc::clone(&config), Arc::new(ShellRunner));
    let state = Arc::new(AppState::new(Arc::clone(&config), deployer));
    let app = api::router(Arc::clone(&state));

    let bind_address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(bind_address.as_str()).await?;
    info!("Listening on {}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server stopped, started at {}", state.started_at.to_rfc3339());

    if !state.deployer.shutdown(config.shutdown_grace).await {
        warn!("Exiting with deployments still running");
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received, stopping...");
}
