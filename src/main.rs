//! admission-dispatch - admission webhook server for `Workload` resources.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Registers the built-in replica policies
//! - Starts the health server and the webhook server

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing::{error, info};

use admission_dispatch::health::run_health_server;
use admission_dispatch::policies::{MonotonicReplicaValidator, ReplicaDefaulter, Workload};
use admission_dispatch::{HealthState, Scheme, ServerConfig, WebhookBuilder, WebhookServer};

/// Grace period for in-flight admission requests during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 2;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("admission_dispatch=info".parse()?),
        )
        .json()
        .init();

    info!("Starting admission-dispatch");

    let config = ServerConfig::from_env()?;

    let mut scheme = Scheme::new();
    scheme.register::<Workload>()?;

    let health_state = Arc::new(HealthState::new());
    let mut server = WebhookServer::new().with_health(health_state.clone());
    server.register(
        WebhookBuilder::new()
            .for_type::<Workload>()
            .with_defaulter(ReplicaDefaulter)
            .with_validator(MonotonicReplicaValidator)
            .complete(&scheme)?,
    )?;
    for path in server.paths() {
        info!(path, "Serving webhook");
    }

    // Start health server immediately so probes work during startup
    let health_handle = {
        let health_state = health_state.clone();
        let port = config.health_port;
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state, port).await {
                error!("Health server error: {}", e);
            }
        })
    };

    let webhook_handle = {
        let config = config.clone();
        tokio::spawn(async move {
            if let Err(e) = server.serve(&config).await {
                error!("Webhook server error: {}", e);
            }
        })
    };

    tokio::select! {
        result = webhook_handle => {
            if let Err(e) = result {
                error!("Webhook server task panicked: {}", e);
            }
        }
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");

            // Stop receiving new admission requests from the control plane
            health_state.set_ready(false).await;
            info!("Marked server as not ready");

            tokio::time::sleep(Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS)).await;
            info!("Grace period complete, shutting down");
        }
    }

    info!("admission-dispatch stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Signal handler setup failures are fatal: without them the server cannot
/// shut down gracefully.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
