//! EventPass HTTP server.
//!
//! Wires `PostgreSQL` with failover, the Redis dedup gate and check-in
//! publisher, the expiry sweeper and the failover monitor, then serves the
//! check-in API until Ctrl+C or SIGTERM.

use eventpass_core::environment::{Clock, SystemClock};
use eventpass_core::{
    CheckInConfig, CheckInStateMachine, ExpirySweeper, SignatureCodec, SweeperConfig,
    TicketIssuer,
};
use eventpass_postgres::{FailoverConfig, FailoverMonitor, FailoverStore, PostgresRepository};
use eventpass_redis::{RedisCheckInPublisher, RedisDedupGate};
use eventpass_server::config::{Config, DatabaseConfig, FailoverModeSetting};
use eventpass_server::metrics::register_metrics;
use eventpass_server::{AppState, build_router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine; real deployments set the environment directly.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eventpass=info,eventpass_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting EventPass server");

    let config = Config::from_env()?;
    info!(
        failover_mode = ?config.database.failover_mode,
        redis_url = %config.redis.url,
        port = config.server.port,
        "Configuration loaded"
    );

    let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.server.metrics_port));
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()?;
    register_metrics();
    info!(address = %metrics_addr, "Prometheus exporter listening");

    let codec = Arc::new(SignatureCodec::new(config.hmac_secret.clone())?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    info!("Connecting to database...");
    let store = Arc::new(connect_store(&config.database).await?);
    info!(role = store.role().await.as_str(), "Database connected");

    let repository = Arc::new(PostgresRepository::new(store.clone()));
    repository.migrate().await?;
    info!("Migrations applied");

    info!("Connecting to Redis...");
    let redis = eventpass_redis::connect(&config.redis.url).await?;
    let gate = Arc::new(RedisDedupGate::from_connection(
        redis.clone(),
        config.redis.command_timeout,
    ));
    let publisher = Arc::new(RedisCheckInPublisher::new(
        redis,
        config.redis.command_timeout,
    ));
    info!("Redis connected");

    let machine = Arc::new(CheckInStateMachine::new(
        repository.clone(),
        gate,
        publisher,
        codec.clone(),
        clock.clone(),
        CheckInConfig::default().with_dedup_ttl(config.check_in.dedup_ttl),
    ));
    let issuer = Arc::new(
        TicketIssuer::new(repository.clone(), codec, clock.clone())
            .with_horizon(config.check_in.ticket_horizon),
    );

    // Background tasks
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweeper = ExpirySweeper::new(
        repository.clone(),
        repository,
        clock,
        SweeperConfig {
            interval: config.check_in.sweep_interval,
        },
    )
    .spawn(shutdown_rx.clone());
    let monitor = FailoverMonitor::new(store.clone()).spawn(shutdown_rx);
    info!("Expiry sweeper and failover monitor started");

    let app = build_router(AppState::new(machine, issuer, store));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped, stopping background tasks");
    if shutdown_tx.send(true).is_err() {
        warn!("Background tasks already stopped");
    }
    for (name, handle) in [("sweeper", sweeper), ("monitor", monitor)] {
        if let Err(e) = handle.await {
            error!(task = name, error = %e, "Background task failed");
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Open the store the configured failover mode asks for.
async fn connect_store(
    database: &DatabaseConfig,
) -> Result<FailoverStore, eventpass_postgres::StoreError> {
    let failover = FailoverConfig {
        probe_interval: database.probe_interval,
        query_timeout: database.query_timeout,
        ..FailoverConfig::default()
    };

    match (database.failover_mode, database.replica_url.as_deref()) {
        (FailoverModeSetting::Hot, Some(replica)) => {
            FailoverStore::connect_hot(&database.url, replica, failover).await
        }
        (FailoverModeSetting::Cold, Some(fallback)) => {
            FailoverStore::connect_cold(&database.url, fallback, failover).await
        }
        (_, None) => FailoverStore::connect_single(&database.url, failover).await,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
