//! barrier-counter server entry point.
//!
//! Connects the database pool, starts the MQTT subscriber and the
//! ingestion worker, and serves the HTTP and WebSocket endpoints until
//! Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

use barrier_counter::api;
use barrier_counter::app_state::AppState;
use barrier_counter::broker::BrokerSubscriber;
use barrier_counter::config::CounterConfig;
use barrier_counter::domain::EventBus;
use barrier_counter::persistence::postgres::{connect_pool, connect_pool_lazy, run_migrations};
use barrier_counter::persistence::{CountWriter, SystemLogWriter};
use barrier_counter::service::{
    AggregationQueryService, HealthMonitor, IngestionWorker, record_broker_transitions,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = CounterConfig::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    tracing::info!(addr = %config.listen_addr, "starting barrier-counter");

    // Database pool; a database that is down at startup must not stop ingestion
    let pool = match connect_pool(&config.database).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(error = %e, "database unreachable at startup; connecting lazily");
            connect_pool_lazy(&config.database).context("invalid database configuration")?
        }
    };
    if config.database.run_migrations {
        match run_migrations(&pool).await {
            Ok(()) => tracing::info!("migrations applied"),
            Err(e) => tracing::warn!(error = %e, "migrations not applied"),
        }
    }

    // Ingestion pipeline
    let event_bus = EventBus::new(config.event_bus_capacity);
    let (readings_tx, readings_rx) = mpsc::channel(config.sensor_channel_capacity);
    let (worker, sensor_rx) =
        IngestionWorker::new(CountWriter::new(pool.clone()), event_bus.clone());
    let worker_task = tokio::spawn(worker.run(readings_rx));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (subscriber, broker_link) = BrokerSubscriber::new(config.broker.clone(), readings_tx);
    let subscriber_task = tokio::spawn(subscriber.run(shutdown_rx));
    let transitions_task = tokio::spawn(record_broker_transitions(
        SystemLogWriter::new(pool.clone()),
        broker_link.clone(),
    ));

    // Build application state
    let app_state = AppState {
        query_service: Arc::new(AggregationQueryService::new(pool.clone())),
        health: HealthMonitor::new(
            pool.clone(),
            broker_link,
            sensor_rx,
            config.health_probe_timeout,
        ),
        event_bus,
    };
    let app = api::build_app(app_state, config.request_timeout);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            tracing::info!("shutdown requested");
        })
        .await?;

    // Stop the subscriber first; dropping its sender lets the worker drain and exit
    shutdown_tx.send_replace(true);
    if let Err(e) = subscriber_task.await {
        tracing::error!(error = %e, "broker subscriber task failed");
    }
    if let Err(e) = transitions_task.await {
        tracing::error!(error = %e, "broker transition log task failed");
    }
    match worker_task.await {
        Ok(summary) => tracing::info!(
            observed = summary.observed,
            counted = summary.counted,
            failed_writes = summary.failed_writes,
            "ingestion drained"
        ),
        Err(e) => tracing::error!(error = %e, "ingestion worker task failed"),
    }
    pool.close();

    Ok(())
}
