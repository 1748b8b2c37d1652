use std::sync::Arc;
use std::time::Duration;

use dotenvy::dotenv;
use gateway_triple_store::engine::{GraphEngine, OxigraphEngine};
use gateway_triple_store::{ExecutorConfig, TransactionalExecutor};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::select;
use tokio::signal::unix::SignalKind;
use tokio::sync::{oneshot, watch};
use triplestore_gateway::channel::{FailureStore, ReadMirror, UpdateScheduler, UpdateWorker};
use triplestore_gateway::config;
use triplestore_gateway::context::Context;
use triplestore_gateway::controllers::HttpApiRouter;
use triplestore_gateway::loader::{MigrationLoader, MigrationWatcher};
use triplestore_gateway::services::build_notifier;

#[tokio::main]
async fn main() {
    dotenv().ok();
    initialize_logger();

    let config = Arc::new(config::initialize_configuration());

    // Initialize Prometheus metrics exporter if enabled
    if config.observability.metrics_enabled {
        let metrics_port = config.observability.metrics_port;
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], metrics_port))
            .install()
            .expect("Failed to install Prometheus metrics exporter");
        tracing::info!("Metrics endpoint enabled on port {}", metrics_port);
    }

    // Open the storage engine and wrap it in the transactional executor
    let engine: Arc<dyn GraphEngine> = match &config.triple_store.data_path {
        Some(path) => Arc::new(
            OxigraphEngine::open(path).expect("Failed to open persistent triple store"),
        ),
        None => Arc::new(OxigraphEngine::in_memory().expect("Failed to create triple store")),
    };
    let executor = Arc::new(TransactionalExecutor::new(
        engine,
        ExecutorConfig {
            query_timeout: config.triple_store.query_timeout(),
        },
    ));

    let notifier = build_notifier(&config.notification);
    let failure_store = FailureStore::new(config.failure_store.directory.clone());
    let read_mirror = ReadMirror::spawn(config.update_channel.capacity);

    // Create the update channel and its worker pool
    let (update_scheduler, update_rx) = UpdateScheduler::channel(config.update_channel.capacity);
    let update_worker = UpdateWorker::new(
        &update_scheduler,
        update_rx,
        Arc::clone(&executor),
        failure_store,
        Arc::clone(&notifier),
        config.update_channel.clone(),
    );
    let update_worker_task = tokio::task::spawn(async move { update_worker.run().await });

    let context = Arc::new(Context::new(
        Arc::clone(&config),
        Arc::clone(&executor),
        update_scheduler,
        read_mirror,
        Arc::clone(&notifier),
    ));

    // Spawn the migration watcher if enabled
    let (migration_shutdown_tx, migration_shutdown_rx) = watch::channel(false);
    let migration_task = if config.migration.enabled {
        let loader = Arc::new(MigrationLoader::new(
            Arc::clone(&executor),
            &config.migration,
            &config.triple_store,
        ));
        let watcher = MigrationWatcher::new(loader, Arc::clone(&notifier), config.migration.clone());
        tracing::info!(directory = %config.migration.directory.display(), "migration watcher enabled");
        Some(tokio::task::spawn(watcher.run(migration_shutdown_rx)))
    } else {
        drop(migration_shutdown_rx);
        None
    };

    // Spawn the HTTP API task if enabled
    let (http_shutdown_tx, http_shutdown_rx) = oneshot::channel::<()>();
    let http_task = if config.http_api.enabled {
        let router = HttpApiRouter::new(&context);
        Some(tokio::task::spawn(async move {
            router.listen_and_handle_http_requests(http_shutdown_rx).await;
        }))
    } else {
        tracing::info!("HTTP API disabled");
        None
    };

    // Wait for shutdown signal (SIGINT or SIGTERM)
    let ctrl_c = tokio::signal::ctrl_c();
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())
        .expect("Failed to install SIGTERM handler");

    select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, initiating shutdown..."),
        _ = sigterm.recv() => tracing::info!("Received SIGTERM, initiating shutdown..."),
    }

    // Ordered shutdown:
    // 1. Stop the HTTP server and the migration watcher (no new work)
    // 2. Drop the context (closes the update channel)
    // 3. Wait for the worker pool to drain in-flight updates

    tracing::info!("Shutting down gracefully...");

    let _ = http_shutdown_tx.send(());
    let _ = migration_shutdown_tx.send(true);

    if let Some(task) = http_task {
        match tokio::time::timeout(Duration::from_secs(5), task).await {
            Ok(Ok(())) => tracing::info!("HTTP server shut down cleanly"),
            Ok(Err(e)) => tracing::error!("HTTP task panicked: {:?}", e),
            Err(_) => tracing::warn!("HTTP server shutdown timeout"),
        }
    }

    if let Some(task) = migration_task {
        match tokio::time::timeout(Duration::from_secs(5), task).await {
            Ok(Ok(())) => tracing::info!("Migration watcher shut down cleanly"),
            Ok(Err(e)) => tracing::error!("Migration task panicked: {:?}", e),
            Err(_) => tracing::warn!("Migration watcher shutdown timeout"),
        }
    }

    drop(context);

    const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);
    tracing::info!("Waiting for update worker to drain...");
    match tokio::time::timeout(DRAIN_TIMEOUT, update_worker_task).await {
        Ok(Ok(())) => tracing::info!("Update worker shut down cleanly"),
        Ok(Err(e)) => tracing::error!("Update worker task panicked: {:?}", e),
        Err(_) => tracing::warn!("Update worker drain timeout after {:?}", DRAIN_TIMEOUT),
    }

    tracing::info!("Shutdown complete");
}

fn initialize_logger() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,triplestore_gateway=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
