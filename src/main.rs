use clap::Parser;
use std::sync::Arc;

use bitguess::adapters::{BinancePriceFeed, PostgresQueue, PostgresStore};
use bitguess::api::{create_router, AppState};
use bitguess::cli::{Cli, Commands};
use bitguess::config::{AppConfig, LoggingConfig};
use bitguess::error::{GameError, Result};
use bitguess::game::{GuessOrchestrator, ResolutionWorker, WorkerConfig};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config)?;
    init_logging(&config.logging);

    if let Err(errors) = config.validate() {
        for e in &errors {
            error!("invalid configuration: {e}");
        }
        return Err(GameError::Validation("invalid configuration".to_string()));
    }

    match cli.command {
        Commands::Migrate => {
            let store =
                PostgresStore::new(&config.database.url, config.database.max_connections).await?;
            store.migrate().await?;
        }
        Commands::Serve => serve(config).await?,
    }

    Ok(())
}

async fn serve(config: AppConfig) -> Result<()> {
    let store =
        Arc::new(PostgresStore::new(&config.database.url, config.database.max_connections).await?);
    store.migrate().await?;

    let queue = Arc::new(PostgresQueue::from_pool(store.pool().clone()));
    let feed = Arc::new(BinancePriceFeed::new(&config.price_feed)?);

    let orchestrator = Arc::new(GuessOrchestrator::new(
        store.clone(),
        store.clone(),
        queue.clone(),
        feed.clone(),
        config.game.reveal_window_secs,
    ));

    let worker = ResolutionWorker::new(
        store.clone(),
        store.clone(),
        feed,
        queue,
        WorkerConfig {
            poll_interval_ms: config.queue.poll_interval_ms,
            batch_size: config.queue.batch_size,
            visibility_timeout_secs: config.queue.visibility_timeout_secs,
        },
    );
    let worker_handle = worker.start();

    let state = AppState::new(orchestrator, Some(store));
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.api.bind_addr).await?;
    info!("API listening on {}", config.api.bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down");
    worker.stop();
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), worker_handle).await;

    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},bitguess=debug,sqlx=warn", config.level))
    });

    if config.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
