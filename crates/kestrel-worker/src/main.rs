//! # Kestrel Worker
//!
//! Main entry point for a Kestrel worker process: loads configuration,
//! connects to Redis and runs a worker pool until Ctrl+C or SIGTERM.

use anyhow::Context;
use kestrel_config::{AppConfig, ConfigLoader};
use kestrel_jobs::configurator::from_config;
use kestrel_jobs::{create_pool, register_metrics, BaseContext, RedisJobStore, RetryPolicy, WorkerPool};
use kestrel_worker::{handlers, logging, startup};
use std::sync::Arc;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    let config = match load_config().await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e:#}");
            std::process::exit(1);
        }
    };

    logging::init(&config.logging);

    info!("Starting Kestrel worker...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(config).await {
        error!("Worker error: {:#}", e);
        std::process::exit(1);
    }
}

/// Configuration is read before logging exists, so failures go to stderr.
async fn load_config() -> anyhow::Result<AppConfig> {
    let loader = ConfigLoader::from_default_location().context("failed to load ./config")?;
    Ok(loader.get().await)
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    info!("Environment: {}", config.app.environment);
    if let Ok(rendered) = config.to_toml() {
        debug!("Effective configuration:\n{}", rendered);
    }

    register_metrics();

    let redis = create_pool(&config.redis).await.context("failed to connect to Redis")?;
    let store = Arc::new(RedisJobStore::with_policy(
        redis,
        RetryPolicy::exponential(config.worker.max_fails),
    ));

    let mut pool = WorkerPool::new(
        BaseContext::default(),
        config.worker.namespace.clone(),
        store,
        [from_config(&config.worker)],
    );
    pool.listen_all(handlers::builtin());

    startup::print_startup_info(&pool.stats(), &config.redis.url, &pool.job_names());

    pool.run().await?;

    let stats = pool.stats();
    info!(
        processed = stats.jobs_processed,
        failed = stats.jobs_failed,
        "Worker shutdown complete"
    );
    Ok(())
}
