//! Startup output.

use kestrel_jobs::WorkerPoolStats;
use tracing::info;

/// Logs where the pool is pulling from.
pub fn print_startup_info(stats: &WorkerPoolStats, redis_url: &str, job_names: &[String]) {
    let separator = "=".repeat(60);
    info!("{}", separator);
    info!("Pool:        {}", stats.id);
    info!("Namespace:   {}", stats.namespace);
    info!("Concurrency: {}", stats.concurrency);
    info!("Redis:       {}", redis_url);
    info!("Jobs:        {}", job_names.join(", "));
    info!("{}", separator);
}
