//! Built-in job handlers.

use kestrel_jobs::{Handler, Job, JobResult};
use std::sync::Arc;
use tracing::info;

/// Job name of [`ping`].
pub const PING: &str = "ping";

/// Liveness job: logs the optional `message` argument and succeeds.
pub async fn ping(job: Job) -> JobResult<()> {
    let message: Option<String> = job.arg("message")?;
    info!(
        job_id = %job.id,
        message = message.as_deref().unwrap_or("pong"),
        "Ping received"
    );
    Ok(())
}

/// Handlers every worker process registers.
pub fn builtin() -> Vec<(&'static str, Arc<dyn Handler>)> {
    let ping: Arc<dyn Handler> = Arc::new(ping);
    vec![(PING, ping)]
}
