//! Worker contexts: the standard logging and error-capture interceptors.
//!
//! A [`WorkerContext`] is handed to the pool at construction. The pool installs
//! its [`log`](WorkerContext::log) and [`capture_error`](WorkerContext::capture_error)
//! interceptors as the two outermost entries of every chain, and asks it to
//! resolve the handler for each job.

use crate::error::{JobError, JobResult};
use crate::exception::PanicReport;
use crate::job::Job;
use crate::metrics::JobMetrics;
use crate::middleware::{Handler, HandlerMap, Middleware, Next};
use crate::monitoring::{install_panic_hook, take_panic_trace, ErrorReporter, Stacktrace, TracingReporter};
use crate::tags::Tags;
use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Tag marking a report that originated in a worker.
pub const WORKER: &str = "worker";

/// Frames dropped when the trace has to be taken at the recovery point.
const RECOVERY_SKIP: usize = 2;

/// Capabilities a worker pool needs from its context.
#[async_trait]
pub trait WorkerContext: Send + Sync + 'static {
    /// Monitoring sink this context reports into.
    fn reporter(&self) -> &dyn ErrorReporter;

    /// Logging interceptor.
    async fn log(&self, job: &Job, next: Next<'_>) -> JobResult<()> {
        log_job(job, next).await
    }

    /// Panic and error capture interceptor.
    async fn capture_error(&self, job: &Job, next: Next<'_>) -> JobResult<()> {
        capture_job_error(self.reporter(), job, next).await
    }

    /// Picks the handler for a job name.
    fn resolve(&self, handlers: &HandlerMap, job_name: &str) -> Option<Arc<dyn Handler>> {
        handlers.get(job_name).cloned()
    }
}

/// Default context reporting into an injected sink.
#[derive(Clone)]
pub struct BaseContext {
    reporter: Arc<dyn ErrorReporter>,
}

impl BaseContext {
    pub fn new(reporter: Arc<dyn ErrorReporter>) -> Self {
        Self { reporter }
    }
}

impl Default for BaseContext {
    fn default() -> Self {
        Self::new(Arc::new(TracingReporter))
    }
}

impl WorkerContext for BaseContext {
    fn reporter(&self) -> &dyn ErrorReporter {
        self.reporter.as_ref()
    }
}

/// Logs the job about to run, then continues.
pub async fn log_job(job: &Job, next: Next<'_>) -> JobResult<()> {
    info!(job = %job.name, job_id = %job.id, "Starting job");
    next.run(job).await
}

/// Runs the rest of the chain inside a recovery boundary and reports any
/// failure to `reporter` exactly once.
///
/// A panic never crosses this function: it is converted into
/// [`JobError::Panicked`] so the engine still scores the attempt as failed.
/// Ordinary errors are returned unchanged.
pub async fn capture_job_error(reporter: &dyn ErrorReporter, job: &Job, next: Next<'_>) -> JobResult<()> {
    install_panic_hook();

    match AssertUnwindSafe(next.run(job)).catch_unwind().await {
        Ok(Ok(())) => {
            info!(job = %job.name, job_id = %job.id, "Job completed successfully");
            Ok(())
        }
        Ok(Err(err)) => {
            error!(job = %job.name, job_id = %job.id, fails = job.fail_count, "{}", err);

            let mut tags = Tags::new().with(WORKER, "true");
            if let Some(own) = err.tags() {
                tags.merge(own);
            }
            tags.tag_job(job);

            reporter.capture_error(&err, &tags);
            Err(err)
        }
        Err(payload) => {
            let report = PanicReport::from_payload(payload.as_ref());
            if report.classified {
                warn!(job = %job.name, job_id = %job.id, exception = %report.message, "Job raised exception");
            }

            let mut tags = report.tags;
            tags.tag_job(job);

            let trace = take_panic_trace().unwrap_or_else(|| Stacktrace::capture(RECOVERY_SKIP));
            let packet = reporter.build_packet(&report.message, trace);

            error!(job = %job.name, job_id = %job.id, fails = job.fail_count, "[PANIC] {}", packet.message);

            reporter.capture(packet, &tags);
            JobMetrics::job_panicked(&job.name);
            Err(JobError::Panicked {
                message: report.message,
            })
        }
    }
}

/// Adapts [`WorkerContext::log`] into a chain entry.
pub struct LogInterceptor {
    context: Arc<dyn WorkerContext>,
}

#[async_trait]
impl Middleware for LogInterceptor {
    async fn handle(&self, job: &Job, next: Next<'_>) -> JobResult<()> {
        self.context.log(job, next).await
    }
}

/// Adapts [`WorkerContext::capture_error`] into a chain entry.
pub struct CaptureErrorInterceptor {
    context: Arc<dyn WorkerContext>,
}

#[async_trait]
impl Middleware for CaptureErrorInterceptor {
    async fn handle(&self, job: &Job, next: Next<'_>) -> JobResult<()> {
        self.context.capture_error(job, next).await
    }
}

/// The two interceptors every pool starts its chain with, outermost first.
pub fn standard_interceptors(context: &Arc<dyn WorkerContext>) -> [Arc<dyn Middleware>; 2] {
    [
        Arc::new(LogInterceptor {
            context: context.clone(),
        }),
        Arc::new(CaptureErrorInterceptor {
            context: context.clone(),
        }),
    ]
}
