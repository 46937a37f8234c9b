//! Worker pool: configuration, chain wiring, and the running lifecycle.

use crate::configurator::{Configurator, PoolOptions};
use crate::context::WorkerContext;
use crate::dispatcher::Dispatcher;
use crate::error::JobResult;
use crate::middleware::{Handler, Middleware};
use crate::pipeline::Pipeline;
use crate::signal::shutdown_signal;
use crate::store::JobStore;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Pool statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPoolStats {
    pub id: String,
    pub namespace: String,
    pub concurrency: usize,
    pub running: bool,
    pub jobs_processed: u64,
    pub jobs_failed: u64,
}

/// A set of handlers executed by `concurrency` workers against one store.
///
/// Every chain starts with the context's logging and error-capture
/// interceptors, ahead of anything added with [`middleware`](Self::middleware).
pub struct WorkerPool<S: JobStore> {
    id: String,
    namespace: String,
    options: PoolOptions,
    pipeline: Pipeline,
    dispatcher: Dispatcher<S>,
}

impl<S: JobStore> WorkerPool<S> {
    /// Builds a pool. Performs no I/O.
    pub fn new<C: WorkerContext>(
        context: C,
        namespace: impl Into<String>,
        store: Arc<S>,
        configurators: impl IntoIterator<Item = Configurator>,
    ) -> Self {
        let id = format!("worker-pool-{}", Uuid::new_v4());
        let namespace = namespace.into();
        let options = PoolOptions::configure(configurators);
        let context: Arc<dyn WorkerContext> = Arc::new(context);

        Self {
            dispatcher: Dispatcher::new(id.clone(), store, namespace.clone(), options.clone()),
            pipeline: Pipeline::new(context),
            id,
            namespace,
            options,
        }
    }

    /// Appends an interceptor after those already installed.
    pub fn middleware(&mut self, middleware: impl Middleware) -> &mut Self {
        self.pipeline.push(Arc::new(middleware));
        self
    }

    /// Binds `handler` to `job_name`, replacing any earlier binding.
    pub fn listen(&mut self, job_name: impl Into<String>, handler: impl Handler) -> &mut Self {
        self.bind(job_name.into(), Arc::new(handler));
        self
    }

    /// Binds several handlers at once.
    pub fn listen_all<N>(&mut self, handlers: impl IntoIterator<Item = (N, Arc<dyn Handler>)>) -> &mut Self
    where
        N: Into<String>,
    {
        for (job_name, handler) in handlers {
            self.bind(job_name.into(), handler);
        }
        self
    }

    fn bind(&mut self, job_name: String, handler: Arc<dyn Handler>) {
        self.dispatcher.register(&job_name);
        if self.pipeline.insert_handler(job_name.clone(), handler).is_some() {
            warn!(pool_id = %self.id, job = %job_name, "Replaced job handler");
        } else {
            info!(pool_id = %self.id, job = %job_name, "Registered job handler");
        }
    }

    /// Starts pulling jobs with the handlers and interceptors registered so far.
    pub fn start(&mut self) -> JobResult<()> {
        self.dispatcher.start(Arc::new(self.pipeline.clone()))?;
        info!(
            pool_id = %self.id,
            namespace = %self.namespace,
            concurrency = self.options.concurrency,
            "Worker pool started"
        );
        Ok(())
    }

    /// Stops pickup and waits for in-flight jobs to finish.
    pub async fn stop(&mut self) -> JobResult<()> {
        self.dispatcher.stop().await?;
        info!(pool_id = %self.id, "Worker pool stopped");
        Ok(())
    }

    /// Runs until `shutdown` completes, then stops gracefully.
    pub async fn run_until<F>(&mut self, shutdown: F) -> JobResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start()?;
        shutdown.await;
        self.stop().await
    }

    /// Runs until the process receives Ctrl+C or SIGTERM.
    pub async fn run(&mut self) -> JobResult<()> {
        self.run_until(shutdown_signal()).await
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn concurrency(&self) -> usize {
        self.options.concurrency
    }

    /// Workers currently spawned by the dispatcher.
    pub fn worker_count(&self) -> usize {
        self.dispatcher.worker_count()
    }

    pub fn is_running(&self) -> bool {
        self.dispatcher.is_running()
    }

    /// Whether a handler is bound to `job_name`.
    pub fn handles(&self, job_name: &str) -> bool {
        self.pipeline.resolve(job_name).is_some()
    }

    /// Job names with a bound handler, sorted.
    pub fn job_names(&self) -> Vec<String> {
        self.pipeline.job_names()
    }

    pub fn stats(&self) -> WorkerPoolStats {
        WorkerPoolStats {
            id: self.id.clone(),
            namespace: self.namespace.clone(),
            concurrency: self.options.concurrency,
            running: self.is_running(),
            jobs_processed: self.dispatcher.jobs_processed(),
            jobs_failed: self.dispatcher.jobs_failed(),
        }
    }
}
