//! The full chain a job runs through.

use crate::context::{standard_interceptors, WorkerContext};
use crate::error::JobResult;
use crate::job::Job;
use crate::middleware::{Handler, HandlerMap, Middleware, Next};
use std::sync::Arc;

/// Interceptors plus handlers, as installed on a pool.
///
/// Always starts with the context's logging and error-capture interceptors.
#[derive(Clone)]
pub struct Pipeline {
    context: Arc<dyn WorkerContext>,
    middleware: Vec<Arc<dyn Middleware>>,
    handlers: HandlerMap,
}

impl Pipeline {
    pub fn new(context: Arc<dyn WorkerContext>) -> Self {
        let middleware = standard_interceptors(&context).into_iter().collect();
        Self {
            context,
            middleware,
            handlers: HandlerMap::new(),
        }
    }

    /// Appends an interceptor after everything already installed.
    pub fn push(&mut self, middleware: Arc<dyn Middleware>) {
        self.middleware.push(middleware);
    }

    /// Binds a handler, returning the one it replaced.
    pub fn insert_handler(&mut self, job_name: String, handler: Arc<dyn Handler>) -> Option<Arc<dyn Handler>> {
        self.handlers.insert(job_name, handler)
    }

    /// Handler chosen by the context for a job name.
    pub fn resolve(&self, job_name: &str) -> Option<Arc<dyn Handler>> {
        self.context.resolve(&self.handlers, job_name)
    }

    /// Runs `job` through every interceptor and then `handler`.
    pub async fn run(&self, job: &Job, handler: &dyn Handler) -> JobResult<()> {
        Next::new(&self.middleware, handler).run(job).await
    }

    /// Registered job names, sorted.
    pub fn job_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Interceptors installed, including the two standard ones.
    pub fn middleware_count(&self) -> usize {
        self.middleware.len()
    }
}
