//! Job handlers and the middleware chain around them.

use crate::error::JobResult;
use crate::job::Job;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Terminal step of the chain: the code that actually processes a job.
///
/// Any `Fn(Job) -> impl Future<Output = JobResult<()>>` is a handler.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, job: Job) -> BoxFuture<'static, JobResult<()>>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Job) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = JobResult<()>> + Send + 'static,
{
    fn call(&self, job: Job) -> BoxFuture<'static, JobResult<()>> {
        Box::pin(self(job))
    }
}

/// Handlers keyed by job name.
pub type HandlerMap = HashMap<String, Arc<dyn Handler>>;

/// Interceptor wrapping the rest of the chain.
///
/// Implementations may act before and/or after calling `next.run(job)`, or
/// short-circuit by returning without calling it.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn handle(&self, job: &Job, next: Next<'_>) -> JobResult<()>;
}

/// The rest of the chain, as seen from an interceptor.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    chain: &'a [Arc<dyn Middleware>],
    handler: &'a dyn Handler,
}

impl<'a> Next<'a> {
    pub(crate) fn new(chain: &'a [Arc<dyn Middleware>], handler: &'a dyn Handler) -> Self {
        Self { chain, handler }
    }

    /// Invokes the remaining interceptors and finally the handler.
    ///
    /// Nothing runs until the returned future is polled, so a recovery
    /// boundary wrapped around it also covers a synchronous panic in the
    /// handler itself.
    pub fn run(self, job: &'a Job) -> BoxFuture<'a, JobResult<()>> {
        Box::pin(async move {
            match self.chain.split_first() {
                Some((current, rest)) => current.handle(job, Next::new(rest, self.handler)).await,
                None => self.handler.call(job.clone()).await,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JobError;
    use parking_lot::Mutex;

    struct Trace {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Middleware for Trace {
        async fn handle(&self, job: &Job, next: Next<'_>) -> JobResult<()> {
            self.log.lock().push(format!("{}:before", self.label));
            let result = next.run(job).await;
            self.log.lock().push(format!("{}:after", self.label));
            result
        }
    }

    struct Deny;

    #[async_trait]
    impl Middleware for Deny {
        async fn handle(&self, job: &Job, _next: Next<'_>) -> JobResult<()> {
            Err(JobError::failed(format!("{} denied", job.name)))
        }
    }

    #[tokio::test]
    async fn test_chain_runs_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(Trace { label: "outer", log: log.clone() }),
            Arc::new(Trace { label: "inner", log: log.clone() }),
        ];
        let handler_log = log.clone();
        let handler = move |_job: Job| {
            let log = handler_log.clone();
            async move {
                log.lock().push("handler".to_string());
                Ok::<(), JobError>(())
            }
        };

        let job = Job::new("ordered");
        Next::new(&chain, &handler).run(&job).await.unwrap();

        assert_eq!(
            *log.lock(),
            vec!["outer:before", "inner:before", "handler", "inner:after", "outer:after"]
        );
    }

    #[tokio::test]
    async fn test_interceptor_can_short_circuit() {
        let chain: Vec<Arc<dyn Middleware>> = vec![Arc::new(Deny)];
        let handler = |_job: Job| async {
            let outcome: JobResult<()> = Err(JobError::failed("handler ran"));
            outcome
        };

        let job = Job::new("blocked");
        let err = Next::new(&chain, &handler).run(&job).await.unwrap_err();
        assert!(err.to_string().contains("blocked denied"));
    }
}
