//! Job storage backends.
//!
//! A [`JobStore`] is the shared storage connection a worker pool pulls from.
//! The pool never owns it; several pools in different namespaces may share one.

mod memory;
pub mod redis;

pub use memory::MemoryJobStore;
pub use self::redis::{create_pool, RedisJobStore};

use crate::error::{JobError, JobResult};
use crate::job::Job;
use async_trait::async_trait;

/// Storage contract the dispatcher relies on.
#[async_trait]
pub trait JobStore: Send + Sync + 'static {
    /// Adds a job to the pending queue for its name.
    async fn enqueue(&self, namespace: &str, job: &Job) -> JobResult<()>;

    /// Takes the next pending job for any of `job_names`, marking it in progress.
    async fn fetch(&self, namespace: &str, job_names: &[String]) -> JobResult<Option<Job>>;

    /// Removes a successfully processed job.
    async fn complete(&self, namespace: &str, job: &Job) -> JobResult<()>;

    /// Records a failed attempt; the store decides between retry and dead.
    async fn fail(&self, namespace: &str, job: &Job, error: &JobError) -> JobResult<()>;
}

/// Key builder for a namespace.
#[derive(Debug, Clone)]
pub struct Keys {
    namespace: String,
}

impl Keys {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Pending list for one job name.
    pub fn jobs(&self, job_name: &str) -> String {
        format!("{}:jobs:{}", self.namespace, job_name)
    }

    /// In-progress hash (job id to payload) for one job name.
    pub fn in_progress(&self, job_name: &str) -> String {
        format!("{}:jobs:{}:inprogress", self.namespace, job_name)
    }

    /// Retry set scored by due time.
    pub fn retry(&self) -> String {
        format!("{}:retry", self.namespace)
    }

    /// Dead set scored by time of death.
    pub fn dead(&self) -> String {
        format!("{}:dead", self.namespace)
    }
}
