//! In-process job store.

use super::{JobStore, Keys};
use crate::error::{JobError, JobResult};
use crate::job::Job;
use crate::metrics::JobMetrics;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Default)]
struct State {
    /// Pending jobs, keyed like the Redis pending lists.
    pending: HashMap<String, VecDeque<Job>>,

    /// In-progress jobs keyed by (in-progress key, job id).
    in_progress: HashMap<(String, String), Job>,

    /// Jobs waiting for a retry, with their due time and pending key.
    retry: Vec<(Instant, String, Job)>,

    /// Dead jobs keyed by namespace.
    dead: HashMap<String, Vec<Job>>,

    completed: u64,
}

/// Job store holding everything in memory.
///
/// Mirrors [`RedisJobStore`](super::RedisJobStore) semantics and is used for
/// tests and single-process setups.
pub struct MemoryJobStore {
    state: Mutex<State>,
    policy: RetryPolicy,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::with_policy(RetryPolicy::default())
    }

    pub fn with_policy(policy: RetryPolicy) -> Self {
        Self {
            state: Mutex::new(State::default()),
            policy,
        }
    }

    /// Number of pending jobs for a job name.
    pub fn pending(&self, namespace: &str, job_name: &str) -> usize {
        let key = Keys::new(namespace).jobs(job_name);
        self.state.lock().pending.get(&key).map_or(0, VecDeque::len)
    }

    /// Number of jobs currently marked in progress.
    pub fn in_progress(&self) -> usize {
        self.state.lock().in_progress.len()
    }

    /// Jobs waiting for a retry in a namespace.
    pub fn retrying(&self, namespace: &str) -> Vec<Job> {
        let keys = Keys::new(namespace);
        self.state
            .lock()
            .retry
            .iter()
            .filter(|(_, key, job)| *key == keys.jobs(&job.name))
            .map(|(_, _, job)| job.clone())
            .collect()
    }

    /// Dead jobs in a namespace.
    pub fn dead(&self, namespace: &str) -> Vec<Job> {
        self.state.lock().dead.get(namespace).cloned().unwrap_or_default()
    }

    /// Total jobs completed across namespaces.
    pub fn completed(&self) -> u64 {
        self.state.lock().completed
    }

    fn promote_due(state: &mut State) {
        let now = Instant::now();
        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut state.retry)
            .into_iter()
            .partition(|(at, _, _)| *at <= now);
        state.retry = waiting;

        for (_, key, job) in due {
            debug!(job = %job.name, job_id = %job.id, "Promoted retry to pending");
            state.pending.entry(key).or_default().push_back(job);
        }
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn enqueue(&self, namespace: &str, job: &Job) -> JobResult<()> {
        let key = Keys::new(namespace).jobs(&job.name);
        self.state.lock().pending.entry(key).or_default().push_back(job.clone());
        JobMetrics::job_enqueued(namespace, &job.name);
        Ok(())
    }

    async fn fetch(&self, namespace: &str, job_names: &[String]) -> JobResult<Option<Job>> {
        let keys = Keys::new(namespace);
        let mut state = self.state.lock();
        Self::promote_due(&mut state);

        for name in job_names {
            let next = state.pending.get_mut(&keys.jobs(name)).and_then(VecDeque::pop_front);
            if let Some(job) = next {
                state
                    .in_progress
                    .insert((keys.in_progress(name), job.id.to_string()), job.clone());
                return Ok(Some(job));
            }
        }

        Ok(None)
    }

    async fn complete(&self, namespace: &str, job: &Job) -> JobResult<()> {
        let key = (Keys::new(namespace).in_progress(&job.name), job.id.to_string());
        let mut state = self.state.lock();
        state.in_progress.remove(&key);
        state.completed += 1;
        Ok(())
    }

    async fn fail(&self, namespace: &str, job: &Job, error: &JobError) -> JobResult<()> {
        let keys = Keys::new(namespace);
        let mut failed = job.clone();
        failed.fail_count += 1;
        failed.last_error = Some(error.to_string());

        let mut state = self.state.lock();
        state
            .in_progress
            .remove(&(keys.in_progress(&job.name), job.id.to_string()));

        if error.is_retryable() && self.policy.should_retry(failed.fail_count) {
            let due = Instant::now() + self.policy.delay_for(failed.fail_count);
            JobMetrics::job_retried(namespace, &job.name, failed.fail_count);
            state.retry.push((due, keys.jobs(&job.name), failed));
        } else {
            warn!(job = %job.name, job_id = %job.id, error = %error, "Moved job to dead set");
            JobMetrics::job_dead(namespace, &job.name);
            state.dead.entry(namespace.to_string()).or_default().push(failed);
        }

        Ok(())
    }
}
