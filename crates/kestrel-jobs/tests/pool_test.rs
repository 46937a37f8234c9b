//! Integration tests for the worker pool running against the in-memory store.

mod common;

use common::{capture_logs, eventually, within, RecordingReporter};
use kestrel_jobs::configurator::{concurrency, poll_interval};
use kestrel_jobs::{
    BaseContext, ErrorReporter, Handler, HandlerMap, Job, JobError, JobResult, JobStore, MemoryJobStore, WorkerContext,
    WorkerPool,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

const NS: &str = "test";

fn context(reporter: &Arc<RecordingReporter>) -> BaseContext {
    let sink: Arc<dyn ErrorReporter> = reporter.clone();
    BaseContext::new(sink)
}

fn fast() -> kestrel_jobs::Configurator {
    poll_interval(Duration::from_millis(5))
}

async fn smtp_timeout(_job: Job) -> JobResult<()> {
    panic!("smtp timeout")
}

async fn succeed(_job: Job) -> JobResult<()> {
    Ok(())
}

#[tokio::test]
async fn test_default_concurrency_is_one() {
    let reporter = RecordingReporter::new();
    let mut pool = WorkerPool::new(context(&reporter), NS, Arc::new(MemoryJobStore::new()), Vec::new());
    pool.listen("noop", succeed);

    assert_eq!(pool.concurrency(), 1);
    pool.start().unwrap();
    assert_eq!(pool.worker_count(), 1);
    pool.stop().await.unwrap();
}

#[tokio::test]
async fn test_configured_concurrency_spawns_that_many_workers() {
    let reporter = RecordingReporter::new();
    let mut pool = WorkerPool::new(
        context(&reporter),
        NS,
        Arc::new(MemoryJobStore::new()),
        [concurrency(2), concurrency(4)],
    );
    pool.listen("noop", succeed);

    pool.start().unwrap();
    assert_eq!(pool.worker_count(), 4);
    assert_eq!(pool.stats().concurrency, 4);

    within(pool.stop()).await.unwrap();
    assert_eq!(pool.worker_count(), 0);
}

#[tokio::test]
async fn test_start_twice_and_stop_idle_are_rejected() {
    let reporter = RecordingReporter::new();
    let mut pool = WorkerPool::new(context(&reporter), NS, Arc::new(MemoryJobStore::new()), Vec::new());

    assert!(matches!(pool.stop().await, Err(JobError::NotRunning)));

    pool.start().unwrap();
    assert!(matches!(pool.start(), Err(JobError::AlreadyRunning)));
    assert_eq!(pool.worker_count(), 1);

    pool.stop().await.unwrap();
    assert!(!pool.is_running());
}

#[tokio::test]
async fn test_second_listen_replaces_first_handler() {
    let reporter = RecordingReporter::new();
    let store = Arc::new(MemoryJobStore::new());
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));

    let mut pool = WorkerPool::new(context(&reporter), NS, store.clone(), [fast()]);
    for counter in [first.clone(), second.clone()] {
        pool.listen("greet", move |_job: Job| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), JobError>(())
            }
        });
    }
    assert_eq!(pool.job_names(), vec!["greet".to_string()]);

    store.enqueue(NS, &Job::new("greet")).await.unwrap();
    pool.start().unwrap();
    assert!(eventually(|| store.completed() == 1).await);
    pool.stop().await.unwrap();

    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_panicking_job_is_reported_and_pool_keeps_working() {
    let (logs, _guard) = capture_logs();
    let reporter = RecordingReporter::new();
    let store = Arc::new(MemoryJobStore::new());

    let mut pool = WorkerPool::new(context(&reporter), NS, store.clone(), [fast()]);
    pool.listen("send_email", smtp_timeout).listen("welcome", succeed);

    let job = Job::new("send_email").with_id("abc123");
    store.enqueue(NS, &job).await.unwrap();
    pool.start().unwrap();

    assert!(eventually(|| reporter.packets().len() == 1).await);
    assert!(eventually(|| store.retrying(NS).len() == 1).await);

    assert_eq!(logs.count(Level::INFO, "Starting job"), 1);
    assert_eq!(logs.count(Level::ERROR, "PANIC"), 1);

    let (packet, tags) = &reporter.packets()[0];
    assert_eq!(packet.message, "Worker Error: smtp timeout");
    assert_eq!(tags.get("job"), Some("send_email"));
    assert_eq!(tags.get("job_id"), Some("abc123"));
    assert_eq!(tags.get("exceptions"), Some("unknown"));

    let retry = &store.retrying(NS)[0];
    assert_eq!(retry.fail_count, 1);
    assert_eq!(retry.last_error.as_deref(), Some("Job panicked: smtp timeout"));

    store.enqueue(NS, &Job::new("welcome")).await.unwrap();
    assert!(eventually(|| store.completed() == 1).await);

    within(pool.stop()).await.unwrap();
    let stats = pool.stats();
    assert_eq!(stats.jobs_processed, 1);
    assert_eq!(stats.jobs_failed, 1);
}

#[tokio::test]
async fn test_stop_drains_in_flight_job_and_stops_pickup() {
    let reporter = RecordingReporter::new();
    let store = Arc::new(MemoryJobStore::new());
    let started = Arc::new(AtomicUsize::new(0));

    let mut pool = WorkerPool::new(context(&reporter), NS, store.clone(), [fast()]);
    let handler_started = started.clone();
    pool.listen("slow", move |_job: Job| {
        let started = handler_started.clone();
        async move {
            started.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<(), JobError>(())
        }
    });

    store.enqueue(NS, &Job::new("slow")).await.unwrap();
    store.enqueue(NS, &Job::new("slow")).await.unwrap();
    pool.start().unwrap();

    assert!(eventually(|| started.load(Ordering::SeqCst) == 1).await);
    within(pool.stop()).await.unwrap();

    assert_eq!(store.completed(), 1);
    assert_eq!(store.in_progress(), 0);
    assert_eq!(store.pending(NS, "slow"), 1);
}

#[tokio::test]
async fn test_run_until_processes_then_returns() {
    let reporter = RecordingReporter::new();
    let store = Arc::new(MemoryJobStore::new());
    let mut pool = WorkerPool::new(context(&reporter), NS, store.clone(), [fast(), concurrency(2)]);
    pool.listen("welcome", succeed);

    for _ in 0..3 {
        store.enqueue(NS, &Job::new("welcome")).await.unwrap();
    }

    let watched = store.clone();
    within(pool.run_until(async move {
        eventually(|| watched.completed() == 3).await;
    }))
    .await
    .unwrap();

    assert!(!pool.is_running());
    assert_eq!(pool.stats().jobs_processed, 3);
}

/// Context that refuses to resolve any handler.
struct Paused {
    reporter: Arc<RecordingReporter>,
}

impl WorkerContext for Paused {
    fn reporter(&self) -> &dyn ErrorReporter {
        self.reporter.as_ref()
    }

    fn resolve(&self, _handlers: &HandlerMap, _job_name: &str) -> Option<std::sync::Arc<dyn Handler>> {
        None
    }
}

#[tokio::test]
async fn test_unresolved_job_fails_without_running_chain() {
    let (logs, _guard) = capture_logs();
    let reporter = RecordingReporter::new();
    let store = Arc::new(MemoryJobStore::new());

    let paused = Paused {
        reporter: reporter.clone(),
    };
    let mut pool = WorkerPool::new(paused, NS, store.clone(), [fast()]);
    pool.listen("welcome", succeed);

    store.enqueue(NS, &Job::new("welcome")).await.unwrap();
    pool.start().unwrap();
    assert!(eventually(|| store.dead(NS).len() == 1).await);
    pool.stop().await.unwrap();

    assert_eq!(logs.count(Level::INFO, "Starting job"), 0);
    assert_eq!(reporter.total(), 0);
    assert_eq!(
        store.dead(NS)[0].last_error.as_deref(),
        Some("No handler registered for job: welcome")
    );
}

/// Sink that fails while reporting.
struct BrokenSink;

impl ErrorReporter for BrokenSink {
    fn capture_error(&self, _error: &JobError, _tags: &kestrel_jobs::Tags) {
        panic!("sink unavailable")
    }

    fn capture(&self, _packet: kestrel_jobs::Packet, _tags: &kestrel_jobs::Tags) {
        panic!("sink unavailable")
    }
}

async fn mailbox_full(_job: Job) -> JobResult<()> {
    Err(JobError::failed("mailbox full"))
}

#[tokio::test]
async fn test_panicking_sink_does_not_kill_worker() {
    let (logs, _guard) = capture_logs();
    let store = Arc::new(MemoryJobStore::new());
    let sink: Arc<dyn ErrorReporter> = Arc::new(BrokenSink);

    let mut pool = WorkerPool::new(BaseContext::new(sink), NS, store.clone(), [fast()]);
    pool.listen("bounce", mailbox_full)
        .listen("send_email", smtp_timeout)
        .listen("welcome", succeed);

    store.enqueue(NS, &Job::new("bounce")).await.unwrap();
    store.enqueue(NS, &Job::new("send_email")).await.unwrap();
    pool.start().unwrap();
    assert!(eventually(|| store.retrying(NS).len() == 2).await);

    store.enqueue(NS, &Job::new("welcome")).await.unwrap();
    assert!(eventually(|| store.completed() == 1).await);
    assert_eq!(store.in_progress(), 0);
    assert_eq!(pool.worker_count(), 1);

    let last_errors: Vec<_> = store.retrying(NS).into_iter().filter_map(|job| job.last_error).collect();
    assert!(last_errors.iter().all(|e| e == "Job panicked: sink unavailable"));
    assert_eq!(logs.count(Level::ERROR, "outside the error-capture interceptor"), 2);

    within(pool.stop()).await.unwrap();
    let stats = pool.stats();
    assert_eq!(stats.jobs_processed, 1);
    assert_eq!(stats.jobs_failed, 2);
}
