//! Shared helpers for worker pool integration tests.

#![allow(dead_code)]

use kestrel_jobs::{create_pool, ErrorReporter, JobError, Packet, RedisConfig, Tags};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use testcontainers::{runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::redis::{Redis, REDIS_PORT};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// Monitoring sink that keeps every report for assertions.
#[derive(Default)]
pub struct RecordingReporter {
    errors: Mutex<Vec<(String, Tags)>>,
    packets: Mutex<Vec<(Packet, Tags)>>,
}

impl RecordingReporter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn errors(&self) -> Vec<(String, Tags)> {
        self.errors.lock().clone()
    }

    pub fn packets(&self) -> Vec<(Packet, Tags)> {
        self.packets.lock().clone()
    }

    pub fn total(&self) -> usize {
        self.errors.lock().len() + self.packets.lock().len()
    }
}

impl ErrorReporter for RecordingReporter {
    fn capture_error(&self, error: &JobError, tags: &Tags) {
        self.errors.lock().push((error.to_string(), tags.clone()));
    }

    fn capture(&self, packet: Packet, tags: &Tags) {
        self.packets.lock().push((packet, tags.clone()));
    }
}

/// A recorded log event.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub level: Level,
    pub target: String,
    pub message: String,
}

/// Log lines recorded by [`capture_logs`].
#[derive(Clone, Default)]
pub struct Logs(Arc<Mutex<Vec<LogLine>>>);

impl Logs {
    pub fn lines(&self) -> Vec<LogLine> {
        self.0.lock().clone()
    }

    /// Lines at `level` whose message contains `needle`.
    pub fn count(&self, level: Level, needle: &str) -> usize {
        self.0
            .lock()
            .iter()
            .filter(|line| line.level == level && line.message.contains(needle))
            .count()
    }

    /// All lines at `level`.
    pub fn at(&self, level: Level) -> usize {
        self.0.lock().iter().filter(|line| line.level == level).count()
    }
}

struct CaptureLayer {
    logs: Logs,
}

#[derive(Default)]
struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.logs.0.lock().push(LogLine {
            level: *metadata.level(),
            target: metadata.target().to_string(),
            message: visitor.0,
        });
    }
}

/// Installs a log recorder for the current thread.
///
/// Pair with the current-thread runtime so spawned workers log into it too.
pub fn capture_logs() -> (Logs, tracing::subscriber::DefaultGuard) {
    let logs = Logs::default();
    let subscriber = tracing_subscriber::registry().with(CaptureLayer { logs: logs.clone() });
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}

/// Polls `condition` until it holds or two seconds pass.
pub async fn eventually<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Runs `future` to completion with a five second ceiling.
pub async fn within<F: Future>(future: F) -> F::Output {
    match tokio::time::timeout(Duration::from_secs(5), future).await {
        Ok(output) => output,
        Err(_) => panic!("timed out"),
    }
}

/// Redis container wrapper.
///
/// Starts a throwaway Redis and hands out connection pools to it.
/// Requires Docker to be available on the system.
pub struct TestRedis {
    _container: ContainerAsync<Redis>,
    config: RedisConfig,
}

impl TestRedis {
    pub async fn new() -> Self {
        let container = Redis::default()
            .start()
            .await
            .expect("Failed to start Redis container");

        let port = container
            .get_host_port_ipv4(REDIS_PORT)
            .await
            .expect("Failed to get Redis port");

        let config = RedisConfig {
            url: format!("redis://127.0.0.1:{}", port),
            pool_size: 4,
        };

        Self {
            _container: container,
            config,
        }
    }

    /// Connects a fresh pool, retrying while the server boots.
    pub async fn pool(&self) -> deadpool_redis::Pool {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match create_pool(&self.config).await {
                Ok(pool) => return pool,
                Err(e) => {
                    if attempts >= 30 {
                        panic!("Failed to connect to Redis after {} attempts: {}", attempts, e);
                    }
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
            }
        }
    }
}
