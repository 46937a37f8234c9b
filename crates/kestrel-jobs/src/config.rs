//! File-backed worker configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Redis connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis URL.
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_pool_size(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_pool_size() -> usize {
    10
}

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Prefix isolating this pool's queues from others on the same Redis.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Number of concurrent workers. Zero means the default of one.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Idle polling interval in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Failures after which a job is moved to the dead set.
    #[serde(default = "default_max_fails")]
    pub max_fails: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            concurrency: default_concurrency(),
            poll_interval_ms: default_poll_interval(),
            max_fails: default_max_fails(),
        }
    }
}

fn default_namespace() -> String {
    "kestrel".to_string()
}

fn default_concurrency() -> usize {
    1
}

fn default_poll_interval() -> u64 {
    100
}

fn default_max_fails() -> u32 {
    4
}

impl WorkerConfig {
    /// Returns poll interval as Duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
