//! Redis-backed job store.

use super::{JobStore, Keys};
use crate::config::RedisConfig;
use crate::error::{JobError, JobResult};
use crate::job::Job;
use crate::metrics::JobMetrics;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use deadpool_redis::{Config, Pool, Runtime};
use redis::{AsyncCommands, Script};
use tracing::{debug, error, info, warn};

/// Pops the oldest pending job and parks it in the in-progress hash.
///
/// Payloads without a string `id` are returned but not parked.
const FETCH_SCRIPT: &str = r"
local payload = redis.call('RPOP', KEYS[1])
if not payload then
  return false
end
local ok, job = pcall(cjson.decode, payload)
if ok and type(job) == 'table' and type(job['id']) == 'string' then
  redis.call('HSET', KEYS[2], job['id'], payload)
end
return payload
";

/// Moves one payload from the retry set to a pending list if still present.
const PROMOTE_SCRIPT: &str = r"
if redis.call('ZREM', KEYS[1], ARGV[1]) == 1 then
  redis.call('LPUSH', KEYS[2], ARGV[1])
  return 1
end
return 0
";

/// Create a Redis connection pool.
pub async fn create_pool(config: &RedisConfig) -> JobResult<Pool> {
    info!("Creating Redis connection pool for job store...");

    let cfg = Config::from_url(&config.url);

    let pool = cfg
        .builder()
        .map_err(|e| JobError::Configuration(format!("Invalid Redis config: {}", e)))?
        .max_size(config.pool_size)
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| JobError::Configuration(format!("Failed to create pool: {}", e)))?;

    // Test connection
    let mut conn = pool.get().await?;
    redis::cmd("PING").query_async::<String>(&mut *conn).await?;

    info!("Redis connection pool created successfully");

    Ok(pool)
}

/// Job store on a shared Redis pool.
///
/// Pending jobs live in one list per job name (`LPUSH` to enqueue, `RPOP` to
/// fetch). Fetched jobs are parked in a per-name hash until completed or
/// failed. Failed jobs go to a retry sorted set scored by due time, or to the
/// dead set once the retry policy gives up.
#[derive(Clone)]
pub struct RedisJobStore {
    pool: Pool,
    policy: RetryPolicy,
    fetch_script: Script,
    promote_script: Script,
}

impl RedisJobStore {
    pub fn new(pool: Pool) -> Self {
        Self::with_policy(pool, RetryPolicy::default())
    }

    pub fn with_policy(pool: Pool, policy: RetryPolicy) -> Self {
        Self {
            pool,
            policy,
            fetch_script: Script::new(FETCH_SCRIPT),
            promote_script: Script::new(PROMOTE_SCRIPT),
        }
    }

    async fn conn(&self) -> JobResult<deadpool_redis::Connection> {
        Ok(self.pool.get().await?)
    }

    /// Moves retries whose due time has passed back onto their pending lists.
    pub async fn promote_due(&self, namespace: &str) -> JobResult<u64> {
        let keys = Keys::new(namespace);
        let mut conn = self.conn().await?;
        let now = Utc::now().timestamp_millis();

        let due: Vec<String> = conn.zrangebyscore(keys.retry(), 0i64, now).await?;
        let mut moved = 0u64;

        for job_json in due {
            match Job::from_json(&job_json) {
                Ok(job) => {
                    let promoted: u64 = self
                        .promote_script
                        .key(keys.retry())
                        .key(keys.jobs(&job.name))
                        .arg(&job_json)
                        .invoke_async(&mut *conn)
                        .await?;
                    // Another worker promoted it first.
                    if promoted == 0 {
                        continue;
                    }
                    moved += 1;
                    debug!(job = %job.name, job_id = %job.id, "Promoted retry to pending");
                }
                Err(e) => {
                    error!(error = %e, "Dropping undecodable job from retry set");
                    let _: () = conn.zrem(keys.retry(), &job_json).await?;
                }
            }
        }

        Ok(moved)
    }

    /// Number of pending jobs for a job name.
    pub async fn pending(&self, namespace: &str, job_name: &str) -> JobResult<u64> {
        let mut conn = self.conn().await?;
        Ok(conn.llen(Keys::new(namespace).jobs(job_name)).await?)
    }

    /// Number of dead jobs in a namespace.
    pub async fn dead_count(&self, namespace: &str) -> JobResult<u64> {
        let mut conn = self.conn().await?;
        Ok(conn.zcard(Keys::new(namespace).dead()).await?)
    }

    /// Number of jobs waiting for a retry in a namespace.
    pub async fn retry_count(&self, namespace: &str) -> JobResult<u64> {
        let mut conn = self.conn().await?;
        Ok(conn.zcard(Keys::new(namespace).retry()).await?)
    }

    /// Number of jobs currently marked in progress for a job name.
    pub async fn in_progress(&self, namespace: &str, job_name: &str) -> JobResult<u64> {
        let mut conn = self.conn().await?;
        Ok(conn.hlen(Keys::new(namespace).in_progress(job_name)).await?)
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn enqueue(&self, namespace: &str, job: &Job) -> JobResult<()> {
        let keys = Keys::new(namespace);
        let mut conn = self.conn().await?;
        let _: () = conn.lpush(keys.jobs(&job.name), job.to_json()?).await?;

        JobMetrics::job_enqueued(namespace, &job.name);
        debug!(job = %job.name, job_id = %job.id, namespace = %namespace, "Enqueued job");
        Ok(())
    }

    async fn fetch(&self, namespace: &str, job_names: &[String]) -> JobResult<Option<Job>> {
        self.promote_due(namespace).await?;

        let keys = Keys::new(namespace);
        let mut conn = self.conn().await?;

        for name in job_names {
            let popped: Option<String> = self
                .fetch_script
                .key(keys.jobs(name))
                .key(keys.in_progress(name))
                .invoke_async(&mut *conn)
                .await?;
            let Some(job_json) = popped else {
                continue;
            };

            match Job::from_json(&job_json) {
                Ok(job) => return Ok(Some(job)),
                Err(e) => {
                    error!(job = %name, error = %e, "Failed to deserialize job, moving to dead set");
                    let now = Utc::now().timestamp_millis();
                    let _: () = conn.zadd(keys.dead(), &job_json, now).await?;
                }
            }
        }

        Ok(None)
    }

    async fn complete(&self, namespace: &str, job: &Job) -> JobResult<()> {
        let keys = Keys::new(namespace);
        let mut conn = self.conn().await?;
        let _: () = conn.hdel(keys.in_progress(&job.name), job.id.as_str()).await?;
        Ok(())
    }

    async fn fail(&self, namespace: &str, job: &Job, error: &JobError) -> JobResult<()> {
        let keys = Keys::new(namespace);
        let mut conn = self.conn().await?;

        let mut failed = job.clone();
        failed.fail_count += 1;
        failed.last_error = Some(error.to_string());
        let failed_json = failed.to_json()?;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .hdel(keys.in_progress(&job.name), job.id.as_str())
            .ignore();

        if error.is_retryable() && self.policy.should_retry(failed.fail_count) {
            let delay = self.policy.delay_for(failed.fail_count);
            let due = Utc::now() + ChronoDuration::from_std(delay).unwrap_or_default();
            pipe.zadd(keys.retry(), &failed_json, due.timestamp_millis()).ignore();
            let _: () = pipe.query_async(&mut *conn).await?;

            JobMetrics::job_retried(namespace, &job.name, failed.fail_count);
            debug!(job = %job.name, job_id = %job.id, fails = failed.fail_count, retry_at = %due, "Scheduled job retry");
        } else {
            let now = Utc::now().timestamp_millis();
            pipe.zadd(keys.dead(), &failed_json, now).ignore();
            let _: () = pipe.query_async(&mut *conn).await?;

            JobMetrics::job_dead(namespace, &job.name);
            warn!(job = %job.name, job_id = %job.id, fails = failed.fail_count, error = %error, "Moved job to dead set");
        }

        Ok(())
    }
}
