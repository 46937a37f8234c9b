//! Kestrel Jobs - Background Job Worker Framework
//!
//! A worker pool executing named jobs from a shared store with:
//! - A middleware chain around every handler, outermost interceptor first
//! - Standard logging and error-capture interceptors installed on every pool
//! - Panic recovery at the error-capture boundary, reported with a stack trace
//! - Pluggable monitoring sinks and worker contexts
//! - Redis and in-memory job stores with retry and dead sets
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                       Worker Pool                          │
//! │                                                            │
//! │   store ──► Dispatcher ──► Worker 1 .. Worker N            │
//! │                              │                             │
//! │                              ▼                             │
//! │   ┌──────────────────────────────────────────────────┐     │
//! │   │ log ─► capture_error ─► user middleware ─► handler│     │
//! │   └──────────────────────────────────────────────────┘     │
//! │                              │                             │
//! │              ┌───────────────┴──────────────┐              │
//! │              ▼                              ▼              │
//! │        complete / fail               ErrorReporter         │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use kestrel_jobs::prelude::*;
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryJobStore::new());
//! let mut pool = WorkerPool::new(BaseContext::default(), "app", store, [concurrency(4)]);
//!
//! pool.listen("send_email", |job: Job| async move {
//!     let to: Option<String> = job.arg("to")?;
//!     deliver(to).await
//! });
//!
//! pool.run().await?;
//! ```

pub mod config;
pub mod configurator;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod exception;
pub mod job;
pub mod metrics;
pub mod middleware;
pub mod monitoring;
pub mod pipeline;
pub mod pool;
pub mod retry;
pub mod signal;
pub mod store;
pub mod tags;

pub use config::{RedisConfig, WorkerConfig};
pub use configurator::{Configurator, PoolOptions};
pub use context::{BaseContext, CaptureErrorInterceptor, LogInterceptor, WorkerContext};
pub use dispatcher::Dispatcher;
pub use error::{JobError, JobResult};
pub use exception::{raise, Exception, GenericException, PanicReport};
pub use job::{Job, JobId};
pub use metrics::{register_metrics, JobMetrics, WorkerMetrics};
pub use middleware::{Handler, HandlerMap, Middleware, Next};
pub use monitoring::{ErrorReporter, Packet, PacketException, Stacktrace, TracingReporter};
pub use pipeline::Pipeline;
pub use pool::{WorkerPool, WorkerPoolStats};
pub use retry::{RetryPolicy, RetryStrategy};
pub use store::{create_pool, JobStore, MemoryJobStore, RedisJobStore};
pub use tags::Tags;

/// Re-export commonly used items
pub mod prelude {
    pub use crate::configurator::{concurrency, poll_interval};
    pub use crate::context::{BaseContext, WorkerContext};
    pub use crate::exception::{raise, Exception};
    pub use crate::middleware::{Middleware, Next};
    pub use crate::pool::WorkerPool;
    pub use crate::store::{JobStore, MemoryJobStore};
    pub use crate::{Job, JobError, JobResult, Tags};
}
