//! Construction-time pool options.

use crate::config::WorkerConfig;
use std::time::Duration;

/// Options a worker pool is built with.
///
/// Set only through [`Configurator`]s at construction; fixed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOptions {
    /// Concurrent workers. Zero means unset and becomes one.
    pub concurrency: usize,

    /// How long an idle worker waits before polling the store again.
    pub poll_interval: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            concurrency: 0,
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl PoolOptions {
    /// Applies configurators in order, then fills defaults.
    pub fn configure(configurators: impl IntoIterator<Item = Configurator>) -> Self {
        let mut options = Self::default();
        for configure in configurators {
            configure(&mut options);
        }
        if options.concurrency == 0 {
            options.concurrency = 1;
        }
        options
    }
}

/// A function overriding pool defaults at construction time.
pub type Configurator = Box<dyn FnOnce(&mut PoolOptions) + Send>;

/// Sets the number of concurrent workers.
pub fn concurrency(workers: usize) -> Configurator {
    Box::new(move |options| options.concurrency = workers)
}

/// Sets the idle polling interval.
pub fn poll_interval(interval: Duration) -> Configurator {
    Box::new(move |options| options.poll_interval = interval)
}

/// Applies the file-backed worker settings.
pub fn from_config(config: &WorkerConfig) -> Configurator {
    let workers = config.concurrency;
    let interval = config.poll_interval();
    Box::new(move |options| {
        options.concurrency = workers;
        options.poll_interval = interval;
    })
}
