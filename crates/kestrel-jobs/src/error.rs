//! Job error types.

use crate::exception::Exception;
use crate::tags::Tags;
use thiserror::Error;

/// Result type for job operations.
pub type JobResult<T> = Result<T, JobError>;

/// Job-related errors.
#[derive(Debug, Error)]
pub enum JobError {
    /// Job execution failed.
    #[error("Job execution failed: {0}")]
    Failed(String),

    /// Job failed with a structured exception carrying its own tags.
    #[error("{0}")]
    Exception(Exception),

    /// Job panicked and a worker recovered the panic.
    #[error("Job panicked: {message}")]
    Panicked { message: String },

    /// No handler is registered for the job name.
    #[error("No handler registered for job: {0}")]
    UnknownJob(String),

    /// Worker pool was started twice.
    #[error("Worker pool already running")]
    AlreadyRunning,

    /// Worker pool was stopped without being started.
    #[error("Worker pool is not running")]
    NotRunning,

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Redis error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Redis pool error.
    #[error("Redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl JobError {
    /// Convenience constructor for an ordinary execution failure.
    pub fn failed(message: impl Into<String>) -> Self {
        JobError::Failed(message.into())
    }

    /// Tags carried by the error itself, if any.
    pub fn tags(&self) -> Option<&Tags> {
        match self {
            JobError::Exception(exception) => Some(exception.tags()),
            _ => None,
        }
    }

    /// Returns true if the queue engine should schedule another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            JobError::Failed(_)
                | JobError::Exception(_)
                | JobError::Panicked { .. }
                | JobError::Redis(_)
                | JobError::Pool(_)
                | JobError::Internal(_)
        )
    }
}

impl From<Exception> for JobError {
    fn from(exception: Exception) -> Self {
        JobError::Exception(exception)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_is_retryable() {
        assert!(JobError::failed("smtp down").is_retryable());
    }

    #[test]
    fn test_panicked_is_retryable() {
        let err = JobError::Panicked {
            message: "boom".into(),
        };
        assert!(err.is_retryable());
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_unknown_job_is_not_retryable() {
        let err = JobError::UnknownJob("resize_image".into());
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("resize_image"));
    }

    #[test]
    fn test_exception_exposes_tags() {
        let err: JobError = Exception::new("quota exceeded").with_tag("tenant", "acme").into();
        let tags = err.tags().expect("exception carries tags");
        assert_eq!(tags.get("tenant"), Some("acme"));
        assert_eq!(err.to_string(), "quota exceeded");
    }

    #[test]
    fn test_plain_errors_have_no_tags() {
        assert!(JobError::failed("nope").tags().is_none());
        assert!(JobError::AlreadyRunning.tags().is_none());
    }
}
