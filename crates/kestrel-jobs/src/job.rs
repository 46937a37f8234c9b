//! Job records flowing through the worker pipeline.

use crate::error::JobResult;
use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Unique job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Creates a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Returns the job ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One unit of work pulled from the queue.
///
/// The record is owned by the job store; handlers and middleware only ever see
/// it by reference or as a private clone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Job name, selects the handler.
    pub name: String,

    /// Unique per enqueued instance.
    pub id: JobId,

    /// Number of prior failed attempts.
    #[serde(rename = "fails", default)]
    pub fail_count: u32,

    /// Job arguments.
    #[serde(default)]
    pub args: Map<String, Value>,

    /// Unix timestamp (seconds) of the first enqueue.
    #[serde(rename = "t", default)]
    pub enqueued_at: i64,

    /// Error text of the last failed attempt.
    #[serde(rename = "err", default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Job {
    /// Creates a fresh job with a random id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: JobId::new(),
            fail_count: 0,
            args: Map::new(),
            enqueued_at: Utc::now().timestamp(),
            last_error: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<JobId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_fail_count(mut self, fail_count: u32) -> Self {
        self.fail_count = fail_count;
        self
    }

    /// Adds an argument.
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    /// Reads a typed argument. Missing keys yield `Ok(None)`.
    pub fn arg<T: DeserializeOwned>(&self, key: &str) -> JobResult<Option<T>> {
        match self.args.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> JobResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> JobResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
