//! Tag maps attached to monitoring reports.

use crate::job::Job;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tag key holding the job name.
pub const JOB: &str = "job";
/// Tag key holding the job id.
pub const JOB_ID: &str = "job_id";
/// Tag key holding the prior failure count.
pub const FAILS: &str = "fails";

/// String-to-string tags used to correlate a failure report with its job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(BTreeMap<String, String>);

impl Tags {
    /// Creates an empty tag map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a tag, replacing any previous value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Returns the value for a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns true if the key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Merges another tag map in; its values win on conflict.
    pub fn merge(&mut self, other: &Tags) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Stamps the job identity (`job`, `job_id`, `fails`) onto the map.
    pub fn tag_job(&mut self, job: &Job) {
        self.insert(JOB, job.name.as_str());
        self.insert(JOB_ID, job.id.as_str());
        self.insert(FAILS, job.fail_count.to_string());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
