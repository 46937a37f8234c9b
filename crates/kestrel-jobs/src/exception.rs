//! Structured exceptions and panic payload classification.
//!
//! A handler can fail in three ways: return an error, panic with a value that
//! exposes a message and tags (a *classified* failure), or panic with anything
//! else (an *unclassified* failure). This module defines the classified shape
//! and turns arbitrary panic payloads into a message plus tag map.

use crate::tags::Tags;
use std::any::{type_name, Any};
use std::fmt;

/// Tag key marking an unclassified panic.
pub const EXCEPTIONS: &str = "exceptions";
/// Tag key holding the runtime type of an unclassified panic payload.
pub const TYPE: &str = "type";

/// A failure that knows how to describe itself to the monitoring sink.
pub trait GenericException: fmt::Debug + Send + Sync + 'static {
    /// Human readable message.
    fn message(&self) -> String;

    /// Tags to attach to the report.
    fn tags(&self) -> Tags;
}

/// Default structured exception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exception {
    message: String,
    tags: Tags,
}

impl Exception {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            tags: Tags::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key, value);
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags.merge(&tags);
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Exception {}

impl GenericException for Exception {
    fn message(&self) -> String {
        self.message.clone()
    }

    fn tags(&self) -> Tags {
        self.tags.clone()
    }
}

/// Panics with a classified exception.
///
/// The payload is boxed as `Box<dyn GenericException>` so the error-capture
/// interceptor can recover the message and tags of any implementor.
pub fn raise<E: GenericException>(exception: E) -> ! {
    let payload: Box<dyn GenericException> = Box::new(exception);
    std::panic::panic_any(payload)
}

/// A panic payload reduced to what the monitoring sink needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicReport {
    pub message: String,
    pub tags: Tags,
    pub classified: bool,
}

impl PanicReport {
    /// Classifies a payload caught at the recovery boundary.
    pub fn from_payload(payload: &(dyn Any + Send)) -> Self {
        if let Some(exception) = payload.downcast_ref::<Box<dyn GenericException>>() {
            return Self::classified(exception.message(), exception.tags());
        }
        if let Some(exception) = payload.downcast_ref::<Exception>() {
            return Self::classified(exception.message.clone(), exception.tags.clone());
        }

        let (message, payload_type) = if let Some(s) = payload.downcast_ref::<&'static str>() {
            ((*s).to_string(), type_name::<&'static str>())
        } else if let Some(s) = payload.downcast_ref::<String>() {
            (s.clone(), type_name::<String>())
        } else {
            ("Box<dyn Any>".to_string(), type_name::<Box<dyn Any + Send>>())
        };

        Self {
            message,
            tags: Tags::new()
                .with(EXCEPTIONS, "unknown")
                .with(TYPE, payload_type),
            classified: false,
        }
    }

    fn classified(message: String, tags: Tags) -> Self {
        Self {
            message,
            tags,
            classified: true,
        }
    }
}
