//! Monitoring sink contract.
//!
//! The error-capture interceptor is the only caller. Delivery (batching,
//! transport, retries) belongs to the [`ErrorReporter`] implementation.

mod stacktrace;

pub use stacktrace::{install_panic_hook, take_panic_trace, Stacktrace};

use crate::error::JobError;
use crate::tags::Tags;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

/// Prefix applied to every packet message.
pub const PACKET_PREFIX: &str = "Worker Error: ";

/// The exception carried inside a diagnostic packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PacketException {
    /// Exception message.
    pub value: String,

    /// Rendered stack frames, innermost first.
    pub stacktrace: Vec<String>,
}

/// A structured exception report sent to the monitoring sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Packet {
    pub message: String,
    pub exception: PacketException,
    pub timestamp: DateTime<Utc>,
}

impl Packet {
    /// Builds a packet wrapping `message` as a synthetic exception.
    pub fn new(message: &str, stacktrace: Stacktrace) -> Self {
        Self {
            message: format!("{PACKET_PREFIX}{message}"),
            exception: PacketException {
                value: message.to_string(),
                stacktrace: stacktrace.frames().to_vec(),
            },
            timestamp: Utc::now(),
        }
    }
}

/// Error-tracking service the worker pipeline reports into.
pub trait ErrorReporter: Send + Sync + 'static {
    /// Reports an ordinary (non-panic) job failure.
    fn capture_error(&self, error: &JobError, tags: &Tags);

    /// Reports a recovered panic.
    fn capture(&self, packet: Packet, tags: &Tags);

    /// Builds the diagnostic packet for a recovered panic.
    fn build_packet(&self, message: &str, stacktrace: Stacktrace) -> Packet {
        Packet::new(message, stacktrace)
    }
}

/// Sink that writes every report as a `tracing` debug event.
///
/// Used when no external error-tracking service is wired in. The
/// error-capture interceptor has already logged the failure at error level.
#[derive(Debug, Clone, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn capture_error(&self, error: &JobError, tags: &Tags) {
        debug!(
            target: "kestrel::monitoring",
            error = %error,
            tags = ?tags,
            "Captured job error"
        );
    }

    fn capture(&self, packet: Packet, tags: &Tags) {
        debug!(
            target: "kestrel::monitoring",
            message = %packet.message,
            frames = packet.exception.stacktrace.len(),
            tags = ?tags,
            "Captured job panic"
        );
    }
}
