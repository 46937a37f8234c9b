//! # Kestrel Worker Library
//!
//! Process-level wiring for the Kestrel worker: logging setup, the built-in
//! job handlers and startup output.

pub mod handlers;
pub mod logging;
pub mod startup;
