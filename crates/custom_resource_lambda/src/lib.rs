//! Lambda-side lifecycle engine for custom resources.
//!
//! `custom_resource_core` defines the protocol; this crate runs it: the
//! dispatcher and its timeout watchdog, response delivery over HTTP, and the
//! EventBridge trigger that drives polling. [`runtime::run`] wires those
//! pieces to `lambda_runtime` for a binary that only supplies handlers.

pub mod adapters;
pub mod config;
pub mod lifecycle;
pub mod logging;
pub mod runtime;
