//! ComfyUI backend protocol plumbing.
//!
//! REST wrappers for graph submission and queue control, a WebSocket
//! client for the progress channel, typed message parsing, a bounded
//! completion wait, and a startup readiness probe.

pub mod api;
pub mod client;
pub mod execution;
pub mod messages;
pub mod startup;
