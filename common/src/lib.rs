//! Shared plumbing for the workspace: tracing bootstrap, span helpers and
//! wall-clock utilities.

pub mod logger;
pub mod time;
