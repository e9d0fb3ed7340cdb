#![deny(unsafe_code)]

/// Chat domain: message log, stream splitting, deferred replies and rendering.
pub mod chat;
/// Submission entry point tying the log to the simulated backends.
pub mod session;
/// Settings persistence.
pub mod settings;
/// Line-based terminal front end.
pub mod shell;
