//! Stable exit codes for deployer CLI commands.
//!
//! A fatal step whose child process exited with a non-zero code propagates that
//! code instead; these constants cover every other case.

/// Command succeeded (deployment completed, config written, plan valid).
pub const OK: i32 = 0;
/// Missing credential, invalid config, spawn failure, signal, timeout or I/O error.
pub const FAILURE: i32 = 1;
