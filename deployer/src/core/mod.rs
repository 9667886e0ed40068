//! Deterministic, pure logic shared by the deployer.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! values and return deterministic outputs suitable for tests.

pub mod config_env;
pub mod credential;
pub mod policy;
pub mod stage;
pub mod types;
