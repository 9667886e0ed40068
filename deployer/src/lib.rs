//! Deployment pipeline for a supervised application.
//!
//! The deployer fetches an application repository, writes its runtime
//! configuration, installs dependencies and starts (or reloads) the app under
//! a process supervisor. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (stages, step outcomes, the
//!   continue/abort policy, credential validation). No I/O.
//! - **[`io`]**: Side-effecting operations (filesystem, git, child processes,
//!   console output). Isolated behind traits to enable scripted fakes in tests.
//!
//! Orchestration modules ([`steps`], [`deploy`]) coordinate core logic with I/O
//! to implement the CLI commands.

pub mod core;
pub mod deploy;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod steps;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
