//! I/O helpers for deployer commands.

pub mod config;
pub mod console;
pub mod env;
pub mod git;
pub mod process;
