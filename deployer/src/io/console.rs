//! Operator-facing status lines.
//!
//! These are the deployer's product output: emoji-prefixed progress lines,
//! always printed regardless of `RUST_LOG`. Not machine-parseable.

/// Sink for console status lines.
pub trait Console {
    /// Progress and informational lines (stdout).
    fn status(&self, line: &str);
    /// Tolerated failures (stderr).
    fn warn(&self, line: &str);
    /// Fatal failures (stderr).
    fn error(&self, line: &str);
}

/// Console writing to the process's stdout/stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdConsole;

impl Console for StdConsole {
    fn status(&self, line: &str) {
        println!("{line}");
    }

    fn warn(&self, line: &str) {
        eprintln!("{line}");
    }

    fn error(&self, line: &str) {
        eprintln!("{line}");
    }
}
