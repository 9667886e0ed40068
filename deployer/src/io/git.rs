//! Git adapter for the fetch and update steps.
//!
//! Only `clone` and `pull` are needed, so we keep a small, explicit wrapper
//! that builds [`CommandSpec`]s rather than spawning directly.

use std::path::PathBuf;

use crate::io::process::CommandSpec;

/// Builds git invocations rooted at a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// `git clone <url> <dest>`, run from the working directory so the clone
    /// lands at `<workdir>/<dest>`.
    pub fn clone_into(&self, url: &str, dest: &str) -> CommandSpec {
        CommandSpec::new("git", &self.workdir)
            .arg("clone")
            .arg(url)
            .arg(dest)
    }

    /// `git pull` inside the working directory.
    pub fn pull(&self) -> CommandSpec {
        CommandSpec::new("git", &self.workdir).arg("pull")
    }
}
