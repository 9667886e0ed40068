//! Process environment input: `.env` loading and the session credential.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::credential::{CredentialError, SessionId};

/// Default dotenv file, relative to the deployment root.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Load variables from a dotenv file into the process environment.
///
/// Variables already set in the environment take precedence. Returns `false`
/// when the file does not exist.
pub fn load_env_file(path: &Path) -> Result<bool> {
    match dotenvy::from_path(path) {
        Ok(()) => {
            debug!(path = %path.display(), "loaded env file");
            Ok(true)
        }
        Err(err) if err.not_found() => {
            debug!(path = %path.display(), "no env file");
            Ok(false)
        }
        Err(err) => Err(err).with_context(|| format!("load env file {}", path.display())),
    }
}

/// Read the session credential from the process environment.
pub fn session_from_env() -> Result<SessionId, CredentialError> {
    SessionId::from_lookup(|key| std::env::var(key).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_env_file_is_not_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let loaded = load_env_file(&temp.path().join(".env")).expect("load");
        assert!(!loaded);
    }

    #[test]
    fn env_file_populates_process_environment() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(".env");
        std::fs::write(&path, "DEPLOYER_ENV_FILE_TEST=loaded\n").expect("write");
        assert!(load_env_file(&path).expect("load"));
        assert_eq!(
            std::env::var("DEPLOYER_ENV_FILE_TEST").as_deref(),
            Ok("loaded")
        );
    }
}
