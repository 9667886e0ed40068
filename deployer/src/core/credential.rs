//! Session credential passed through to the deployed application.

use std::fmt;

/// Environment variable holding the session credential.
pub const SESSION_ID_VAR: &str = "SESSION_ID";

/// Why a credential was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialError {
    /// Variable unset or empty.
    Missing,
    /// Value contains a line break and would corrupt the two-line config file.
    MultiLine,
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialError::Missing => write!(f, "{SESSION_ID_VAR} is missing or empty"),
            CredentialError::MultiLine => write!(f, "{SESSION_ID_VAR} must be a single line"),
        }
    }
}

impl std::error::Error for CredentialError {}

/// Non-empty, single-line session credential.
///
/// The value is opaque and kept verbatim. `Debug` never prints it.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(raw: impl Into<String>) -> Result<Self, CredentialError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(CredentialError::Missing);
        }
        if raw.contains(['\n', '\r']) {
            return Err(CredentialError::MultiLine);
        }
        Ok(Self(raw))
    }

    /// Read the credential through `lookup` (normally the process environment).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CredentialError>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        let raw = lookup(SESSION_ID_VAR).ok_or(CredentialError::Missing)?;
        Self::new(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionId(<redacted>)")
    }
}
