//! GitHub token resolution.
//!
//! The token is resolved through a short chain:
//!
//! 1. `--ghtoken <token>` — explicit per-invocation value
//! 2. `GITHUB_TOKEN` env var — process/session level
//!
//! Empty values are skipped. Nothing is read from disk.

use std::{env, fmt};

use crate::error::{ConfigurationError, Result};

/// Environment variable consulted when no token flag is given.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// A bearer token for the GitHub REST API.
#[derive(Clone)]
pub struct Credentials {
    token: String,
}

impl Credentials {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(ConfigurationError::MissingToken);
        }
        Ok(Self { token })
    }

    /// Resolve the token from the explicit flag value, then the environment.
    pub fn resolve(explicit: Option<&str>) -> Result<Self> {
        Self::resolve_from(explicit, env::var(TOKEN_ENV).ok())
    }

    /// Resolve against a given `GITHUB_TOKEN` value instead of the process environment.
    pub fn resolve_from(explicit: Option<&str>, env_token: Option<String>) -> Result<Self> {
        if let Some(token) = explicit
            && !token.is_empty()
        {
            return Self::new(token);
        }

        if let Some(token) = env_token
            && !token.is_empty()
        {
            return Self::new(token);
        }

        Err(ConfigurationError::MissingToken)
    }

    pub(crate) fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .finish()
    }
}
