//! Errors that stop a run before any request is sent.

use std::{io, path::PathBuf};

use crate::model::OperationKind;

/// Invalid invocation or configuration, detected before any network call.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("{kind} requires `{field}`")]
    MissingField {
        kind: OperationKind,
        field: &'static str,
    },

    #[error("GitHub token required: pass --ghtoken or set GITHUB_TOKEN")]
    MissingToken,

    #[error("invalid API url `{url}`: {reason}")]
    InvalidApiUrl { url: String, reason: String },

    #[error("invalid `{key}`: {reason}")]
    InvalidSetting { key: &'static str, reason: String },

    #[error("failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("unsupported manifest version {found} (expected {expected})")]
    UnsupportedManifestVersion { found: u32, expected: u32 },

    #[error("manifest field `{0}` is empty")]
    EmptyField(&'static str),

    #[error("duplicate repository `{repository}` in `{list}`")]
    DuplicateRepository {
        list: &'static str,
        repository: String,
    },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

pub type Result<T> = core::result::Result<T, ConfigurationError>;
