//! Dispatch results: what happened to each request, in dispatch order.

use std::fmt;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::{Method, OperationKind};

/// Classified outcome of a single request.
///
/// Failures are values, not errors: a run records them and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum Outcome {
    /// The remote accepted the call (2xx).
    Success { status: u16 },

    /// The remote answered with a non-success status.
    HttpError { status: u16, body: String },

    /// No usable response: connection, DNS, timeout, or unreadable body.
    TransportError { message: String },

    /// A release lookup found no release for the tag (404, or no id).
    ResolutionError { message: String },

    /// Not attempted because an earlier step for the same repository failed.
    Skipped { reason: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Whether this outcome counts against the run.
    ///
    /// Skips are a consequence of a failure already counted.
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Success { .. } | Self::Skipped { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success { status } => write!(f, "ok ({status})"),
            Self::HttpError { status, .. } => write!(f, "http error ({status})"),
            Self::TransportError { message } => write!(f, "transport error: {message}"),
            Self::ResolutionError { message } => write!(f, "unresolved: {message}"),
            Self::Skipped { reason } => write!(f, "skipped: {reason}"),
        }
    }
}

/// The record of one dispatch request after it ran (or was skipped).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResult {
    pub repository: String,
    pub stage: Option<String>,
    pub kind: OperationKind,
    pub method: Method,
    /// The last endpoint called, percent-encoded. For a chained delete this is
    /// the delete path, or the lookup path when the lookup failed.
    pub endpoint: String,
    pub outcome: Outcome,
    pub finished_at: Timestamp,
}
