//! Dispatch requests: the shape of one remote call, built before any I/O.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::OperationKind;

/// HTTP methods the GitHub endpoints in use need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        })
    }
}

/// JSON body of a `workflow_dispatch` event.
///
/// `inputs` is ordered so repeated builds serialize identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchBody {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub inputs: BTreeMap<String, String>,
}

/// One remote call, fully described.
///
/// Immutable once built. The path is kept as raw segments; the executor
/// percent-encodes each one, so a tag like `1.0#rc1` stays a single segment.
/// For `DeleteRelease` the path is the release lookup; the executor chains
/// the delete from the id it returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    pub owner: String,
    pub repository: String,
    /// Top-level stage name, when the target is a stage rather than a module.
    pub stage: Option<String>,
    pub kind: OperationKind,
    pub method: Method,
    pub segments: Vec<String>,
    pub body: Option<DispatchBody>,
}

impl DispatchRequest {
    /// Unencoded path, for display.
    pub fn path(&self) -> String {
        display_path(&self.segments)
    }
}

/// Join raw segments into a `/`-led path without encoding.
pub fn display_path(segments: &[String]) -> String {
    format!("/{}", segments.join("/"))
}
