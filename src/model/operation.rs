//! Operation descriptors: what to do to every repository in a fleet.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// The kind of remote operation a descriptor asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    /// Trigger the container image build workflow.
    BuildContainer,

    /// Trigger the release workflow, which tags the version.
    TagRelease,

    /// Look up the release for a tag and delete it.
    DeleteRelease,

    /// Delete the git tag ref.
    DeleteTag,

    /// Trigger the deploy workflow for a venue.
    Deploy,
}

impl OperationKind {
    /// Short label used in logs and the run summary.
    pub fn label(self) -> &'static str {
        match self {
            Self::BuildContainer => "build-container",
            Self::TagRelease => "tag-release",
            Self::DeleteRelease => "delete-release",
            Self::DeleteTag => "delete-tag",
            Self::Deploy => "deploy",
        }
    }

    /// Whether this kind removes something rather than dispatching a workflow.
    pub fn is_delete(self) -> bool {
        matches!(self, Self::DeleteRelease | Self::DeleteTag)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One operation to apply across a fleet.
///
/// Fields are optional at construction so invocation parameters can be
/// carried through as given; [`Operation::validate`] enforces which ones
/// each kind needs. Empty strings count as missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub kind: OperationKind,
    pub branch: Option<String>,
    pub version: Option<String>,
    pub venue: Option<String>,
    pub include_top_level: bool,
}

impl Operation {
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            branch: None,
            version: None,
            venue: None,
            include_top_level: false,
        }
    }

    pub fn branch(mut self, branch: Option<impl Into<String>>) -> Self {
        self.branch = branch.map(Into::into);
        self
    }

    pub fn version(mut self, version: Option<impl Into<String>>) -> Self {
        self.version = version.map(Into::into);
        self
    }

    pub fn venue(mut self, venue: Option<impl Into<String>>) -> Self {
        self.venue = venue.map(Into::into);
        self
    }

    pub fn include_top_level(mut self, include: bool) -> Self {
        self.include_top_level = include;
        self
    }

    /// Check that every field this kind requires is present.
    ///
    /// Deletes need only `version`. Workflow dispatches also need `branch`,
    /// and deploys need `venue` on top of that.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.require("version", self.version.as_deref())?;
        if self.kind.is_delete() {
            return Ok(());
        }
        self.require("branch", self.branch.as_deref())?;
        if self.kind == OperationKind::Deploy {
            self.require("venue", self.venue.as_deref())?;
        }
        Ok(())
    }

    fn require(&self, field: &'static str, value: Option<&str>) -> Result<(), ConfigurationError> {
        match value {
            Some(v) if !v.trim().is_empty() => Ok(()),
            _ => Err(ConfigurationError::MissingField {
                kind: self.kind,
                field,
            }),
        }
    }
}
