//! Request building: turn an operation and a target into a remote call.
//!
//! Pure construction. Nothing here touches the network, so request shapes
//! and their order can be checked without a GitHub to talk to.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::manifest::Target;
use crate::model::{DispatchBody, DispatchRequest, Method, Operation, OperationKind};

/// Build the request for one target of an operation.
///
/// Fails with a `ConfigurationError` when the operation is missing a field
/// its kind requires.
pub fn build(operation: &Operation, owner: &str, target: &Target) -> Result<DispatchRequest> {
    operation.validate()?;

    let repo = target.repository.as_str();
    // Validated above: every kind carries a version.
    let version = operation.version.clone().unwrap_or_default();

    let (method, segments, body) = match operation.kind {
        OperationKind::BuildContainer => (
            Method::Post,
            workflow_segments(owner, repo, "container.yml"),
            Some(dispatch_body(operation, target, &version)),
        ),
        OperationKind::TagRelease => (
            Method::Post,
            workflow_segments(owner, repo, "release.yml"),
            Some(dispatch_body(operation, target, &version)),
        ),
        OperationKind::Deploy => (
            Method::Post,
            workflow_segments(owner, repo, "deploy.yml"),
            Some(dispatch_body(operation, target, &version)),
        ),
        OperationKind::DeleteRelease => (
            Method::Get,
            repo_segments(owner, repo, &["releases", "tags", &version]),
            None,
        ),
        OperationKind::DeleteTag => (
            Method::Delete,
            repo_segments(owner, repo, &["git", "refs", "tags", &version]),
            None,
        ),
    };

    Ok(DispatchRequest {
        owner: owner.to_string(),
        repository: target.repository.clone(),
        stage: target.stage.as_ref().map(|s| s.name.clone()),
        kind: operation.kind,
        method,
        segments,
        body,
    })
}

/// Path of the release with the given id, the second half of a release delete.
pub fn release_segments(owner: &str, repo: &str, id: u64) -> Vec<String> {
    repo_segments(owner, repo, &["releases", &id.to_string()])
}

fn workflow_segments(owner: &str, repo: &str, workflow: &str) -> Vec<String> {
    repo_segments(owner, repo, &["actions", "workflows", workflow, "dispatches"])
}

/// `repos/{owner}/{repo}/...` as raw, unencoded segments.
fn repo_segments(owner: &str, repo: &str, rest: &[&str]) -> Vec<String> {
    ["repos", owner, repo]
        .iter()
        .chain(rest)
        .map(ToString::to_string)
        .collect()
}

fn dispatch_body(operation: &Operation, target: &Target, version: &str) -> DispatchBody {
    let mut inputs = BTreeMap::new();
    inputs.insert("version".to_string(), version.to_string());

    if operation.kind == OperationKind::Deploy {
        if let Some(venue) = &operation.venue {
            inputs.insert("venue".to_string(), venue.clone());
        }
        if let Some(stage) = &target.stage {
            inputs.insert("deployment".to_string(), stage.deployment.clone());
        }
    }

    DispatchBody {
        git_ref: operation.branch.clone().unwrap_or_default(),
        inputs,
    }
}
