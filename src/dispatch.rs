//! Fleet dispatch: run operations across a manifest, in order.
//!
//! A [`Batch`] names the operations of one invocation and how their targets
//! interleave. The whole batch is planned before the first call, so an
//! invalid operation sends nothing. Execution is strictly sequential and
//! never stops early: every planned request gets a result.

use std::collections::HashSet;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span};
use uuid::Uuid;

use crate::credentials::Credentials;
use crate::error::Result;
use crate::execute::Executor;
use crate::manifest::Manifest;
use crate::model::{DispatchRequest, DispatchResult, Operation, OperationKind, Outcome};
use crate::request;

/// How the targets of several operations are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Every target of the first operation, then every target of the next.
    Phased,

    /// For each target of the first operation, every operation in turn.
    Interleaved,
}

/// The operations of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub operations: Vec<Operation>,
    pub order: Order,
}

impl Batch {
    pub fn single(operation: Operation) -> Self {
        Self {
            operations: vec![operation],
            order: Order::Phased,
        }
    }

    /// Build every container image, then tag every release.
    pub fn release(branch: Option<String>, version: Option<String>) -> Self {
        let op = |kind| {
            Operation::new(kind)
                .branch(branch.clone())
                .version(version.clone())
        };
        Self {
            operations: vec![op(OperationKind::BuildContainer), op(OperationKind::TagRelease)],
            order: Order::Phased,
        }
    }

    /// Per repository: delete the release, then the tag.
    pub fn delete(version: Option<String>) -> Self {
        let op = |kind| Operation::new(kind).version(version.clone());
        Self {
            operations: vec![op(OperationKind::DeleteRelease), op(OperationKind::DeleteTag)],
            order: Order::Interleaved,
        }
    }

    /// Deploy every module, bracketed by top-level stages when asked.
    pub fn deploy(
        branch: Option<String>,
        version: Option<String>,
        venue: Option<String>,
        include_top_level: bool,
    ) -> Self {
        Self::single(
            Operation::new(OperationKind::Deploy)
                .branch(branch)
                .version(version)
                .venue(venue)
                .include_top_level(include_top_level),
        )
    }
}

/// Everything one run produced, for the JSON report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub run_id: Uuid,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
    pub results: Vec<DispatchResult>,
}

impl Report {
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_failure()).count()
    }
}

/// Drives a batch over a manifest.
pub struct Dispatcher<'a> {
    manifest: &'a Manifest,
    executor: &'a Executor,
}

impl<'a> Dispatcher<'a> {
    pub fn new(manifest: &'a Manifest, executor: &'a Executor) -> Self {
        Self { manifest, executor }
    }

    /// Build every request of the batch, in dispatch order.
    pub fn plan(&self, batch: &Batch) -> Result<Vec<DispatchRequest>> {
        plan(self.manifest, batch)
    }

    /// Plan the batch, then execute each request in order.
    ///
    /// Only planning can fail. A release that cannot be resolved skips the
    /// tag delete for the same repository.
    pub fn run(&self, batch: &Batch, credentials: &Credentials) -> Result<Vec<DispatchResult>> {
        self.report(batch, credentials).map(|report| report.results)
    }

    /// Like [`Dispatcher::run`], with the run id and timing kept.
    pub fn report(&self, batch: &Batch, credentials: &Credentials) -> Result<Report> {
        let requests = self.plan(batch)?;

        let run_id = Uuid::new_v4();
        let span = info_span!("run", id = %run_id);
        let _guard = span.enter();
        let started_at = Timestamp::now();
        info!(requests = requests.len(), owner = %self.manifest.owner, "starting");

        let mut unresolved = HashSet::new();
        let mut results = Vec::with_capacity(requests.len());
        for request in &requests {
            if request.kind == OperationKind::DeleteTag && unresolved.contains(&request.repository) {
                results.push(skipped(request));
                continue;
            }

            let result = self.executor.execute(request, credentials);
            if matches!(result.outcome, Outcome::ResolutionError { .. }) {
                unresolved.insert(request.repository.clone());
            }
            results.push(result);
        }

        let failed = results.iter().filter(|r| r.outcome.is_failure()).count();
        info!(dispatched = results.len(), failed, "finished");

        Ok(Report {
            run_id,
            started_at,
            finished_at: Timestamp::now(),
            results,
        })
    }
}

/// Build every request of `batch` against `manifest`, in dispatch order.
pub fn plan(manifest: &Manifest, batch: &Batch) -> Result<Vec<DispatchRequest>> {
    for op in &batch.operations {
        op.validate()?;
    }

    let mut requests = Vec::new();
    match batch.order {
        Order::Phased => {
            for op in &batch.operations {
                for target in manifest.resolve(op.kind, op.include_top_level) {
                    requests.push(request::build(op, &manifest.owner, &target)?);
                }
            }
        }
        Order::Interleaved => {
            let Some(first) = batch.operations.first() else {
                return Ok(requests);
            };
            for target in manifest.resolve(first.kind, first.include_top_level) {
                for op in &batch.operations {
                    requests.push(request::build(op, &manifest.owner, &target)?);
                }
            }
        }
    }
    Ok(requests)
}

fn skipped(request: &DispatchRequest) -> DispatchResult {
    DispatchResult {
        repository: request.repository.clone(),
        stage: request.stage.clone(),
        kind: request.kind,
        method: request.method,
        endpoint: request.path(),
        outcome: Outcome::Skipped {
            reason: "release lookup failed".to_string(),
        },
        finished_at: Timestamp::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use mockito::{Matcher, Server};
    use serde_json::json;

    use crate::config::Config;
    use crate::error::ConfigurationError;
    use crate::model::Method;

    fn two_module_manifest() -> Manifest {
        Manifest {
            containers: vec!["input".into(), "output".into()],
            modules: vec!["input".into(), "output".into()],
            ..Manifest::confluence()
        }
    }

    fn executor(url: &str) -> Executor {
        Executor::new(&Config {
            api_url: url.to_string(),
            timeout_secs: 5,
            ..Config::default()
        })
        .unwrap()
    }

    fn creds() -> Credentials {
        Credentials::new("ghp_test").unwrap()
    }

    fn some(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    #[test]
    fn release_plan_builds_then_tags() {
        let requests = plan(
            &two_module_manifest(),
            &Batch::release(some("main"), some("1.2.0")),
        )
        .unwrap();

        let shape: Vec<_> = requests
            .iter()
            .map(|r| (r.kind, r.repository.as_str()))
            .collect();
        assert_eq!(
            shape,
            vec![
                (OperationKind::BuildContainer, "input"),
                (OperationKind::BuildContainer, "output"),
                (OperationKind::TagRelease, "input"),
                (OperationKind::TagRelease, "output"),
                (OperationKind::TagRelease, "confluence-terraform"),
            ]
        );
    }

    #[test]
    fn delete_plan_interleaves_per_repository() {
        let requests = plan(&two_module_manifest(), &Batch::delete(some("2.0.0"))).unwrap();

        let shape: Vec<_> = requests
            .iter()
            .map(|r| (r.kind, r.repository.as_str()))
            .collect();
        assert_eq!(
            shape,
            vec![
                (OperationKind::DeleteRelease, "input"),
                (OperationKind::DeleteTag, "input"),
                (OperationKind::DeleteRelease, "output"),
                (OperationKind::DeleteTag, "output"),
                (OperationKind::DeleteRelease, "confluence-terraform"),
                (OperationKind::DeleteTag, "confluence-terraform"),
            ]
        );
    }

    #[test]
    fn deploy_plan_orders_stages_around_modules() {
        let batch = Batch::deploy(some("main"), some("1.2.0"), some("ops"), true);
        let requests = plan(&two_module_manifest(), &batch).unwrap();

        let stages: Vec<_> = requests.iter().map(|r| r.stage.as_deref()).collect();
        assert_eq!(
            stages,
            vec![
                Some("network"),
                Some("infrastructure"),
                None,
                None,
                Some("step-function"),
            ]
        );
    }

    #[test]
    fn missing_venue_plans_nothing() {
        let batch = Batch::deploy(some("main"), some("1.2.0"), None, true);
        let err = plan(&two_module_manifest(), &batch).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::MissingField { field: "venue", .. }
        ));
    }

    #[test]
    fn invalid_batch_sends_no_requests() {
        let mut server = Server::new();
        let any = server.mock("POST", Matcher::Any).expect(0).create();
        let manifest = two_module_manifest();
        let executor = executor(&server.url());

        let batch = Batch::release(None, some("1.2.0"));
        assert!(Dispatcher::new(&manifest, &executor).run(&batch, &creds()).is_err());
        any.assert();
    }

    #[test]
    fn container_build_dispatches_each_module_in_order() {
        let mut server = Server::new();
        let body = json!({"ref": "main", "inputs": {"version": "1.2.0"}});
        let input = server
            .mock(
                "POST",
                "/repos/SWOT-Confluence/input/actions/workflows/container.yml/dispatches",
            )
            .match_body(Matcher::Json(body.clone()))
            .with_status(204)
            .expect(1)
            .create();
        let output = server
            .mock(
                "POST",
                "/repos/SWOT-Confluence/output/actions/workflows/container.yml/dispatches",
            )
            .match_body(Matcher::Json(body))
            .with_status(204)
            .expect(1)
            .create();

        let manifest = two_module_manifest();
        let executor = executor(&server.url());
        let op = Operation::new(OperationKind::BuildContainer)
            .branch(some("main"))
            .version(some("1.2.0"));
        let results = Dispatcher::new(&manifest, &executor)
            .run(&Batch::single(op), &creds())
            .unwrap();

        input.assert();
        output.assert();
        let repos: Vec<_> = results.iter().map(|r| r.repository.as_str()).collect();
        assert_eq!(repos, vec!["input", "output"]);
        assert!(results.iter().all(|r| r.method == Method::Post && r.outcome.is_success()));
    }

    #[test]
    fn failing_target_does_not_stop_the_run() {
        let mut server = Server::new();
        server
            .mock(
                "POST",
                "/repos/SWOT-Confluence/input/actions/workflows/container.yml/dispatches",
            )
            .with_status(500)
            .with_body("boom")
            .create();
        let output = server
            .mock(
                "POST",
                "/repos/SWOT-Confluence/output/actions/workflows/container.yml/dispatches",
            )
            .with_status(204)
            .expect(1)
            .create();

        let manifest = two_module_manifest();
        let executor = executor(&server.url());
        let op = Operation::new(OperationKind::BuildContainer)
            .branch(some("main"))
            .version(some("1.2.0"));
        let results = Dispatcher::new(&manifest, &executor)
            .run(&Batch::single(op), &creds())
            .unwrap();

        output.assert();
        assert_eq!(results.len(), 2);
        assert_eq!(
            results[0].outcome,
            Outcome::HttpError {
                status: 500,
                body: "boom".into()
            }
        );
        assert!(results[1].outcome.is_success());
    }

    #[test]
    fn unresolved_release_skips_that_repositorys_tag_only() {
        let mut server = Server::new();
        let manifest = Manifest {
            modules: vec!["sad".into()],
            ..Manifest::confluence()
        };

        server
            .mock("GET", "/repos/SWOT-Confluence/sad/releases/tags/2.0.0")
            .with_status(404)
            .with_body(r#"{"message": "Not Found"}"#)
            .create();
        let sad_deletes = server
            .mock(
                "DELETE",
                Matcher::Regex("^/repos/SWOT-Confluence/sad/".to_string()),
            )
            .expect(0)
            .create();
        server
            .mock(
                "GET",
                "/repos/SWOT-Confluence/confluence-terraform/releases/tags/2.0.0",
            )
            .with_status(200)
            .with_body(r#"{"id": 7}"#)
            .create();
        let infra_release = server
            .mock(
                "DELETE",
                "/repos/SWOT-Confluence/confluence-terraform/releases/7",
            )
            .with_status(204)
            .expect(1)
            .create();
        let infra_tag = server
            .mock(
                "DELETE",
                "/repos/SWOT-Confluence/confluence-terraform/git/refs/tags/2.0.0",
            )
            .with_status(204)
            .expect(1)
            .create();

        let executor = executor(&server.url());
        let results = Dispatcher::new(&manifest, &executor)
            .run(&Batch::delete(some("2.0.0")), &creds())
            .unwrap();

        sad_deletes.assert();
        infra_release.assert();
        infra_tag.assert();

        assert_eq!(results.len(), 4);
        assert!(matches!(results[0].outcome, Outcome::ResolutionError { .. }));
        assert!(matches!(results[1].outcome, Outcome::Skipped { .. }));
        assert!(results[2].outcome.is_success());
        assert!(results[3].outcome.is_success());
    }

    #[test]
    fn failed_lookup_still_deletes_the_tag() {
        let mut server = Server::new();
        let manifest = Manifest {
            modules: Vec::new(),
            infrastructure: "sad".into(),
            ..Manifest::confluence()
        };

        server
            .mock("GET", "/repos/SWOT-Confluence/sad/releases/tags/2.0.0")
            .with_status(500)
            .with_body("upstream exploded")
            .create();
        let tag = server
            .mock("DELETE", "/repos/SWOT-Confluence/sad/git/refs/tags/2.0.0")
            .with_status(204)
            .expect(1)
            .create();

        let executor = executor(&server.url());
        let results = Dispatcher::new(&manifest, &executor)
            .run(&Batch::delete(some("2.0.0")), &creds())
            .unwrap();

        tag.assert();
        assert_eq!(results.len(), 2);
        assert_eq!(
            results[0].outcome,
            Outcome::HttpError {
                status: 500,
                body: "upstream exploded".into(),
            }
        );
        assert!(results[1].outcome.is_success());
    }

    #[test]
    fn report_serializes_camel_case_keys() {
        let report = Report {
            run_id: Uuid::new_v4(),
            started_at: Timestamp::UNIX_EPOCH,
            finished_at: Timestamp::UNIX_EPOCH,
            results: Vec::new(),
        };
        let value = serde_json::to_value(&report).unwrap();
        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["finishedAt", "results", "runId", "startedAt"]);
    }
}
