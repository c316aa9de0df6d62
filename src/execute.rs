//! Request execution: send one dispatch request and classify what came back.
//!
//! Every call carries the GitHub REST headers and a bounded timeout.
//! HTTP and transport failures become an [`Outcome`], never an error, so a
//! failing repository cannot stop the rest of a run.

use std::thread;
use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::credentials::Credentials;
use crate::error::{ConfigurationError, Result};
use crate::model::{DispatchBody, DispatchRequest, DispatchResult, Method, OperationKind, Outcome};
use crate::request::release_segments;

/// REST API version pinned on every request.
pub const API_VERSION: &str = "2022-11-28";

const GITHUB_JSON: &str = "application/vnd.github+json";
const USER_AGENT: &str = concat!("fleet-dispatch/", env!("CARGO_PKG_VERSION"));

/// Sends dispatch requests to a GitHub REST API.
pub struct Executor {
    client: Client,
    api_url: Url,
    retries: u32,
    backoff: Duration,
}

/// A response whose body was read in full.
struct Response {
    status: u16,
    body: String,
}

impl Response {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Deserialize)]
struct Release {
    id: Option<u64>,
}

impl Executor {
    /// Build an executor for the configured API root, timeout, and retry policy.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;

        let invalid = |reason: String| ConfigurationError::InvalidApiUrl {
            url: config.api_url.clone(),
            reason,
        };
        let api_url = Url::parse(&config.api_url).map_err(|e| invalid(e.to_string()))?;
        if api_url.cannot_be_a_base() {
            return Err(invalid("not a base url".to_string()));
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            api_url,
            retries: config.transport_retries,
            backoff: config.retry_backoff(),
        })
    }

    /// Execute one request and record its classified outcome.
    ///
    /// A release delete makes two calls: the lookup in `request.segments`,
    /// then a delete of the release id it returned. The result names the
    /// last call actually sent. Every other kind makes one call.
    pub fn execute(&self, request: &DispatchRequest, credentials: &Credentials) -> DispatchResult {
        let (method, endpoint, outcome) = match request.kind {
            OperationKind::DeleteRelease => self.delete_release(request, credentials),
            _ => {
                let url = self.url(&request.segments);
                let response = self.send(request.method, &url, request.body.as_ref(), credentials);
                let outcome = classify(response);
                log_outcome(request, request.method, url.path(), &outcome);
                (request.method, url.path().to_string(), outcome)
            }
        };

        DispatchResult {
            repository: request.repository.clone(),
            stage: request.stage.clone(),
            kind: request.kind,
            method,
            endpoint,
            outcome,
            finished_at: jiff::Timestamp::now(),
        }
    }

    fn delete_release(
        &self,
        request: &DispatchRequest,
        credentials: &Credentials,
    ) -> (Method, String, Outcome) {
        let lookup = self.url(&request.segments);
        let tag = request.segments.last().map_or("", String::as_str);

        let id = match resolve_release(self.send(Method::Get, &lookup, None, credentials), tag) {
            Ok(id) => id,
            Err(outcome) => {
                log_outcome(request, Method::Get, lookup.path(), &outcome);
                return (Method::Get, lookup.path().to_string(), outcome);
            }
        };
        info!(
            repository = %request.repository,
            method = %Method::Get,
            endpoint = lookup.path(),
            release = id,
            "release resolved"
        );

        let url = self.url(&release_segments(&request.owner, &request.repository, id));
        let outcome = classify(self.send(Method::Delete, &url, None, credentials));
        log_outcome(request, Method::Delete, url.path(), &outcome);
        (Method::Delete, url.path().to_string(), outcome)
    }

    /// The API root with `segments` appended, each one percent-encoded.
    fn url(&self, segments: &[String]) -> Url {
        let mut url = self.api_url.clone();
        // Base urls are checked in `new`, so the path is always mutable.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Send with up to `retries` extra attempts on transport failure.
    fn send(
        &self,
        method: Method,
        url: &Url,
        body: Option<&DispatchBody>,
        credentials: &Credentials,
    ) -> core::result::Result<Response, String> {
        let mut attempt: u32 = 0;
        loop {
            match self.send_once(method, url, body, credentials) {
                Ok(response) => return Ok(response),
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    warn!(%method, endpoint = url.path(), attempt, error = %e, "transport error, retrying");
                    thread::sleep(self.retry_delay(attempt));
                }
                Err(e) => return Err(e.to_string()),
            }
        }
    }

    /// Linear backoff, capped rather than overflowing on large settings.
    fn retry_delay(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }

    fn send_once(
        &self,
        method: Method,
        url: &Url,
        body: Option<&DispatchBody>,
        credentials: &Credentials,
    ) -> core::result::Result<Response, reqwest::Error> {
        let method = match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, url.clone())
            .header(ACCEPT, GITHUB_JSON)
            .header("X-GitHub-Api-Version", API_VERSION)
            .bearer_auth(credentials.token());
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let body = response.text()?;
        Ok(Response { status, body })
    }
}

/// Map a response (or its absence) to an outcome.
fn classify(response: core::result::Result<Response, String>) -> Outcome {
    match response {
        Ok(r) if r.is_success() => Outcome::Success { status: r.status },
        Ok(r) => Outcome::HttpError {
            status: r.status,
            body: r.body,
        },
        Err(message) => Outcome::TransportError { message },
    }
}

/// Extract the release id from a tag lookup, or the outcome that stops the delete.
///
/// Only a missing release is a resolution error. Any other failed lookup keeps
/// its HTTP or transport classification.
fn resolve_release(
    lookup: core::result::Result<Response, String>,
    tag: &str,
) -> core::result::Result<u64, Outcome> {
    let response = match lookup {
        Ok(r) if r.status == 404 => {
            return Err(Outcome::ResolutionError {
                message: format!("no release for tag `{tag}`"),
            });
        }
        Ok(r) if r.is_success() => r,
        other => return Err(classify(other)),
    };

    serde_json::from_str::<Release>(&response.body)
        .ok()
        .and_then(|r| r.id)
        .ok_or_else(|| Outcome::ResolutionError {
            message: "release lookup response has no id".to_string(),
        })
}

fn log_outcome(request: &DispatchRequest, method: Method, endpoint: &str, outcome: &Outcome) {
    let stage = request.stage.as_deref().unwrap_or("-");
    match outcome {
        Outcome::Success { .. } => info!(
            repository = %request.repository,
            stage,
            kind = %request.kind,
            %method,
            endpoint,
            %outcome,
            "dispatched"
        ),
        Outcome::HttpError { body, .. } => warn!(
            repository = %request.repository,
            stage,
            kind = %request.kind,
            %method,
            endpoint,
            %outcome,
            body = body.as_str(),
            "dispatch failed"
        ),
        _ => warn!(
            repository = %request.repository,
            stage,
            kind = %request.kind,
            %method,
            endpoint,
            %outcome,
            "dispatch failed"
        ),
    }
    debug!(repository = %request.repository, ?outcome, "classified");
}
