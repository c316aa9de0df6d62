//! Output formatting for CLI display.

use crate::model::{DispatchRequest, DispatchResult, Outcome};

/// One planned request, as printed by `--dry-run`.
pub(super) fn format_request(request: &DispatchRequest) -> String {
    let body = request
        .body
        .as_ref()
        .and_then(|b| serde_json::to_string(b).ok())
        .map(|b| format!("  {b}"))
        .unwrap_or_default();
    format!(
        "{:<6} {}{}  [{}]{body}",
        request.method,
        request.path(),
        stage_suffix(request.stage.as_deref()),
        request.kind,
    )
}

/// One finished request: repository, stage, kind, outcome.
pub(super) fn format_result(result: &DispatchResult) -> String {
    format!(
        "{}{}  {}  {}",
        result.repository,
        stage_suffix(result.stage.as_deref()),
        result.kind,
        result.outcome,
    )
}

/// Final tally line. Skipped requests were never sent, so they are not dispatched.
pub(super) fn format_tally(results: &[DispatchResult]) -> String {
    let failed = results.iter().filter(|r| r.outcome.is_failure()).count();
    let skipped = results
        .iter()
        .filter(|r| matches!(r.outcome, Outcome::Skipped { .. }))
        .count();
    let dispatched = results.len() - skipped;
    format!("{dispatched} dispatched, {failed} failed, {skipped} skipped")
}

fn stage_suffix(stage: Option<&str>) -> String {
    stage.map(|s| format!(" ({s})")).unwrap_or_default()
}
