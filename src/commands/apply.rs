use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use declarative::{ApplyContext, ApplyResult, DiffSummary, ExecuteSummary};
use std::path::Path;

use super::plan::{self, prior_state, undeclared};
use super::{Provider, confirm, reconciler};
use crate::Context;
use crate::config::Document;
use crate::resource::Registry;
use crate::state::StateFile;
use crate::ui;

pub fn run(
    provider: &Provider,
    ctx: &Context,
    file: &Path,
    state_path: &Path,
    dry_run: bool,
    yes: bool,
) -> Result<()> {
    ui::header("Applying Declarations");

    if dry_run {
        ui::warn("Dry run - no changes will be made");
    }

    let document = Document::load(file)?;
    let mut state = StateFile::load(state_path)?;
    let registry = provider.connect()?;

    let planned = plan::compute(&registry, &provider.apply_context(true), &document, &state)?;
    plan::show(ctx, &planned);

    if !DiffSummary::from_changes(planned.iter().map(|p| &p.change)).has_changes() {
        return Ok(());
    }

    if dry_run {
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
        return Ok(());
    }

    if !yes && !confirm("Continue?")? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(());
    }

    println!();
    let summary = execute(&registry, &provider.apply_context(false), &document, &mut state)?;
    ui::apply_summary(&summary);

    if !summary.is_success() {
        bail!("{} resources failed to apply", summary.failed);
    }
    Ok(())
}

/// Converge every declared resource in document order, then delete
/// undeclared ones in reverse recorded order
///
/// State is saved after every resource. The first failure stops the run;
/// whatever was not reached is counted as skipped.
pub fn execute(
    registry: &Registry,
    ctx: &ApplyContext,
    document: &Document,
    state: &mut StateFile,
) -> Result<ExecuteSummary> {
    let undeclared = undeclared(document, state);
    let total = document.resources.len() + undeclared.len();
    let mut summary = ExecuteSummary::default();

    for declared in &document.resources {
        if stop(ctx, &summary) {
            break;
        }
        let resource = registry.get(&declared.kind)?;
        let prior = prior_state(state, declared)?.cloned();
        let result = match resource.converge_json(ctx, prior.as_ref(), &declared.attributes_value()) {
            Ok(outcome) => {
                if !ctx.dry_run {
                    state.record(&declared.address, &declared.kind, outcome.state);
                    state
                        .touch()
                        .with_context(|| format!("Failed to record '{}'", declared.address))?;
                }
                outcome.result
            }
            Err(err) => failed(&declared.address, &err),
        };
        ui::result(&declared.address, &result);
        summary.add_result(&result);
    }

    for entry in undeclared.iter().rev() {
        if stop(ctx, &summary) {
            break;
        }
        let resource = reconciler(registry, entry)?;
        let result = match resource.destroy_json(ctx, &entry.state) {
            Ok(result) => {
                if !ctx.dry_run {
                    state.remove(&entry.address);
                    state
                        .touch()
                        .with_context(|| format!("Failed to forget '{}'", entry.address))?;
                }
                result
            }
            Err(err) => failed(&entry.address, &err),
        };
        ui::result(&entry.address, &result);
        summary.add_result(&result);
    }

    summary.skipped += total - summary.total();
    Ok(summary)
}

fn stop(ctx: &ApplyContext, summary: &ExecuteSummary) -> bool {
    if ctx.is_cancelled() {
        log::warn!("Interrupted, skipping the remaining resources");
        return true;
    }
    !summary.is_success()
}

fn failed(address: &str, err: &anyhow::Error) -> ApplyResult {
    log::debug!("{address} failed: {err:?}");
    ApplyResult::Failed {
        error: format!("{err:#}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing;
    use segment_api::{ApiError, Client, MockClient};
    use serde_json::json;
    use tempfile::TempDir;

    fn document() -> Document {
        testing::document(json!({"resource": [
            {"address": "ios", "type": "segment_source", "slug": "ios", "catalog_name": "catalog/sources/ios"},
            {"address": "plan", "type": "segment_tracking_plan", "display_name": "Main",
             "rules_identify": "{\"properties\": {\"traits\": {}}}"},
            {"address": "schema", "type": "segment_source_schema_config", "source_slug": "ios",
             "allow_unplanned_track_events": false}
        ]}))
    }

    #[test]
    fn test_execute_creates_and_records() {
        let dir = TempDir::new().unwrap();
        let client = MockClient::new("acme");
        let registry = testing::registry(&client);
        let mut state = testing::state(&dir);

        let summary = execute(&registry, &ApplyContext::new(false), &document(), &mut state).unwrap();
        assert_eq!(summary.created, 3);
        assert!(summary.is_success());

        let saved = StateFile::load(state.path()).unwrap();
        let addresses: Vec<_> = saved.resources.iter().map(|e| e.address.as_str()).collect();
        assert_eq!(addresses, ["ios", "plan", "schema"]);
        assert_eq!(saved.get("ios").unwrap().state["id"], "workspaces/acme/sources/ios");
        assert!(!client.get_source_config("ios").unwrap().settings.allow_unplanned_track_events);

        let again = execute(&registry, &ApplyContext::new(false), &document(), &mut state).unwrap();
        assert_eq!(again.no_change, 3);
        assert_eq!(again.total_changes(), 0);
    }

    #[test]
    fn test_execute_deletes_undeclared_in_reverse_order() {
        let dir = TempDir::new().unwrap();
        let client = MockClient::new("acme");
        let registry = testing::registry(&client);
        let mut state = testing::state(&dir);
        execute(&registry, &ApplyContext::new(false), &document(), &mut state).unwrap();

        let empty = testing::document(json!({"resource": []}));
        let summary = execute(&registry, &ApplyContext::new(false), &empty, &mut state).unwrap();
        assert_eq!(summary.removed, 3);
        assert!(state.resources.is_empty());

        let calls = client.calls();
        let position = |op: &str| calls.iter().rposition(|c| c == op).unwrap();
        assert!(position("update_source_config") < position("delete_tracking_plan"));
        assert!(position("delete_tracking_plan") < position("delete_source"));
    }

    #[test]
    fn test_execute_stops_at_first_failure() {
        let dir = TempDir::new().unwrap();
        let client = MockClient::new("acme");
        let registry = testing::registry(&client);
        let mut state = testing::state(&dir);
        client.fail_next("create_tracking_plan", ApiError::new(13, "backend unavailable"));

        let summary = execute(&registry, &ApplyContext::new(false), &document(), &mut state).unwrap();
        assert_eq!(summary.created, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(client.call_count("update_source_config"), 0);

        let saved = StateFile::load(state.path()).unwrap();
        assert_eq!(saved.resources.len(), 1);
    }

    #[test]
    fn test_execute_dry_run_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let client = MockClient::new("acme");
        let registry = testing::registry(&client);
        let mut state = testing::state(&dir);

        let summary = execute(&registry, &ApplyContext::new(true), &document(), &mut state).unwrap();
        assert_eq!(summary.skipped, 3);
        assert!(state.resources.is_empty());
        assert!(!state.path().exists());
        assert_eq!(client.call_count("create_source"), 0);
    }
}
