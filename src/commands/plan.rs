use anyhow::{Context as AnyhowContext, Result, bail};
use declarative::{ApplyContext, Change, DiffSummary};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

use super::{Provider, check_cancelled, reconciler};
use crate::Context;
use crate::config::{DeclaredResource, Document};
use crate::resource::Registry;
use crate::state::{StateEntry, StateFile};
use crate::ui;

/// Change planned for one address
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedEntry {
    pub address: String,
    pub kind: String,
    pub change: Change,
}

pub fn run(provider: &Provider, ctx: &Context, file: &Path, state_path: &Path) -> Result<()> {
    ui::header("Planning Changes");

    let document = Document::load(file)?;
    let state = StateFile::load(state_path)?;
    let registry = provider.connect()?;

    let planned = compute(&registry, &provider.apply_context(true), &document, &state)?;
    show(ctx, &planned);
    Ok(())
}

/// Print a plan and its totals
pub fn show(ctx: &Context, planned: &[PlannedEntry]) {
    for entry in planned {
        if ctx.quiet && !entry.change.is_change() {
            continue;
        }
        ui::change(&entry.address, &entry.kind, &entry.change);
    }
    ui::plan_summary(&DiffSummary::from_changes(planned.iter().map(|p| &p.change)));
}

/// Prior state recorded for a declared resource
///
/// Changing the type behind an address is refused; the old object would
/// otherwise be orphaned.
pub fn prior_state<'s>(state: &'s StateFile, declared: &DeclaredResource) -> Result<Option<&'s Value>> {
    match state.get(&declared.address) {
        Some(entry) if entry.kind != declared.kind => bail!(
            "Address '{}' is recorded as {} but declared as {}; destroy it or use a new address",
            declared.address,
            entry.kind,
            declared.kind
        ),
        Some(entry) => Ok(Some(&entry.state)),
        None => Ok(None),
    }
}

/// State entries whose address is no longer declared, in recorded order
pub fn undeclared(document: &Document, state: &StateFile) -> Vec<StateEntry> {
    let declared: HashSet<&str> = document
        .resources
        .iter()
        .map(|r| r.address.as_str())
        .collect();
    state
        .resources
        .iter()
        .filter(|e| !declared.contains(e.address.as_str()))
        .cloned()
        .collect()
}

/// Refresh recorded state and compute the change for every address
///
/// Declared resources come first in document order, followed by the
/// deletions in the reverse of their recorded order.
pub fn compute(
    registry: &Registry,
    ctx: &ApplyContext,
    document: &Document,
    state: &StateFile,
) -> Result<Vec<PlannedEntry>> {
    let mut planned = Vec::new();

    for declared in &document.resources {
        check_cancelled(ctx)?;
        let resource = registry.get(&declared.kind)?;
        let prior = prior_state(state, declared)?;
        let result = resource
            .plan_json(ctx, prior, Some(&declared.attributes_value()))
            .with_context(|| format!("Failed to plan '{}'", declared.address))?;
        planned.push(PlannedEntry {
            address: declared.address.clone(),
            kind: declared.kind.clone(),
            change: result.change,
        });
    }

    for entry in undeclared(document, state).iter().rev() {
        check_cancelled(ctx)?;
        let resource = reconciler(registry, entry)?;
        let result = resource
            .plan_json(ctx, Some(&entry.state), None)
            .with_context(|| format!("Failed to plan '{}'", entry.address))?;
        planned.push(PlannedEntry {
            address: entry.address.clone(),
            kind: entry.kind.clone(),
            change: result.change,
        });
    }

    Ok(planned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing;
    use declarative::ApplyContext;
    use segment_api::{Client, MockClient};
    use serde_json::json;
    use tempfile::TempDir;

    fn source(address: &str, slug: &str) -> Value {
        json!({"address": address, "type": "segment_source", "slug": slug, "catalog_name": "catalog/sources/ios"})
    }

    #[test]
    fn test_compute_plans_declared_and_undeclared() {
        let dir = TempDir::new().unwrap();
        let client = MockClient::new("acme");
        let registry = testing::registry(&client);
        let ctx = ApplyContext::new(false);

        client.create_source("ios", "catalog/sources/ios").unwrap();
        client.create_source("old", "catalog/sources/ios").unwrap();
        let mut state = testing::state(&dir);
        let resource = registry.get("segment_source").unwrap();
        for slug in ["ios", "old"] {
            let value = resource.import_json(&ctx, slug).unwrap();
            state.record(slug, "segment_source", Some(value));
        }

        let document = testing::document(json!({"resource": [
            source("ios", "ios"),
            source("android", "android"),
        ]}));
        let planned = compute(&registry, &ctx, &document, &state).unwrap();
        let changes: Vec<_> = planned
            .iter()
            .map(|p| (p.address.as_str(), p.change.clone()))
            .collect();
        assert_eq!(
            changes,
            [
                ("ios", Change::NoChange),
                ("android", Change::Create),
                ("old", Change::Delete),
            ]
        );
        assert_eq!(client.call_count("create_source"), 2);
    }

    #[test]
    fn test_type_change_is_refused() {
        let dir = TempDir::new().unwrap();
        let client = MockClient::new("acme");
        let registry = testing::registry(&client);
        let mut state = testing::state(&dir);
        state.record("x", "segment_tracking_plan", Some(json!({"id": "rs_1"})));

        let document = testing::document(json!({"resource": [source("x", "x")]}));
        let err = compute(&registry, &ApplyContext::new(false), &document, &state).unwrap_err();
        assert!(err.to_string().contains("recorded as segment_tracking_plan"));
        assert!(client.calls().is_empty());
    }

    #[test]
    fn test_invalid_declaration_fails_the_plan() {
        let dir = TempDir::new().unwrap();
        let client = MockClient::new("acme");
        let registry = testing::registry(&client);
        let document = testing::document(json!({"resource": [
            {"address": "plan", "type": "segment_tracking_plan", "display_name": "", "rules_global": "{"}
        ]}));
        let err = compute(&registry, &ApplyContext::new(false), &document, &testing::state(&dir))
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to plan 'plan'");
        assert!(format!("{err:#}").contains("display_name"));
    }

    #[test]
    fn test_cancelled_plan_stops() {
        let dir = TempDir::new().unwrap();
        let client = MockClient::new("acme");
        let registry = testing::registry(&client);
        let ctx = ApplyContext::new(false);
        ctx.cancel.cancel();
        let document = testing::document(json!({"resource": [source("ios", "ios")]}));
        assert!(compute(&registry, &ctx, &document, &testing::state(&dir)).is_err());
        assert!(client.calls().is_empty());
    }
}
