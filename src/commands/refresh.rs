use anyhow::{Context as AnyhowContext, Result};
use declarative::{ApplyContext, ExecuteSummary};
use std::path::Path;

use super::{Provider, check_cancelled, reconciler};
use crate::Context;
use crate::resource::Registry;
use crate::state::StateFile;
use crate::ui;

pub fn run(provider: &Provider, ctx: &Context, state_path: &Path) -> Result<()> {
    ui::header("Refreshing State");

    let mut state = StateFile::load(state_path)?;
    if state.resources.is_empty() {
        ui::info("Nothing is managed yet");
        return Ok(());
    }
    let registry = provider.connect()?;

    let summary = refresh(&registry, &provider.apply_context(false), &mut state)?;

    println!();
    ui::success(&format!(
        "Refreshed {} resources ({} gone)",
        summary.total(),
        summary.removed
    ));
    if !ctx.quiet {
        ui::kv("state", &state.path().display().to_string());
    }
    Ok(())
}

/// Re-read every entry, dropping the ones that no longer exist
///
/// Counts unchanged entries as `no_change`, updated ones as `modified` and
/// vanished ones as `removed`.
pub fn refresh(
    registry: &Registry,
    ctx: &ApplyContext,
    state: &mut StateFile,
) -> Result<ExecuteSummary> {
    let mut summary = ExecuteSummary::default();

    for entry in state.resources.clone() {
        check_cancelled(ctx)?;
        let resource = reconciler(registry, &entry)?;
        let current = resource
            .refresh_json(ctx, &entry.state)
            .with_context(|| format!("Failed to refresh '{}'", entry.address))?;

        match &current {
            None => {
                ui::warn(&format!("{} no longer exists", entry.address));
                summary.removed += 1;
            }
            Some(value) if *value != entry.state => {
                ui::info(&format!("{} changed remotely", entry.address));
                summary.modified += 1;
            }
            Some(_) => summary.no_change += 1,
        }
        state.record(&entry.address, &entry.kind, current);
    }

    state.touch()?;
    Ok(summary)
}
