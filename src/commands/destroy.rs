use anyhow::{Result, bail};
use colored::Colorize;
use declarative::{ApplyContext, ApplyResult, ExecuteSummary};
use std::path::Path;

use super::{Provider, confirm, reconciler};
use crate::Context;
use crate::resource::Registry;
use crate::state::StateFile;
use crate::ui;

pub fn run(
    provider: &Provider,
    ctx: &Context,
    state_path: &Path,
    dry_run: bool,
    yes: bool,
) -> Result<()> {
    ui::header("Destroying Managed Resources");

    let mut state = StateFile::load(state_path)?;
    if state.resources.is_empty() {
        ui::info("Nothing is managed");
        return Ok(());
    }

    if !ctx.quiet {
        for entry in state.resources.iter().rev() {
            println!("  {} {:<40} {}", "-".red(), entry.address, entry.kind.dimmed());
        }
        println!();
    }

    if !yes && !dry_run {
        let prompt = format!("Delete {} resources?", state.resources.len());
        if !confirm(&prompt)? {
            println!("  {} Aborted", "✗".red());
            return Ok(());
        }
    }

    let registry = provider.connect()?;
    let summary = destroy(&registry, &provider.apply_context(dry_run), &mut state)?;
    ui::apply_summary(&summary);

    if !summary.is_success() {
        bail!("{} resources could not be deleted", summary.failed);
    }
    Ok(())
}

/// Delete every entry in reverse recorded order, forgetting each one as
/// soon as it is gone
///
/// Failed deletions stay in state and do not stop the run.
pub fn destroy(
    registry: &Registry,
    ctx: &ApplyContext,
    state: &mut StateFile,
) -> Result<ExecuteSummary> {
    let mut summary = ExecuteSummary::default();

    for entry in state.resources.clone().iter().rev() {
        if ctx.is_cancelled() {
            log::warn!("Interrupted, keeping the remaining resources");
            break;
        }
        let resource = reconciler(registry, entry)?;
        let result = match resource.destroy_json(ctx, &entry.state) {
            Ok(result) => result,
            Err(err) => ApplyResult::Failed {
                error: format!("{err:#}"),
            },
        };

        if !ctx.dry_run && matches!(result, ApplyResult::Removed | ApplyResult::NoChange) {
            state.remove(&entry.address);
            state.touch()?;
        }
        ui::result(&entry.address, &result);
        summary.add_result(&result);
    }

    Ok(summary)
}
