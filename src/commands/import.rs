use anyhow::{Context as AnyhowContext, Result, bail};
use declarative::ApplyContext;

use super::Provider;
use crate::Context;
use crate::cli::ImportArgs;
use crate::resource::Registry;
use crate::state::StateFile;
use crate::ui;

pub fn run(provider: &Provider, ctx: &Context, args: &ImportArgs) -> Result<()> {
    ui::header("Importing");

    let mut state = StateFile::load(&args.state.state)?;
    let registry = provider.connect()?;

    import(
        &registry,
        &provider.apply_context(false),
        &mut state,
        &args.type_name,
        &args.address,
        &args.id,
    )?;

    ui::success(&format!("Imported {} as '{}'", args.id, args.address));
    if !ctx.quiet {
        ui::kv("type", &args.type_name);
        ui::kv("state", &state.path().display().to_string());
    }
    Ok(())
}

/// Look up an existing object and record it under `address`
pub fn import(
    registry: &Registry,
    ctx: &ApplyContext,
    state: &mut StateFile,
    type_name: &str,
    address: &str,
    id: &str,
) -> Result<()> {
    if state.get(address).is_some() {
        bail!("Address '{address}' is already managed; destroy it or use a new address");
    }

    let resource = registry.get(type_name)?;
    let value = resource
        .import_json(ctx, id)
        .with_context(|| format!("Failed to import {type_name} {id:?}"))?;

    state.record(address, type_name, Some(value));
    state.touch()
}
