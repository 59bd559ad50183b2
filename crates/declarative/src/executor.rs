//! Lifecycle driver - refreshes, plans and converges single resources
//!
//! Resources are driven one at a time; ordering across resources is up to
//! the caller.

use crate::context::ApplyContext;
use crate::diff::{Change, compute_change};
use crate::resource::Resource;
use crate::types::{ApplyResult, ResourceState};
use anyhow::Result;

/// Refreshed state together with the change it needs
#[derive(Debug, Clone)]
pub struct Planned<S> {
    pub change: Change,
    /// State after refresh; `None` when the resource is not present
    pub state: Option<S>,
}

/// Result of converging a resource and the state to persist
#[derive(Debug, Clone)]
pub struct Outcome<S> {
    pub result: ApplyResult,
    /// State to persist; `None` when the resource is not present
    pub state: Option<S>,
}

/// Re-read a resource, returning `None` if it vanished
pub fn refresh<R: Resource + ?Sized>(
    resource: &R,
    ctx: &ApplyContext,
    prior: &R::State,
) -> Result<Option<R::State>> {
    match resource.read(ctx, prior)? {
        ResourceState::Present(state) => Ok(Some(state)),
        ResourceState::Absent => {
            log::warn!(
                "{} {} no longer exists remotely",
                resource.resource_type(),
                resource.id(prior)
            );
            Ok(None)
        }
    }
}

/// Refresh `prior` and compute the change needed to reach `desired`
pub fn plan<R: Resource + ?Sized>(
    resource: &R,
    ctx: &ApplyContext,
    prior: Option<&R::State>,
    desired: Option<&R::Config>,
) -> Result<Planned<R::State>> {
    if let Some(config) = desired {
        resource.validate(config)?;
    }
    let state = match prior {
        Some(prior) => refresh(resource, ctx, prior)?,
        None => None,
    };
    let change = compute_change(resource, state.as_ref(), desired);
    Ok(Planned { change, state })
}

/// Bring a resource in line with its declared configuration
///
/// Validates first, so nothing is sent for an invalid declaration. In a
/// dry run the refreshed state is returned and nothing is changed.
pub fn converge<R: Resource + ?Sized>(
    resource: &R,
    ctx: &ApplyContext,
    prior: Option<&R::State>,
    config: &R::Config,
) -> Result<Outcome<R::State>> {
    let planned = plan(resource, ctx, prior, Some(config))?;
    let kind = resource.resource_type();

    if ctx.dry_run && planned.change.is_change() {
        return Ok(Outcome {
            result: ApplyResult::Skipped {
                reason: format!("dry run: would {}", planned.change),
            },
            state: planned.state,
        });
    }

    match (planned.change, planned.state) {
        (Change::Create, _) => {
            let state = resource.create(ctx, config)?;
            log::info!("created {kind} {}", resource.id(&state));
            Ok(Outcome {
                result: ApplyResult::Created,
                state: Some(state),
            })
        }
        (Change::Update { attributes }, Some(current)) => {
            log::debug!("updating {kind} {}: {}", resource.id(&current), attributes.join(", "));
            let state = resource.update(ctx, &current, config)?;
            log::info!("updated {kind} {}", resource.id(&state));
            Ok(Outcome {
                result: ApplyResult::Modified,
                state: Some(state),
            })
        }
        (Change::Replace { attributes }, Some(current)) => {
            log::debug!("replacing {kind} {}: {}", resource.id(&current), attributes.join(", "));
            resource.delete(ctx, &current)?;
            let state = resource.create(ctx, config)?;
            log::info!("replaced {kind} {}", resource.id(&state));
            Ok(Outcome {
                result: ApplyResult::Replaced,
                state: Some(state),
            })
        }
        (_, state) => Ok(Outcome {
            result: ApplyResult::NoChange,
            state,
        }),
    }
}

/// Delete a resource if it still exists
pub fn destroy<R: Resource + ?Sized>(
    resource: &R,
    ctx: &ApplyContext,
    prior: &R::State,
) -> Result<ApplyResult> {
    let Some(current) = refresh(resource, ctx, prior)? else {
        return Ok(ApplyResult::NoChange);
    };
    if ctx.dry_run {
        return Ok(ApplyResult::Skipped {
            reason: "dry run: would delete".into(),
        });
    }
    resource.delete(ctx, &current)?;
    log::info!("deleted {} {}", resource.resource_type(), resource.id(&current));
    Ok(ApplyResult::Removed)
}

/// Import an existing resource by user-supplied identifier
pub fn import<R: Resource + ?Sized>(
    resource: &R,
    ctx: &ApplyContext,
    id: &str,
) -> Result<R::State> {
    match resource.import(ctx, id)? {
        ResourceState::Present(state) => {
            log::info!("imported {} {}", resource.resource_type(), resource.id(&state));
            Ok(state)
        }
        ResourceState::Absent => anyhow::bail!(
            "Cannot import {} {id:?}: it does not exist",
            resource.resource_type()
        ),
    }
}
