//! # Declarative
//!
//! A framework for declarative resource lifecycle management.
//!
//! This crate provides the core abstractions for declaring desired state,
//! reading back the current state of remote objects, and converging them
//! to match.
//!
//! ## Core Concepts
//!
//! - **Resource**: A kind of remote object with create/read/update/delete/import
//! - **ResourceState**: Whether the object exists, with its observed attributes
//! - **Change**: What has to happen to reach the declared state
//! - **Executor**: Drives one resource at a time through plan, converge or destroy
//! - **Poller**: Bounded, cancellable wait for asynchronous remote changes
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{ApplyContext, converge};
//!
//! let ctx = ApplyContext::new(false);
//! let outcome = converge(&my_resource, &ctx, prior.as_ref(), &config)?;
//! println!("{:?}", outcome.result);
//! ```
//!
//! Hosts that work on untyped documents use [`ErasedResource`], which every
//! [`Resource`] implements over JSON values.

pub mod context;
pub mod diff;
pub mod executor;
pub mod poll;
pub mod resource;
pub mod types;
pub mod validate;

// Re-export main types at crate root
pub use context::{ApplyContext, CancelToken};
pub use diff::{Change, DiffSummary, compute_change};
pub use executor::{Outcome, Planned, converge, destroy, import, plan, refresh};
pub use poll::{PollConfig, PollError, wait_until};
pub use resource::{BoxedResource, ErasedResource, Resource};
pub use types::{ApplyResult, ExecuteSummary, ResourceState};
pub use validate::Violations;
