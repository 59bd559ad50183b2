//! Command implementations
//!
//! Each command is split into a `run` entry point that does file I/O and
//! prompting, and a core function over a [`Registry`] that the tests drive
//! with an in-memory client.

pub mod apply;
pub mod destroy;
pub mod import;
pub mod plan;
pub mod refresh;
pub mod schema;
pub mod validate;

use anyhow::{Context as AnyhowContext, Result, bail};
use declarative::{ApplyContext, CancelToken, ErasedResource, PollConfig};
use segment_api::HttpClient;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{Overrides, ProviderConfig};
use crate::resource::Registry;
use crate::state::StateEntry;

/// How to reach the API, resolved lazily so offline commands need no
/// credentials
pub struct Provider {
    pub config: Option<PathBuf>,
    pub overrides: Overrides,
    pub cancel: CancelToken,
    pub poll: PollConfig,
}

impl Provider {
    /// Resolve configuration and build every reconciler over an HTTP client
    pub fn connect(&self) -> Result<Registry> {
        let config = ProviderConfig::load(self.config.as_deref(), self.overrides.clone())?;
        log::debug!("Using workspace {} at {}", config.workspace, config.api_url);
        let client = HttpClient::with_api_base(
            &config.access_token,
            &config.workspace,
            config.api_url.clone(),
        );
        Ok(Registry::new(Arc::new(client), self.poll))
    }

    pub fn apply_context(&self, dry_run: bool) -> ApplyContext {
        ApplyContext::with_cancel(dry_run, self.cancel.clone())
    }
}

/// Reconciler for a recorded state entry
fn reconciler<'r>(registry: &'r Registry, entry: &StateEntry) -> Result<&'r dyn ErasedResource> {
    registry
        .get(&entry.kind)
        .with_context(|| format!("State entry '{}' has an unusable type", entry.address))
}

fn check_cancelled(ctx: &ApplyContext) -> Result<()> {
    if ctx.is_cancelled() {
        bail!("Interrupted");
    }
    Ok(())
}

/// Ask before changing anything remote
fn confirm(prompt: &str) -> Result<bool> {
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(true)
        .interact()
        .context("Failed to read confirmation")
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::config::Document;
    use crate::state::StateFile;
    use segment_api::MockClient;
    use std::time::Duration;
    use tempfile::TempDir;

    pub fn registry(client: &MockClient) -> Registry {
        let poll = PollConfig::new(Duration::from_millis(5), Duration::from_millis(200));
        Registry::new(Arc::new(client.clone()), poll)
    }

    pub fn document(json: serde_json::Value) -> Document {
        serde_json::from_value(json).unwrap()
    }

    pub fn state(dir: &TempDir) -> StateFile {
        StateFile::load(&dir.path().join("state.json")).unwrap()
    }
}
