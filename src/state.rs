use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// State Structures
// ============================================================================

/// Observed state of one managed resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    pub address: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub state: Value,
}

/// State file tracking every resource the provider manages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    /// Last time the state was written
    pub last_updated: DateTime<Utc>,

    /// Entries in the order they were first recorded
    #[serde(default)]
    pub resources: Vec<StateEntry>,

    #[serde(skip)]
    path: PathBuf,
}

// ============================================================================
// StateFile Implementation
// ============================================================================

impl StateFile {
    /// Empty state that will be written to `path`
    pub fn empty(path: &Path) -> Self {
        Self {
            last_updated: Utc::now(),
            resources: Vec::new(),
            path: path.to_path_buf(),
        }
    }

    /// Load state from disk, or return empty state if the file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file {} does not exist, starting empty", path.display());
            return Ok(Self::empty(path));
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let mut state: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;
        state.path = path.to_path_buf();

        log::debug!("Loaded state from {}", path.display());
        Ok(state)
    }

    /// Save state to disk
    pub fn save(&self) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let content =
            serde_json::to_string_pretty(&self).context("Failed to serialize state to JSON")?;

        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write state file: {}", self.path.display()))?;

        log::debug!("Saved state to {}", self.path.display());
        Ok(())
    }

    /// Update the last_updated timestamp and save
    pub fn touch(&mut self) -> Result<()> {
        self.last_updated = Utc::now();
        self.save()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ========================================================================
    // Entry Helpers
    // ========================================================================

    pub fn get(&self, address: &str) -> Option<&StateEntry> {
        self.resources.iter().find(|e| e.address == address)
    }

    /// Record an entry, keeping the position of an existing one
    pub fn upsert(&mut self, entry: StateEntry) {
        match self.resources.iter_mut().find(|e| e.address == entry.address) {
            Some(existing) => *existing = entry,
            None => self.resources.push(entry),
        }
    }

    /// Record `state` for `address`, or drop the entry when `None`
    pub fn record(&mut self, address: &str, kind: &str, state: Option<Value>) {
        match state {
            Some(state) => self.upsert(StateEntry {
                address: address.to_string(),
                kind: kind.to_string(),
                state,
            }),
            None => {
                self.remove(address);
            }
        }
    }

    pub fn remove(&mut self, address: &str) -> Option<StateEntry> {
        let index = self.resources.iter().position(|e| e.address == address)?;
        Some(self.resources.remove(index))
    }
}

// ============================================================================
// Tests
// ============================================================================
