use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub use segment_api::client::http::DEFAULT_API_URL;

pub const ENV_ACCESS_TOKEN: &str = "SEGMENT_ACCESS_TOKEN";
pub const ENV_WORKSPACE: &str = "SEGMENT_WORKSPACE";
pub const ENV_API_URL: &str = "SEGMENT_API_URL";

/// Get the config directory path (~/.config/segment-provider)
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("segment-provider"))
}

/// Get the default provider config file path
pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

// ============================================================================
// Provider Config
// ============================================================================

/// Provider settings as stored in the optional config file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub access_token: Option<String>,
    pub workspace: Option<String>,
    pub api_url: Option<String>,
}

impl FileConfig {
    /// Load a config file. A missing file at the default location is not an
    /// error; an explicitly requested one is.
    pub fn load(path: &Path, explicit: bool) -> Result<Self> {
        if !path.exists() {
            if explicit {
                bail!("Config file not found: {}", path.display());
            }
            log::debug!("No config file at {}, using flags and environment", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }
}

/// Values given on the command line or through the environment
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub access_token: Option<String>,
    pub workspace: Option<String>,
    pub api_url: Option<String>,
}

/// Resolved provider configuration
#[derive(Clone)]
pub struct ProviderConfig {
    pub access_token: String,
    pub workspace: String,
    pub api_url: String,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("access_token", &"<redacted>")
            .field("workspace", &self.workspace)
            .field("api_url", &self.api_url)
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl ProviderConfig {
    /// Resolve configuration from the config file and overrides
    pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let file = match path {
            Some(path) => FileConfig::load(path, true)?,
            None => FileConfig::load(&default_config_path()?, false)?,
        };
        Self::resolve(file, overrides)
    }

    /// Merge file values with overrides; overrides win
    pub fn resolve(file: FileConfig, overrides: Overrides) -> Result<Self> {
        let access_token = non_empty(overrides.access_token)
            .or_else(|| non_empty(file.access_token))
            .with_context(|| {
                format!("Missing access token: pass --access-token or set {ENV_ACCESS_TOKEN}")
            })?;
        let workspace = non_empty(overrides.workspace)
            .or_else(|| non_empty(file.workspace))
            .with_context(|| {
                format!("Missing workspace: pass --workspace or set {ENV_WORKSPACE}")
            })?;
        let api_url = non_empty(overrides.api_url)
            .or_else(|| non_empty(file.api_url))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        Ok(Self {
            access_token,
            workspace,
            api_url,
        })
    }
}

// ============================================================================
// Declared Document
// ============================================================================

/// One declared resource: an address, a type name and its attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclaredResource {
    pub address: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl DeclaredResource {
    pub fn attributes_value(&self) -> Value {
        Value::Object(self.attributes.clone())
    }
}

/// A declaration file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Document {
    #[serde(default, rename = "resource")]
    pub resources: Vec<DeclaredResource>,
}

impl Document {
    /// Load a document. `.toml` files are TOML, anything else JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let is_toml = path.extension().is_some_and(|ext| ext == "toml");
        let document: Self = if is_toml {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML document: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON document: {}", path.display()))?
        };

        document.check_addresses()?;
        log::debug!(
            "Loaded {} declared resources from {}",
            document.resources.len(),
            path.display()
        );
        Ok(document)
    }

    fn check_addresses(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for resource in &self.resources {
            if resource.address.trim().is_empty() {
                bail!("Resource of type '{}' has an empty address", resource.kind);
            }
            if !seen.insert(resource.address.as_str()) {
                bail!("Duplicate resource address '{}'", resource.address);
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_overrides_win_over_file() {
        let file = FileConfig {
            access_token: Some("file-token".into()),
            workspace: Some("file-ws".into()),
            api_url: Some("http://localhost:9000".into()),
        };
        let overrides = Overrides {
            workspace: Some("flag-ws".into()),
            ..Default::default()
        };
        let config = ProviderConfig::resolve(file, overrides).unwrap();
        assert_eq!(config.access_token, "file-token");
        assert_eq!(config.workspace, "flag-ws");
        assert_eq!(config.api_url, "http://localhost:9000");
    }

    #[test]
    fn test_default_api_url() {
        let overrides = Overrides {
            access_token: Some("t".into()),
            workspace: Some("acme".into()),
            api_url: None,
        };
        let config = ProviderConfig::resolve(FileConfig::default(), overrides).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_missing_values_name_flag_and_env() {
        let err = ProviderConfig::resolve(FileConfig::default(), Overrides::default()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("--access-token"));
        assert!(message.contains(ENV_ACCESS_TOKEN));

        let overrides = Overrides {
            access_token: Some("t".into()),
            workspace: Some("  ".into()),
            ..Default::default()
        };
        let err = ProviderConfig::resolve(FileConfig::default(), overrides).unwrap_err();
        assert!(err.to_string().contains(ENV_WORKSPACE));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = ProviderConfig {
            access_token: "secret".into(),
            workspace: "acme".into(),
            api_url: DEFAULT_API_URL.into(),
        };
        assert!(!format!("{config:?}").contains("secret"));
    }

    #[test]
    fn test_file_config_load() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "config.toml", "access_token = \"t\"\nworkspace = \"acme\"\n");
        let file = FileConfig::load(&path, true).unwrap();
        assert_eq!(file.workspace.as_deref(), Some("acme"));

        let missing = dir.path().join("nope.toml");
        assert!(FileConfig::load(&missing, false).unwrap().access_token.is_none());
        assert!(FileConfig::load(&missing, true).is_err());

        let typo = write(&dir, "typo.toml", "workspaces = \"acme\"\n");
        assert!(FileConfig::load(&typo, true).is_err());
    }

    #[test]
    fn test_document_toml() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "infra.toml",
            r#"
[[resource]]
address = "ios"
type = "segment_source"
slug = "ios"
catalog_name = "catalog/sources/ios"

[[resource]]
address = "drop-test"
type = "segment_destination_filter"
source_slug = "ios"
destination_slug = "amplitude"
title = "Drop test events"
conditions = "event = \"test\""

[[resource.action]]
type = "drop_event"
"#,
        );
        let document = Document::load(&path).unwrap();
        assert_eq!(document.resources.len(), 2);
        assert_eq!(document.resources[0].kind, "segment_source");

        let filter = &document.resources[1];
        assert_eq!(filter.address, "drop-test");
        assert!(!filter.attributes.contains_key("address"));
        assert_eq!(filter.attributes["action"][0]["type"], "drop_event");
    }

    #[test]
    fn test_document_json() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "infra.json",
            r#"{"resource": [{"address": "plan", "type": "segment_tracking_plan", "display_name": "Main"}]}"#,
        );
        let document = Document::load(&path).unwrap();
        assert_eq!(
            document.resources[0].attributes_value(),
            serde_json::json!({"display_name": "Main"})
        );
    }

    #[test]
    fn test_document_rejects_duplicate_addresses() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "dup.json",
            r#"{"resource": [
                {"address": "a", "type": "segment_source"},
                {"address": "a", "type": "segment_source"}
            ]}"#,
        );
        let err = Document::load(&path).unwrap_err();
        assert!(err.to_string().contains("Duplicate resource address 'a'"));
    }
}
