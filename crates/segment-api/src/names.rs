//! Hierarchical resource names.
//!
//! Every Config API object is addressed by a slash-separated name such as
//! `workspaces/acme/sources/ios/destinations/webhooks`. Each segment
//! position has a fixed meaning, so parsing checks the segment count and
//! every literal segment and fails with a [`NameError`] instead of
//! returning whatever happens to sit at an index.

use std::fmt;
use std::str::FromStr;

/// A name did not have the shape expected for its kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid resource name {name:?}: expected {expected}")]
pub struct NameError {
    /// Expected pattern, e.g. `workspaces/{workspace}/sources/{source}`.
    pub expected: &'static str,
    /// The offending name.
    pub name: String,
}

const SOURCE_PATTERN: &str = "workspaces/{workspace}/sources/{source}";
const DESTINATION_PATTERN: &str =
    "workspaces/{workspace}/sources/{source}/destinations/{destination}";
const FILTER_PATTERN: &str = "workspaces/{workspace}/sources/{source}/destinations/{destination}/config/{config}/filters/{filter}";
const SCHEMA_CONFIG_PATTERN: &str = "workspaces/{workspace}/sources/{source}/schema-config";
const TRACKING_PLAN_PATTERN: &str = "workspaces/{workspace}/tracking-plans/{tracking_plan}";

/// Match `name` against `pattern`, returning the placeholder captures in
/// order. Literal segments must match exactly; placeholders must be
/// non-empty.
fn captures<'a>(name: &'a str, pattern: &'static str) -> Result<Vec<&'a str>, NameError> {
    let err = || NameError {
        expected: pattern,
        name: name.to_string(),
    };

    let segments: Vec<&str> = name.split('/').collect();
    let expected: Vec<&str> = pattern.split('/').collect();
    if segments.len() != expected.len() {
        return Err(err());
    }

    let mut out = Vec::with_capacity(expected.len() / 2);
    for (segment, literal) in segments.iter().zip(&expected) {
        if literal.starts_with('{') {
            if segment.is_empty() {
                return Err(err());
            }
            out.push(*segment);
        } else if segment != literal {
            return Err(err());
        }
    }
    Ok(out)
}

/// `workspaces/{workspace}/sources/{source}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceName {
    pub workspace: String,
    pub source: String,
}

impl SourceName {
    pub fn new(workspace: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            workspace: workspace.into(),
            source: source.into(),
        }
    }
}

impl FromStr for SourceName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let c = captures(s, SOURCE_PATTERN)?;
        Ok(Self::new(c[0], c[1]))
    }
}

impl fmt::Display for SourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "workspaces/{}/sources/{}", self.workspace, self.source)
    }
}

/// `workspaces/{workspace}/sources/{source}/destinations/{destination}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DestinationName {
    pub workspace: String,
    pub source: String,
    pub destination: String,
}

impl DestinationName {
    pub fn new(
        workspace: impl Into<String>,
        source: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            workspace: workspace.into(),
            source: source.into(),
            destination: destination.into(),
        }
    }

    /// Name of the parent source.
    pub fn source_name(&self) -> SourceName {
        SourceName::new(&self.workspace, &self.source)
    }
}

impl FromStr for DestinationName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let c = captures(s, DESTINATION_PATTERN)?;
        Ok(Self::new(c[0], c[1], c[2]))
    }
}

impl fmt::Display for DestinationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "workspaces/{}/sources/{}/destinations/{}",
            self.workspace, self.source, self.destination
        )
    }
}

/// `workspaces/{workspace}/sources/{source}/destinations/{destination}/config/{config}/filters/{filter}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterName {
    pub workspace: String,
    pub source: String,
    pub destination: String,
    /// Destination config id the filter hangs off.
    pub config: String,
    pub filter: String,
}

impl FromStr for FilterName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let c = captures(s, FILTER_PATTERN)?;
        Ok(Self {
            workspace: c[0].to_string(),
            source: c[1].to_string(),
            destination: c[2].to_string(),
            config: c[3].to_string(),
            filter: c[4].to_string(),
        })
    }
}

impl fmt::Display for FilterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "workspaces/{}/sources/{}/destinations/{}/config/{}/filters/{}",
            self.workspace, self.source, self.destination, self.config, self.filter
        )
    }
}

/// Name of a source's schema configuration.
///
/// The API returns `.../sources/{source}/schema-config`; the bare source
/// name is accepted too since it identifies the same object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaConfigName {
    pub workspace: String,
    pub source: String,
}

impl SchemaConfigName {
    pub fn new(workspace: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            workspace: workspace.into(),
            source: source.into(),
        }
    }
}

impl FromStr for SchemaConfigName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let c = captures(s, SCHEMA_CONFIG_PATTERN).or_else(|err| {
            captures(s, SOURCE_PATTERN).map_err(|_| err)
        })?;
        Ok(Self::new(c[0], c[1]))
    }
}

impl fmt::Display for SchemaConfigName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "workspaces/{}/sources/{}/schema-config",
            self.workspace, self.source
        )
    }
}

/// `workspaces/{workspace}/tracking-plans/{tracking_plan}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackingPlanName {
    pub workspace: String,
    pub tracking_plan: String,
}

impl TrackingPlanName {
    pub fn new(workspace: impl Into<String>, tracking_plan: impl Into<String>) -> Self {
        Self {
            workspace: workspace.into(),
            tracking_plan: tracking_plan.into(),
        }
    }
}

impl FromStr for TrackingPlanName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let c = captures(s, TRACKING_PLAN_PATTERN)?;
        Ok(Self::new(c[0], c[1]))
    }
}

impl fmt::Display for TrackingPlanName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "workspaces/{}/tracking-plans/{}",
            self.workspace, self.tracking_plan
        )
    }
}

// =============================================================================
// Slug helpers
// =============================================================================

/// Extract the source slug from a source name.
pub fn source_name_to_slug(name: &str) -> Result<String, NameError> {
    Ok(name.parse::<SourceName>()?.source)
}

/// Build a source name from a workspace and slug.
pub fn source_slug_to_name(workspace: &str, slug: &str) -> String {
    SourceName::new(workspace, slug).to_string()
}

/// Extract the destination slug from a destination name.
pub fn destination_name_to_slug(name: &str) -> Result<String, NameError> {
    Ok(name.parse::<DestinationName>()?.destination)
}

/// Extract the parent source slug from a destination name.
pub fn destination_name_to_source_slug(name: &str) -> Result<String, NameError> {
    Ok(name.parse::<DestinationName>()?.source)
}

/// Extract the filter id from a destination filter name.
pub fn destination_filter_name_to_id(name: &str) -> Result<String, NameError> {
    Ok(name.parse::<FilterName>()?.filter)
}

/// Extract the plan id from a tracking plan name.
pub fn tracking_plan_name_to_id(name: &str) -> Result<String, NameError> {
    Ok(name.parse::<TrackingPlanName>()?.tracking_plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_name_round_trip() {
        for slug in ["ios", "web-prod", "a_b", "x"] {
            let name = source_slug_to_name("acme", slug);
            assert_eq!(source_name_to_slug(&name).unwrap(), slug);
        }
    }

    #[test]
    fn test_source_name_rejects_longer_names() {
        let err = source_name_to_slug("workspaces/acme/sources/ios/destinations/webhooks")
            .unwrap_err();
        assert_eq!(err.expected, SOURCE_PATTERN);
        assert!(err.to_string().contains("destinations/webhooks"));
    }

    #[test]
    fn test_source_name_rejects_wrong_literal() {
        assert!(source_name_to_slug("workspaces/acme/sauces/ios").is_err());
        assert!(source_name_to_slug("workspace/acme/sources/ios").is_err());
    }

    #[test]
    fn test_source_name_rejects_empty_segment() {
        assert!(source_name_to_slug("workspaces/acme/sources/").is_err());
        assert!(source_name_to_slug("workspaces//sources/ios").is_err());
        assert!(source_name_to_slug("").is_err());
    }

    #[test]
    fn test_destination_name_round_trip() {
        let name = DestinationName::new("acme", "ios", "webhooks");
        let text = name.to_string();
        assert_eq!(text, "workspaces/acme/sources/ios/destinations/webhooks");
        assert_eq!(destination_name_to_slug(&text).unwrap(), "webhooks");
        assert_eq!(destination_name_to_source_slug(&text).unwrap(), "ios");
        assert_eq!(text.parse::<DestinationName>().unwrap(), name);
        assert_eq!(name.source_name().to_string(), "workspaces/acme/sources/ios");
    }

    #[test]
    fn test_destination_name_rejects_source_name() {
        assert!(destination_name_to_slug("workspaces/acme/sources/ios").is_err());
    }

    #[test]
    fn test_filter_name_parse() {
        let text =
            "workspaces/acme/sources/ios/destinations/webhooks/config/abc123/filters/df_123";
        let name: FilterName = text.parse().unwrap();
        assert_eq!(name.workspace, "acme");
        assert_eq!(name.source, "ios");
        assert_eq!(name.destination, "webhooks");
        assert_eq!(name.config, "abc123");
        assert_eq!(name.filter, "df_123");
        assert_eq!(name.to_string(), text);
        assert_eq!(destination_filter_name_to_id(text).unwrap(), "df_123");
    }

    #[test]
    fn test_filter_name_rejects_truncated() {
        assert!(
            destination_filter_name_to_id("workspaces/acme/sources/ios/destinations/webhooks")
                .is_err()
        );
    }

    #[test]
    fn test_schema_config_name_accepts_both_forms() {
        let full: SchemaConfigName = "workspaces/acme/sources/ios/schema-config".parse().unwrap();
        let bare: SchemaConfigName = "workspaces/acme/sources/ios".parse().unwrap();
        assert_eq!(full, bare);
        assert_eq!(full.source, "ios");
    }

    #[test]
    fn test_schema_config_name_error_names_full_pattern() {
        let err = "workspaces/acme/sources/ios/other"
            .parse::<SchemaConfigName>()
            .unwrap_err();
        assert_eq!(err.expected, SCHEMA_CONFIG_PATTERN);
    }

    #[test]
    fn test_tracking_plan_name_round_trip() {
        let name = TrackingPlanName::new("acme", "rs_123");
        assert_eq!(
            tracking_plan_name_to_id(&name.to_string()).unwrap(),
            "rs_123"
        );
        assert!(tracking_plan_name_to_id("rs_123").is_err());
    }
}
