//! Wire types of the Segment Config API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Full name, `workspaces/{ws}/sources/{slug}`.
    pub name: String,
    /// Catalog entry, e.g. `catalog/sources/javascript`.
    pub catalog_name: String,
}

/// One destination setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// Full setting name, `.../destinations/{dst}/config/{setting}`.
    pub name: String,
    /// Setting type as reported by the catalog (`string`, `boolean`, `mixed`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Native JSON value.
    #[serde(default)]
    pub value: Value,
}

/// A destination attached to a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    /// Full name, `workspaces/{ws}/sources/{src}/destinations/{dst}`.
    pub name: String,
    #[serde(default)]
    pub connection_mode: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, rename = "config")]
    pub configs: Vec<DestinationConfig>,
}

/// Field names of one event section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldList {
    #[serde(default)]
    pub fields: Vec<String>,
}

/// Field selection for allow-list and block-list actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<FieldList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<FieldList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traits: Option<FieldList>,
}

impl EventDescription {
    /// Build a description, omitting empty lists.
    pub fn new(properties: Vec<String>, context: Vec<String>, traits: Vec<String>) -> Self {
        let list = |fields: Vec<String>| (!fields.is_empty()).then_some(FieldList { fields });
        Self {
            properties: list(properties),
            context: list(context),
            traits: list(traits),
        }
    }
}

/// A destination filter action as the API encodes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterAction {
    /// Drop matching events.
    DropEvent,
    /// Let a fraction of matching events through.
    SampleEvent {
        percent: f64,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        path: String,
    },
    /// Keep only the listed fields.
    AllowProperties { fields: EventDescription },
    /// Drop the listed fields.
    DropProperties { fields: EventDescription },
}

/// A destination filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DestinationFilter {
    /// Full name; empty when creating.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "enabled")]
    pub is_enabled: bool,
    /// FQL condition.
    #[serde(default, rename = "if")]
    pub conditions: String,
    #[serde(default)]
    pub actions: Vec<FilterAction>,
}

/// Policy for events that are not in the tracking plan or violate it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommonEventSetting {
    #[default]
    Allow,
    OmitProperties,
    Block,
}

impl CommonEventSetting {
    /// Wire literal.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "ALLOW",
            Self::OmitProperties => "OMIT_PROPERTIES",
            Self::Block => "BLOCK",
        }
    }
}

/// Schema settings of a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSettings {
    pub allow_unplanned_track_events: bool,
    pub allow_unplanned_identify_traits: bool,
    pub allow_unplanned_group_traits: bool,
    #[serde(default)]
    pub forwarding_blocked_events_to: String,
    pub allow_unplanned_track_event_properties: bool,
    pub allow_track_event_on_violations: bool,
    pub allow_identify_traits_on_violations: bool,
    pub allow_group_traits_on_violations: bool,
    #[serde(default)]
    pub forwarding_violations_to: String,
    pub allow_track_properties_on_violations: bool,
    #[serde(default)]
    pub common_track_event_on_violations: CommonEventSetting,
    #[serde(default)]
    pub common_identify_event_on_violations: CommonEventSetting,
    #[serde(default)]
    pub common_group_event_on_violations: CommonEventSetting,
}

impl Default for SchemaSettings {
    /// Settings a freshly created source starts with.
    fn default() -> Self {
        Self {
            allow_unplanned_track_events: true,
            allow_unplanned_identify_traits: true,
            allow_unplanned_group_traits: true,
            forwarding_blocked_events_to: String::new(),
            allow_unplanned_track_event_properties: true,
            allow_track_event_on_violations: true,
            allow_identify_traits_on_violations: true,
            allow_group_traits_on_violations: true,
            forwarding_violations_to: String::new(),
            allow_track_properties_on_violations: true,
            common_track_event_on_violations: CommonEventSetting::Allow,
            common_identify_event_on_violations: CommonEventSetting::Allow,
            common_group_event_on_violations: CommonEventSetting::Allow,
        }
    }
}

impl SchemaSettings {
    /// Field paths sent in update masks.
    pub const FIELD_PATHS: [&'static str; 13] = [
        "allow_unplanned_track_events",
        "allow_unplanned_identify_traits",
        "allow_unplanned_group_traits",
        "forwarding_blocked_events_to",
        "allow_unplanned_track_event_properties",
        "allow_track_event_on_violations",
        "allow_identify_traits_on_violations",
        "allow_group_traits_on_violations",
        "forwarding_violations_to",
        "allow_track_properties_on_violations",
        "common_track_event_on_violations",
        "common_identify_event_on_violations",
        "common_group_event_on_violations",
    ];
}

/// Schema configuration of a source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(flatten)]
    pub settings: SchemaSettings,
}

/// Rules of a tracking plan. Rule bodies are opaque JSON objects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identify: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<Value>,
}

/// A tracking plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackingPlan {
    /// Full name; empty when creating.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub rules: RuleSet,
}

/// A source connected to a tracking plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingPlanSourceConnection {
    pub tracking_plan_id: String,
    /// Full source name.
    pub source: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_action_wire_format() {
        let actions = vec![
            FilterAction::DropEvent,
            FilterAction::SampleEvent {
                percent: 0.5,
                path: String::new(),
            },
            FilterAction::AllowProperties {
                fields: EventDescription::new(vec!["a".into()], vec![], vec![]),
            },
        ];
        let value = serde_json::to_value(&actions).unwrap();
        assert_eq!(
            value,
            json!([
                {"type": "DROP_EVENT"},
                {"type": "SAMPLE_EVENT", "percent": 0.5},
                {"type": "ALLOW_PROPERTIES", "fields": {"properties": {"fields": ["a"]}}}
            ])
        );
    }

    #[test]
    fn test_filter_action_parse_block_list() {
        let action: FilterAction = serde_json::from_value(json!({
            "type": "DROP_PROPERTIES",
            "fields": {"context": {"fields": ["ip"]}, "traits": {"fields": ["email"]}}
        }))
        .unwrap();
        let FilterAction::DropProperties { fields } = action else {
            panic!("expected block list");
        };
        assert!(fields.properties.is_none());
        assert_eq!(fields.context.unwrap().fields, vec!["ip"]);
        assert_eq!(fields.traits.unwrap().fields, vec!["email"]);
    }

    #[test]
    fn test_destination_filter_uses_if_and_enabled() {
        let filter = DestinationFilter {
            title: "t".into(),
            is_enabled: true,
            conditions: "all".into(),
            ..Default::default()
        };
        let value = serde_json::to_value(&filter).unwrap();
        assert_eq!(value["if"], "all");
        assert_eq!(value["enabled"], true);
        assert!(value.get("name").is_none());
    }

    #[test]
    fn test_source_config_flattened() {
        let config: SourceConfig = serde_json::from_value(json!({
            "name": "workspaces/acme/sources/ios/schema-config",
            "allow_unplanned_track_events": false,
            "allow_unplanned_identify_traits": true,
            "allow_unplanned_group_traits": true,
            "allow_unplanned_track_event_properties": true,
            "allow_track_event_on_violations": true,
            "allow_identify_traits_on_violations": true,
            "allow_group_traits_on_violations": true,
            "allow_track_properties_on_violations": true,
            "common_track_event_on_violations": "BLOCK"
        }))
        .unwrap();
        assert!(!config.settings.allow_unplanned_track_events);
        assert_eq!(
            config.settings.common_track_event_on_violations,
            CommonEventSetting::Block
        );
        assert_eq!(
            config.settings.common_group_event_on_violations,
            CommonEventSetting::Allow
        );
    }

    #[test]
    fn test_rule_set_omits_absent_categories() {
        let rules = RuleSet {
            identify: Some(json!({"type": "object"})),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&rules).unwrap(),
            json!({"identify": {"type": "object"}})
        );
    }
}
