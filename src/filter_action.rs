//! Destination filter actions.
//!
//! Declared actions arrive as loosely shaped blocks (`type` plus optional
//! `percent`, `path` and `fields`). [`parse_actions`] checks every block
//! against the attributes its type allows, reports all problems together,
//! and produces typed [`Action`]s for everything downstream.

use std::collections::BTreeMap;

use declarative::Violations;
use segment_api::{EventDescription, FieldList, FilterAction};
use serde::{Deserialize, Serialize};

/// Most actions a filter may carry.
pub const MAX_ACTIONS: usize = 4;

pub const DROP_EVENT: &str = "drop_event";
pub const SAMPLE_EVENT: &str = "sample_event";
pub const ALLOW_LIST: &str = "whitelist_fields";
pub const BLOCK_LIST: &str = "blacklist_fields";

const FIELD_KEYS: [&str; 3] = ["context", "properties", "traits"];

/// Field selection block of an allow-list or block-list action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldsBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traits: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<String>>,
}

/// One declared `action` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldsBlock>,
}

/// Field names per event section, empty when a section is not selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSet {
    pub context: Vec<String>,
    pub traits: Vec<String>,
    pub properties: Vec<String>,
}

/// A validated filter action.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Drop,
    Sample { percent: f64, path: Option<String> },
    AllowList(FieldSet),
    BlockList(FieldSet),
}

impl Action {
    /// Declared type tag
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Drop => DROP_EVENT,
            Self::Sample { .. } => SAMPLE_EVENT,
            Self::AllowList(_) => ALLOW_LIST,
            Self::BlockList(_) => BLOCK_LIST,
        }
    }

    pub fn to_remote(&self) -> FilterAction {
        match self {
            Self::Drop => FilterAction::DropEvent,
            Self::Sample { percent, path } => FilterAction::SampleEvent {
                percent: *percent,
                path: path.clone().unwrap_or_default(),
            },
            Self::AllowList(fields) => FilterAction::AllowProperties {
                fields: fields.to_remote(),
            },
            Self::BlockList(fields) => FilterAction::DropProperties {
                fields: fields.to_remote(),
            },
        }
    }

    pub fn from_remote(action: &FilterAction) -> Self {
        match action {
            FilterAction::DropEvent => Self::Drop,
            FilterAction::SampleEvent { percent, path } => Self::Sample {
                percent: *percent,
                path: (!path.is_empty()).then(|| path.clone()),
            },
            FilterAction::AllowProperties { fields } => Self::AllowList(FieldSet::from_remote(fields)),
            FilterAction::DropProperties { fields } => Self::BlockList(FieldSet::from_remote(fields)),
        }
    }

    /// Declared form, omitting unset attributes and empty field lists.
    pub fn to_block(&self) -> ActionBlock {
        let (percent, path, fields) = match self {
            Self::Drop => (None, None, Vec::new()),
            Self::Sample { percent, path } => (Some(*percent), path.clone(), Vec::new()),
            Self::AllowList(fields) | Self::BlockList(fields) => {
                (None, None, vec![fields.to_block()])
            }
        };
        ActionBlock {
            kind: self.tag().to_string(),
            percent,
            path,
            fields,
        }
    }
}

impl FieldSet {
    fn to_remote(&self) -> EventDescription {
        EventDescription::new(
            self.properties.clone(),
            self.context.clone(),
            self.traits.clone(),
        )
    }

    fn from_remote(fields: &EventDescription) -> Self {
        let list = |f: &Option<FieldList>| f.as_ref().map(|l| l.fields.clone()).unwrap_or_default();
        Self {
            context: list(&fields.context),
            traits: list(&fields.traits),
            properties: list(&fields.properties),
        }
    }

    fn to_block(&self) -> FieldsBlock {
        let list = |f: &Vec<String>| (!f.is_empty()).then(|| f.clone());
        FieldsBlock {
            context: list(&self.context),
            traits: list(&self.traits),
            properties: list(&self.properties),
        }
    }

    fn from_block(block: &FieldsBlock) -> Self {
        Self {
            context: block.context.clone().unwrap_or_default(),
            traits: block.traits.clone().unwrap_or_default(),
            properties: block.properties.clone().unwrap_or_default(),
        }
    }
}

fn forbidden_scalars(block: &ActionBlock) -> Vec<&'static str> {
    let mut set = Vec::new();
    if block.percent.is_some_and(|p| p != 0.0) {
        set.push("percent");
    }
    if block.path.as_deref().is_some_and(|p| !p.is_empty()) {
        set.push("path");
    }
    set
}

fn check_field_names(i: usize, kind: &str, block: &FieldsBlock, violations: &mut Violations) {
    let sections = [
        ("context", &block.context),
        ("properties", &block.properties),
        ("traits", &block.traits),
    ];
    for (section, names) in sections {
        for name in names.iter().flatten() {
            if name.is_empty() {
                violations.push(format!(
                    "at {i}: for {kind:?} action, {section:?} contains an empty field name"
                ));
            } else if name.contains('.') {
                violations.push(format!(
                    "at {i}: for {kind:?} action, nested field {name:?} in {section:?} is not supported"
                ));
            }
        }
    }
}

fn parse_one(i: usize, block: &ActionBlock, violations: &mut Violations) -> Option<Action> {
    let kind = block.kind.as_str();
    let before = violations.len();

    let action = match kind {
        DROP_EVENT => {
            let extra = forbidden_scalars(block);
            if !extra.is_empty() {
                violations.push(format!(
                    "at {i}: for {kind:?} action, attributes {extra:?} should not be set"
                ));
            }
            if !block.fields.is_empty() {
                violations.push(format!(
                    "at {i}: for {kind:?} action, block \"fields\" should not be set"
                ));
            }
            Action::Drop
        }
        SAMPLE_EVENT => {
            match block.percent {
                None => violations.push(format!(
                    "at {i}: for {kind:?} action, attributes [\"percent\"] must be set"
                )),
                Some(p) if !(0.0..=1.0).contains(&p) => violations.push(format!(
                    "at {i}: for {kind:?} action, percent {p} must be in [0.0, 1.0]"
                )),
                Some(_) => {}
            }
            if !block.fields.is_empty() {
                violations.push(format!(
                    "at {i}: for {kind:?} action, block \"fields\" should not be set"
                ));
            }
            Action::Sample {
                percent: block.percent.unwrap_or_default(),
                path: block.path.clone().filter(|p| !p.is_empty()),
            }
        }
        ALLOW_LIST | BLOCK_LIST => {
            let extra = forbidden_scalars(block);
            if !extra.is_empty() {
                violations.push(format!(
                    "at {i}: for {kind:?} action, attributes {extra:?} should not be set"
                ));
            }
            let fields = match block.fields.as_slice() {
                [only] => {
                    let unset = |names: &Option<Vec<String>>| names.as_ref().is_none_or(Vec::is_empty);
                    if unset(&only.context) && unset(&only.traits) && unset(&only.properties) {
                        violations.push(format!(
                            "at {i}: for {kind:?} action in \"fields\" block at least one of {FIELD_KEYS:?} must be set"
                        ));
                    }
                    check_field_names(i, kind, only, violations);
                    FieldSet::from_block(only)
                }
                other => {
                    violations.push(format!(
                        "at {i}: for {kind:?} action, exactly one block \"fields\" must be set (is: {})",
                        other.len()
                    ));
                    FieldSet::default()
                }
            };
            if kind == ALLOW_LIST {
                Action::AllowList(fields)
            } else {
                Action::BlockList(fields)
            }
        }
        _ => {
            violations.push(format!("at {i}: invalid action type: {kind:?}"));
            return None;
        }
    };

    (violations.len() == before).then_some(action)
}

/// Validate declared action blocks and convert them to typed actions.
///
/// Every block is checked; all violations are returned together.
pub fn parse_actions(blocks: &[ActionBlock]) -> Result<Vec<Action>, Violations> {
    let mut violations = Violations::new();

    if blocks.is_empty() {
        violations.push("at least one action must be set");
    }
    if blocks.len() > MAX_ACTIONS {
        violations.push(format!(
            "at most {MAX_ACTIONS} actions may be set (is: {})",
            blocks.len()
        ));
    }

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for block in blocks {
        *counts.entry(block.kind.as_str()).or_default() += 1;
    }
    let event_actions = counts.get(DROP_EVENT).unwrap_or(&0) + counts.get(SAMPLE_EVENT).unwrap_or(&0);
    if event_actions > 1 {
        violations.push(format!(
            "at most one of {:?} and {:?} may be set (is: {event_actions})",
            DROP_EVENT, SAMPLE_EVENT
        ));
    }
    for kind in [ALLOW_LIST, BLOCK_LIST] {
        let count = counts.get(kind).copied().unwrap_or(0);
        if count > 1 {
            violations.push(format!("at most one {kind:?} action may be set (is: {count})"));
        }
    }

    let actions: Vec<Action> = blocks
        .iter()
        .enumerate()
        .filter_map(|(i, block)| parse_one(i, block, &mut violations))
        .collect();

    violations.into_result().map(|()| actions)
}

/// Sort key making action lists comparable as sets.
pub fn sort_blocks(blocks: &mut [ActionBlock]) {
    blocks.sort_by_cached_key(|block| serde_json::to_string(block).unwrap_or_default());
}
