//! Tracking plan rules.
//!
//! Rules are declared per category as JSON strings. A category the user
//! declares is owned by the provider and replaces the remote value on every
//! update; a category left undeclared belongs to whoever edits the plan
//! elsewhere, so it is never sent and never read back.
//!
//! Rule bodies are kept in a canonical form (two-space pretty JSON, keys
//! sorted) so formatting never shows up as a change.

use std::collections::BTreeSet;

use declarative::Violations;
use segment_api::RuleSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

pub const GLOBAL: &str = "global";
pub const EVENTS: &str = "events";
pub const IDENTIFY: &str = "identify";
pub const GROUP: &str = "group";

/// Rule categories as declared. `None` means not managed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredRules {
    #[serde(
        default,
        rename = "rules_global",
        skip_serializing_if = "Option::is_none"
    )]
    pub global: Option<String>,
    #[serde(
        default,
        rename = "rules_events",
        skip_serializing_if = "Option::is_none"
    )]
    pub events: Option<Vec<String>>,
    #[serde(
        default,
        rename = "rules_identify",
        skip_serializing_if = "Option::is_none"
    )]
    pub identify: Option<String>,
    #[serde(
        default,
        rename = "rules_group",
        skip_serializing_if = "Option::is_none"
    )]
    pub group: Option<String>,
}

/// Canonical text of a rule value. Null has no text.
pub fn canonical_value(value: &Value) -> String {
    if value.is_null() {
        return String::new();
    }
    serde_json::to_string_pretty(value).unwrap_or_default()
}

/// Canonical text of a declared rule. Empty and unparsable text is kept as
/// is so the parse error surfaces at validation.
pub fn canonicalize(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }
    serde_json::from_str::<Value>(raw)
        .map(|value| canonical_value(&value))
        .unwrap_or_else(|_| raw.to_string())
}

/// Parse one declared rule object. Empty text clears the category.
pub fn parse_rule(category: &'static str, raw: &str) -> Result<Option<Value>, Error> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let value: Value = serde_json::from_str(raw).map_err(|err| Error::InvalidRule {
        category,
        message: err.to_string(),
    })?;
    if !value.is_object() {
        return Err(Error::InvalidRule {
            category,
            message: "expected a JSON object".into(),
        });
    }
    Ok(Some(value))
}

/// Parse declared event rules, each a JSON object with a non-empty `name`.
pub fn parse_events(raw: &[String]) -> Result<Vec<Value>, Error> {
    raw.iter()
        .enumerate()
        .map(|(i, text)| {
            let invalid = |message: String| Error::InvalidRule {
                category: EVENTS,
                message: format!("at #{i}: {message}"),
            };
            let value: Value = serde_json::from_str(text).map_err(|err| invalid(err.to_string()))?;
            match value.get("name").and_then(Value::as_str) {
                Some(name) if !name.is_empty() => Ok(value),
                _ => Err(invalid("event rule must have a non-empty \"name\"".into())),
            }
        })
        .collect()
}

fn event_identity(event: &Value) -> (String, String) {
    let name = event
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let version = event.get("version").map(Value::to_string).unwrap_or_default();
    (name, version)
}

/// Check every declared category, reporting all problems together.
pub fn validate(rules: &DeclaredRules) -> Violations {
    let mut violations = Violations::new();

    let singles = [
        (GLOBAL, &rules.global),
        (IDENTIFY, &rules.identify),
        (GROUP, &rules.group),
    ];
    for (category, raw) in singles {
        if let Some(raw) = raw
            && let Err(err) = parse_rule(category, raw)
        {
            violations.push(err.to_string());
        }
    }

    if let Some(events) = &rules.events {
        let mut seen = BTreeSet::new();
        for (i, raw) in events.iter().enumerate() {
            match parse_events(std::slice::from_ref(raw)) {
                Ok(parsed) => {
                    let (name, version) = event_identity(&parsed[0]);
                    if !seen.insert((name.clone(), version.clone())) {
                        violations.push(format!(
                            "invalid \"events\" rules: at #{i}: duplicate event {name:?} (version {})",
                            if version.is_empty() { "unset" } else { version.as_str() }
                        ));
                    }
                }
                Err(err) => violations.push(
                    err.to_string()
                        .replacen("at #0:", &format!("at #{i}:"), 1),
                ),
            }
        }
    }

    violations
}

/// Rule set to send: `remote` with every declared category replaced.
pub fn merge(mut remote: RuleSet, declared: &DeclaredRules) -> Result<RuleSet, Error> {
    if let Some(raw) = &declared.global {
        remote.global = parse_rule(GLOBAL, raw)?;
    }
    if let Some(raw) = &declared.events {
        remote.events = parse_events(raw)?;
    }
    if let Some(raw) = &declared.identify {
        remote.identify = parse_rule(IDENTIFY, raw)?;
    }
    if let Some(raw) = &declared.group {
        remote.group = parse_rule(GROUP, raw)?;
    }
    Ok(remote)
}

fn read_single(value: Option<&Value>) -> String {
    value.map(canonical_value).unwrap_or_default()
}

fn read_events(events: &[Value]) -> Vec<String> {
    events.iter().map(canonical_value).collect()
}

/// Read back only the categories `owned` manages.
pub fn read_back(owned: &DeclaredRules, remote: &RuleSet) -> DeclaredRules {
    DeclaredRules {
        global: owned.global.as_ref().map(|_| read_single(remote.global.as_ref())),
        events: owned.events.as_ref().map(|_| read_events(&remote.events)),
        identify: owned
            .identify
            .as_ref()
            .map(|_| read_single(remote.identify.as_ref())),
        group: owned.group.as_ref().map(|_| read_single(remote.group.as_ref())),
    }
}

/// Every category the remote plan has, for import.
pub fn read_all(remote: &RuleSet) -> DeclaredRules {
    DeclaredRules {
        global: remote.global.as_ref().map(canonical_value),
        events: (!remote.events.is_empty()).then(|| read_events(&remote.events)),
        identify: remote.identify.as_ref().map(canonical_value),
        group: remote.group.as_ref().map(canonical_value),
    }
}

/// Declared categories in canonical form, for comparison with state.
pub fn normalized(rules: &DeclaredRules) -> DeclaredRules {
    DeclaredRules {
        global: rules.global.as_deref().map(canonicalize),
        events: rules
            .events
            .as_ref()
            .map(|events| events.iter().map(|e| canonicalize(e)).collect()),
        identify: rules.identify.as_deref().map(canonicalize),
        group: rules.group.as_deref().map(canonicalize),
    }
}

/// Names of the rule attributes whose canonical value differs. A category
/// dropped from the declaration counts as changed so it stops being owned.
pub fn changed(state: &DeclaredRules, declared: &DeclaredRules) -> Vec<&'static str> {
    let declared = normalized(declared);
    let mut changed = Vec::new();
    if declared.global != state.global {
        changed.push("rules_global");
    }
    if declared.events != state.events {
        changed.push("rules_events");
    }
    if declared.identify != state.identify {
        changed.push("rules_identify");
    }
    if declared.group != state.group {
        changed.push("rules_group");
    }
    changed
}
