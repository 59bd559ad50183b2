//! Change computation for resources

use crate::resource::Resource;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What has to happen to a resource to reach its declared state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Change {
    /// Declared but not present remotely
    Create,
    /// Present, with attributes that can change in place
    Update { attributes: Vec<String> },
    /// Present, with at least one force-new attribute changed
    Replace { attributes: Vec<String> },
    /// Present but no longer declared
    Delete,
    /// Already converged
    NoChange,
}

impl Change {
    /// Check if the change does anything
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::NoChange)
    }

    /// Short marker for plan output
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Create => "+",
            Self::Update { .. } => "~",
            Self::Replace { .. } => "-/+",
            Self::Delete => "-",
            Self::NoChange => "=",
        }
    }

    /// Attributes that triggered the change
    pub fn attributes(&self) -> &[String] {
        match self {
            Self::Update { attributes } | Self::Replace { attributes } => attributes,
            _ => &[],
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update { attributes } => write!(f, "update ({})", attributes.join(", ")),
            Self::Replace { attributes } => {
                write!(f, "replace ({})", attributes.join(", "))
            }
            Self::Delete => write!(f, "delete"),
            Self::NoChange => write!(f, "no changes"),
        }
    }
}

/// Compute the change from the observed `current` state to `desired`
pub fn compute_change<R: Resource + ?Sized>(
    resource: &R,
    current: Option<&R::State>,
    desired: Option<&R::Config>,
) -> Change {
    match (current, desired) {
        (None, Some(_)) => Change::Create,
        (None, None) => Change::NoChange,
        (Some(_), None) => Change::Delete,
        (Some(state), Some(config)) => {
            let changed = resource.changed_attributes(state, config);
            if changed.is_empty() {
                return Change::NoChange;
            }
            let force_new = resource.replace_attributes();
            let attributes = changed.iter().map(ToString::to_string).collect();
            if changed.iter().any(|attr| force_new.contains(attr)) {
                Change::Replace { attributes }
            } else {
                Change::Update { attributes }
            }
        }
    }
}

/// Plan summary statistics
#[derive(Debug, Clone, Default)]
pub struct DiffSummary {
    pub creates: usize,
    pub updates: usize,
    pub replaces: usize,
    pub deletes: usize,
    pub unchanged: usize,
}

impl DiffSummary {
    /// Create a summary from a list of changes
    pub fn from_changes<'a>(changes: impl IntoIterator<Item = &'a Change>) -> Self {
        let mut summary = Self::default();
        for change in changes {
            match change {
                Change::Create => summary.creates += 1,
                Change::Update { .. } => summary.updates += 1,
                Change::Replace { .. } => summary.replaces += 1,
                Change::Delete => summary.deletes += 1,
                Change::NoChange => summary.unchanged += 1,
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.creates + self.updates + self.replaces + self.deletes
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ApplyContext;
    use crate::types::ResourceState;

    struct Pair;

    impl Resource for Pair {
        type Config = (String, String);
        type State = (String, String);

        fn resource_type(&self) -> &'static str {
            "pair"
        }

        fn id(&self, state: &Self::State) -> String {
            state.0.clone()
        }

        fn create(&self, _ctx: &ApplyContext, config: &Self::Config) -> anyhow::Result<Self::State> {
            Ok(config.clone())
        }

        fn read(
            &self,
            _ctx: &ApplyContext,
            prior: &Self::State,
        ) -> anyhow::Result<ResourceState<Self::State>> {
            Ok(ResourceState::Present(prior.clone()))
        }

        fn delete(&self, _ctx: &ApplyContext, _prior: &Self::State) -> anyhow::Result<()> {
            Ok(())
        }

        fn import(
            &self,
            _ctx: &ApplyContext,
            _id: &str,
        ) -> anyhow::Result<ResourceState<Self::State>> {
            Ok(ResourceState::Absent)
        }

        fn changed_attributes(
            &self,
            state: &Self::State,
            config: &Self::Config,
        ) -> Vec<&'static str> {
            let mut changed = Vec::new();
            if state.0 != config.0 {
                changed.push("key");
            }
            if state.1 != config.1 {
                changed.push("value");
            }
            changed
        }

        fn replace_attributes(&self) -> &'static [&'static str] {
            &["key"]
        }
    }

    fn pair(key: &str, value: &str) -> (String, String) {
        (key.to_string(), value.to_string())
    }

    #[test]
    fn test_create_and_delete() {
        assert_eq!(compute_change(&Pair, None, Some(&pair("a", "1"))), Change::Create);
        assert_eq!(compute_change(&Pair, Some(&pair("a", "1")), None), Change::Delete);
        assert_eq!(compute_change(&Pair, None, None), Change::NoChange);
    }

    #[test]
    fn test_update_in_place() {
        let change = compute_change(&Pair, Some(&pair("a", "1")), Some(&pair("a", "2")));
        assert_eq!(
            change,
            Change::Update {
                attributes: vec!["value".into()]
            }
        );
        assert_eq!(change.to_string(), "update (value)");
    }

    #[test]
    fn test_force_new_replaces() {
        let change = compute_change(&Pair, Some(&pair("a", "1")), Some(&pair("b", "2")));
        assert_eq!(change.symbol(), "-/+");
        assert_eq!(change.attributes(), ["key", "value"]);
    }

    #[test]
    fn test_summary() {
        let changes = [
            Change::Create,
            Change::NoChange,
            Change::Replace { attributes: vec![] },
        ];
        let summary = DiffSummary::from_changes(&changes);
        assert_eq!(summary.total(), 2);
        assert_eq!(summary.unchanged, 1);
        assert!(summary.has_changes());
    }
}
