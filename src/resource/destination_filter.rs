//! Destination filter reconciler
//!
//! Filters are addressed by `(source, destination, filter id)`. The API is
//! unreliable about reporting missing filters: it answers with a generic
//! validation error or an internal permission error instead of 404, so
//! reads treat every absent-class error as a deleted filter.

use anyhow::Result;
use declarative::{ApplyContext, Resource, ResourceState, Violations};
use segment_api::DestinationFilter;
use segment_api::names::{self, FilterName};
use serde::{Deserialize, Serialize};

use super::{SharedClient, absent, delete_tolerating_missing, read_or_absent};
use crate::error::{Error, remote};
use crate::filter_action::{self, Action, ActionBlock};

pub const TYPE: &str = "segment_destination_filter";

fn default_enabled() -> bool {
    true
}

/// Declared attributes of a destination filter
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    pub source_slug: String,
    pub destination_slug: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub conditions: String,
    pub action: Vec<ActionBlock>,
}

impl FilterConfig {
    fn key(&self) -> String {
        format!("{}/{}", self.source_slug, self.destination_slug)
    }

    fn check(&self) -> Result<Vec<Action>, Violations> {
        let mut violations = Violations::new();
        if self.conditions.trim().is_empty() {
            violations.push("\"conditions\" must be set");
        }
        match filter_action::parse_actions(&self.action) {
            Ok(actions) => violations.into_result().map(|()| actions),
            Err(action_violations) => {
                violations.extend(action_violations);
                Err(violations)
            }
        }
    }

    fn to_remote(&self, name: String, actions: &[Action]) -> DestinationFilter {
        DestinationFilter {
            name,
            title: self.title.clone(),
            description: self.description.clone(),
            is_enabled: self.enabled,
            conditions: self.conditions.clone(),
            actions: actions.iter().map(Action::to_remote).collect(),
        }
    }

    /// Actions in the form they are read back in.
    fn normalized_actions(&self) -> Vec<ActionBlock> {
        let mut blocks = match filter_action::parse_actions(&self.action) {
            Ok(actions) => actions.iter().map(Action::to_block).collect(),
            Err(_) => self.action.clone(),
        };
        filter_action::sort_blocks(&mut blocks);
        blocks
    }
}

/// Observed state of a destination filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    /// Filter id
    pub id: String,
    /// Full filter name
    pub name: String,
    pub source_slug: String,
    pub destination_slug: String,
    pub title: String,
    pub description: String,
    pub enabled: bool,
    pub conditions: String,
    pub action: Vec<ActionBlock>,
}

pub struct DestinationFilterResource {
    client: SharedClient,
}

impl DestinationFilterResource {
    pub fn new(client: SharedClient) -> Self {
        Self { client }
    }

    fn fetch(
        &self,
        source_slug: &str,
        destination_slug: &str,
        filter_id: &str,
    ) -> Result<ResourceState<FilterState>> {
        let key = format!("{source_slug}/{destination_slug}/{filter_id}");
        log::debug!("get {TYPE} {key}");
        let result = self
            .client
            .get_destination_filter(source_slug, destination_slug, filter_id);
        let ResourceState::Present(filter) = read_or_absent(TYPE, &key, result, absent)? else {
            return Ok(ResourceState::Absent);
        };

        let mut action: Vec<ActionBlock> = filter
            .actions
            .iter()
            .map(|a| Action::from_remote(a).to_block())
            .collect();
        filter_action::sort_blocks(&mut action);

        Ok(ResourceState::Present(FilterState {
            id: names::destination_filter_name_to_id(&filter.name)?,
            name: filter.name,
            source_slug: source_slug.to_string(),
            destination_slug: destination_slug.to_string(),
            title: filter.title,
            description: filter.description,
            enabled: filter.is_enabled,
            conditions: filter.conditions,
            action,
        }))
    }

    fn fetch_written(&self, source: &str, destination: &str, id: &str) -> Result<FilterState> {
        match self.fetch(source, destination, id)? {
            ResourceState::Present(state) => Ok(state),
            ResourceState::Absent => {
                anyhow::bail!("{TYPE} {source}/{destination}/{id} vanished right after write")
            }
        }
    }
}

impl Resource for DestinationFilterResource {
    type Config = FilterConfig;
    type State = FilterState;

    fn resource_type(&self) -> &'static str {
        TYPE
    }

    fn id(&self, state: &FilterState) -> String {
        state.id.clone()
    }

    fn validate(&self, config: &FilterConfig) -> Result<()> {
        config
            .check()
            .map_err(|violations| Error::validation(TYPE, config.key(), violations))?;
        Ok(())
    }

    fn create(&self, _ctx: &ApplyContext, config: &FilterConfig) -> Result<FilterState> {
        let key = config.key();
        let actions = config
            .check()
            .map_err(|violations| Error::validation(TYPE, &key, violations))?;

        log::debug!("create {TYPE} {key}");
        let created = self
            .client
            .create_destination_filter(
                &config.source_slug,
                &config.destination_slug,
                &config.to_remote(String::new(), &actions),
            )
            .map_err(remote(TYPE, &key))?;
        let id = names::destination_filter_name_to_id(&created.name)?;
        self.fetch_written(&config.source_slug, &config.destination_slug, &id)
    }

    fn read(&self, _ctx: &ApplyContext, prior: &FilterState) -> Result<ResourceState<FilterState>> {
        self.fetch(&prior.source_slug, &prior.destination_slug, &prior.id)
    }

    fn update(
        &self,
        _ctx: &ApplyContext,
        prior: &FilterState,
        config: &FilterConfig,
    ) -> Result<FilterState> {
        let key = format!("{}/{}", config.key(), prior.id);
        let actions = config
            .check()
            .map_err(|violations| Error::validation(TYPE, &key, violations))?;

        log::debug!("update {TYPE} {key}");
        self.client
            .update_destination_filter(
                &prior.source_slug,
                &prior.destination_slug,
                &config.to_remote(prior.name.clone(), &actions),
            )
            .map_err(remote(TYPE, &key))?;
        self.fetch_written(&prior.source_slug, &prior.destination_slug, &prior.id)
    }

    fn delete(&self, _ctx: &ApplyContext, prior: &FilterState) -> Result<()> {
        let key = format!("{}/{}/{}", prior.source_slug, prior.destination_slug, prior.id);
        log::debug!("delete {TYPE} {key}");
        let result = self.client.delete_destination_filter(
            &prior.source_slug,
            &prior.destination_slug,
            &prior.id,
        );
        delete_tolerating_missing(TYPE, &key, result, absent)?;
        Ok(())
    }

    fn import(&self, _ctx: &ApplyContext, id: &str) -> Result<ResourceState<FilterState>> {
        let name: FilterName = id.parse()?;
        self.fetch(&name.source, &name.destination, &name.filter)
    }

    fn changed_attributes(&self, state: &FilterState, config: &FilterConfig) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if state.source_slug != config.source_slug {
            changed.push("source_slug");
        }
        if state.destination_slug != config.destination_slug {
            changed.push("destination_slug");
        }
        if state.title != config.title {
            changed.push("title");
        }
        if state.description != config.description {
            changed.push("description");
        }
        if state.enabled != config.enabled {
            changed.push("enabled");
        }
        if state.conditions != config.conditions {
            changed.push("conditions");
        }
        if state.action != config.normalized_actions() {
            changed.push("action");
        }
        changed
    }

    fn replace_attributes(&self) -> &'static [&'static str] {
        &["source_slug", "destination_slug"]
    }
}
