//! Destination reconciler

use anyhow::Result;
use declarative::{ApplyContext, Resource, ResourceState};
use segment_api::DestinationConfig as RemoteConfig;
use segment_api::names::DestinationName;
use serde::{Deserialize, Serialize};

use super::{SharedClient, delete_tolerating_missing, not_found, read_or_absent};
use crate::config_value;
use crate::error::remote;

pub const TYPE: &str = "segment_destination";

fn default_enabled() -> bool {
    true
}

/// One destination setting as declared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigEntry {
    /// Full setting name, `.../destinations/{dst}/config/{setting}`
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Raw value; absent for zero values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ConfigEntry {
    fn to_remote(&self) -> RemoteConfig {
        RemoteConfig {
            name: self.name.clone(),
            kind: self.kind.clone(),
            value: self
                .value
                .as_deref()
                .map_or_else(|| serde_json::Value::String(String::new()), config_value::decode),
        }
    }

    fn from_remote(config: &RemoteConfig) -> Self {
        Self {
            name: config.name.clone(),
            kind: config.kind.clone(),
            value: config_value::encode(&config.value),
        }
    }

    fn normalized(&self) -> Self {
        Self {
            value: config_value::normalize(self.value.as_deref()),
            ..self.clone()
        }
    }
}

/// Settings as a set: normalized and ordered by name.
fn config_set(entries: &[ConfigEntry]) -> Vec<ConfigEntry> {
    let mut set: Vec<ConfigEntry> = entries.iter().map(ConfigEntry::normalized).collect();
    set.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.kind.cmp(&b.kind)));
    set.dedup();
    set
}

/// Declared attributes of a destination
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DestinationConfig {
    pub slug: String,
    pub source_slug: String,
    pub connection_mode: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub configs: Vec<ConfigEntry>,
}

impl DestinationConfig {
    fn remote_configs(&self) -> Vec<RemoteConfig> {
        config_set(&self.configs)
            .iter()
            .map(ConfigEntry::to_remote)
            .collect()
    }
}

/// Observed state of a destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationState {
    /// Destination name
    pub id: String,
    pub slug: String,
    pub source_slug: String,
    pub connection_mode: String,
    pub enabled: bool,
    pub configs: Vec<ConfigEntry>,
}

pub struct DestinationResource {
    client: SharedClient,
}

impl DestinationResource {
    pub fn new(client: SharedClient) -> Self {
        Self { client }
    }

    fn fetch(&self, name: &DestinationName) -> Result<ResourceState<DestinationState>> {
        let key = format!("{}/{}", name.source, name.destination);
        log::debug!("get {TYPE} {key}");
        let result = self.client.get_destination(&name.source, &name.destination);
        let ResourceState::Present(destination) = read_or_absent(TYPE, &key, result, not_found)?
        else {
            return Ok(ResourceState::Absent);
        };

        let configs: Vec<ConfigEntry> = destination
            .configs
            .iter()
            .map(ConfigEntry::from_remote)
            .collect();
        Ok(ResourceState::Present(DestinationState {
            id: destination.name,
            slug: name.destination.clone(),
            source_slug: name.source.clone(),
            connection_mode: destination.connection_mode,
            enabled: destination.enabled,
            configs: config_set(&configs),
        }))
    }

    fn fetch_created(&self, name: &str) -> Result<DestinationState> {
        let name: DestinationName = name.parse()?;
        match self.fetch(&name)? {
            ResourceState::Present(state) => Ok(state),
            ResourceState::Absent => anyhow::bail!("{TYPE} {name} vanished right after write"),
        }
    }
}

impl Resource for DestinationResource {
    type Config = DestinationConfig;
    type State = DestinationState;

    fn resource_type(&self) -> &'static str {
        TYPE
    }

    fn id(&self, state: &DestinationState) -> String {
        state.id.clone()
    }

    fn create(&self, _ctx: &ApplyContext, config: &DestinationConfig) -> Result<DestinationState> {
        let key = format!("{}/{}", config.source_slug, config.slug);
        log::debug!("create {TYPE} {key}");
        let destination = self
            .client
            .create_destination(
                &config.source_slug,
                &config.slug,
                &config.connection_mode,
                config.enabled,
                config.remote_configs(),
            )
            .map_err(remote(TYPE, &key))?;
        self.fetch_created(&destination.name)
    }

    fn read(
        &self,
        _ctx: &ApplyContext,
        prior: &DestinationState,
    ) -> Result<ResourceState<DestinationState>> {
        self.fetch(&prior.id.parse::<DestinationName>()?)
    }

    fn update(
        &self,
        _ctx: &ApplyContext,
        prior: &DestinationState,
        config: &DestinationConfig,
    ) -> Result<DestinationState> {
        let name: DestinationName = prior.id.parse()?;
        let key = format!("{}/{}", name.source, name.destination);
        log::debug!("update {TYPE} {key}");
        self.client
            .update_destination(
                &name.source,
                &name.destination,
                config.enabled,
                config.remote_configs(),
            )
            .map_err(remote(TYPE, &key))?;
        self.fetch_created(&prior.id)
    }

    fn delete(&self, _ctx: &ApplyContext, prior: &DestinationState) -> Result<()> {
        let name: DestinationName = prior.id.parse()?;
        let key = format!("{}/{}", name.source, name.destination);
        log::debug!("delete {TYPE} {key}");
        let result = self.client.delete_destination(&name.source, &name.destination);
        delete_tolerating_missing(TYPE, &key, result, not_found)?;
        Ok(())
    }

    fn import(&self, _ctx: &ApplyContext, id: &str) -> Result<ResourceState<DestinationState>> {
        self.fetch(&id.parse::<DestinationName>()?)
    }

    fn changed_attributes(
        &self,
        state: &DestinationState,
        config: &DestinationConfig,
    ) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if state.slug != config.slug {
            changed.push("slug");
        }
        if state.source_slug != config.source_slug {
            changed.push("source_slug");
        }
        if state.connection_mode != config.connection_mode {
            changed.push("connection_mode");
        }
        if state.enabled != config.enabled {
            changed.push("enabled");
        }
        if config_set(&state.configs) != config_set(&config.configs) {
            changed.push("configs");
        }
        changed
    }

    fn replace_attributes(&self) -> &'static [&'static str] {
        &["slug", "source_slug", "connection_mode"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{ApplyResult, Change, converge, plan};
    use segment_api::{Client, MockClient};
    use serde_json::json;
    use std::sync::Arc;

    const BASE: &str = "workspaces/acme/sources/ios/destinations/webhooks/config/";

    fn setup() -> (MockClient, DestinationResource) {
        let client = MockClient::new("acme");
        client.create_source("ios", "catalog/sources/ios").unwrap();
        let resource = DestinationResource::new(Arc::new(client.clone()));
        (client, resource)
    }

    fn entry(setting: &str, kind: &str, value: Option<&str>) -> ConfigEntry {
        ConfigEntry {
            name: format!("{BASE}{setting}"),
            kind: kind.into(),
            value: value.map(Into::into),
        }
    }

    fn webhooks(enabled: bool, endpoint: &str) -> DestinationConfig {
        let hooks = json!([{"hook": endpoint, "headers": [{"key": "x", "value": "y"}]}]);
        DestinationConfig {
            slug: "webhooks".into(),
            source_slug: "ios".into(),
            connection_mode: "UNSPECIFIED".into(),
            enabled,
            configs: vec![
                entry("globalHook", "string", Some("")),
                entry("hooks", "mixed", Some(&hooks.to_string())),
                entry("sharedSecret", "string", None),
            ],
        }
    }

    #[test]
    fn test_create_sends_native_values() {
        let (client, resource) = setup();
        let ctx = ApplyContext::new(false);
        resource.create(&ctx, &webhooks(true, "https://example.com/v1")).unwrap();

        let remote = client.get_destination("ios", "webhooks").unwrap();
        let hooks = remote.configs.iter().find(|c| c.name.ends_with("hooks")).unwrap();
        assert!(hooks.value.is_array());
        assert_eq!(hooks.value[0]["hook"], "https://example.com/v1");
    }

    #[test]
    fn test_read_omits_zero_values() {
        let (_, resource) = setup();
        let ctx = ApplyContext::new(false);
        let state = resource.create(&ctx, &webhooks(true, "https://example.com/v1")).unwrap();

        let global = state.configs.iter().find(|c| c.name.ends_with("globalHook")).unwrap();
        assert_eq!(global.value, None);
        let flattened = serde_json::to_value(global).unwrap();
        assert!(flattened.get("value").is_none());
        assert_eq!(state.configs.len(), 3);
    }

    #[test]
    fn test_converged_state_has_no_diff() {
        let (_, resource) = setup();
        let ctx = ApplyContext::new(false);
        let config = webhooks(true, "https://example.com/v1");
        let state = converge(&resource, &ctx, None, &config).unwrap().state.unwrap();

        let planned = plan(&resource, &ctx, Some(&state), Some(&config)).unwrap();
        assert_eq!(planned.change, Change::NoChange);
    }

    #[test]
    fn test_update_in_place() {
        let (client, resource) = setup();
        let ctx = ApplyContext::new(false);
        let state = converge(&resource, &ctx, None, &webhooks(true, "https://example.com/v1"))
            .unwrap()
            .state
            .unwrap();

        let outcome = converge(
            &resource,
            &ctx,
            Some(&state),
            &webhooks(false, "https://example.com/v2"),
        )
        .unwrap();
        assert_eq!(outcome.result, ApplyResult::Modified);
        let state = outcome.state.unwrap();
        assert!(!state.enabled);
        assert_eq!(client.call_count("update_destination"), 1);
        assert_eq!(client.call_count("delete_destination"), 0);
    }

    #[test]
    fn test_drift_detected() {
        let (client, resource) = setup();
        let ctx = ApplyContext::new(false);
        let config = webhooks(true, "https://example.com/v1");
        let state = converge(&resource, &ctx, None, &config).unwrap().state.unwrap();

        client.set_destination_enabled("ios", "webhooks", false).unwrap();
        let planned = plan(&resource, &ctx, Some(&state), Some(&config)).unwrap();
        assert_eq!(
            planned.change,
            Change::Update {
                attributes: vec!["enabled".into()]
            }
        );
    }

    #[test]
    fn test_connection_mode_change_replaces() {
        let (_, resource) = setup();
        let ctx = ApplyContext::new(false);
        let state = resource.create(&ctx, &webhooks(true, "https://a")).unwrap();
        let config = DestinationConfig {
            connection_mode: "CLOUD".into(),
            ..webhooks(true, "https://a")
        };
        assert_eq!(resource.changed_attributes(&state, &config), vec!["connection_mode"]);
        let outcome = converge(&resource, &ctx, Some(&state), &config).unwrap();
        assert_eq!(outcome.result, ApplyResult::Replaced);
    }

    #[test]
    fn test_config_order_and_formatting_ignored() {
        let (_, resource) = setup();
        let ctx = ApplyContext::new(false);
        let state = resource.create(&ctx, &webhooks(true, "https://a")).unwrap();

        let mut config = webhooks(true, "https://a");
        config.configs.reverse();
        let pretty = serde_json::to_string_pretty(&json!([
            {"headers": [{"key": "x", "value": "y"}], "hook": "https://a"}
        ]))
        .unwrap();
        config.configs[1].value = Some(pretty);
        assert!(resource.changed_attributes(&state, &config).is_empty());
    }

    #[test]
    fn test_import_and_missing() {
        let (client, resource) = setup();
        let ctx = ApplyContext::new(false);
        let created = resource.create(&ctx, &webhooks(true, "https://a")).unwrap();
        let imported = resource
            .import(&ctx, "workspaces/acme/sources/ios/destinations/webhooks")
            .unwrap()
            .into_option()
            .unwrap();
        assert_eq!(imported, created);

        client.delete_destination("ios", "webhooks").unwrap();
        assert!(resource.read(&ctx, &created).unwrap().is_absent());
        assert!(resource.import(&ctx, "webhooks").is_err());
    }
}
