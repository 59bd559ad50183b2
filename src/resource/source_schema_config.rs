//! Source schema configuration reconciler
//!
//! Every source has exactly one schema configuration, created along with
//! the source. "Creating" it applies the declared settings and "deleting"
//! it puts the defaults back. The API applies updates asynchronously, so
//! after a write the reconciler polls until reads reflect the change.

use std::time::Instant;

use anyhow::Result;
use declarative::{ApplyContext, PollConfig, PollError, Resource, ResourceState, Violations};
use segment_api::names::{SchemaConfigName, SourceName};
use segment_api::{CommonEventSetting, SchemaSettings, SourceConfig};
use serde::{Deserialize, Serialize};

use super::{SharedClient, absent, delete_tolerating_missing, read_or_absent};
use crate::error::{Error, remote};

pub const TYPE: &str = "segment_source_schema_config";

/// Declared attributes of a schema configuration
///
/// Every setting is optional and falls back to the value a new source
/// starts with.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SchemaConfig {
    pub source_slug: String,
    pub allow_unplanned_track_events: bool,
    pub allow_unplanned_identify_traits: bool,
    pub allow_unplanned_group_traits: bool,
    pub forwarding_blocked_events_to: String,
    pub allow_unplanned_track_event_properties: bool,
    pub allow_track_event_on_violations: bool,
    pub allow_identify_traits_on_violations: bool,
    pub allow_group_traits_on_violations: bool,
    pub forwarding_violations_to: String,
    pub allow_track_properties_on_violations: bool,
    pub common_track_event_on_violations: CommonEventSetting,
    pub common_identify_event_on_violations: CommonEventSetting,
    pub common_group_event_on_violations: CommonEventSetting,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        let d = SchemaSettings::default();
        Self {
            source_slug: String::new(),
            allow_unplanned_track_events: d.allow_unplanned_track_events,
            allow_unplanned_identify_traits: d.allow_unplanned_identify_traits,
            allow_unplanned_group_traits: d.allow_unplanned_group_traits,
            forwarding_blocked_events_to: d.forwarding_blocked_events_to,
            allow_unplanned_track_event_properties: d.allow_unplanned_track_event_properties,
            allow_track_event_on_violations: d.allow_track_event_on_violations,
            allow_identify_traits_on_violations: d.allow_identify_traits_on_violations,
            allow_group_traits_on_violations: d.allow_group_traits_on_violations,
            forwarding_violations_to: d.forwarding_violations_to,
            allow_track_properties_on_violations: d.allow_track_properties_on_violations,
            common_track_event_on_violations: d.common_track_event_on_violations,
            common_identify_event_on_violations: d.common_identify_event_on_violations,
            common_group_event_on_violations: d.common_group_event_on_violations,
        }
    }
}

impl SchemaConfig {
    fn settings(&self) -> SchemaSettings {
        SchemaSettings {
            allow_unplanned_track_events: self.allow_unplanned_track_events,
            allow_unplanned_identify_traits: self.allow_unplanned_identify_traits,
            allow_unplanned_group_traits: self.allow_unplanned_group_traits,
            forwarding_blocked_events_to: self.forwarding_blocked_events_to.clone(),
            allow_unplanned_track_event_properties: self.allow_unplanned_track_event_properties,
            allow_track_event_on_violations: self.allow_track_event_on_violations,
            allow_identify_traits_on_violations: self.allow_identify_traits_on_violations,
            allow_group_traits_on_violations: self.allow_group_traits_on_violations,
            forwarding_violations_to: self.forwarding_violations_to.clone(),
            allow_track_properties_on_violations: self.allow_track_properties_on_violations,
            common_track_event_on_violations: self.common_track_event_on_violations,
            common_identify_event_on_violations: self.common_identify_event_on_violations,
            common_group_event_on_violations: self.common_group_event_on_violations,
        }
    }
}

/// Observed state of a schema configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaConfigState {
    /// Schema config name
    pub id: String,
    pub source_slug: String,
    #[serde(flatten)]
    pub settings: SchemaSettings,
}

pub struct SourceSchemaConfigResource {
    client: SharedClient,
    poll: PollConfig,
}

impl SourceSchemaConfigResource {
    pub fn new(client: SharedClient, poll: PollConfig) -> Self {
        Self { client, poll }
    }

    fn fetch(&self, slug: &str) -> Result<ResourceState<SchemaConfigState>> {
        log::debug!("get {TYPE} {slug}");
        let result = self.client.get_source_config(slug);
        let ResourceState::Present(config) = read_or_absent(TYPE, slug, result, absent)? else {
            return Ok(ResourceState::Absent);
        };
        let id = if config.name.is_empty() {
            SourceName::new(self.client.workspace(), slug).to_string()
        } else {
            config.name
        };
        Ok(ResourceState::Present(SchemaConfigState {
            id,
            source_slug: slug.to_string(),
            settings: config.settings,
        }))
    }

    /// Send `settings` and wait until reads reflect them.
    fn apply(&self, ctx: &ApplyContext, slug: &str, settings: SchemaSettings) -> Result<SchemaConfigState> {
        log::debug!("get {TYPE} {slug} before update");
        let before = self
            .client
            .get_source_config(slug)
            .map_err(remote(TYPE, slug))?;

        log::debug!("update {TYPE} {slug}");
        let unchanged = before.settings == settings;
        self.client
            .update_source_config(
                slug,
                &SourceConfig {
                    name: String::new(),
                    settings,
                },
            )
            .map_err(remote(TYPE, slug))?;

        if unchanged {
            log::debug!("{TYPE} {slug} already had the declared settings");
        } else {
            self.wait_until_modified(ctx, slug, &before.settings)?;
        }

        match self.fetch(slug)? {
            ResourceState::Present(state) => Ok(state),
            ResourceState::Absent => anyhow::bail!("{TYPE} {slug} vanished right after update"),
        }
    }

    fn wait_until_modified(
        &self,
        ctx: &ApplyContext,
        slug: &str,
        before: &SchemaSettings,
    ) -> Result<(), Error> {
        let start = Instant::now();
        let result = declarative::wait_until(&ctx.cancel, &self.poll, || {
            self.client
                .get_source_config(slug)
                .map(|current| current.settings != *before)
        });
        match result {
            Ok(waited) => {
                log::debug!("{TYPE} {slug} modified after {waited:?}");
                Ok(())
            }
            Err(PollError::Timeout { .. }) => Err(Error::Timeout {
                slug: slug.to_string(),
                waited: start.elapsed(),
            }),
            Err(PollError::Cancelled) => Err(Error::Cancelled {
                kind: TYPE,
                key: slug.to_string(),
            }),
            Err(PollError::Failed(err)) => Err(Error::remote(TYPE, slug, err)),
        }
    }
}

impl Resource for SourceSchemaConfigResource {
    type Config = SchemaConfig;
    type State = SchemaConfigState;

    fn resource_type(&self) -> &'static str {
        TYPE
    }

    fn id(&self, state: &SchemaConfigState) -> String {
        state.id.clone()
    }

    fn validate(&self, config: &SchemaConfig) -> Result<()> {
        let mut violations = Violations::new();
        if config.source_slug.is_empty() {
            violations.push("\"source_slug\" must be set");
        }
        violations
            .into_result()
            .map_err(|violations| Error::validation(TYPE, "(unnamed)", violations))?;
        Ok(())
    }

    fn create(&self, ctx: &ApplyContext, config: &SchemaConfig) -> Result<SchemaConfigState> {
        self.apply(ctx, &config.source_slug, config.settings())
    }

    fn read(
        &self,
        _ctx: &ApplyContext,
        prior: &SchemaConfigState,
    ) -> Result<ResourceState<SchemaConfigState>> {
        let name: SchemaConfigName = prior.id.parse()?;
        self.fetch(&name.source)
    }

    fn update(
        &self,
        ctx: &ApplyContext,
        prior: &SchemaConfigState,
        config: &SchemaConfig,
    ) -> Result<SchemaConfigState> {
        self.apply(ctx, &prior.source_slug, config.settings())
    }

    fn delete(&self, _ctx: &ApplyContext, prior: &SchemaConfigState) -> Result<()> {
        let slug = &prior.source_slug;
        log::debug!("reset {TYPE} {slug} to defaults");
        let result = self
            .client
            .update_source_config(
                slug,
                &SourceConfig {
                    name: String::new(),
                    settings: SchemaSettings::default(),
                },
            )
            .map(|_| ());
        delete_tolerating_missing(TYPE, slug, result, absent)?;
        Ok(())
    }

    fn import(&self, _ctx: &ApplyContext, id: &str) -> Result<ResourceState<SchemaConfigState>> {
        let slug = if id.contains('/') {
            id.parse::<SchemaConfigName>()?.source
        } else {
            id.to_string()
        };
        self.fetch(&slug)
    }

    fn changed_attributes(
        &self,
        state: &SchemaConfigState,
        config: &SchemaConfig,
    ) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if state.source_slug != config.source_slug {
            changed.push("source_slug");
        }
        let (Ok(current), Ok(desired)) = (
            serde_json::to_value(&state.settings),
            serde_json::to_value(config.settings()),
        ) else {
            return changed;
        };
        changed.extend(
            SchemaSettings::FIELD_PATHS
                .into_iter()
                .filter(|field| current.get(field) != desired.get(field)),
        );
        changed
    }

    fn replace_attributes(&self) -> &'static [&'static str] {
        &["source_slug"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{ApplyResult, CancelToken, converge};
    use segment_api::{ApiError, Client, MockClient, Propagation};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn scaled() -> PollConfig {
        PollConfig::new(Duration::from_millis(10), Duration::from_millis(300))
    }

    fn setup(poll: PollConfig) -> (MockClient, SourceSchemaConfigResource) {
        let client = MockClient::new("acme");
        client.create_source("ios", "catalog/sources/ios").unwrap();
        let resource = SourceSchemaConfigResource::new(Arc::new(client.clone()), poll);
        (client, resource)
    }

    fn strict() -> SchemaConfig {
        SchemaConfig {
            source_slug: "ios".into(),
            allow_unplanned_track_events: false,
            common_track_event_on_violations: CommonEventSetting::Block,
            ..Default::default()
        }
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let config: SchemaConfig = serde_json::from_value(serde_json::json!({
            "source_slug": "ios",
            "allow_unplanned_group_traits": false,
            "common_group_event_on_violations": "OMIT_PROPERTIES"
        }))
        .unwrap();
        assert!(config.allow_unplanned_track_events);
        assert!(!config.allow_unplanned_group_traits);
        assert_eq!(
            config.common_group_event_on_violations,
            CommonEventSetting::OmitProperties
        );

        let typo = serde_json::from_value::<SchemaConfig>(serde_json::json!({
            "source_slug": "ios",
            "allow_unplaned_track_events": false
        }));
        assert!(typo.is_err());
    }

    #[test]
    fn test_create_applies_settings() {
        let (client, resource) = setup(scaled());
        let ctx = ApplyContext::new(false);
        let state = resource.create(&ctx, &strict()).unwrap();
        assert_eq!(state.id, "workspaces/acme/sources/ios/schema-config");
        assert!(!state.settings.allow_unplanned_track_events);
        assert!(resource.changed_attributes(&state, &strict()).is_empty());
        assert!(!client.get_source_config("ios").unwrap().settings.allow_unplanned_track_events);
    }

    #[test]
    fn test_waits_for_delayed_propagation() {
        let (client, resource) = setup(scaled());
        client.set_propagation(Propagation::After(Duration::from_millis(60)));
        let ctx = ApplyContext::new(false);

        let start = Instant::now();
        let state = resource.create(&ctx, &strict()).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(60));
        assert!(!state.settings.allow_unplanned_track_events);
        assert!(client.call_count("get_source_config") > 2);
    }

    #[test]
    fn test_change_within_two_seconds_is_observed_with_default_bounds() {
        let (client, resource) = setup(PollConfig::default());
        client.set_propagation(Propagation::After(Duration::from_millis(1500)));
        let ctx = ApplyContext::new(false);

        let start = Instant::now();
        resource.create(&ctx, &strict()).unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1500));
        assert!(elapsed < Duration::from_secs(5), "{elapsed:?}");
    }

    #[test]
    fn test_times_out_when_never_visible() {
        let poll = scaled();
        let (client, resource) = setup(poll);
        client.set_propagation(Propagation::Never);
        let ctx = ApplyContext::new(false);

        let start = Instant::now();
        let err = resource.create(&ctx, &strict()).unwrap_err();
        let elapsed = start.elapsed();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Timeout { slug, .. }) if slug == "ios"));
        assert!(elapsed >= poll.timeout, "{elapsed:?}");
        assert!(elapsed < poll.timeout * 3, "{elapsed:?}");
        assert!(err.to_string().contains("source schema \"ios\""));
    }

    #[test]
    fn test_cancel_interrupts_wait() {
        let poll = PollConfig::new(Duration::from_secs(1), Duration::from_secs(60));
        let (client, resource) = setup(poll);
        client.set_propagation(Propagation::Never);
        let cancel = CancelToken::new();
        let ctx = ApplyContext::with_cancel(false, cancel.clone());

        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            cancel.cancel();
        });
        let start = Instant::now();
        let err = resource.create(&ctx, &strict()).unwrap_err();
        canceller.join().unwrap();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Cancelled { .. })));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_unchanged_settings_skip_the_wait() {
        let (client, resource) = setup(scaled());
        client.set_propagation(Propagation::Never);
        let ctx = ApplyContext::new(false);
        let config = SchemaConfig {
            source_slug: "ios".into(),
            ..Default::default()
        };
        let state = resource.create(&ctx, &config).unwrap();
        assert_eq!(state.settings, SchemaSettings::default());
        assert_eq!(client.call_count("get_source_config"), 2);
    }

    #[test]
    fn test_delete_resets_defaults() {
        let (client, resource) = setup(scaled());
        let ctx = ApplyContext::new(false);
        let state = resource.create(&ctx, &strict()).unwrap();
        resource.delete(&ctx, &state).unwrap();
        assert_eq!(
            client.get_source_config("ios").unwrap().settings,
            SchemaSettings::default()
        );

        client.delete_source("ios").unwrap();
        resource.delete(&ctx, &state).unwrap();
    }

    #[test]
    fn test_read_absent_after_source_removed() {
        let (client, resource) = setup(scaled());
        let ctx = ApplyContext::new(false);
        let state = resource.create(&ctx, &strict()).unwrap();
        client.delete_source("ios").unwrap();
        assert!(resource.read(&ctx, &state).unwrap().is_absent());
    }

    #[test]
    fn test_update_reports_changed_fields() {
        let (client, resource) = setup(scaled());
        let ctx = ApplyContext::new(false);
        let state = converge(&resource, &ctx, None, &strict()).unwrap().state.unwrap();

        let relaxed = SchemaConfig {
            forwarding_violations_to: "ios-violations".into(),
            ..strict()
        };
        assert_eq!(
            resource.changed_attributes(&state, &relaxed),
            vec!["forwarding_violations_to"]
        );
        let outcome = converge(&resource, &ctx, Some(&state), &relaxed).unwrap();
        assert_eq!(outcome.result, ApplyResult::Modified);
        assert_eq!(
            outcome.state.unwrap().settings.forwarding_violations_to,
            "ios-violations"
        );

        client.fail_next("update_source_config", ApiError::new(500, "boom"));
        assert!(resource.update(&ctx, &state, &strict()).is_err());
    }

    #[test]
    fn test_import_by_slug_or_name() {
        let (_, resource) = setup(scaled());
        let ctx = ApplyContext::new(false);
        let created = resource.create(&ctx, &strict()).unwrap();
        for id in ["ios", "workspaces/acme/sources/ios", "workspaces/acme/sources/ios/schema-config"] {
            let imported = resource.import(&ctx, id).unwrap().into_option().unwrap();
            assert_eq!(imported, created, "{id}");
        }
    }
}
