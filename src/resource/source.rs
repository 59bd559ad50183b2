//! Source reconciler

use anyhow::Result;
use declarative::{ApplyContext, Resource, ResourceState};
use segment_api::names::{self, SourceName};
use serde::{Deserialize, Serialize};

use super::{SharedClient, delete_tolerating_missing, not_found, read_or_absent};
use crate::error::remote;

pub const TYPE: &str = "segment_source";

/// Declared attributes of a source
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub slug: String,
    pub catalog_name: String,
}

/// Observed state of a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceState {
    /// Source name
    pub id: String,
    pub slug: String,
    pub catalog_name: String,
}

pub struct SourceResource {
    client: SharedClient,
}

impl SourceResource {
    pub fn new(client: SharedClient) -> Self {
        Self { client }
    }

    fn fetch(&self, slug: &str) -> Result<ResourceState<SourceState>> {
        log::debug!("get {TYPE} {slug}");
        let source = read_or_absent(TYPE, slug, self.client.get_source(slug), not_found)?;
        let ResourceState::Present(source) = source else {
            return Ok(ResourceState::Absent);
        };
        Ok(ResourceState::Present(SourceState {
            slug: names::source_name_to_slug(&source.name)?,
            id: source.name,
            catalog_name: source.catalog_name,
        }))
    }
}

impl Resource for SourceResource {
    type Config = SourceConfig;
    type State = SourceState;

    fn resource_type(&self) -> &'static str {
        TYPE
    }

    fn id(&self, state: &SourceState) -> String {
        state.id.clone()
    }

    fn create(&self, _ctx: &ApplyContext, config: &SourceConfig) -> Result<SourceState> {
        log::debug!("create {TYPE} {}", config.slug);
        let source = self
            .client
            .create_source(&config.slug, &config.catalog_name)
            .map_err(remote(TYPE, &config.slug))?;
        let slug = names::source_name_to_slug(&source.name)?;
        match self.fetch(&slug)? {
            ResourceState::Present(state) => Ok(state),
            ResourceState::Absent => anyhow::bail!("{TYPE} {slug} vanished right after create"),
        }
    }

    fn read(&self, _ctx: &ApplyContext, prior: &SourceState) -> Result<ResourceState<SourceState>> {
        let slug = names::source_name_to_slug(&prior.id)?;
        self.fetch(&slug)
    }

    fn delete(&self, _ctx: &ApplyContext, prior: &SourceState) -> Result<()> {
        let slug = names::source_name_to_slug(&prior.id)?;
        log::debug!("delete {TYPE} {slug}");
        delete_tolerating_missing(TYPE, &slug, self.client.delete_source(&slug), not_found)?;
        Ok(())
    }

    fn import(&self, _ctx: &ApplyContext, id: &str) -> Result<ResourceState<SourceState>> {
        let slug = if id.contains('/') {
            id.parse::<SourceName>()?.source
        } else {
            id.to_string()
        };
        self.fetch(&slug)
    }

    fn changed_attributes(&self, state: &SourceState, config: &SourceConfig) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if state.slug != config.slug {
            changed.push("slug");
        }
        if state.catalog_name != config.catalog_name {
            changed.push("catalog_name");
        }
        changed
    }

    fn replace_attributes(&self) -> &'static [&'static str] {
        &["slug", "catalog_name"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{ApplyResult, converge, destroy};
    use segment_api::{ApiError, Client, MockClient};
    use std::sync::Arc;

    fn setup() -> (MockClient, SourceResource) {
        let client = MockClient::new("acme");
        let resource = SourceResource::new(Arc::new(client.clone()));
        (client, resource)
    }

    fn ios() -> SourceConfig {
        SourceConfig {
            slug: "ios".into(),
            catalog_name: "catalog/sources/ios".into(),
        }
    }

    #[test]
    fn test_create_reads_back() {
        let (client, resource) = setup();
        let ctx = ApplyContext::new(false);
        let state = resource.create(&ctx, &ios()).unwrap();
        assert_eq!(state.id, "workspaces/acme/sources/ios");
        assert_eq!(state.slug, "ios");
        assert_eq!(client.call_count("get_source"), 1);
    }

    #[test]
    fn test_read_missing_is_absent() {
        let (client, resource) = setup();
        let ctx = ApplyContext::new(false);
        let state = resource.create(&ctx, &ios()).unwrap();
        client.delete_source("ios").unwrap();
        assert!(resource.read(&ctx, &state).unwrap().is_absent());
    }

    #[test]
    fn test_read_other_error_is_fatal() {
        let (client, resource) = setup();
        let ctx = ApplyContext::new(false);
        let state = resource.create(&ctx, &ios()).unwrap();
        client.fail_next("get_source", ApiError::new(500, "boom"));
        let err = resource.read(&ctx, &state).unwrap_err();
        assert!(err.to_string().contains("segment_source ios"));
    }

    #[test]
    fn test_read_rejects_malformed_id() {
        let (_, resource) = setup();
        let ctx = ApplyContext::new(false);
        let prior = SourceState {
            id: "ios".into(),
            slug: "ios".into(),
            catalog_name: String::new(),
        };
        let err = resource.read(&ctx, &prior).unwrap_err();
        assert!(err.to_string().contains("workspaces/{workspace}/sources/{source}"));
    }

    #[test]
    fn test_catalog_change_replaces() {
        let (client, resource) = setup();
        let ctx = ApplyContext::new(false);
        let state = converge(&resource, &ctx, None, &ios()).unwrap().state.unwrap();

        let changed = SourceConfig {
            catalog_name: "catalog/sources/android".into(),
            ..ios()
        };
        let outcome = converge(&resource, &ctx, Some(&state), &changed).unwrap();
        assert_eq!(outcome.result, ApplyResult::Replaced);
        assert_eq!(outcome.state.unwrap().catalog_name, "catalog/sources/android");
        assert_eq!(client.call_count("delete_source"), 1);
    }

    #[test]
    fn test_import_by_slug_or_name() {
        let (_, resource) = setup();
        let ctx = ApplyContext::new(false);
        let created = resource.create(&ctx, &ios()).unwrap();

        let by_slug = resource.import(&ctx, "ios").unwrap().into_option().unwrap();
        let by_name = resource
            .import(&ctx, "workspaces/acme/sources/ios")
            .unwrap()
            .into_option()
            .unwrap();
        assert_eq!(by_slug, created);
        assert_eq!(by_name, created);
        assert!(resource.import(&ctx, "android").unwrap().is_absent());
    }

    #[test]
    fn test_destroy_twice() {
        let (_, resource) = setup();
        let ctx = ApplyContext::new(false);
        let state = resource.create(&ctx, &ios()).unwrap();
        assert_eq!(destroy(&resource, &ctx, &state).unwrap(), ApplyResult::Removed);
        assert_eq!(destroy(&resource, &ctx, &state).unwrap(), ApplyResult::NoChange);
    }
}
