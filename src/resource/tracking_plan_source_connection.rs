//! Tracking plan / source connection reconciler

use anyhow::Result;
use declarative::{ApplyContext, Resource, ResourceState};
use segment_api::TrackingPlanSourceConnection;
use segment_api::names;
use serde::{Deserialize, Serialize};

use super::{SharedClient, delete_tolerating_missing, not_found, read_or_absent};
use crate::error::remote;
use crate::ident::ConnectionId;

pub const TYPE: &str = "segment_tracking_plan_source_connection";

/// Declared attributes of a connection
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    pub tracking_plan_id: String,
    pub source_slug: String,
}

/// Observed state of a connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionState {
    /// `{tracking_plan_id}|{source_slug}`
    pub id: String,
    pub tracking_plan_id: String,
    pub source_slug: String,
}

/// Slug of a connected source. Names that do not parse fall back to
/// their last segment.
fn connected_slug(connection: &TrackingPlanSourceConnection) -> String {
    names::source_name_to_slug(&connection.source).unwrap_or_else(|err| {
        log::debug!("{err}; matching on the last segment");
        let last = connection.source.rsplit('/').next();
        last.unwrap_or_default().to_string()
    })
}

pub struct TrackingPlanSourceConnectionResource {
    client: SharedClient,
}

impl TrackingPlanSourceConnectionResource {
    pub fn new(client: SharedClient) -> Self {
        Self { client }
    }

    fn fetch(&self, id: &ConnectionId) -> Result<ResourceState<ConnectionState>> {
        let key = id.to_string();
        log::debug!("list {TYPE} for {}", id.tracking_plan_id);
        let result = self
            .client
            .list_tracking_plan_source_connections(&id.tracking_plan_id);
        let ResourceState::Present(connections) = read_or_absent(TYPE, &key, result, not_found)?
        else {
            return Ok(ResourceState::Absent);
        };

        let found = connections.iter().any(|c| {
            c.tracking_plan_id == id.tracking_plan_id && connected_slug(c) == id.source_slug
        });
        if !found {
            log::warn!("{TYPE} {key} is not listed, treating as absent");
            return Ok(ResourceState::Absent);
        }
        Ok(ResourceState::Present(ConnectionState {
            id: key,
            tracking_plan_id: id.tracking_plan_id.clone(),
            source_slug: id.source_slug.clone(),
        }))
    }
}

impl Resource for TrackingPlanSourceConnectionResource {
    type Config = ConnectionConfig;
    type State = ConnectionState;

    fn resource_type(&self) -> &'static str {
        TYPE
    }

    fn id(&self, state: &ConnectionState) -> String {
        state.id.clone()
    }

    fn create(&self, _ctx: &ApplyContext, config: &ConnectionConfig) -> Result<ConnectionState> {
        let id = ConnectionId::new(&config.tracking_plan_id, &config.source_slug);
        log::debug!("create {TYPE} {id}");
        self.client
            .create_tracking_plan_source_connection(&id.tracking_plan_id, &id.source_slug)
            .map_err(remote(TYPE, &id))?;
        match self.fetch(&id)? {
            ResourceState::Present(state) => Ok(state),
            ResourceState::Absent => anyhow::bail!("{TYPE} {id} vanished right after create"),
        }
    }

    fn read(
        &self,
        _ctx: &ApplyContext,
        prior: &ConnectionState,
    ) -> Result<ResourceState<ConnectionState>> {
        self.fetch(&prior.id.parse()?)
    }

    fn delete(&self, _ctx: &ApplyContext, prior: &ConnectionState) -> Result<()> {
        log::debug!("delete {TYPE} {}", prior.id);
        let result = self
            .client
            .delete_tracking_plan_source_connection(&prior.tracking_plan_id, &prior.source_slug);
        delete_tolerating_missing(TYPE, &prior.id, result, not_found)?;
        Ok(())
    }

    fn import(&self, _ctx: &ApplyContext, id: &str) -> Result<ResourceState<ConnectionState>> {
        self.fetch(&id.parse()?)
    }

    fn changed_attributes(
        &self,
        state: &ConnectionState,
        config: &ConnectionConfig,
    ) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if state.tracking_plan_id != config.tracking_plan_id {
            changed.push("tracking_plan_id");
        }
        if state.source_slug != config.source_slug {
            changed.push("source_slug");
        }
        changed
    }

    fn replace_attributes(&self) -> &'static [&'static str] {
        &["tracking_plan_id", "source_slug"]
    }
}
