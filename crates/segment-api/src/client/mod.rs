//! Client trait and implementations for the Config API.
//!
//! The [`Client`] trait is the call contract the reconcilers depend on.
//! [`http::HttpClient`] talks to the real API; [`mock::MockClient`] keeps
//! everything in memory and reproduces the API's quirks for tests:
//!
//! ```
//! use segment_api::client::{Client, MockClient};
//!
//! let client = MockClient::new("acme");
//! let source = client.create_source("ios", "catalog/sources/ios").unwrap();
//! assert_eq!(source.name, "workspaces/acme/sources/ios");
//! assert!(client.get_source("android").unwrap_err().is_absent());
//! ```

pub mod http;
pub mod mock;

pub use http::HttpClient;
pub use mock::{MockClient, Propagation};

use crate::error::Result;
use crate::types::{
    Destination, DestinationConfig, DestinationFilter, Source, SourceConfig, TrackingPlan,
    TrackingPlanSourceConnection,
};

/// Calls the reconcilers make against the Config API.
///
/// Every call returns either the decoded object or an [`crate::Error`]
/// whose [`crate::Error::classify`] tells not-found apart from fatal
/// failures.
pub trait Client: Send + Sync {
    /// Workspace all calls are scoped to.
    fn workspace(&self) -> &str;

    // Sources

    fn create_source(&self, slug: &str, catalog_name: &str) -> Result<Source>;
    fn get_source(&self, slug: &str) -> Result<Source>;
    fn delete_source(&self, slug: &str) -> Result<()>;

    // Destinations

    fn create_destination(
        &self,
        source_slug: &str,
        destination_slug: &str,
        connection_mode: &str,
        enabled: bool,
        configs: Vec<DestinationConfig>,
    ) -> Result<Destination>;
    fn get_destination(&self, source_slug: &str, destination_slug: &str) -> Result<Destination>;
    fn update_destination(
        &self,
        source_slug: &str,
        destination_slug: &str,
        enabled: bool,
        configs: Vec<DestinationConfig>,
    ) -> Result<Destination>;
    fn delete_destination(&self, source_slug: &str, destination_slug: &str) -> Result<()>;

    // Destination filters

    fn create_destination_filter(
        &self,
        source_slug: &str,
        destination_slug: &str,
        filter: &DestinationFilter,
    ) -> Result<DestinationFilter>;
    fn get_destination_filter(
        &self,
        source_slug: &str,
        destination_slug: &str,
        filter_id: &str,
    ) -> Result<DestinationFilter>;
    /// Update the filter identified by `filter.name`.
    fn update_destination_filter(
        &self,
        source_slug: &str,
        destination_slug: &str,
        filter: &DestinationFilter,
    ) -> Result<DestinationFilter>;
    fn delete_destination_filter(
        &self,
        source_slug: &str,
        destination_slug: &str,
        filter_id: &str,
    ) -> Result<()>;

    // Source schema configuration

    fn get_source_config(&self, source_slug: &str) -> Result<SourceConfig>;
    fn update_source_config(&self, source_slug: &str, config: &SourceConfig)
    -> Result<SourceConfig>;

    // Tracking plans

    fn create_tracking_plan(&self, plan: &TrackingPlan) -> Result<TrackingPlan>;
    fn get_tracking_plan(&self, plan_id: &str) -> Result<TrackingPlan>;
    fn update_tracking_plan(&self, plan_id: &str, plan: &TrackingPlan) -> Result<TrackingPlan>;
    fn delete_tracking_plan(&self, plan_id: &str) -> Result<()>;
    fn list_tracking_plans(&self) -> Result<Vec<TrackingPlan>>;

    // Tracking plan source connections

    fn create_tracking_plan_source_connection(&self, plan_id: &str, source_slug: &str)
    -> Result<()>;
    fn delete_tracking_plan_source_connection(&self, plan_id: &str, source_slug: &str)
    -> Result<()>;
    fn list_tracking_plan_source_connections(
        &self,
        plan_id: &str,
    ) -> Result<Vec<TrackingPlanSourceConnection>>;
}
