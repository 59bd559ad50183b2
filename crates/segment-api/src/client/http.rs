//! Blocking HTTP client for the Config API (v1beta).
//!
//! Requests carry a bearer token and JSON envelopes (`{"source": ...}`,
//! `{"filter": ...}`, ...). Non-2xx answers are decoded from
//! `{"error": "...", "code": n}` into an [`ApiError`]; when the body is not
//! in that shape the HTTP status and raw body are used instead.

use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use ureq::http::Response;
use ureq::{Agent, Body};

use super::Client;
use crate::error::{ApiError, Result};
use crate::names::{DestinationName, SourceName};
use crate::types::{
    Destination, DestinationConfig, DestinationFilter, SchemaSettings, Source, SourceConfig,
    TrackingPlan, TrackingPlanSourceConnection,
};

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "https://platform.segmentapis.com/v1beta";

const USER_AGENT: &str = "segment-provider-rs";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Config API client over HTTPS.
pub struct HttpClient {
    /// HTTP agent for requests.
    agent: Agent,
    /// API base URL, without trailing slash.
    api_base: String,
    /// `Bearer {token}` header value.
    authorization: String,
    workspace: String,
}

impl HttpClient {
    /// Create a client for the public API.
    #[must_use]
    pub fn new(access_token: &str, workspace: &str) -> Self {
        Self::with_api_base(access_token, workspace, DEFAULT_API_URL)
    }

    /// Create a client with a custom API base (for proxies and testing).
    #[must_use]
    pub fn with_api_base(access_token: &str, workspace: &str, api_base: impl Into<String>) -> Self {
        let config = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build();
        Self {
            agent: Agent::new_with_config(config),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            authorization: format!("Bearer {access_token}"),
            workspace: workspace.to_string(),
        }
    }

    /// Get the current API base URL.
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn url(&self, path: &str) -> String {
        format!("{}/workspaces/{}/{}", self.api_base, self.workspace, path)
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        log::debug!("GET {path}");
        let response = self
            .agent
            .get(&self.url(path))
            .header("Authorization", self.authorization.as_str())
            .header("User-Agent", USER_AGENT)
            .call()?;
        decode(response)
    }

    fn delete(&self, path: &str) -> Result<()> {
        log::debug!("DELETE {path}");
        let response = self
            .agent
            .delete(&self.url(path))
            .header("Authorization", self.authorization.as_str())
            .header("User-Agent", USER_AGENT)
            .call()?;
        check(response).map(|_| ())
    }

    fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        log::debug!("POST {path}");
        let response = self
            .agent
            .post(&self.url(path))
            .header("Authorization", self.authorization.as_str())
            .header("User-Agent", USER_AGENT)
            .send_json(body)?;
        decode(response)
    }

    fn patch<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        log::debug!("PATCH {path}");
        let response = self
            .agent
            .patch(&self.url(path))
            .header("Authorization", self.authorization.as_str())
            .header("User-Agent", USER_AGENT)
            .send_json(body)?;
        decode(response)
    }
}

/// Return the response if it is a success, the decoded API error otherwise.
fn check(mut response: Response<Body>) -> Result<Response<Body>> {
    let status = response.status().as_u16();
    if response.status().is_success() {
        return Ok(response);
    }
    let body = response.body_mut().read_to_string().unwrap_or_default();
    Err(api_error(status, &body).into())
}

fn decode<T: DeserializeOwned>(response: Response<Body>) -> Result<T> {
    let mut response = check(response)?;
    Ok(response.body_mut().read_json()?)
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default, alias = "message")]
    error: String,
    #[serde(default)]
    code: Option<i64>,
}

/// Build an [`ApiError`] from a failed response.
fn api_error(status: u16, body: &str) -> ApiError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) if !parsed.error.is_empty() || parsed.code.is_some() => {
            ApiError::new(parsed.code.unwrap_or_else(|| i64::from(status)), parsed.error)
        }
        _ => ApiError::new(i64::from(status), body.trim()),
    }
}

impl Client for HttpClient {
    fn workspace(&self) -> &str {
        &self.workspace
    }

    fn create_source(&self, slug: &str, catalog_name: &str) -> Result<Source> {
        let body = json!({
            "source": {
                "name": SourceName::new(&self.workspace, slug).to_string(),
                "catalog_name": catalog_name,
            }
        });
        self.post("sources", &body)
    }

    fn get_source(&self, slug: &str) -> Result<Source> {
        self.get(&format!("sources/{slug}"))
    }

    fn delete_source(&self, slug: &str) -> Result<()> {
        self.delete(&format!("sources/{slug}"))
    }

    fn create_destination(
        &self,
        source_slug: &str,
        destination_slug: &str,
        connection_mode: &str,
        enabled: bool,
        configs: Vec<DestinationConfig>,
    ) -> Result<Destination> {
        let body = json!({
            "destination": {
                "name": DestinationName::new(&self.workspace, source_slug, destination_slug).to_string(),
                "connection_mode": connection_mode,
                "enabled": enabled,
                "config": configs,
            }
        });
        self.post(&format!("sources/{source_slug}/destinations"), &body)
    }

    fn get_destination(&self, source_slug: &str, destination_slug: &str) -> Result<Destination> {
        self.get(&format!(
            "sources/{source_slug}/destinations/{destination_slug}"
        ))
    }

    fn update_destination(
        &self,
        source_slug: &str,
        destination_slug: &str,
        enabled: bool,
        configs: Vec<DestinationConfig>,
    ) -> Result<Destination> {
        let body = json!({
            "destination": {
                "enabled": enabled,
                "config": configs,
            },
            "update_mask": {
                "paths": ["destination.enabled", "destination.config"],
            }
        });
        self.patch(
            &format!("sources/{source_slug}/destinations/{destination_slug}"),
            &body,
        )
    }

    fn delete_destination(&self, source_slug: &str, destination_slug: &str) -> Result<()> {
        self.delete(&format!(
            "sources/{source_slug}/destinations/{destination_slug}"
        ))
    }

    fn create_destination_filter(
        &self,
        source_slug: &str,
        destination_slug: &str,
        filter: &DestinationFilter,
    ) -> Result<DestinationFilter> {
        let body = json!({ "filter": filter });
        self.post(
            &format!("sources/{source_slug}/destinations/{destination_slug}/filters"),
            &body,
        )
    }

    fn get_destination_filter(
        &self,
        source_slug: &str,
        destination_slug: &str,
        filter_id: &str,
    ) -> Result<DestinationFilter> {
        self.get(&format!(
            "sources/{source_slug}/destinations/{destination_slug}/filters/{filter_id}"
        ))
    }

    fn update_destination_filter(
        &self,
        source_slug: &str,
        destination_slug: &str,
        filter: &DestinationFilter,
    ) -> Result<DestinationFilter> {
        let filter_id = crate::names::destination_filter_name_to_id(&filter.name)?;
        let body = json!({
            "filter": filter,
            "update_mask": {
                "paths": [
                    "filter.title",
                    "filter.description",
                    "filter.enabled",
                    "filter.if",
                    "filter.actions",
                ],
            }
        });
        self.patch(
            &format!("sources/{source_slug}/destinations/{destination_slug}/filters/{filter_id}"),
            &body,
        )
    }

    fn delete_destination_filter(
        &self,
        source_slug: &str,
        destination_slug: &str,
        filter_id: &str,
    ) -> Result<()> {
        self.delete(&format!(
            "sources/{source_slug}/destinations/{destination_slug}/filters/{filter_id}"
        ))
    }

    fn get_source_config(&self, source_slug: &str) -> Result<SourceConfig> {
        self.get(&format!("sources/{source_slug}/schema-config"))
    }

    fn update_source_config(
        &self,
        source_slug: &str,
        config: &SourceConfig,
    ) -> Result<SourceConfig> {
        let paths: Vec<String> = SchemaSettings::FIELD_PATHS
            .iter()
            .map(|field| format!("schema_config.{field}"))
            .collect();
        let body = json!({
            "schema_config": config,
            "update_mask": { "paths": paths },
        });
        self.patch(&format!("sources/{source_slug}/schema-config"), &body)
    }

    fn create_tracking_plan(&self, plan: &TrackingPlan) -> Result<TrackingPlan> {
        let body = json!({ "tracking_plan": plan });
        self.post("tracking-plans", &body)
    }

    fn get_tracking_plan(&self, plan_id: &str) -> Result<TrackingPlan> {
        self.get(&format!("tracking-plans/{plan_id}"))
    }

    fn update_tracking_plan(&self, plan_id: &str, plan: &TrackingPlan) -> Result<TrackingPlan> {
        let body = json!({
            "tracking_plan": plan,
            "update_mask": {
                "paths": ["tracking_plan.display_name", "tracking_plan.rules"],
            }
        });
        self.patch(&format!("tracking-plans/{plan_id}"), &body)
    }

    fn delete_tracking_plan(&self, plan_id: &str) -> Result<()> {
        self.delete(&format!("tracking-plans/{plan_id}"))
    }

    fn list_tracking_plans(&self) -> Result<Vec<TrackingPlan>> {
        #[derive(Deserialize)]
        struct Listing {
            #[serde(default)]
            tracking_plans: Vec<TrackingPlan>,
        }
        let listing: Listing = self.get("tracking-plans")?;
        Ok(listing.tracking_plans)
    }

    fn create_tracking_plan_source_connection(
        &self,
        plan_id: &str,
        source_slug: &str,
    ) -> Result<()> {
        let body = json!({
            "source_name": SourceName::new(&self.workspace, source_slug).to_string(),
        });
        let _: Value = self.post(
            &format!("tracking-plans/{plan_id}/source-connections"),
            &body,
        )?;
        Ok(())
    }

    fn delete_tracking_plan_source_connection(
        &self,
        plan_id: &str,
        source_slug: &str,
    ) -> Result<()> {
        self.delete(&format!(
            "tracking-plans/{plan_id}/source-connections/{source_slug}"
        ))
    }

    fn list_tracking_plan_source_connections(
        &self,
        plan_id: &str,
    ) -> Result<Vec<TrackingPlanSourceConnection>> {
        #[derive(Deserialize)]
        struct Listing {
            #[serde(default)]
            connections: Vec<TrackingPlanSourceConnection>,
        }
        let listing: Listing = self.get(&format!("tracking-plans/{plan_id}/source-connections"))?;
        Ok(listing.connections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building() {
        let client = HttpClient::with_api_base("token", "acme", "http://localhost:9000/v1beta/");
        assert_eq!(client.api_base(), "http://localhost:9000/v1beta");
        assert_eq!(
            client.url("sources/ios"),
            "http://localhost:9000/v1beta/workspaces/acme/sources/ios"
        );
        assert_eq!(client.workspace(), "acme");
    }

    #[test]
    fn test_default_api_base() {
        let client = HttpClient::new("token", "acme");
        assert_eq!(client.api_base(), DEFAULT_API_URL);
    }

    #[test]
    fn test_api_error_from_structured_body() {
        let err = api_error(400, r#"{"error": "filter does not exist", "code": 3}"#);
        assert_eq!(err.code, 3);
        assert_eq!(err.message, "filter does not exist");
    }

    #[test]
    fn test_api_error_without_code_uses_status() {
        let err = api_error(404, r#"{"error": "source not found"}"#);
        assert_eq!(err.code, 404);
        assert_eq!(err.message, "source not found");
    }

    #[test]
    fn test_api_error_from_plain_body() {
        let err = api_error(502, "Bad Gateway\n");
        assert_eq!(err.code, 502);
        assert_eq!(err.message, "Bad Gateway");
    }
}
