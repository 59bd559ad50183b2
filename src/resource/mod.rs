//! Reconcilers for the six Segment resource kinds
//!
//! Each reconciler implements [`declarative::Resource`] over a shared
//! [`Client`]. They all follow the same shape: create calls the API and
//! then reads the object back, read treats a missing object as absent,
//! and update re-sends the declared attributes before reading back.

use std::fmt;
use std::sync::Arc;

use anyhow::{Result, bail};
use declarative::{BoxedResource, ErasedResource, PollConfig, ResourceState};
use segment_api::Client;

use crate::error::Error;

pub mod destination;
pub mod destination_filter;
pub mod source;
pub mod source_schema_config;
pub mod tracking_plan;
pub mod tracking_plan_source_connection;

pub use destination::DestinationResource;
pub use destination_filter::DestinationFilterResource;
pub use source::SourceResource;
pub use source_schema_config::SourceSchemaConfigResource;
pub use tracking_plan::TrackingPlanResource;
pub use tracking_plan_source_connection::TrackingPlanSourceConnectionResource;

/// Client shared by every reconciler.
pub type SharedClient = Arc<dyn Client>;

/// Turn a read result into a resource state.
///
/// Errors matching `gone` mean the object no longer exists; anything else
/// is fatal and names the resource.
pub(crate) fn read_or_absent<T>(
    kind: &'static str,
    key: &str,
    result: segment_api::Result<T>,
    gone: fn(&segment_api::Error) -> bool,
) -> Result<ResourceState<T>, Error> {
    match result {
        Ok(value) => Ok(ResourceState::Present(value)),
        Err(err) if gone(&err) => {
            log::warn!("{kind} {key}: {}, treating as absent", err.classify());
            Ok(ResourceState::Absent)
        }
        Err(err) => Err(Error::remote(kind, key, err)),
    }
}

/// Treat deleting an already missing object as success.
pub(crate) fn delete_tolerating_missing(
    kind: &'static str,
    key: &str,
    result: segment_api::Result<()>,
    gone: fn(&segment_api::Error) -> bool,
) -> Result<(), Error> {
    match result {
        Ok(()) => Ok(()),
        Err(err) if gone(&err) => {
            log::warn!("{kind} {key} was already gone");
            Ok(())
        }
        Err(err) => Err(Error::remote(kind, key, err)),
    }
}

pub(crate) fn not_found(err: &segment_api::Error) -> bool {
    err.is_not_found()
}

pub(crate) fn absent(err: &segment_api::Error) -> bool {
    err.is_absent()
}

/// All reconcilers, looked up by type name.
pub struct Registry {
    resources: Vec<BoxedResource<'static>>,
}

impl Registry {
    /// Build every reconciler over `client`.
    pub fn new(client: SharedClient, poll: PollConfig) -> Self {
        let resources: Vec<BoxedResource<'static>> = vec![
            Box::new(SourceResource::new(client.clone())),
            Box::new(DestinationResource::new(client.clone())),
            Box::new(DestinationFilterResource::new(client.clone())),
            Box::new(SourceSchemaConfigResource::new(client.clone(), poll)),
            Box::new(TrackingPlanResource::new(client.clone())),
            Box::new(TrackingPlanSourceConnectionResource::new(client)),
        ];
        Self { resources }
    }

    /// Reconciler for `type_name`.
    pub fn get(&self, type_name: &str) -> Result<&dyn ErasedResource> {
        match self.resources.iter().find(|r| r.type_name() == type_name) {
            Some(resource) => Ok(resource.as_ref()),
            None => bail!(
                "Unknown resource type '{type_name}'. Expected one of: {}",
                self.type_names().join(", ")
            ),
        }
    }

    pub fn type_names(&self) -> Vec<&'static str> {
        self.resources.iter().map(|r| r.type_name()).collect()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("resources", &self.type_names())
            .finish()
    }
}

// ============================================================================
// Declared attribute contract
// ============================================================================

/// Declared attribute of a resource type.
#[derive(Debug, Clone, Copy)]
pub struct Attribute {
    pub name: &'static str,
    pub kind: &'static str,
    pub required: bool,
    pub force_new: bool,
    pub computed: bool,
    pub description: &'static str,
}

const fn attr(name: &'static str, kind: &'static str, description: &'static str) -> Attribute {
    Attribute {
        name,
        kind,
        required: false,
        force_new: false,
        computed: false,
        description,
    }
}

impl Attribute {
    const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    const fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    const fn computed(mut self) -> Self {
        self.computed = true;
        self
    }
}

/// Attribute contract of one resource type.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub type_name: &'static str,
    pub id: &'static str,
    pub import_id: &'static str,
    pub attributes: &'static [Attribute],
}

pub const SCHEMAS: [Schema; 6] = [
    Schema {
        type_name: source::TYPE,
        id: "source name, workspaces/{ws}/sources/{slug}",
        import_id: "source name or bare slug",
        attributes: &[
            attr("slug", "string", "Short name of the source (e.g. \"ios\")")
                .required()
                .force_new(),
            attr("catalog_name", "string", "Catalog entry (e.g. \"catalog/sources/ios\")")
                .required()
                .force_new(),
        ],
    },
    Schema {
        type_name: destination::TYPE,
        id: "destination name, workspaces/{ws}/sources/{src}/destinations/{dst}",
        import_id: "destination name",
        attributes: &[
            attr("slug", "string", "Short name of the destination (e.g. \"webhooks\")")
                .required()
                .force_new(),
            attr("source_slug", "string", "Short name of the source")
                .required()
                .force_new(),
            attr("connection_mode", "string", "Connection mode of the destination")
                .required()
                .force_new(),
            attr("enabled", "bool", "Delivery enabled for the destination (default true)"),
            attr("configs", "set of {name, type, value?}", "Settings of the destination")
                .required(),
        ],
    },
    Schema {
        type_name: destination_filter::TYPE,
        id: "filter id",
        import_id: "full filter name",
        attributes: &[
            attr("source_slug", "string", "Short name of the source")
                .required()
                .force_new(),
            attr("destination_slug", "string", "Short name of the destination")
                .required()
                .force_new(),
            attr("name", "string", "Full filter name").computed(),
            attr("title", "string", "Title of the filter"),
            attr("description", "string", "Description of the filter"),
            attr("enabled", "bool", "Whether the filter is active (default true)"),
            attr("conditions", "string", "FQL condition selecting events").required(),
            attr(
                "action",
                "set of {type, percent?, path?, fields?}",
                "1 to 4 of drop_event, sample_event, whitelist_fields, blacklist_fields",
            )
            .required(),
        ],
    },
    Schema {
        type_name: source_schema_config::TYPE,
        id: "schema config name",
        import_id: "source name or bare slug",
        attributes: &[
            attr("source_slug", "string", "Short name of the source")
                .required()
                .force_new(),
            attr("allow_unplanned_track_events", "bool", "default true"),
            attr("allow_unplanned_identify_traits", "bool", "default true"),
            attr("allow_unplanned_group_traits", "bool", "default true"),
            attr("forwarding_blocked_events_to", "string", "default empty"),
            attr("allow_unplanned_track_event_properties", "bool", "default true"),
            attr("allow_track_event_on_violations", "bool", "default true"),
            attr("allow_identify_traits_on_violations", "bool", "default true"),
            attr("allow_group_traits_on_violations", "bool", "default true"),
            attr("forwarding_violations_to", "string", "default empty"),
            attr("allow_track_properties_on_violations", "bool", "default true"),
            attr(
                "common_track_event_on_violations",
                "ALLOW | OMIT_PROPERTIES | BLOCK",
                "default ALLOW",
            ),
            attr(
                "common_identify_event_on_violations",
                "ALLOW | OMIT_PROPERTIES | BLOCK",
                "default ALLOW",
            ),
            attr(
                "common_group_event_on_violations",
                "ALLOW | OMIT_PROPERTIES | BLOCK",
                "default ALLOW",
            ),
        ],
    },
    Schema {
        type_name: tracking_plan::TYPE,
        id: "tracking plan id (rs_...)",
        import_id: "plan id or full plan name",
        attributes: &[
            attr("display_name", "string", "Display name of the plan").required(),
            attr("name", "string", "Full plan name").computed(),
            attr("rules_global", "json string", "Global rules; managed only when set"),
            attr("rules_events", "list of json strings", "Event rules; managed only when set"),
            attr("rules_identify", "json string", "Identify rules; managed only when set"),
            attr("rules_group", "json string", "Group rules; managed only when set"),
        ],
    },
    Schema {
        type_name: tracking_plan_source_connection::TYPE,
        id: "{tracking_plan_id}|{source_slug}",
        import_id: "{tracking_plan_id}|{source_slug}",
        attributes: &[
            attr("tracking_plan_id", "string", "Id of the tracking plan")
                .required()
                .force_new(),
            attr("source_slug", "string", "Short name of the source")
                .required()
                .force_new(),
        ],
    },
];

/// Contract of `type_name`, if it is a known type.
pub fn schema(type_name: &str) -> Option<&'static Schema> {
    SCHEMAS.iter().find(|s| s.type_name == type_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use segment_api::{ApiError, MockClient};

    #[test]
    fn test_registry_covers_every_schema() {
        let registry = Registry::new(Arc::new(MockClient::new("acme")), PollConfig::default());
        assert_eq!(registry.type_names().len(), SCHEMAS.len());
        for schema in &SCHEMAS {
            assert_eq!(registry.get(schema.type_name).unwrap().type_name(), schema.type_name);
        }
        let Err(err) = registry.get("segment_workspace") else {
            panic!("expected an unknown type error");
        };
        assert!(err.to_string().contains("segment_source"));
    }

    #[test]
    fn test_force_new_attributes_match_reconcilers() {
        use declarative::Resource;
        let client: SharedClient = Arc::new(MockClient::new("acme"));
        let declared = |type_name: &str| -> Vec<&'static str> {
            schema(type_name)
                .unwrap()
                .attributes
                .iter()
                .filter(|a| a.force_new)
                .map(|a| a.name)
                .collect()
        };
        assert_eq!(
            declared(source::TYPE),
            SourceResource::new(client.clone()).replace_attributes()
        );
        assert_eq!(
            declared(destination::TYPE),
            DestinationResource::new(client.clone()).replace_attributes()
        );
        assert_eq!(
            declared(destination_filter::TYPE),
            DestinationFilterResource::new(client.clone()).replace_attributes()
        );
        assert_eq!(
            declared(tracking_plan_source_connection::TYPE),
            TrackingPlanSourceConnectionResource::new(client).replace_attributes()
        );
    }

    #[test]
    fn test_read_or_absent() {
        let gone: segment_api::Result<()> = Err(ApiError::not_found("nope").into());
        assert!(read_or_absent("k", "x", gone, not_found).unwrap().is_absent());

        let quirk: segment_api::Result<()> = Err(ApiError::new(
            13,
            "failed to validate permissions due to an internal error",
        )
        .into());
        assert!(read_or_absent("k", "x", quirk, not_found).is_err());

        let quirk: segment_api::Result<()> = Err(ApiError::new(
            13,
            "failed to validate permissions due to an internal error",
        )
        .into());
        assert!(read_or_absent("k", "x", quirk, absent).unwrap().is_absent());
    }

    #[test]
    fn test_delete_tolerating_missing() {
        let gone: segment_api::Result<()> = Err(ApiError::not_found("nope").into());
        assert!(delete_tolerating_missing("k", "x", gone, not_found).is_ok());

        let boom: segment_api::Result<()> = Err(ApiError::new(500, "boom").into());
        let err = delete_tolerating_missing("k", "x", boom, not_found).unwrap_err();
        assert!(matches!(err, Error::Remote { .. }));
    }
}
