//! In-memory Config API for tests.
//!
//! [`MockClient`] keeps a whole workspace behind a mutex and answers the
//! way the real API does, including its quirks: missing filters come back
//! as code 3 "filter does not exist", and schema-config updates can be
//! made to surface late with [`Propagation`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::Client;
use crate::error::{ApiError, INVALID_ARGUMENT_CODE, Result};
use crate::names::{
    DestinationName, FilterName, SchemaConfigName, SourceName, TrackingPlanName,
};
use crate::types::{
    Destination, DestinationConfig, DestinationFilter, RuleSet, SchemaSettings, Source,
    SourceConfig, TrackingPlan, TrackingPlanSourceConnection,
};

const CONFLICT_CODE: i64 = 409;

/// When schema-config updates become visible to reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Propagation {
    /// Reads see an update as soon as it is accepted.
    #[default]
    Immediate,
    /// Reads see an update once the delay has passed.
    After(Duration),
    /// Reads never see updates.
    Never,
}

#[derive(Debug)]
struct PendingSettings {
    settings: SchemaSettings,
    visible_at: Option<Instant>,
}

#[derive(Debug)]
struct SourceEntry {
    source: Source,
    settings: SchemaSettings,
    pending: Option<PendingSettings>,
}

impl SourceEntry {
    /// Promote a pending update whose delay has elapsed.
    fn settle(&mut self) {
        let ready = self
            .pending
            .as_ref()
            .is_some_and(|p| p.visible_at.is_some_and(|at| Instant::now() >= at));
        if ready && let Some(pending) = self.pending.take() {
            self.settings = pending.settings;
        }
    }
}

#[derive(Debug, Default)]
struct State {
    sources: BTreeMap<String, SourceEntry>,
    destinations: BTreeMap<(String, String), Destination>,
    filters: BTreeMap<(String, String, String), DestinationFilter>,
    plans: BTreeMap<String, TrackingPlan>,
    connections: BTreeMap<String, Vec<String>>,
    propagation: Propagation,
    failures: HashMap<String, ApiError>,
    calls: Vec<String>,
    next_id: u64,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}_{}", self.next_id)
    }

    fn source(&mut self, slug: &str) -> Result<&mut SourceEntry> {
        self.sources
            .get_mut(slug)
            .ok_or_else(|| ApiError::not_found(format!("source {slug:?} not found")).into())
    }

    fn destination(&mut self, source: &str, destination: &str) -> Result<&mut Destination> {
        self.destinations
            .get_mut(&(source.to_string(), destination.to_string()))
            .ok_or_else(|| {
                ApiError::not_found(format!("destination {destination:?} not found")).into()
            })
    }

    fn plan(&mut self, plan_id: &str) -> Result<&mut TrackingPlan> {
        self.plans.get_mut(plan_id).ok_or_else(|| {
            ApiError::not_found(format!("tracking plan {plan_id:?} not found")).into()
        })
    }
}

fn filter_missing(filter_id: &str) -> ApiError {
    ApiError::new(
        INVALID_ARGUMENT_CODE,
        format!("filter does not exist: {filter_id}"),
    )
}

/// In-memory workspace implementing [`Client`].
#[derive(Debug, Clone)]
pub struct MockClient {
    workspace: String,
    state: Arc<Mutex<State>>,
}

impl MockClient {
    /// Create an empty workspace.
    #[must_use]
    pub fn new(workspace: impl Into<String>) -> Self {
        Self {
            workspace: workspace.into(),
            state: Arc::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a call and fail it if a failure was queued for it.
    fn begin(&self, op: &str) -> Result<MutexGuard<'_, State>> {
        let mut state = self.lock();
        state.calls.push(op.to_string());
        if let Some(err) = state.failures.remove(op) {
            return Err(err.into());
        }
        Ok(state)
    }

    /// Set when schema-config updates become visible.
    pub fn set_propagation(&self, propagation: Propagation) {
        self.lock().propagation = propagation;
    }

    /// Fail the next call of `op` (a [`Client`] method name) with `err`.
    pub fn fail_next(&self, op: &str, err: ApiError) {
        self.lock().failures.insert(op.to_string(), err);
    }

    /// Names of all calls made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Number of calls of `op` made so far.
    #[must_use]
    pub fn call_count(&self, op: &str) -> usize {
        self.lock().calls.iter().filter(|c| *c == op).count()
    }

    /// Replace a tracking plan's rules behind the provider's back.
    pub fn set_tracking_plan_rules(&self, plan_id: &str, rules: RuleSet) -> Result<()> {
        let mut state = self.lock();
        state.plan(plan_id)?.rules = rules;
        Ok(())
    }

    /// Store a tracking plan exactly as given, name included.
    pub fn insert_tracking_plan(&self, plan_id: &str, plan: TrackingPlan) {
        self.lock().plans.insert(plan_id.to_string(), plan);
    }

    /// Replace a destination's enabled flag behind the provider's back.
    pub fn set_destination_enabled(
        &self,
        source_slug: &str,
        destination_slug: &str,
        enabled: bool,
    ) -> Result<()> {
        let mut state = self.lock();
        state.destination(source_slug, destination_slug)?.enabled = enabled;
        Ok(())
    }
}

impl Client for MockClient {
    fn workspace(&self) -> &str {
        &self.workspace
    }

    fn create_source(&self, slug: &str, catalog_name: &str) -> Result<Source> {
        let mut state = self.begin("create_source")?;
        if state.sources.contains_key(slug) {
            return Err(ApiError::new(CONFLICT_CODE, format!("source {slug:?} already exists")).into());
        }
        let source = Source {
            name: SourceName::new(&self.workspace, slug).to_string(),
            catalog_name: catalog_name.to_string(),
        };
        state.sources.insert(
            slug.to_string(),
            SourceEntry {
                source: source.clone(),
                settings: SchemaSettings::default(),
                pending: None,
            },
        );
        Ok(source)
    }

    fn get_source(&self, slug: &str) -> Result<Source> {
        let mut state = self.begin("get_source")?;
        Ok(state.source(slug)?.source.clone())
    }

    fn delete_source(&self, slug: &str) -> Result<()> {
        let mut state = self.begin("delete_source")?;
        state.source(slug)?;
        state.sources.remove(slug);
        state.destinations.retain(|(src, _), _| src != slug);
        state.filters.retain(|(src, _, _), _| src != slug);
        for sources in state.connections.values_mut() {
            sources.retain(|s| s != slug);
        }
        Ok(())
    }

    fn create_destination(
        &self,
        source_slug: &str,
        destination_slug: &str,
        connection_mode: &str,
        enabled: bool,
        configs: Vec<DestinationConfig>,
    ) -> Result<Destination> {
        let mut state = self.begin("create_destination")?;
        state.source(source_slug)?;
        let key = (source_slug.to_string(), destination_slug.to_string());
        if state.destinations.contains_key(&key) {
            return Err(ApiError::new(
                CONFLICT_CODE,
                format!("destination {destination_slug:?} already exists"),
            )
            .into());
        }
        let destination = Destination {
            name: DestinationName::new(&self.workspace, source_slug, destination_slug).to_string(),
            connection_mode: connection_mode.to_string(),
            enabled,
            configs,
        };
        state.destinations.insert(key, destination.clone());
        Ok(destination)
    }

    fn get_destination(&self, source_slug: &str, destination_slug: &str) -> Result<Destination> {
        let mut state = self.begin("get_destination")?;
        Ok(state.destination(source_slug, destination_slug)?.clone())
    }

    fn update_destination(
        &self,
        source_slug: &str,
        destination_slug: &str,
        enabled: bool,
        configs: Vec<DestinationConfig>,
    ) -> Result<Destination> {
        let mut state = self.begin("update_destination")?;
        let destination = state.destination(source_slug, destination_slug)?;
        destination.enabled = enabled;
        destination.configs = configs;
        Ok(destination.clone())
    }

    fn delete_destination(&self, source_slug: &str, destination_slug: &str) -> Result<()> {
        let mut state = self.begin("delete_destination")?;
        state.destination(source_slug, destination_slug)?;
        state
            .destinations
            .remove(&(source_slug.to_string(), destination_slug.to_string()));
        state
            .filters
            .retain(|(src, dst, _), _| src != source_slug || dst != destination_slug);
        Ok(())
    }

    fn create_destination_filter(
        &self,
        source_slug: &str,
        destination_slug: &str,
        filter: &DestinationFilter,
    ) -> Result<DestinationFilter> {
        let mut state = self.begin("create_destination_filter")?;
        state.destination(source_slug, destination_slug)?;
        let filter_id = state.next_id("df");
        let name = FilterName {
            workspace: self.workspace.clone(),
            source: source_slug.to_string(),
            destination: destination_slug.to_string(),
            config: format!("dcfg_{destination_slug}"),
            filter: filter_id.clone(),
        };
        let created = DestinationFilter {
            name: name.to_string(),
            ..filter.clone()
        };
        state.filters.insert(
            (
                source_slug.to_string(),
                destination_slug.to_string(),
                filter_id,
            ),
            created.clone(),
        );
        Ok(created)
    }

    fn get_destination_filter(
        &self,
        source_slug: &str,
        destination_slug: &str,
        filter_id: &str,
    ) -> Result<DestinationFilter> {
        let state = self.begin("get_destination_filter")?;
        state
            .filters
            .get(&(
                source_slug.to_string(),
                destination_slug.to_string(),
                filter_id.to_string(),
            ))
            .cloned()
            .ok_or_else(|| filter_missing(filter_id).into())
    }

    fn update_destination_filter(
        &self,
        source_slug: &str,
        destination_slug: &str,
        filter: &DestinationFilter,
    ) -> Result<DestinationFilter> {
        let mut state = self.begin("update_destination_filter")?;
        let filter_id = filter.name.parse::<FilterName>()?.filter;
        let stored = state
            .filters
            .get_mut(&(
                source_slug.to_string(),
                destination_slug.to_string(),
                filter_id.clone(),
            ))
            .ok_or_else(|| filter_missing(&filter_id))?;
        *stored = filter.clone();
        Ok(stored.clone())
    }

    fn delete_destination_filter(
        &self,
        source_slug: &str,
        destination_slug: &str,
        filter_id: &str,
    ) -> Result<()> {
        let mut state = self.begin("delete_destination_filter")?;
        state
            .filters
            .remove(&(
                source_slug.to_string(),
                destination_slug.to_string(),
                filter_id.to_string(),
            ))
            .map(|_| ())
            .ok_or_else(|| filter_missing(filter_id).into())
    }

    fn get_source_config(&self, source_slug: &str) -> Result<SourceConfig> {
        let mut state = self.begin("get_source_config")?;
        let entry = state.source(source_slug)?;
        entry.settle();
        Ok(SourceConfig {
            name: SchemaConfigName::new(&self.workspace, source_slug).to_string(),
            settings: entry.settings.clone(),
        })
    }

    fn update_source_config(
        &self,
        source_slug: &str,
        config: &SourceConfig,
    ) -> Result<SourceConfig> {
        let mut state = self.begin("update_source_config")?;
        let propagation = state.propagation;
        let entry = state.source(source_slug)?;
        match propagation {
            Propagation::Immediate => {
                entry.settings = config.settings.clone();
                entry.pending = None;
            }
            Propagation::After(delay) => {
                entry.pending = Some(PendingSettings {
                    settings: config.settings.clone(),
                    visible_at: Some(Instant::now() + delay),
                });
            }
            Propagation::Never => {
                entry.pending = Some(PendingSettings {
                    settings: config.settings.clone(),
                    visible_at: None,
                });
            }
        }
        Ok(SourceConfig {
            name: SchemaConfigName::new(&self.workspace, source_slug).to_string(),
            settings: config.settings.clone(),
        })
    }

    fn create_tracking_plan(&self, plan: &TrackingPlan) -> Result<TrackingPlan> {
        let mut state = self.begin("create_tracking_plan")?;
        let plan_id = state.next_id("rs");
        let created = TrackingPlan {
            name: TrackingPlanName::new(&self.workspace, &plan_id).to_string(),
            ..plan.clone()
        };
        state.plans.insert(plan_id, created.clone());
        Ok(created)
    }

    fn get_tracking_plan(&self, plan_id: &str) -> Result<TrackingPlan> {
        let mut state = self.begin("get_tracking_plan")?;
        Ok(state.plan(plan_id)?.clone())
    }

    fn update_tracking_plan(&self, plan_id: &str, plan: &TrackingPlan) -> Result<TrackingPlan> {
        let mut state = self.begin("update_tracking_plan")?;
        let stored = state.plan(plan_id)?;
        stored.display_name.clone_from(&plan.display_name);
        stored.rules = plan.rules.clone();
        Ok(stored.clone())
    }

    fn delete_tracking_plan(&self, plan_id: &str) -> Result<()> {
        let mut state = self.begin("delete_tracking_plan")?;
        state.plan(plan_id)?;
        state.plans.remove(plan_id);
        state.connections.remove(plan_id);
        Ok(())
    }

    fn list_tracking_plans(&self) -> Result<Vec<TrackingPlan>> {
        let state = self.begin("list_tracking_plans")?;
        Ok(state.plans.values().cloned().collect())
    }

    fn create_tracking_plan_source_connection(
        &self,
        plan_id: &str,
        source_slug: &str,
    ) -> Result<()> {
        let mut state = self.begin("create_tracking_plan_source_connection")?;
        state.plan(plan_id)?;
        state.source(source_slug)?;
        let sources = state.connections.entry(plan_id.to_string()).or_default();
        if sources.iter().any(|s| s == source_slug) {
            return Err(ApiError::new(
                CONFLICT_CODE,
                format!("source {source_slug:?} is already connected"),
            )
            .into());
        }
        sources.push(source_slug.to_string());
        Ok(())
    }

    fn delete_tracking_plan_source_connection(
        &self,
        plan_id: &str,
        source_slug: &str,
    ) -> Result<()> {
        let mut state = self.begin("delete_tracking_plan_source_connection")?;
        state.plan(plan_id)?;
        let sources = state.connections.entry(plan_id.to_string()).or_default();
        let before = sources.len();
        sources.retain(|s| s != source_slug);
        if sources.len() == before {
            return Err(ApiError::not_found(format!(
                "source {source_slug:?} is not connected"
            ))
            .into());
        }
        Ok(())
    }

    fn list_tracking_plan_source_connections(
        &self,
        plan_id: &str,
    ) -> Result<Vec<TrackingPlanSourceConnection>> {
        let mut state = self.begin("list_tracking_plan_source_connections")?;
        state.plan(plan_id)?;
        let sources = state.connections.get(plan_id).cloned().unwrap_or_default();
        Ok(sources
            .into_iter()
            .map(|slug| TrackingPlanSourceConnection {
                tracking_plan_id: plan_id.to_string(),
                source: SourceName::new(&self.workspace, slug).to_string(),
            })
            .collect())
    }
}
