//! Tracking plan reconciler
//!
//! Only the rule categories a declaration sets are owned; see
//! [`crate::rules`]. Existence is checked against the plan list before any
//! read or update, since single-plan reads are not a reliable signal.

use anyhow::Result;
use declarative::{ApplyContext, Resource, ResourceState};
use segment_api::names::{self, TrackingPlanName};
use segment_api::{RuleSet, TrackingPlan};
use serde::{Deserialize, Serialize};

use super::{SharedClient, delete_tolerating_missing, not_found};
use crate::error::{Error, remote};
use crate::rules::{self, DeclaredRules};

pub const TYPE: &str = "segment_tracking_plan";

/// Declared attributes of a tracking plan
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackingPlanConfig {
    pub display_name: String,
    #[serde(default)]
    pub rules_global: Option<String>,
    #[serde(default)]
    pub rules_events: Option<Vec<String>>,
    #[serde(default)]
    pub rules_identify: Option<String>,
    #[serde(default)]
    pub rules_group: Option<String>,
}

impl TrackingPlanConfig {
    fn rules(&self) -> DeclaredRules {
        DeclaredRules {
            global: self.rules_global.clone(),
            events: self.rules_events.clone(),
            identify: self.rules_identify.clone(),
            group: self.rules_group.clone(),
        }
    }
}

/// Observed state of a tracking plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingPlanState {
    /// Plan id
    pub id: String,
    /// Full plan name
    pub name: String,
    pub display_name: String,
    #[serde(flatten)]
    pub rules: DeclaredRules,
}

pub struct TrackingPlanResource {
    client: SharedClient,
}

impl TrackingPlanResource {
    pub fn new(client: SharedClient) -> Self {
        Self { client }
    }

    /// Whether `plan_id` is among the workspace's plans.
    fn exists(&self, plan_id: &str) -> Result<bool> {
        log::debug!("list tracking plans looking for {plan_id}");
        let plans = self
            .client
            .list_tracking_plans()
            .map_err(remote(TYPE, plan_id))?;
        Ok(plans.iter().any(|plan| {
            match names::tracking_plan_name_to_id(&plan.name) {
                Ok(id) => id == plan_id,
                Err(err) => {
                    log::debug!("skipping listed tracking plan: {err}");
                    false
                }
            }
        }))
    }

    fn get(&self, plan_id: &str) -> Result<TrackingPlan> {
        log::debug!("get {TYPE} {plan_id}");
        Ok(self
            .client
            .get_tracking_plan(plan_id)
            .map_err(remote(TYPE, plan_id))?)
    }

    /// Read the plan, filling in only the rule categories in `owned`.
    fn fetch(
        &self,
        plan_id: &str,
        owned: impl FnOnce(&RuleSet) -> DeclaredRules,
    ) -> Result<ResourceState<TrackingPlanState>> {
        if !self.exists(plan_id)? {
            log::warn!("{TYPE} {plan_id} is not listed, treating as absent");
            return Ok(ResourceState::Absent);
        }
        let plan = self.get(plan_id)?;
        Ok(ResourceState::Present(TrackingPlanState {
            id: plan_id.to_string(),
            rules: owned(&plan.rules),
            name: plan.name,
            display_name: plan.display_name,
        }))
    }

    fn fetch_written(&self, plan_id: &str, owned: &DeclaredRules) -> Result<TrackingPlanState> {
        match self.fetch(plan_id, |remote| rules::read_back(owned, remote))? {
            ResourceState::Present(state) => Ok(state),
            ResourceState::Absent => anyhow::bail!("{TYPE} {plan_id} vanished right after write"),
        }
    }
}

impl Resource for TrackingPlanResource {
    type Config = TrackingPlanConfig;
    type State = TrackingPlanState;

    fn resource_type(&self) -> &'static str {
        TYPE
    }

    fn id(&self, state: &TrackingPlanState) -> String {
        state.id.clone()
    }

    fn validate(&self, config: &TrackingPlanConfig) -> Result<()> {
        let mut violations = rules::validate(&config.rules());
        if config.display_name.trim().is_empty() {
            violations.push("\"display_name\" must be set");
        }
        violations
            .into_result()
            .map_err(|violations| Error::validation(TYPE, &config.display_name, violations))?;
        Ok(())
    }

    fn create(&self, _ctx: &ApplyContext, config: &TrackingPlanConfig) -> Result<TrackingPlanState> {
        let declared = config.rules();
        let plan = TrackingPlan {
            name: String::new(),
            display_name: config.display_name.clone(),
            rules: rules::merge(RuleSet::default(), &declared)?,
        };

        log::debug!("create {TYPE} {:?}", config.display_name);
        let created = self
            .client
            .create_tracking_plan(&plan)
            .map_err(remote(TYPE, &config.display_name))?;
        let plan_id = names::tracking_plan_name_to_id(&created.name)?;
        self.fetch_written(&plan_id, &declared)
    }

    fn read(
        &self,
        _ctx: &ApplyContext,
        prior: &TrackingPlanState,
    ) -> Result<ResourceState<TrackingPlanState>> {
        self.fetch(&prior.id, |remote| rules::read_back(&prior.rules, remote))
    }

    fn update(
        &self,
        _ctx: &ApplyContext,
        prior: &TrackingPlanState,
        config: &TrackingPlanConfig,
    ) -> Result<TrackingPlanState> {
        let plan_id = &prior.id;
        if !self.exists(plan_id)? {
            return Err(Error::TrackingPlanGone {
                id: plan_id.clone(),
            }
            .into());
        }

        let declared = config.rules();
        let current = self.get(plan_id)?;
        let plan = TrackingPlan {
            name: String::new(),
            display_name: config.display_name.clone(),
            rules: rules::merge(current.rules, &declared)?,
        };

        log::debug!("update {TYPE} {plan_id}");
        self.client
            .update_tracking_plan(plan_id, &plan)
            .map_err(remote(TYPE, plan_id))?;
        self.fetch_written(plan_id, &declared)
    }

    fn delete(&self, _ctx: &ApplyContext, prior: &TrackingPlanState) -> Result<()> {
        log::debug!("delete {TYPE} {}", prior.id);
        let result = self.client.delete_tracking_plan(&prior.id);
        delete_tolerating_missing(TYPE, &prior.id, result, not_found)?;
        Ok(())
    }

    fn import(&self, _ctx: &ApplyContext, id: &str) -> Result<ResourceState<TrackingPlanState>> {
        let plan_id = if id.contains('/') {
            id.parse::<TrackingPlanName>()?.tracking_plan
        } else {
            id.to_string()
        };
        self.fetch(&plan_id, rules::read_all)
    }

    fn changed_attributes(
        &self,
        state: &TrackingPlanState,
        config: &TrackingPlanConfig,
    ) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if state.display_name != config.display_name {
            changed.push("display_name");
        }
        changed.extend(rules::changed(&state.rules, &config.rules()));
        changed
    }
}
