//! Resource trait for declarative lifecycle management
//!
//! A Resource is a kind of remote object that can be created, read back,
//! updated, deleted and imported. Each implementation works on two typed
//! values: the declared configuration the user writes, and the observed
//! state persisted between runs (declared attributes plus computed ones).

use crate::context::ApplyContext;
use crate::executor::{self, Outcome, Planned};
use crate::types::{ApplyResult, ResourceState};
use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// Core trait for declarative resources
///
/// # Example
///
/// ```
/// use declarative::{ApplyContext, Resource, ResourceState};
/// use std::collections::HashMap;
/// use std::sync::Mutex;
///
/// struct Greeting {
///     remote: Mutex<HashMap<String, String>>,
/// }
///
/// impl Resource for Greeting {
///     type Config = (String, String);
///     type State = (String, String);
///
///     fn resource_type(&self) -> &'static str {
///         "greeting"
///     }
///
///     fn id(&self, state: &Self::State) -> String {
///         state.0.clone()
///     }
///
///     fn create(&self, _ctx: &ApplyContext, config: &Self::Config) -> anyhow::Result<Self::State> {
///         self.remote.lock().unwrap().insert(config.0.clone(), config.1.clone());
///         Ok(config.clone())
///     }
///
///     fn read(
///         &self,
///         _ctx: &ApplyContext,
///         prior: &Self::State,
///     ) -> anyhow::Result<ResourceState<Self::State>> {
///         let remote = self.remote.lock().unwrap();
///         Ok(remote.get(&prior.0).map(|text| (prior.0.clone(), text.clone())).into())
///     }
///
///     fn delete(&self, _ctx: &ApplyContext, prior: &Self::State) -> anyhow::Result<()> {
///         self.remote.lock().unwrap().remove(&prior.0);
///         Ok(())
///     }
///
///     fn import(&self, ctx: &ApplyContext, id: &str) -> anyhow::Result<ResourceState<Self::State>> {
///         self.read(ctx, &(id.to_string(), String::new()))
///     }
///
///     fn changed_attributes(&self, state: &Self::State, config: &Self::Config) -> Vec<&'static str> {
///         if state.1 == config.1 { vec![] } else { vec!["text"] }
///     }
///
///     fn replace_attributes(&self) -> &'static [&'static str] {
///         &["text"]
///     }
/// }
///
/// let greeting = Greeting { remote: Mutex::new(HashMap::new()) };
/// let ctx = ApplyContext::new(false);
/// let state = greeting.create(&ctx, &("hello".into(), "world".into())).unwrap();
/// assert!(greeting.read(&ctx, &state).unwrap().is_present());
/// ```
pub trait Resource: Send + Sync {
    /// Declared attributes
    type Config: fmt::Debug + DeserializeOwned;

    /// Observed attributes persisted between runs
    type State: Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned;

    /// Resource type name, e.g. "segment_source"
    fn resource_type(&self) -> &'static str;

    /// Stable identifier of an existing resource
    fn id(&self, state: &Self::State) -> String;

    /// Check the declared attributes without calling the remote system
    ///
    /// Implementations should report every problem at once.
    fn validate(&self, _config: &Self::Config) -> Result<()> {
        Ok(())
    }

    /// Create the remote object and return its normalized state
    fn create(&self, ctx: &ApplyContext, config: &Self::Config) -> Result<Self::State>;

    /// Read the remote object back
    ///
    /// Returns `Absent` when the object no longer exists. `prior` is the
    /// last persisted state; implementations may use it to decide which
    /// attributes they own.
    fn read(&self, ctx: &ApplyContext, prior: &Self::State) -> Result<ResourceState<Self::State>>;

    /// Update the remote object in place and return its normalized state
    ///
    /// Resources whose attributes are all force-new never reach this.
    fn update(
        &self,
        _ctx: &ApplyContext,
        prior: &Self::State,
        _config: &Self::Config,
    ) -> Result<Self::State> {
        anyhow::bail!(
            "{} {} cannot be updated in place",
            self.resource_type(),
            self.id(prior)
        )
    }

    /// Delete the remote object
    fn delete(&self, ctx: &ApplyContext, prior: &Self::State) -> Result<()>;

    /// Look up an existing remote object by a user-supplied identifier
    fn import(&self, ctx: &ApplyContext, id: &str) -> Result<ResourceState<Self::State>>;

    /// Names of declared attributes whose value differs from `state`
    fn changed_attributes(&self, state: &Self::State, config: &Self::Config) -> Vec<&'static str>;

    /// Attributes that cannot be changed without replacing the object
    fn replace_attributes(&self) -> &'static [&'static str] {
        &[]
    }
}

/// Type-erased resource working on JSON values
///
/// Lets a host keep resources of different kinds in one registry and
/// drive them from untyped documents. Every [`Resource`] implements it.
pub trait ErasedResource: Send + Sync {
    /// Resource type name
    fn type_name(&self) -> &'static str;

    /// Decode and validate declared attributes
    fn validate_json(&self, config: &Value) -> Result<()>;

    /// Refresh `prior` and compute the change needed to reach `config`
    fn plan_json(
        &self,
        ctx: &ApplyContext,
        prior: Option<&Value>,
        config: Option<&Value>,
    ) -> Result<Planned<Value>>;

    /// Bring the remote object in line with `config`
    fn converge_json(
        &self,
        ctx: &ApplyContext,
        prior: Option<&Value>,
        config: &Value,
    ) -> Result<Outcome<Value>>;

    /// Delete the remote object described by `prior`
    fn destroy_json(&self, ctx: &ApplyContext, prior: &Value) -> Result<ApplyResult>;

    /// Re-read `prior`; `None` when the object is gone
    fn refresh_json(&self, ctx: &ApplyContext, prior: &Value) -> Result<Option<Value>>;

    /// Import by user-supplied identifier
    fn import_json(&self, ctx: &ApplyContext, id: &str) -> Result<Value>;
}

/// A boxed resource for type-erased storage
pub type BoxedResource<'a> = Box<dyn ErasedResource + 'a>;

fn decode<T: DeserializeOwned>(value: &Value, what: &str, resource_type: &str) -> Result<T> {
    serde_json::from_value(value.clone())
        .with_context(|| format!("Invalid {what} for {resource_type}"))
}

fn encode<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).context("Failed to serialize resource state")
}

impl<R: Resource> ErasedResource for R {
    fn type_name(&self) -> &'static str {
        self.resource_type()
    }

    fn validate_json(&self, config: &Value) -> Result<()> {
        let config: R::Config = decode(config, "attributes", self.resource_type())?;
        self.validate(&config)
    }

    fn plan_json(
        &self,
        ctx: &ApplyContext,
        prior: Option<&Value>,
        config: Option<&Value>,
    ) -> Result<Planned<Value>> {
        let prior: Option<R::State> = prior
            .map(|v| decode(v, "state", self.resource_type()))
            .transpose()?;
        let config: Option<R::Config> = config
            .map(|v| decode(v, "attributes", self.resource_type()))
            .transpose()?;
        let planned = executor::plan(self, ctx, prior.as_ref(), config.as_ref())?;
        Ok(Planned {
            change: planned.change,
            state: planned.state.as_ref().map(encode).transpose()?,
        })
    }

    fn converge_json(
        &self,
        ctx: &ApplyContext,
        prior: Option<&Value>,
        config: &Value,
    ) -> Result<Outcome<Value>> {
        let prior: Option<R::State> = prior
            .map(|v| decode(v, "state", self.resource_type()))
            .transpose()?;
        let config: R::Config = decode(config, "attributes", self.resource_type())?;
        let outcome = executor::converge(self, ctx, prior.as_ref(), &config)?;
        Ok(Outcome {
            result: outcome.result,
            state: outcome.state.as_ref().map(encode).transpose()?,
        })
    }

    fn destroy_json(&self, ctx: &ApplyContext, prior: &Value) -> Result<ApplyResult> {
        let prior: R::State = decode(prior, "state", self.resource_type())?;
        executor::destroy(self, ctx, &prior)
    }

    fn refresh_json(&self, ctx: &ApplyContext, prior: &Value) -> Result<Option<Value>> {
        let prior: R::State = decode(prior, "state", self.resource_type())?;
        executor::refresh(self, ctx, &prior)?
            .as_ref()
            .map(encode)
            .transpose()
    }

    fn import_json(&self, ctx: &ApplyContext, id: &str) -> Result<Value> {
        encode(&executor::import(self, ctx, id)?)
    }
}
