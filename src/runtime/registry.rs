//! Named registries for workflows and activities.
//!
//! A single `Registry<H>` stores both kinds of handler. Handlers are resolved
//! once at registration into trait objects; typed registrations wrap the user
//! function so payload conversion happens at the edge and nowhere else.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::WorkflowInstance;
use crate::error::{RegistryError, WorkflowError};
use crate::payload::{Converter, DefaultConverter, Payload};
use crate::runtime::context::WorkflowContext;

/// Implemented by workflow handlers the executor can start.
#[async_trait]
pub trait WorkflowHandler: Send + Sync {
    async fn invoke(&self, ctx: WorkflowContext, input: Payload) -> Result<Payload, WorkflowError>;
}

/// Implemented by activity handlers a host can execute.
#[async_trait]
pub trait ActivityHandler: Send + Sync {
    async fn invoke(&self, ctx: ActivityContext, inputs: Vec<Payload>) -> Result<Payload, String>;
}

/// Function wrapper that implements `WorkflowHandler`.
pub struct FnWorkflow<F, Fut>(pub F)
where
    F: Fn(WorkflowContext, Payload) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Payload, WorkflowError>> + Send + 'static;

#[async_trait]
impl<F, Fut> WorkflowHandler for FnWorkflow<F, Fut>
where
    F: Fn(WorkflowContext, Payload) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Payload, WorkflowError>> + Send + 'static,
{
    async fn invoke(&self, ctx: WorkflowContext, input: Payload) -> Result<Payload, WorkflowError> {
        (self.0)(ctx, input).await
    }
}

/// Function wrapper that implements `ActivityHandler`.
pub struct FnActivity<F, Fut>(pub F)
where
    F: Fn(ActivityContext, Vec<Payload>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Payload, String>> + Send + 'static;

#[async_trait]
impl<F, Fut> ActivityHandler for FnActivity<F, Fut>
where
    F: Fn(ActivityContext, Vec<Payload>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Payload, String>> + Send + 'static,
{
    async fn invoke(&self, ctx: ActivityContext, inputs: Vec<Payload>) -> Result<Payload, String> {
        (self.0)(ctx, inputs).await
    }
}

/// What an activity execution knows about the command that requested it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityContext {
    pub instance: WorkflowInstance,
    pub activity_name: String,
    pub event_id: i64,
}

impl ActivityContext {
    pub fn new(instance: WorkflowInstance, activity_name: impl Into<String>, event_id: i64) -> Self {
        Self {
            instance,
            activity_name: activity_name.into(),
            event_id,
        }
    }
}

/// Label used in registry diagnostics.
pub trait HandlerKind {
    const KIND: &'static str;
}

impl HandlerKind for dyn WorkflowHandler {
    const KIND: &'static str = "workflow";
}

impl HandlerKind for dyn ActivityHandler {
    const KIND: &'static str = "activity";
}

/// Immutable map from name to handler.
pub struct Registry<H: ?Sized> {
    inner: Arc<BTreeMap<String, Arc<H>>>,
}

// H: ?Sized rules out the derive
impl<H: ?Sized> Clone for Registry<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H: ?Sized> Default for Registry<H> {
    fn default() -> Self {
        Self {
            inner: Arc::new(BTreeMap::new()),
        }
    }
}

impl<H: ?Sized> std::fmt::Debug for Registry<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.inner.keys()).finish()
    }
}

pub struct RegistryBuilder<H: ?Sized> {
    map: BTreeMap<String, Arc<H>>,
    errors: Vec<String>,
}

pub type WorkflowRegistry = Registry<dyn WorkflowHandler>;
pub type ActivityRegistry = Registry<dyn ActivityHandler>;
pub type WorkflowRegistryBuilder = RegistryBuilder<dyn WorkflowHandler>;
pub type ActivityRegistryBuilder = RegistryBuilder<dyn ActivityHandler>;

impl<H: ?Sized + HandlerKind> Registry<H> {
    pub fn builder() -> RegistryBuilder<H> {
        RegistryBuilder {
            map: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    /// Start a builder seeded with this registry's handlers.
    pub fn builder_from(reg: &Registry<H>) -> RegistryBuilder<H> {
        RegistryBuilder {
            map: reg.inner.as_ref().clone(),
            errors: Vec::new(),
        }
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<H>, RegistryError> {
        match self.inner.get(name) {
            Some(handler) => Ok(Arc::clone(handler)),
            None => {
                tracing::debug!(
                    target: "duroflow::runtime::registry",
                    kind = H::KIND,
                    requested_name = %name,
                    registered_names = ?self.names(),
                    "registry lookup miss"
                );
                Err(RegistryError::NotFound {
                    kind: H::KIND,
                    name: name.to_string(),
                })
            }
        }
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.inner.keys().cloned().collect()
    }

    pub fn has(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    pub fn count(&self) -> usize {
        self.inner.len()
    }
}

impl<H: ?Sized + HandlerKind> RegistryBuilder<H> {
    pub fn build(self) -> Registry<H> {
        Registry {
            inner: Arc::new(self.map),
        }
    }

    /// Build the registry, failing if any registration was rejected.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Registration`] listing every rejected registration.
    pub fn build_result(self) -> Result<Registry<H>, RegistryError> {
        if self.errors.is_empty() {
            Ok(self.build())
        } else {
            Err(RegistryError::Registration(self.errors.join("; ")))
        }
    }

    /// Add every handler of `other`; names already present are reported as errors.
    pub fn merge(mut self, other: Registry<H>) -> Self {
        for (name, handler) in other.inner.iter() {
            if self.map.contains_key(name) {
                self.errors.push(format!("duplicate {} in merge: {name}", H::KIND));
            } else {
                self.map.insert(name.clone(), Arc::clone(handler));
            }
        }
        self
    }

    fn insert(mut self, name: String, handler: Arc<H>) -> Self {
        if self.map.contains_key(&name) {
            self.errors.push(format!("duplicate {} registration: {name}", H::KIND));
        } else {
            self.map.insert(name, handler);
        }
        self
    }
}

impl WorkflowRegistryBuilder {
    pub fn register<F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(WorkflowContext, Payload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Payload, WorkflowError>> + Send + 'static,
    {
        self.insert(name.into(), Arc::new(FnWorkflow(f)))
    }

    /// Register a workflow taking and returning serde types.
    pub fn register_typed<In, Out, F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        In: DeserializeOwned + Send + 'static,
        Out: Serialize + Send + 'static,
        F: Fn(WorkflowContext, In) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Out, WorkflowError>> + Send + 'static,
    {
        let f = Arc::new(f);
        let wrapper = move |ctx: WorkflowContext, input: Payload| {
            let f = Arc::clone(&f);
            async move {
                let converter = DefaultConverter::default();
                let input: In = converter
                    .from_payload(&input)
                    .map_err(|e| WorkflowError::conversion("decode_input", e))?;
                let out = f(ctx, input).await?;
                converter
                    .to_payload(&out)
                    .map_err(|e| WorkflowError::conversion("encode_output", e))
            }
        };
        self.insert(name.into(), Arc::new(FnWorkflow(wrapper)))
    }
}

impl ActivityRegistryBuilder {
    pub fn register<F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(ActivityContext, Vec<Payload>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Payload, String>> + Send + 'static,
    {
        self.insert(name.into(), Arc::new(FnActivity(f)))
    }

    /// Register an activity whose arguments decode into `In` (a tuple for
    /// several arguments) and whose result encodes from `Out`.
    pub fn register_typed<In, Out, F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        In: DeserializeOwned + Send + 'static,
        Out: Serialize + Send + 'static,
        F: Fn(ActivityContext, In) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Out, String>> + Send + 'static,
    {
        let f = Arc::new(f);
        let wrapper = move |ctx: ActivityContext, inputs: Vec<Payload>| {
            let f = Arc::clone(&f);
            async move {
                let converter = DefaultConverter::default();
                let input: In = converter.decode_args(&inputs).map_err(|e| e.to_string())?;
                let out = f(ctx, input).await?;
                converter.to_payload(&out).map_err(|e| e.to_string())
            }
        };
        self.insert(name.into(), Arc::new(FnActivity(wrapper)))
    }
}
