//! Host-side lifecycle of a feature instance

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use crate::config::EvaluationConfig;
use crate::kernel::GeometryKernel;
use crate::merge::SolidSet;
use crate::param::{BoundParameters, Overrides, SchemaBindingError, bind, bind_defaults};

use super::{FeatureClass, FeatureError, FeaturePlugin, FeatureResult, RunContext};

/// Lifecycle state of a feature instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Instantiated, no parameters yet
    Created,
    /// Parameters bound, ready to execute
    Bound,
    /// Entry point running
    Executing,
    /// Last execution succeeded
    Completed,
    /// Last execution failed or was interrupted
    Failed,
}

/// A plugin instance together with its bound parameters and lifecycle state
pub struct FeatureInstance {
    class: Arc<dyn FeatureClass>,
    plugin: Box<dyn FeaturePlugin>,
    params: Option<BoundParameters>,
    state: LifecycleState,
}

impl fmt::Debug for FeatureInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureInstance")
            .field("class", &self.class.short_name())
            .field("params", &self.params)
            .field("state", &self.state)
            .finish()
    }
}

impl FeatureInstance {
    /// Instantiate a class; the instance starts unbound
    pub fn new(class: Arc<dyn FeatureClass>) -> Self {
        let plugin = class.instantiate();
        Self {
            class,
            plugin,
            params: None,
            state: LifecycleState::Created,
        }
    }

    /// Instantiate a class and bind its schema defaults
    pub fn with_defaults(class: Arc<dyn FeatureClass>) -> Self {
        let mut instance = Self::new(class);
        instance.params = Some(bind_defaults(instance.class.schema()));
        instance.state = LifecycleState::Bound;
        instance
    }

    /// The class this instance was created from
    pub fn class(&self) -> &Arc<dyn FeatureClass> {
        &self.class
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Bound parameters, if any
    pub fn params(&self) -> Option<&BoundParameters> {
        self.params.as_ref()
    }

    /// Mutable access to the bound parameters
    pub fn params_mut(&mut self) -> Option<&mut BoundParameters> {
        self.params.as_mut()
    }

    /// Bind overrides against the class schema
    ///
    /// On error the previous parameters and state are kept.
    pub fn bind(&mut self, overrides: &Overrides) -> Result<(), SchemaBindingError> {
        let bound = bind(self.class.schema(), overrides)?;
        self.params = Some(bound);
        self.state = LifecycleState::Bound;
        Ok(())
    }

    /// Return a finished instance to `Bound` for the next evaluation pass
    pub fn reset_for_pass(&mut self) {
        if matches!(self.state, LifecycleState::Completed | LifecycleState::Failed) {
            self.state = LifecycleState::Bound;
        }
    }

    /// Record that an execution was abandoned before it finished
    pub fn mark_interrupted(&mut self) {
        if self.state == LifecycleState::Executing {
            self.state = LifecycleState::Failed;
        }
    }

    /// Run the plugin's entry point once
    ///
    /// A panic inside the plugin is caught and reported as
    /// [`FeatureError::Panicked`].
    pub async fn execute(
        &mut self,
        kernel: &dyn GeometryKernel,
        feature_id: &str,
        config: &EvaluationConfig,
        solids: SolidSet,
    ) -> FeatureResult<SolidSet> {
        if self.state != LifecycleState::Bound {
            return Err(FeatureError::Lifecycle(format!(
                "cannot execute '{feature_id}' from state {:?}",
                self.state
            )));
        }
        let Some(params) = self.params.as_ref() else {
            return Err(FeatureError::Lifecycle(format!(
                "'{feature_id}' has no bound parameters"
            )));
        };

        self.state = LifecycleState::Executing;
        let ctx = RunContext::new(kernel, feature_id, params, config);
        let result = AssertUnwindSafe(self.plugin.run(&ctx, solids))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(FeatureError::Panicked(panic_message(payload.as_ref()))));

        self.state = match result {
            Ok(_) => LifecycleState::Completed,
            Err(_) => LifecycleState::Failed,
        };
        result
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
