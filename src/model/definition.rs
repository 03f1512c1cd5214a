//! # Model Definitions
//!
//! Everything shared by all instances of one entity type: defaults, rules,
//! mutations, routes, options, hooks, the transport and the message registry.
//! A definition is immutable once built and shared through an `Arc`.
//!
//! ```rust
//! use std::sync::Arc;
//! use resource_model::messages::MessageRegistry;
//! use resource_model::mock::MockTransport;
//! use resource_model::model::ModelDefinition;
//! use resource_model::persistence::Operation;
//! use resource_model::validation::rules;
//!
//! let users = ModelDefinition::builder("user", Arc::new(MockTransport::new()), Arc::new(MessageRegistry::new()))
//!     .default("role", "member")
//!     .rule("name", rules::required())
//!     .rule("name", rules::length(3))
//!     .route(Operation::Fetch, "/users/{id}")
//!     .route(Operation::Save, "/users")
//!     .build()
//!     .unwrap();
//! assert_eq!(users.name(), "user");
//! ```

use super::options::ModelOptions;
use crate::attributes::check_reserved;
use crate::error::ModelError;
use crate::messages::MessageRegistry;
use crate::mutation::MutationPipeline;
use crate::persistence::{Hooks, ModelHooks, Operation, RouteResolver, Transport};
use crate::validation::{Rule, RuleSet};
use crate::value::{Attributes, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub struct ModelDefinition {
    name: String,
    defaults: Attributes,
    rules: RuleSet,
    mutations: MutationPipeline,
    routes: HashMap<Operation, String>,
    options: ModelOptions,
    hooks: Arc<dyn ModelHooks>,
    transport: Arc<dyn Transport>,
    messages: Arc<MessageRegistry>,
    resolver: RouteResolver,
}

impl ModelDefinition {
    pub fn builder(
        name: impl Into<String>,
        transport: Arc<dyn Transport>,
        messages: Arc<MessageRegistry>,
    ) -> ModelDefinitionBuilder {
        ModelDefinitionBuilder {
            name: name.into(),
            defaults: Attributes::new(),
            rules: RuleSet::new(),
            mutations: MutationPipeline::new(),
            routes: HashMap::new(),
            options: ModelOptions::default(),
            hooks: Arc::new(Hooks::new()),
            transport,
            messages,
        }
    }

    /// Entity type name, used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn defaults(&self) -> &Attributes {
        &self.defaults
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn mutations(&self) -> &MutationPipeline {
        &self.mutations
    }

    pub fn options(&self) -> &ModelOptions {
        &self.options
    }

    pub fn hooks(&self) -> &dyn ModelHooks {
        self.hooks.as_ref()
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn messages(&self) -> &Arc<MessageRegistry> {
        &self.messages
    }

    pub fn resolver(&self) -> &RouteResolver {
        &self.resolver
    }

    /// The route template for `operation`.
    pub fn route(&self, operation: Operation) -> Result<&str, ModelError> {
        self.routes
            .get(&operation)
            .map(String::as_str)
            .ok_or_else(|| ModelError::RouteNotDefined(operation.to_string()))
    }
}

impl fmt::Debug for ModelDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDefinition")
            .field("name", &self.name)
            .field("defaults", &self.defaults)
            .field("rules", &self.rules)
            .field("routes", &self.routes)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

pub struct ModelDefinitionBuilder {
    name: String,
    defaults: Attributes,
    rules: RuleSet,
    mutations: MutationPipeline,
    routes: HashMap<Operation, String>,
    options: ModelOptions,
    hooks: Arc<dyn ModelHooks>,
    transport: Arc<dyn Transport>,
    messages: Arc<MessageRegistry>,
}

impl ModelDefinitionBuilder {
    /// Default value of `attribute` for new instances.
    pub fn default(mut self, attribute: &str, value: impl Into<serde_json::Value>) -> Self {
        self.defaults.insert(attribute.to_string(), Value::Data(value.into()));
        self
    }

    /// Appends a rule to `attribute`'s list.
    pub fn rule(mut self, attribute: &str, rule: Rule) -> Self {
        self.rules.add(attribute, rule);
        self
    }

    pub fn mutation<F>(mut self, attribute: &str, mutator: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.mutations.add(attribute, mutator);
        self
    }

    pub fn route(mut self, operation: Operation, template: &str) -> Self {
        self.routes.insert(operation, template.to_string());
        self
    }

    pub fn options(mut self, options: ModelOptions) -> Self {
        self.options = options;
        self
    }

    pub fn hooks(mut self, hooks: impl ModelHooks + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    /// Fails if a default uses a reserved name or the route pattern does not compile.
    pub fn build(self) -> Result<Arc<ModelDefinition>, ModelError> {
        for name in self.defaults.keys() {
            check_reserved(name)?;
        }
        let resolver = RouteResolver::new(&self.options.route_parameter_pattern)?;

        Ok(Arc::new(ModelDefinition {
            name: self.name,
            defaults: self.defaults,
            rules: self.rules,
            mutations: self.mutations,
            routes: self.routes,
            options: self.options,
            hooks: self.hooks,
            transport: self.transport,
            messages: self.messages,
            resolver,
        }))
    }
}
