//! # Model Hooks
//!
//! Per-entity-type customization of the persistence lifecycle. Implement
//! [`ModelHooks`] directly, or compose a [`Hooks`] value from closures and only
//! override what you need:
//!
//! ```rust
//! use resource_model::persistence::{Hooks, Operation};
//! use resource_model::events::Signal;
//!
//! let hooks = Hooks::new()
//!     .before(|operation, _model| match operation {
//!         Operation::Delete => Signal::Cancel,
//!         _ => Signal::Continue,
//!     })
//!     .headers(|_model| [("Authorization".to_string(), "Bearer t".to_string())].into());
//! ```

use super::{Headers, Operation, Response};
use crate::error::ModelError;
use crate::events::Signal;
use crate::model::Model;
use std::fmt;
use std::sync::Arc;

type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Overridable steps of fetch, save and delete. Every method has a default.
pub trait ModelHooks: Send + Sync {
    /// Runs before the busy flag is raised. `Cancel` skips the operation.
    fn before(&self, _operation: Operation, _model: &Model) -> Signal {
        Signal::Continue
    }

    /// Headers sent with every request.
    fn headers(&self, _model: &Model) -> Headers {
        Headers::new()
    }

    /// Query parameters sent with `fetch`.
    fn fetch_query(&self, _model: &Model) -> Option<serde_json::Value> {
        None
    }

    /// Extra route parameters, taking precedence over attributes.
    fn route_parameters(&self, _model: &Model) -> JsonMap {
        JsonMap::new()
    }

    fn on_success(&self, _model: &Model, _operation: Operation, _response: Option<&Response>) {}

    fn on_failure(&self, _model: &Model, _operation: Operation, _error: &ModelError) {}
}

type BeforeFn = Arc<dyn Fn(Operation, &Model) -> Signal + Send + Sync>;
type HeadersFn = Arc<dyn Fn(&Model) -> Headers + Send + Sync>;
type QueryFn = Arc<dyn Fn(&Model) -> Option<serde_json::Value> + Send + Sync>;
type ParametersFn = Arc<dyn Fn(&Model) -> JsonMap + Send + Sync>;
type SuccessFn = Arc<dyn Fn(&Model, Operation, Option<&Response>) + Send + Sync>;
type FailureFn = Arc<dyn Fn(&Model, Operation, &ModelError) + Send + Sync>;

/// [`ModelHooks`] assembled from optional closures.
#[derive(Clone, Default)]
pub struct Hooks {
    before: Option<BeforeFn>,
    headers: Option<HeadersFn>,
    fetch_query: Option<QueryFn>,
    route_parameters: Option<ParametersFn>,
    on_success: Option<SuccessFn>,
    on_failure: Option<FailureFn>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before<F>(mut self, f: F) -> Self
    where
        F: Fn(Operation, &Model) -> Signal + Send + Sync + 'static,
    {
        self.before = Some(Arc::new(f));
        self
    }

    pub fn headers<F>(mut self, f: F) -> Self
    where
        F: Fn(&Model) -> Headers + Send + Sync + 'static,
    {
        self.headers = Some(Arc::new(f));
        self
    }

    pub fn fetch_query<F>(mut self, f: F) -> Self
    where
        F: Fn(&Model) -> Option<serde_json::Value> + Send + Sync + 'static,
    {
        self.fetch_query = Some(Arc::new(f));
        self
    }

    pub fn route_parameters<F>(mut self, f: F) -> Self
    where
        F: Fn(&Model) -> JsonMap + Send + Sync + 'static,
    {
        self.route_parameters = Some(Arc::new(f));
        self
    }

    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(&Model, Operation, Option<&Response>) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(f));
        self
    }

    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(&Model, Operation, &ModelError) + Send + Sync + 'static,
    {
        self.on_failure = Some(Arc::new(f));
        self
    }
}

impl ModelHooks for Hooks {
    fn before(&self, operation: Operation, model: &Model) -> Signal {
        self.before.as_ref().map_or(Signal::Continue, |f| f(operation, model))
    }

    fn headers(&self, model: &Model) -> Headers {
        self.headers.as_ref().map(|f| f(model)).unwrap_or_default()
    }

    fn fetch_query(&self, model: &Model) -> Option<serde_json::Value> {
        self.fetch_query.as_ref().and_then(|f| f(model))
    }

    fn route_parameters(&self, model: &Model) -> JsonMap {
        self.route_parameters.as_ref().map(|f| f(model)).unwrap_or_default()
    }

    fn on_success(&self, model: &Model, operation: Operation, response: Option<&Response>) {
        if let Some(f) = &self.on_success {
            f(model, operation, response);
        }
    }

    fn on_failure(&self, model: &Model, operation: Operation, error: &ModelError) {
        if let Some(f) = &self.on_failure {
            f(model, operation, error);
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("before", &self.before.is_some())
            .field("headers", &self.headers.is_some())
            .field("fetch_query", &self.fetch_query.is_some())
            .field("route_parameters", &self.route_parameters.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}
