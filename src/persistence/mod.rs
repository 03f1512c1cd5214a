//! # Persistence
//!
//! Fetch, save and delete for a single [`Model`], each gated by its own busy flag.
//!
//! ## Lifecycle of one operation
//!
//! 1. Already busy with the same kind of operation: resolve [`Outcome::Cancelled`]
//!    without contacting the transport.
//! 2. The [`ModelHooks::before`] hook may skip the operation. Nothing else happens.
//! 3. The busy flag is raised and `<op>.before` is emitted. A listener returning
//!    `false` cancels, after every listener has run.
//! 4. `save` validates first (unless `validate_on_save` is off).
//! 5. A [`Request`] is built from the route, method table and hooks, then sent.
//! 6. Success applies the response, clears errors and the fatal flag, then emits
//!    `<op>.success` and `<op>.always`.
//! 7. Failure is classified: HTTP 422 populates attribute errors and is not fatal,
//!    anything else is fatal and clears attribute errors. `<op>.failure` and
//!    `<op>.always` are emitted.
//!
//! The busy flag is lowered before any success or failure event, and a
//! [`BusyGuard`] lowers it on every early return.

mod controller;
pub mod hooks;
pub mod routes;
pub mod transport;

pub use hooks::{Hooks, ModelHooks};
pub use routes::{RouteResolver, DEFAULT_ROUTE_PARAMETER_PATTERN};
pub use transport::{Headers, Method, Request, Response, Transport, TransportError};

use crate::model::Model;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kinds of persistence operation. Each has its own busy flag and route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Fetch,
    Save,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Fetch => "fetch",
            Operation::Save => "save",
            Operation::Delete => "delete",
        }
    }

    /// Lifecycle event name, e.g. `save.success`.
    pub fn event(&self, stage: &str) -> String {
        format!("{}.{stage}", self.as_str())
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a persistence operation ended when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The operation ran. `None` when no request was needed.
    Completed(Option<Response>),
    /// Skipped because the model was busy, or a hook or listener cancelled it.
    Cancelled,
}

impl Outcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    pub fn response(&self) -> Option<&Response> {
        match self {
            Outcome::Completed(response) => response.as_ref(),
            Outcome::Cancelled => None,
        }
    }
}

/// Holds a busy flag raised until released or dropped.
pub struct BusyGuard {
    model: Model,
    operation: Operation,
    active: bool,
}

impl BusyGuard {
    /// Raises the flag, or returns `None` if it is already raised.
    pub(crate) fn acquire(model: &Model, operation: Operation) -> Option<Self> {
        model.try_mark_busy(operation).then(|| Self {
            model: model.clone(),
            operation,
            active: true,
        })
    }

    /// Lowers the flag now.
    pub fn release(&mut self) {
        if self.active {
            self.active = false;
            self.model.clear_busy(self.operation);
        }
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_event_names() {
        assert_eq!(Operation::Fetch.event("before"), "fetch.before");
        assert_eq!(Operation::Delete.event("always"), "delete.always");
        assert_eq!(Operation::Save.to_string(), "save");
    }

    #[test]
    fn test_outcome() {
        assert!(Outcome::Cancelled.is_cancelled());
        let outcome = Outcome::Completed(Some(Response::ok(serde_json::json!({"id": 1}))));
        assert_eq!(outcome.response().map(Response::status), Some(200));
        assert_eq!(Outcome::Completed(None).response(), None);
    }
}
