//! Events emitted by models.

use super::Model;
use crate::attributes::Change;
use crate::error::ModelError;
use crate::persistence::Response;
use crate::validation::ValidationErrors;

/// Payload of a [`ModelEvent`].
#[derive(Debug, Clone)]
pub enum EventDetail {
    None,
    /// `change`
    Change(Change),
    /// `reset` and `sync`: the attributes involved.
    Attributes(Vec<String>),
    /// `validate`: the errors found by that call.
    Validated(ValidationErrors),
    /// `<op>.success`, `create`, `update`, and `<op>.always` after success.
    Response(Option<Response>),
    /// `<op>.failure` and `<op>.always` after failure.
    Error(ModelError),
}

/// An event and the model that emitted it.
#[derive(Debug, Clone)]
pub struct ModelEvent {
    pub name: String,
    pub target: Model,
    pub detail: EventDetail,
}

impl ModelEvent {
    pub fn change(&self) -> Option<&Change> {
        match &self.detail {
            EventDetail::Change(change) => Some(change),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ModelError> {
        match &self.detail {
            EventDetail::Error(error) => Some(error),
            _ => None,
        }
    }

    pub fn response(&self) -> Option<&Response> {
        match &self.detail {
            EventDetail::Response(response) => response.as_ref(),
            _ => None,
        }
    }
}
