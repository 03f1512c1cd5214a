//! # Model Errors
//!
//! This module defines the error types surfaced by models. By centralizing error
//! definitions, every public operation reports failures with the same taxonomy:
//!
//! - **Configuration errors** ([`ModelError::RouteNotDefined`], [`ModelError::ReservedAttribute`],
//!   [`ModelError::InvalidArgument`], [`ModelError::Configuration`]) indicate a programming mistake.
//! - **Validation errors** ([`ValidationError`]) are never fatal.
//! - **Request errors** ([`RequestError`]) wrap any non-422 transport failure and are fatal.
//! - **Response errors** ([`ResponseError`]) mean the server replied with data of an unexpected shape.

use crate::persistence::{Response, TransportError};
use crate::validation::ValidationErrors;

/// A transport-level failure that was not a validation rejection.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct RequestError {
    message: String,
    #[source]
    original: TransportError,
    response: Option<Response>,
}

impl RequestError {
    pub fn new(original: TransportError) -> Self {
        Self {
            message: original.to_string(),
            response: original.response().cloned(),
            original,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn original(&self) -> &TransportError {
        &self.original
    }

    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }
}

/// The server responded, but the body could not be interpreted.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ResponseError {
    message: String,
    response: Option<Response>,
}

impl ResponseError {
    pub fn new(message: impl Into<String>, response: Option<Response>) -> Self {
        Self {
            message: message.into(),
            response,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }
}

/// One or more attributes failed validation, locally or on the server (HTTP 422).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
    errors: ValidationErrors,
}

impl ValidationError {
    pub fn new(errors: ValidationErrors) -> Self {
        let attributes: Vec<&str> = errors.keys().map(String::as_str).collect();
        Self {
            message: format!("Validation failed for: {}", attributes.join(", ")),
            errors,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Errors keyed by attribute name.
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }
}

/// Errors returned by model operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Response(#[from] ResponseError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Route '{0}' is not defined")]
    RouteNotDefined(String),
    #[error("'{0}' is a reserved attribute name")]
    ReservedAttribute(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl ModelError {
    /// Whether this error marks the model as fatally failed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ModelError::Request(_) | ModelError::Response(_))
    }

    /// Attribute errors carried by a validation failure.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            ModelError::Validation(e) => Some(e.errors()),
            _ => None,
        }
    }
}
