//! # Transport Boundary
//!
//! Models never perform I/O themselves. Every persistence operation is turned into
//! a [`Request`] and handed to a [`Transport`], which resolves to a [`Response`] or
//! fails with a [`TransportError`]. A failure may still carry the server's response
//! (for example an HTTP 422 with attribute errors); network failures carry none.

use crate::validation::{parse_errors, ValidationErrors};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Request and response headers.
pub type Headers = BTreeMap<String, String>;

/// HTTP verbs a model can be configured to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a transport needs to perform one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub url: String,
    pub method: Method,
    /// Request body.
    pub data: Option<serde_json::Value>,
    /// Query parameters.
    pub params: Option<serde_json::Value>,
    pub headers: Headers,
}

/// What the server sent back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    status: u16,
    data: serde_json::Value,
    headers: Headers,
}

impl Response {
    pub fn new(status: u16, data: serde_json::Value) -> Self {
        Self {
            status,
            data,
            headers: Headers::new(),
        }
    }

    /// A `200 OK` carrying `data`.
    pub fn ok(data: serde_json::Value) -> Self {
        Self::new(200, data)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn data(&self) -> &serde_json::Value {
        &self.data
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Attribute errors carried by the body.
    pub fn validation_errors(&self) -> ValidationErrors {
        parse_errors(&self.data)
    }
}

/// A failed transport call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
    response: Option<Response>,
}

impl TransportError {
    /// A failure without any response, such as a refused connection.
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            response: None,
        }
    }

    /// A failure carrying the server's response.
    pub fn with_response(message: impl Into<String>, response: Response) -> Self {
        Self {
            message: message.into(),
            response: Some(response),
        }
    }

    /// A failure described by the response status alone.
    pub fn from_response(response: Response) -> Self {
        Self::with_response(format!("Request failed with status code {}", response.status()), response)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(Response::status)
    }
}

/// Performs requests on behalf of models.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::FieldErrors;
    use serde_json::json;

    #[test]
    fn test_method_serializes_uppercase() {
        assert_eq!(serde_json::to_value(Method::Patch).unwrap(), json!("PATCH"));
        assert_eq!(serde_json::from_value::<Method>(json!("PUT")).unwrap(), Method::Put);
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }

    #[test]
    fn test_error_from_response() {
        let error = TransportError::from_response(Response::new(422, json!({"name": ["Required"]})));
        assert_eq!(error.to_string(), "Request failed with status code 422");
        assert_eq!(error.status(), Some(422));
        let errors = error.response().map(Response::validation_errors).unwrap_or_default();
        assert_eq!(errors["name"], FieldErrors::Messages(vec!["Required".into()]));

        assert_eq!(TransportError::network("offline").status(), None);
    }
}
