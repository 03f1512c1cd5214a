//! # Mock Transport
//!
//! An expectation-queue [`Transport`] for testing models without a server.
//!
//! Queue the requests you expect, in order, together with their replies. Each
//! call pops the next expectation and panics if the method or URL differ.
//!
//! ```rust
//! use std::sync::Arc;
//! use resource_model::mock::MockTransport;
//! use resource_model::persistence::{Method, Response};
//! use serde_json::json;
//!
//! let mock = Arc::new(MockTransport::new());
//! mock.expect(Method::Get, "/users/1").return_ok(Response::ok(json!({"id": 1, "name": "Ada"})));
//! mock.expect(Method::Post, "/users").return_status(422, json!({"name": ["Required"]}));
//!
//! // Hand `mock.clone()` to a ModelDefinition, run the model...
//! // mock.verify(); // Ensures all expectations were met
//! ```
//!
//! Use [`ExpectationBuilder::return_deferred`] to keep a request pending until the
//! test decides how it ends, for example to observe busy flags mid-flight.

use crate::persistence::{Method, Request, Response, Transport, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::oneshot;

type Reply = Result<Response, TransportError>;

enum Pending {
    Ready(Reply),
    Deferred(oneshot::Receiver<Reply>),
}

struct Expectation {
    method: Method,
    url: String,
    reply: Pending,
}

#[derive(Default)]
struct MockState {
    expectations: VecDeque<Expectation>,
    requests: Vec<Request>,
}

/// A transport replaying queued replies.
#[derive(Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Creates a mock with no expectations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expects a request with `method` to `url`.
    pub fn expect(&self, method: Method, url: &str) -> ExpectationBuilder {
        ExpectationBuilder {
            method,
            url: url.to_string(),
            state: self.state.clone(),
        }
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<Request> {
        self.state.lock().requests.clone()
    }

    /// The most recent request.
    pub fn last_request(&self) -> Option<Request> {
        self.state.lock().requests.last().cloned()
    }

    /// Verifies that all expectations were met.
    pub fn verify(&self) {
        let state = self.state.lock();
        if !state.expectations.is_empty() {
            panic!("Not all expectations were met. {} remaining", state.expectations.len());
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        let expectation = {
            let mut state = self.state.lock();
            state.requests.push(request.clone());
            state.expectations.pop_front()
        };
        // Lock released before awaiting a deferred reply.

        let Some(expectation) = expectation else {
            panic!("Unexpected request: {} {}", request.method, request.url);
        };
        if expectation.method != request.method || expectation.url != request.url {
            panic!(
                "Expected {} {}, got {} {}",
                expectation.method, expectation.url, request.method, request.url
            );
        }

        match expectation.reply {
            Pending::Ready(reply) => reply,
            Pending::Deferred(receiver) => receiver
                .await
                .unwrap_or_else(|_| Err(TransportError::network("deferred reply was dropped"))),
        }
    }
}

/// Builder for one expectation.
pub struct ExpectationBuilder {
    method: Method,
    url: String,
    state: Arc<Mutex<MockState>>,
}

impl ExpectationBuilder {
    /// Replies with `response`.
    pub fn return_ok(self, response: Response) {
        self.push(Pending::Ready(Ok(response)));
    }

    /// Fails with `error`.
    pub fn return_err(self, error: TransportError) {
        self.push(Pending::Ready(Err(error)));
    }

    /// Fails with an HTTP error response.
    pub fn return_status(self, status: u16, data: serde_json::Value) {
        self.return_err(TransportError::from_response(Response::new(status, data)));
    }

    /// Leaves the request pending until the returned sender is used.
    pub fn return_deferred(self) -> oneshot::Sender<Reply> {
        let (sender, receiver) = oneshot::channel();
        self.push(Pending::Deferred(receiver));
        sender
    }

    fn push(self, reply: Pending) {
        self.state.lock().expectations.push_back(Expectation {
            method: self.method,
            url: self.url,
            reply,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(method: Method, url: &str) -> Request {
        Request {
            url: url.to_string(),
            method,
            data: None,
            params: None,
            headers: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_replies_in_order() {
        let mock = MockTransport::new();
        mock.expect(Method::Get, "/a").return_ok(Response::ok(json!(1)));
        mock.expect(Method::Delete, "/a").return_status(500, json!(null));

        let first = mock.send(request(Method::Get, "/a")).await.unwrap();
        assert_eq!(first.data(), &json!(1));
        let second = mock.send(request(Method::Delete, "/a")).await.unwrap_err();
        assert_eq!(second.status(), Some(500));

        assert_eq!(mock.requests().len(), 2);
        mock.verify();
    }

    #[tokio::test]
    async fn test_deferred_reply() {
        let mock = Arc::new(MockTransport::new());
        let reply = mock.expect(Method::Get, "/slow").return_deferred();

        let pending = tokio::spawn({
            let mock = mock.clone();
            async move { mock.send(request(Method::Get, "/slow")).await }
        });
        tokio::task::yield_now().await;
        reply.send(Ok(Response::ok(json!("done")))).unwrap();

        let response = pending.await.unwrap().unwrap();
        assert_eq!(response.data(), &json!("done"));
    }

    #[tokio::test]
    #[should_panic(expected = "Not all expectations were met")]
    async fn test_verify_panics_on_unmet_expectations() {
        let mock = MockTransport::new();
        mock.expect(Method::Get, "/never").return_ok(Response::ok(json!(null)));
        mock.verify();
    }
}
