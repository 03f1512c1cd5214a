#![doc(html_logo_url = "https://www.rust-lang.org/logos/rust-logo-128x128.png")]
#![doc(html_favicon_url = "https://www.rust-lang.org/favicon.ico")]
//! # Resource Model
//!
//! > **Client-side entities with dirty tracking, validation and a CRUD lifecycle.**
//!
//! A [`Model`](model::Model) tracks the state of one remote record: what the server
//! last agreed to, what the user has changed since, whether the values are valid,
//! and whether a fetch, save or delete is in flight.
//!
//! ## 🏗️ Design Philosophy
//!
//! ### Why two buffers?
//!
//! Every model keeps a **reference** buffer (the last synced truth) next to a
//! **working** buffer (live edits). Comparing the two answers "what changed?",
//! `reset` throws edits away, and a save can commit exactly what it sent while
//! edits made during the request stay dirty.
//!
//! ### Why definitions?
//!
//! Rules, mutations, routes and options are declared once per entity type in a
//! [`ModelDefinition`](model::ModelDefinition) and shared by `Arc`. Instances only
//! own their attribute buffers and flags.
//!
//! ## 🚀 Core Concepts
//!
//! ### Composable rules
//! [`Rule`](validation::Rule)s are immutable. `.and`, `.or` and `.format` return new
//! rules, so a rule declared once can be reused everywhere. Predicates may be
//! synchronous or asynchronous; chains always wait for every member to settle and
//! report failures in declaration order.
//!
//! ### One operation at a time, per kind
//! Each of fetch, save and delete has its own busy flag. A second call while the
//! first is pending resolves [`Outcome::Cancelled`](persistence::Outcome) without
//! contacting the transport. There is no queueing; retrying is up to the caller.
//!
//! ### Mocking: Testing without a server
//! [`MockTransport`](mock::MockTransport) replays queued replies and can hold a
//! request open until the test releases it.
//!
//! ## 👩‍💻 Architecture Notes
//!
//! ### 1. Type-Safe Error Handling
//! Every operation returns [`ModelError`](error::ModelError). Validation failures
//! (local, or HTTP 422 from the server) are never fatal; transport failures and
//! unreadable responses set the model's `fatal` flag.
//!
//! ### 2. Concurrency Model
//! Models are `Send + Sync` handles. State is guarded by a `parking_lot` mutex
//! that is released before any `.await` and before listeners run, so listeners
//! may freely call back into the model.
//!
//! ### 3. Observability
//! We use `tracing` with structured fields. See the [`telemetry`] module.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. State ([`value`], [`attributes`], [`mutation`])
//! - **Role**: attribute values, the three-buffer store and value transforms.
//! - **Key items**: [`Value`](value::Value), [`AttributeStore`](attributes::AttributeStore),
//!   [`MutationPipeline`](mutation::MutationPipeline).
//!
//! ### 2. Validation ([`validation`], [`messages`])
//! - **Role**: rules, the built-in rule library and locale-aware messages.
//! - **Key items**: [`Rule`](validation::Rule), [`rules`](validation::rules),
//!   [`MessageRegistry`](messages::MessageRegistry).
//!
//! ### 3. Persistence ([`persistence`])
//! - **Role**: the fetch/save/delete state machine and the transport boundary.
//! - **Key items**: [`Transport`](persistence::Transport), [`ModelHooks`](persistence::ModelHooks),
//!   [`Outcome`](persistence::Outcome).
//!
//! ### 4. Entities ([`model`], [`collection`], [`events`])
//! - **Role**: ties everything together per instance.
//! - **Key items**: [`Model`](model::Model), [`Collection`](collection::Collection),
//!   [`EventBus`](events::EventBus).
//!
//! ## 🚀 Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use resource_model::messages::MessageRegistry;
//! use resource_model::mock::MockTransport;
//! use resource_model::model::{Model, ModelDefinition};
//! use resource_model::persistence::{Method, Operation, Response};
//! use resource_model::validation::rules;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), resource_model::error::ModelError> {
//! let transport = Arc::new(MockTransport::new());
//! transport.expect(Method::Post, "/users").return_ok(Response::ok(json!({"id": 7})));
//!
//! let users = ModelDefinition::builder("user", transport.clone(), Arc::new(MessageRegistry::new()))
//!     .rule("name", rules::required().and(rules::length(3)))
//!     .route(Operation::Save, "/users")
//!     .build()?;
//!
//! let ada = Model::from_json(users, json!({"name": "Ada"}))?;
//! ada.save().await?;
//! assert_eq!(ada.get("id").and_then(|id| id.as_i64()), Some(7));
//! assert_eq!(ada.changed(), None);
//! # Ok(())
//! # }
//! ```
//!
//! ### Running Tests
//!
//! ```bash
//! cargo test
//! ```

pub mod attributes;
pub mod collection;
pub mod error;
pub mod events;
pub mod messages;
pub mod mock;
pub mod model;
pub mod mutation;
pub mod persistence;
pub mod telemetry;
pub mod validation;
pub mod value;
