use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use resource_model::collection::Collection;
use resource_model::error::ModelError;
use resource_model::events::Signal;
use resource_model::messages::MessageRegistry;
use resource_model::mock::MockTransport;
use resource_model::model::{Model, ModelDefinition, ModelEvent, ModelOptions};
use resource_model::persistence::{Hooks, Method, Operation, Outcome, Response, TransportError};
use resource_model::validation::{rules, FieldErrors};
use resource_model::value::Value;
use serde_json::json;
use std::sync::Arc;

fn users(transport: &Arc<MockTransport>, options: ModelOptions) -> Arc<ModelDefinition> {
    ModelDefinition::builder("user", transport.clone(), Arc::new(MessageRegistry::new()))
        .rule("name", rules::required())
        .route(Operation::Fetch, "/users/{id}")
        .route(Operation::Save, "/users")
        .route(Operation::Delete, "/users/{id}")
        .options(options)
        .build()
        .expect("valid definition")
}

fn user(transport: &Arc<MockTransport>, attributes: serde_json::Value) -> Model {
    Model::from_json(users(transport, ModelOptions::default()), attributes).expect("valid attributes")
}

/// Records the names of `events` as they are emitted.
fn record(model: &Model, events: &str) -> Arc<Mutex<Vec<String>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    model.on(events, move |event: &ModelEvent| sink.lock().push(event.name.clone()));
    seen
}

#[tokio::test]
async fn test_create_assigns_identifier_from_response() {
    let transport = Arc::new(MockTransport::new());
    transport
        .expect(Method::Post, "/users")
        .return_ok(Response::new(201, json!({"id": 7})));
    let model = user(&transport, json!({"name": "Ada"}));
    let events = record(&model, "save.before, save.success, create, update, save.always");

    let outcome = model.save().await.unwrap();

    assert_eq!(outcome.response().map(Response::status), Some(201));
    assert_eq!(model.get("id"), Some(Value::from(7)));
    assert!(!model.is_changed("id"));
    assert_eq!(model.changed(), None);
    assert!(!model.saving() && !model.fatal());
    assert_eq!(*events.lock(), vec!["save.before", "save.success", "create", "save.always"]);

    let request = transport.last_request().unwrap();
    assert_eq!(request.data, Some(json!({"name": "Ada"})));
    transport.verify();
}

#[tokio::test]
async fn test_update_sends_every_attribute() {
    let transport = Arc::new(MockTransport::new());
    transport.expect(Method::Post, "/users").return_ok(Response::ok(json!(null)));
    let model = user(&transport, json!({"id": 3, "name": "Ada", "email": "ada@example.com"}));
    let events = record(&model, "create, update");
    model.set("name", "Grace").unwrap();

    model.save().await.unwrap();

    assert_eq!(
        transport.last_request().unwrap().data,
        Some(json!({"id": 3, "name": "Grace", "email": "ada@example.com"}))
    );
    assert_eq!(model.changed(), None);
    assert_eq!(*events.lock(), vec!["update"]);
}

#[tokio::test]
async fn test_patch_sends_only_changes() {
    let transport = Arc::new(MockTransport::new());
    transport.expect(Method::Patch, "/users").return_ok(Response::ok(json!({})));
    let options = ModelOptions {
        patch: true,
        ..ModelOptions::default()
    };
    let model = Model::from_json(
        users(&transport, options),
        json!({"id": 3, "name": "Ada", "email": "ada@example.com"}),
    )
    .unwrap();
    model.set("name", "Grace").unwrap();

    model.save().await.unwrap();

    assert_eq!(transport.last_request().unwrap().data, Some(json!({"name": "Grace"})));
    assert_eq!(model.changed(), None);
}

#[tokio::test]
async fn test_scalar_save_response_is_the_identifier() {
    let transport = Arc::new(MockTransport::new());
    transport.expect(Method::Post, "/users").return_ok(Response::ok(json!("u-42")));
    let model = user(&transport, json!({"name": "Ada"}));

    model.save().await.unwrap();

    assert_eq!(model.identifier(), Some(Value::from("u-42")));
    assert_eq!(model.changed(), None);
}

#[tokio::test]
async fn test_array_save_response_is_a_response_error() {
    let transport = Arc::new(MockTransport::new());
    transport.expect(Method::Post, "/users").return_ok(Response::ok(json!([1, 2])));
    let model = user(&transport, json!({"name": "Ada"}));
    model.set("name", "Grace").unwrap();

    let error = model.save().await.unwrap_err();

    assert!(matches!(error, ModelError::Response(_)));
    assert!(model.fatal());
    // Nothing was applied.
    assert_eq!(model.changed(), Some(vec!["name".to_string()]));
    assert!(model.is_new());
}

#[tokio::test]
async fn test_server_validation_failure_is_not_fatal() {
    let transport = Arc::new(MockTransport::new());
    transport
        .expect(Method::Post, "/users")
        .return_status(422, json!({"name": ["Required"]}));
    let model = user(&transport, json!({"name": "Ada"}));

    let error = model.save().await.unwrap_err();

    let Some(errors) = error.validation_errors() else {
        panic!("expected a validation error, got {error:?}");
    };
    assert_eq!(errors["name"], FieldErrors::Messages(vec!["Required".into()]));
    assert!(!model.fatal());
    assert!(!model.saving());
    assert_eq!(model.attribute_errors("name"), Some(FieldErrors::Messages(vec!["Required".into()])));
}

#[tokio::test]
async fn test_server_validation_failure_first_error_only() {
    let transport = Arc::new(MockTransport::new());
    transport
        .expect(Method::Post, "/users")
        .return_status(422, json!({"name": ["Required", "Too short"]}));
    let options = ModelOptions {
        use_first_error_only: true,
        ..ModelOptions::default()
    };
    let model = Model::from_json(users(&transport, options), json!({"name": "Ada"})).unwrap();

    assert!(matches!(model.save().await, Err(ModelError::Validation(_))));
    assert_eq!(model.attribute_errors("name"), Some(FieldErrors::Message("Required".into())));
}

#[tokio::test]
async fn test_local_validation_failure_makes_no_request() {
    let transport = Arc::new(MockTransport::new());
    let model = user(&transport, json!({}));
    let events = record(&model, "save.before, save.failure, save.always");

    let error = model.save().await.unwrap_err();

    assert!(matches!(error, ModelError::Validation(_)));
    assert_eq!(error.to_string(), "Validation failed for: name");
    assert!(transport.requests().is_empty());
    assert!(!model.saving() && !model.fatal());
    assert_eq!(model.attribute_errors("name"), Some(FieldErrors::Messages(vec!["Required".into()])));
    assert_eq!(*events.lock(), vec!["save.before", "save.failure", "save.always"]);
}

#[tokio::test]
async fn test_validate_on_save_can_be_disabled() {
    let transport = Arc::new(MockTransport::new());
    transport.expect(Method::Post, "/users").return_ok(Response::ok(json!({"id": 1})));
    let options = ModelOptions {
        validate_on_save: false,
        ..ModelOptions::default()
    };
    let model = Model::from_json(users(&transport, options), json!({})).unwrap();

    assert!(model.save().await.is_ok());
    transport.verify();
}

#[tokio::test]
async fn test_second_fetch_while_pending_is_cancelled() {
    let transport = Arc::new(MockTransport::new());
    let reply = transport.expect(Method::Get, "/users/1").return_deferred();
    let model = user(&transport, json!({"id": 1}));

    let first = tokio::spawn({
        let model = model.clone();
        async move { model.fetch().await }
    });
    while !model.loading() {
        tokio::task::yield_now().await;
    }

    let second = model.fetch().await.unwrap();
    assert_eq!(second, Outcome::Cancelled);
    assert_eq!(transport.requests().len(), 1);

    reply
        .send(Ok(Response::ok(json!({"id": 1, "name": "Ada"}))))
        .unwrap();
    let first = first.await.unwrap().unwrap();

    assert!(!first.is_cancelled());
    assert_eq!(model.get("name"), Some(Value::from("Ada")));
    assert_eq!(model.changed(), None);
    assert!(!model.loading());
}

#[tokio::test]
async fn test_writes_during_save_stay_dirty() {
    let transport = Arc::new(MockTransport::new());
    let reply = transport.expect(Method::Post, "/users").return_deferred();
    let model = user(&transport, json!({"id": 1, "name": "Ada"}));
    model.set("name", "Grace").unwrap();

    let save = tokio::spawn({
        let model = model.clone();
        async move { model.save().await }
    });
    while transport.requests().is_empty() {
        tokio::task::yield_now().await;
    }
    model.set("name", "Hopper").unwrap();
    reply.send(Ok(Response::ok(json!({})))).unwrap();
    save.await.unwrap().unwrap();

    assert_eq!(model.saved("name"), Some(Value::from("Grace")));
    assert_eq!(model.get("name"), Some(Value::from("Hopper")));
    assert_eq!(model.changed(), Some(vec!["name".to_string()]));
}

#[tokio::test]
async fn test_fatal_failure_clears_errors_and_keeps_attributes() {
    let transport = Arc::new(MockTransport::new());
    transport.expect(Method::Get, "/users/1").return_status(500, json!({"message": "boom"}));
    transport
        .expect(Method::Get, "/users/1")
        .return_ok(Response::ok(json!({"name": "Ada"})));
    let model = user(&transport, json!({"id": 1, "name": "Local"}));
    model.set("name", "Edited").unwrap();
    model.set_errors([("name".to_string(), FieldErrors::Message("Required".into()))].into());

    let error = model.fetch().await.unwrap_err();

    let ModelError::Request(request_error) = &error else {
        panic!("expected a request error, got {error:?}");
    };
    assert_eq!(request_error.response().map(Response::status), Some(500));
    assert!(model.fatal());
    assert!(model.errors().is_empty());
    assert_eq!(model.get("name"), Some(Value::from("Edited")));
    assert!(!model.loading());

    // The next successful operation clears the fatal flag.
    model.fetch().await.unwrap();
    assert!(!model.fatal());
    assert_eq!(model.get("name"), Some(Value::from("Ada")));
}

#[tokio::test]
async fn test_network_failure_has_no_response() {
    let transport = Arc::new(MockTransport::new());
    transport
        .expect(Method::Get, "/users/1")
        .return_err(TransportError::network("connection refused"));
    let model = user(&transport, json!({"id": 1}));

    let error = model.fetch().await.unwrap_err();

    assert_eq!(error.to_string(), "connection refused");
    let ModelError::Request(request_error) = error else {
        panic!("expected a request error");
    };
    assert!(request_error.response().is_none());
    assert_eq!(request_error.original().message(), "connection refused");
    assert!(model.fatal());
}

#[tokio::test]
async fn test_fetch_requires_an_object() {
    let transport = Arc::new(MockTransport::new());
    transport.expect(Method::Get, "/users/1").return_ok(Response::ok(json!("nope")));
    let model = user(&transport, json!({"id": 1}));

    assert!(matches!(model.fetch().await, Err(ModelError::Response(_))));
    assert!(model.fatal());
}

#[tokio::test]
async fn test_listener_cancel_runs_every_listener() {
    let transport = Arc::new(MockTransport::new());
    let model = user(&transport, json!({"name": "Ada"}));
    let seen = record(&model, "save.before");
    model.on("save.before", |_: &ModelEvent| false);
    let after = record(&model, "save.before");

    let outcome = model.save().await.unwrap();

    assert!(outcome.is_cancelled());
    assert_eq!(seen.lock().len(), 1);
    assert_eq!(after.lock().len(), 1);
    assert!(!model.saving());
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_hook_skip_emits_nothing() {
    let transport = Arc::new(MockTransport::new());
    let definition = ModelDefinition::builder("user", transport.clone(), Arc::new(MessageRegistry::new()))
        .route(Operation::Delete, "/users/{id}")
        .hooks(Hooks::new().before(|operation, _| match operation {
            Operation::Delete => Signal::Cancel,
            _ => Signal::Continue,
        }))
        .build()
        .unwrap();
    let model = Model::from_json(definition, json!({"id": 1})).unwrap();
    let events = record(&model, "delete.before");

    assert_eq!(model.delete().await.unwrap(), Outcome::Cancelled);
    assert!(events.lock().is_empty());
    assert!(!model.deleting());
}

#[tokio::test]
async fn test_hooks_supply_headers_query_and_route_parameters() {
    let transport = Arc::new(MockTransport::new());
    transport
        .expect(Method::Get, "/teams/red/users/1")
        .return_ok(Response::ok(json!({})));
    let successes = Arc::new(Mutex::new(Vec::new()));
    let sink = successes.clone();
    let definition = ModelDefinition::builder("user", transport.clone(), Arc::new(MessageRegistry::new()))
        .route(Operation::Fetch, "/teams/{team}/users/{id}")
        .hooks(
            Hooks::new()
                .headers(|_| [("Authorization".to_string(), "Bearer token".to_string())].into())
                .fetch_query(|_| Some(json!({"include": "profile"})))
                .route_parameters(|_| json!({"team": "red"}).as_object().cloned().unwrap_or_default())
                .on_success(move |_, operation, _| sink.lock().push(operation)),
        )
        .build()
        .unwrap();
    let model = Model::from_json(definition, json!({"id": 1})).unwrap();

    model.fetch().await.unwrap();

    let request = transport.last_request().unwrap();
    assert_eq!(request.headers["Authorization"], "Bearer token");
    assert_eq!(request.params, Some(json!({"include": "profile"})));
    assert_eq!(*successes.lock(), vec![Operation::Fetch]);
}

#[tokio::test]
async fn test_missing_route_is_a_configuration_error() {
    let transport = Arc::new(MockTransport::new());
    let definition = ModelDefinition::builder("user", transport.clone(), Arc::new(MessageRegistry::new()))
        .build()
        .unwrap();
    let model = Model::from_json(definition, json!({"id": 1})).unwrap();

    assert!(matches!(model.delete().await, Err(ModelError::RouteNotDefined(_))));
    assert!(!model.deleting());
    assert!(!model.fatal());
}

#[tokio::test]
async fn test_save_unchanged_disabled_skips_request() {
    let transport = Arc::new(MockTransport::new());
    let options = ModelOptions {
        save_unchanged: false,
        ..ModelOptions::default()
    };
    let model = Model::from_json(users(&transport, options), json!({"id": 1, "name": "Ada"})).unwrap();
    let events = record(&model, "save.before, save.success, save.failure, save.always");

    assert_eq!(model.save().await.unwrap(), Outcome::Completed(None));
    assert!(transport.requests().is_empty());
    assert!(!model.saving());
    assert!(events.lock().is_empty());
}

#[tokio::test]
async fn test_save_unchanged_disabled_skips_validation() {
    let transport = Arc::new(MockTransport::new());
    let options = ModelOptions {
        save_unchanged: false,
        ..ModelOptions::default()
    };
    // `name` is required but missing; nothing changed, so nothing is checked.
    let model = Model::from_json(users(&transport, options), json!({"id": 1})).unwrap();
    let events = record(&model, "save.before, save.success, save.failure, save.always");

    assert_eq!(model.save().await.unwrap(), Outcome::Completed(None));
    assert!(model.errors().is_empty());
    assert!(events.lock().is_empty());
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_unset_attribute_is_clean_after_save() {
    let transport = Arc::new(MockTransport::new());
    transport.expect(Method::Post, "/users").return_ok(Response::ok(json!(null)));
    let model = user(&transport, json!({"id": 1, "name": "Ada", "nick": "A"}));
    model.unset("nick");
    assert_eq!(model.changed(), Some(vec!["nick".to_string()]));

    model.save().await.unwrap();

    assert_eq!(transport.last_request().unwrap().data, Some(json!({"id": 1, "name": "Ada"})));
    assert_eq!(model.saved("nick"), None);
    assert_eq!(model.changed(), None);
    transport.verify();
}

#[tokio::test]
async fn test_patch_commits_removed_attributes() {
    let transport = Arc::new(MockTransport::new());
    transport.expect(Method::Patch, "/users").return_ok(Response::ok(json!({})));
    let options = ModelOptions {
        patch: true,
        ..ModelOptions::default()
    };
    let model = Model::from_json(users(&transport, options), json!({"id": 1, "name": "Ada", "nick": "A"})).unwrap();
    model.unset("nick");
    model.set("name", "Grace").unwrap();

    model.save().await.unwrap();

    assert_eq!(transport.last_request().unwrap().data, Some(json!({"name": "Grace"})));
    assert_eq!(model.changed(), None);
    assert!(!model.has("nick"));
}

#[tokio::test]
async fn test_mutate_before_save_becomes_the_saved_value() {
    let transport = Arc::new(MockTransport::new());
    transport.expect(Method::Post, "/users").return_ok(Response::ok(json!({"id": 1})));
    let definition = ModelDefinition::builder("user", transport.clone(), Arc::new(MessageRegistry::new()))
        .route(Operation::Save, "/users")
        .mutation("name", |value: Value| match value.as_str() {
            Some(s) => Value::from(s.to_uppercase()),
            None => value,
        })
        .build()
        .unwrap();
    let model = Model::new(definition, Default::default()).unwrap();
    model.set("name", "ada").unwrap();

    model.save().await.unwrap();

    assert_eq!(transport.last_request().unwrap().data, Some(json!({"name": "ADA"})));
    assert_eq!(model.saved("name"), Some(Value::from("ADA")));
    assert_eq!(model.get("name"), Some(Value::from("ADA")));
    assert_eq!(model.changed(), None);
}

#[tokio::test]
async fn test_create_and_delete_update_collections() {
    let transport = Arc::new(MockTransport::new());
    transport.expect(Method::Post, "/users").return_ok(Response::ok(json!({"id": 9})));
    transport.expect(Method::Delete, "/users/9").return_ok(Response::new(204, json!(null)));
    let model = user(&transport, json!({"name": "Ada"}));
    let team = Collection::new();
    model.register_collection(&team);
    assert!(!team.has(&model));

    model.save().await.unwrap();
    assert!(team.has(&model));

    model.delete().await.unwrap();
    assert!(!team.has(&model));
    assert!(!model.deleting());
    transport.verify();
}

#[tokio::test]
async fn test_deleting_a_new_model_makes_no_request() {
    let transport = Arc::new(MockTransport::new());
    let model = user(&transport, json!({"name": "Ada"}));
    let team = Collection::from_models([model.clone()]);

    assert_eq!(model.delete().await.unwrap(), Outcome::Completed(None));
    assert!(team.is_empty());
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_different_operations_are_independent() {
    let transport = Arc::new(MockTransport::new());
    let fetch_reply = transport.expect(Method::Get, "/users/1").return_deferred();
    transport.expect(Method::Post, "/users").return_ok(Response::ok(json!({})));
    let model = user(&transport, json!({"id": 1, "name": "Ada"}));

    let fetch = tokio::spawn({
        let model = model.clone();
        async move { model.fetch().await }
    });
    while !model.loading() {
        tokio::task::yield_now().await;
    }

    assert!(!model.save().await.unwrap().is_cancelled());
    assert!(model.loading());

    fetch_reply.send(Ok(Response::ok(json!({})))).unwrap();
    fetch.await.unwrap().unwrap();
    assert!(!model.loading());
}
