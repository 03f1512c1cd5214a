//! # Models
//!
//! A [`Model`] is a cheap-to-clone handle on one entity: its attribute buffers,
//! stored validation errors, busy flags and listeners. Clones share state, so a
//! model can be handed to asynchronous rules, nested validation or spawned tasks.
//!
//! ## Locking
//!
//! State sits behind a `parking_lot` mutex that is never held across an `.await`
//! and never held while listeners run. Every mutating method applies its change
//! under the lock, releases it, then emits events.
//!
//! ## Events
//!
//! | Event | Detail |
//! |-------|--------|
//! | `change` | [`EventDetail::Change`] for every modified attribute |
//! | `reset`, `sync` | [`EventDetail::Attributes`] |
//! | `validate` | [`EventDetail::Validated`] |
//! | `fetch.before`, `save.before`, `delete.before` | none; returning `false` cancels |
//! | `<op>.success`, `create`, `update` | [`EventDetail::Response`] |
//! | `<op>.failure` | [`EventDetail::Error`] |
//! | `<op>.always` | the success or failure detail |

mod definition;
mod event;
mod options;

pub use definition::{ModelDefinition, ModelDefinitionBuilder};
pub use event::{EventDetail, ModelEvent};
pub use options::{MethodTable, ModelOptions};

use crate::attributes::{AttributeStore, Change};
use crate::collection::{Collection, CollectionInner};
use crate::error::ModelError;
use crate::events::{EventBus, Signal};
use crate::messages::MessageRegistry;
use crate::mutation::MutationPipeline;
use crate::persistence::Operation;
use crate::validation::{self, FieldErrors, ValidationErrors};
use crate::value::{self, Attributes, Selection, Value};
use futures::future::{self as fut, BoxFuture};
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

static NEXT_UID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default)]
struct ModelState {
    store: AttributeStore,
    errors: ValidationErrors,
    loading: bool,
    saving: bool,
    deleting: bool,
    fatal: bool,
}

impl ModelState {
    fn busy_flag(&mut self, operation: Operation) -> &mut bool {
        match operation {
            Operation::Fetch => &mut self.loading,
            Operation::Save => &mut self.saving,
            Operation::Delete => &mut self.deleting,
        }
    }
}

struct ModelInner {
    uid: u64,
    definition: Arc<ModelDefinition>,
    state: Mutex<ModelState>,
    events: EventBus<ModelEvent>,
    collections: Mutex<Vec<Weak<CollectionInner>>>,
}

/// A single entity instance.
#[derive(Clone)]
pub struct Model {
    inner: Arc<ModelInner>,
}

impl Model {
    /// Creates a clean model: defaults, then `attributes`, all synced.
    pub fn new(definition: Arc<ModelDefinition>, attributes: Attributes) -> Result<Self, ModelError> {
        let options = definition.options();
        let mut store = AttributeStore::new(definition.defaults().clone());
        store.set_many(attributes, options.mutate_on_change.then(|| definition.mutations()))?;
        store.sync(&Selection::All, options.mutate_before_sync.then(|| definition.mutations()));

        Ok(Self {
            inner: Arc::new(ModelInner {
                uid: NEXT_UID.fetch_add(1, Ordering::Relaxed),
                state: Mutex::new(ModelState {
                    store,
                    ..ModelState::default()
                }),
                definition,
                events: EventBus::new(),
                collections: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Creates a model from a JSON object of attributes.
    pub fn from_json(definition: Arc<ModelDefinition>, json: serde_json::Value) -> Result<Self, ModelError> {
        Self::new(definition, value::attributes(json))
    }

    /// Process-unique instance id.
    pub fn uid(&self) -> u64 {
        self.inner.uid
    }

    /// Whether both handles refer to the same instance.
    pub fn ptr_eq(&self, other: &Model) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn definition(&self) -> &Arc<ModelDefinition> {
        &self.inner.definition
    }

    pub fn options(&self) -> &ModelOptions {
        self.inner.definition.options()
    }

    pub fn messages(&self) -> &Arc<MessageRegistry> {
        self.inner.definition.messages()
    }

    // Attributes

    pub fn get(&self, attribute: &str) -> Option<Value> {
        self.inner.state.lock().store.get(attribute).cloned()
    }

    pub fn get_or(&self, attribute: &str, fallback: impl Into<Value>) -> Value {
        self.get(attribute).unwrap_or_else(|| fallback.into())
    }

    pub fn has(&self, attribute: &str) -> bool {
        self.inner.state.lock().store.has(attribute)
    }

    /// The last synced value of `attribute`.
    pub fn saved(&self, attribute: &str) -> Option<Value> {
        self.inner.state.lock().store.saved(attribute).cloned()
    }

    /// Writes one attribute, emitting `change` if the value differs.
    pub fn set(&self, attribute: &str, value: impl Into<Value>) -> Result<(), ModelError> {
        let change = {
            let mut state = self.inner.state.lock();
            state.store.set(attribute, value.into(), self.change_mutations())?
        };
        if let Some(change) = change {
            self.notify_change(change);
        }
        Ok(())
    }

    /// Writes several attributes. Nothing is written if any name is reserved.
    pub fn set_many(&self, attributes: Attributes) -> Result<(), ModelError> {
        let changes = {
            let mut state = self.inner.state.lock();
            state.store.set_many(attributes, self.change_mutations())?
        };
        for change in changes {
            self.notify_change(change);
        }
        Ok(())
    }

    /// Reverts attributes to their defaults, removing those without one.
    pub fn unset(&self, selection: impl Into<Selection>) {
        let changes = self.inner.state.lock().store.unset(&selection.into());
        for change in changes {
            self.notify_change(change);
        }
    }

    /// Restores attributes to their last synced values.
    pub fn reset(&self, selection: impl Into<Selection>) {
        let names = self.inner.state.lock().store.reset(&selection.into());
        self.emit("reset", EventDetail::Attributes(names));
    }

    /// Makes the working values of the selected attributes the new reference.
    pub fn sync(&self, selection: impl Into<Selection>) {
        let mutations = self.options().mutate_before_sync.then(|| self.inner.definition.mutations());
        let names = self.inner.state.lock().store.sync(&selection.into(), mutations);
        self.emit("sync", EventDetail::Attributes(names));
    }

    /// Syncs what a save sent. See [`AttributeStore::commit`].
    pub(crate) fn commit(&self, snapshot: &Attributes, sent: &Attributes, removed: &[String]) {
        let mutations = self.options().mutate_before_sync.then(|| self.inner.definition.mutations());
        let names = self.inner.state.lock().store.commit(snapshot, sent, removed, mutations);
        self.emit("sync", EventDetail::Attributes(names));
    }

    /// Attributes whose working value differs from the reference, in key order.
    pub fn changed(&self) -> Option<Vec<String>> {
        self.inner.state.lock().store.changed()
    }

    pub fn is_changed(&self, attribute: &str) -> bool {
        self.inner.state.lock().store.is_changed(attribute)
    }

    /// Restores defaults into both buffers and forgets errors.
    pub fn clear(&self) {
        let mut state = self.inner.state.lock();
        state.store.clear();
        state.errors.clear();
        state.fatal = false;
    }

    /// Copy of the working buffer.
    pub fn attributes(&self) -> Attributes {
        self.inner.state.lock().store.working().clone()
    }

    /// The identifier value, if it is set and non-empty.
    pub fn identifier(&self) -> Option<Value> {
        self.get(&self.options().identifier).filter(|value| !value.is_empty())
    }

    /// True until the model has an identifier.
    pub fn is_new(&self) -> bool {
        self.identifier().is_none()
    }

    /// The working attributes as a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        // Clone out first: nested models lock their own state.
        let attributes = self.attributes();
        value::to_json(&attributes)
    }

    fn change_mutations(&self) -> Option<&MutationPipeline> {
        self.options().mutate_on_change.then(|| self.inner.definition.mutations())
    }

    fn notify_change(&self, change: Change) {
        let attribute = change.attribute.clone();
        self.emit("change", EventDetail::Change(change));
        if self.options().validate_on_change {
            self.spawn_validation(attribute);
        }
    }

    fn spawn_validation(&self, attribute: String) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(self.validate(attribute));
            }
            Err(_) => debug!(
                entity_type = %self.inner.definition.name(),
                uid = self.uid(),
                %attribute,
                "No runtime; skipping validation on change"
            ),
        }
    }

    // Validation

    /// Validates the selected attributes and stores the result.
    ///
    /// `All` covers every attribute with rules, plus attributes holding nested
    /// models when `validate_recursively` is set. Attributes without rules pass.
    pub fn validate(&self, selection: impl Into<Selection>) -> BoxFuture<'static, Result<ValidationErrors, ModelError>> {
        let selection = selection.into();
        let model = self.clone();

        async move {
            let attributes = selection.resolve(|| model.validatable_attributes());
            let errors = validation::validate_attributes(&model, attributes.clone()).await;
            model.store_errors(&selection, &attributes, &errors);
            model.emit("validate", EventDetail::Validated(errors.clone()));
            Ok(errors)
        }
        .boxed()
    }

    /// Like [`Model::validate`], with a loosely-typed target: null, a name or a list of names.
    pub fn validate_json(
        &self,
        target: &serde_json::Value,
    ) -> BoxFuture<'static, Result<ValidationErrors, ModelError>> {
        match Selection::from_json(target) {
            Ok(selection) => self.validate(selection),
            Err(error) => fut::ready(Err(error)).boxed(),
        }
    }

    fn validatable_attributes(&self) -> Vec<String> {
        let definition = &self.inner.definition;
        let mut names: BTreeSet<String> = definition.rules().attributes().map(str::to_string).collect();
        if definition.options().validate_recursively {
            let state = self.inner.state.lock();
            names.extend(
                state
                    .store
                    .working()
                    .iter()
                    .filter(|(_, value)| value.as_model().is_some())
                    .map(|(name, _)| name.clone()),
            );
        }
        names.into_iter().collect()
    }

    // The last call to settle wins for the attributes it covers.
    fn store_errors(&self, selection: &Selection, attributes: &[String], errors: &ValidationErrors) {
        let mut state = self.inner.state.lock();
        if *selection == Selection::All {
            state.errors = errors.clone();
            return;
        }
        for attribute in attributes {
            match errors.get(attribute) {
                Some(field) => {
                    state.errors.insert(attribute.clone(), field.clone());
                }
                None => {
                    state.errors.remove(attribute);
                }
            }
        }
    }

    pub fn errors(&self) -> ValidationErrors {
        self.inner.state.lock().errors.clone()
    }

    pub fn attribute_errors(&self, attribute: &str) -> Option<FieldErrors> {
        self.inner.state.lock().errors.get(attribute).cloned()
    }

    pub fn set_errors(&self, errors: ValidationErrors) {
        self.inner.state.lock().errors = errors;
    }

    pub fn clear_errors(&self) {
        self.inner.state.lock().errors.clear();
    }

    // Persistence state

    pub fn loading(&self) -> bool {
        self.inner.state.lock().loading
    }

    pub fn saving(&self) -> bool {
        self.inner.state.lock().saving
    }

    pub fn deleting(&self) -> bool {
        self.inner.state.lock().deleting
    }

    /// Set when the last operation failed for a reason other than validation.
    pub fn fatal(&self) -> bool {
        self.inner.state.lock().fatal
    }

    pub fn is_busy(&self, operation: Operation) -> bool {
        *self.inner.state.lock().busy_flag(operation)
    }

    pub(crate) fn try_mark_busy(&self, operation: Operation) -> bool {
        let mut state = self.inner.state.lock();
        let flag = state.busy_flag(operation);
        if *flag {
            return false;
        }
        *flag = true;
        true
    }

    pub(crate) fn clear_busy(&self, operation: Operation) {
        *self.inner.state.lock().busy_flag(operation) = false;
    }

    /// Records the outcome of an operation on the error state.
    pub(crate) fn settle_errors(&self, error: Option<&ModelError>) {
        let mut state = self.inner.state.lock();
        match error {
            None => {
                state.errors.clear();
                state.fatal = false;
            }
            Some(ModelError::Validation(e)) => {
                state.errors = e.errors().clone();
                state.fatal = false;
            }
            Some(e) if e.is_fatal() => {
                state.errors.clear();
                state.fatal = true;
            }
            Some(_) => {}
        }
    }

    // Events

    /// Registers `listener` for each comma-separated event name.
    pub fn on<F, R>(&self, events: &str, listener: F)
    where
        F: Fn(&ModelEvent) -> R + Send + Sync + 'static,
        R: Into<Signal>,
    {
        self.inner.events.on(events, listener);
    }

    /// Emits `name`. Returns `false` if any listener cancelled.
    pub fn emit(&self, name: &str, detail: EventDetail) -> bool {
        let event = ModelEvent {
            name: name.to_string(),
            target: self.clone(),
            detail,
        };
        self.inner.events.emit(name, &event)
    }

    // Collections

    /// Records that `collection` holds this model, without adding it.
    pub fn register_collection(&self, collection: &Collection) {
        let mut collections = self.inner.collections.lock();
        collections.retain(|weak| weak.strong_count() > 0);
        if !collections.iter().any(|weak| collection.is(weak)) {
            collections.push(collection.downgrade());
        }
    }

    pub(crate) fn forget_collection(&self, collection: &Collection) {
        self.inner.collections.lock().retain(|weak| !collection.is(weak));
    }

    /// Live collections holding a back-reference to this model.
    pub fn collections(&self) -> Vec<Collection> {
        self.inner
            .collections
            .lock()
            .iter()
            .filter_map(Collection::upgrade)
            .collect()
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("entity_type", &self.inner.definition.name())
            .field("uid", &self.inner.uid)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use crate::validation::rules;
    use crate::value::attributes;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn definition(options: ModelOptions) -> Arc<ModelDefinition> {
        ModelDefinition::builder("user", Arc::new(MockTransport::new()), Arc::new(MessageRegistry::new()))
            .default("role", "member")
            .rule("name", rules::required())
            .rule("name", rules::length(3))
            .rule("email", rules::email())
            .mutation("name", |v: Value| match v.as_str() {
                Some(s) => Value::from(s.trim()),
                None => v,
            })
            .options(options)
            .build()
            .unwrap()
    }

    fn user(attrs: serde_json::Value) -> Model {
        Model::new(definition(ModelOptions::default()), attributes(attrs)).unwrap()
    }

    #[test]
    fn test_new_model_is_clean() {
        let model = user(json!({"name": "Ada"}));
        assert_eq!(model.changed(), None);
        assert_eq!(model.get("role"), Some(Value::from("member")));
        assert!(model.is_new());
        assert_ne!(model.uid(), user(json!({})).uid());
    }

    #[test]
    fn test_change_event_only_for_real_changes() {
        let model = user(json!({"name": "Ada"}));
        let events = Arc::new(Mutex::new(Vec::new()));
        let seen = events.clone();
        model.on("change", move |event: &ModelEvent| {
            if let Some(change) = event.change() {
                seen.lock().push((change.attribute.clone(), change.value.clone()));
            }
        });

        model.set("name", "Ada").unwrap();
        model.set("name", "Grace").unwrap();
        assert_eq!(*events.lock(), vec![("name".to_string(), Some(Value::from("Grace")))]);
        assert_eq!(model.changed(), Some(vec!["name".to_string()]));
    }

    #[test]
    fn test_mutate_on_change_is_opt_in() {
        let model = user(json!({}));
        model.set("name", "  Ada ").unwrap();
        assert_eq!(model.get("name"), Some(Value::from("  Ada ")));

        // Sync mutates by default.
        model.sync("name");
        assert_eq!(model.saved("name"), Some(Value::from("Ada")));

        let eager = Model::new(
            definition(ModelOptions {
                mutate_on_change: true,
                ..ModelOptions::default()
            }),
            Attributes::new(),
        )
        .unwrap();
        eager.set("name", "  Ada ").unwrap();
        assert_eq!(eager.get("name"), Some(Value::from("Ada")));
    }

    #[test]
    fn test_set_reset_sync_round_trip() {
        let model = user(json!({"name": "Ada"}));
        model.set("name", "Grace").unwrap();
        model.sync(Selection::All);
        model.reset(Selection::All);
        assert_eq!(model.get("name"), Some(Value::from("Grace")));
        assert_eq!(model.changed(), None);
    }

    #[test]
    fn test_reserved_attribute() {
        let model = user(json!({}));
        assert!(matches!(model.set("_saving", true), Err(ModelError::ReservedAttribute(_))));
        assert!(Model::from_json(definition(ModelOptions::default()), json!({"_uid": 1})).is_err());
    }

    #[test]
    fn test_identifier() {
        let model = user(json!({"id": ""}));
        assert!(model.is_new());
        model.set("id", 5).unwrap();
        assert_eq!(model.identifier(), Some(Value::from(5)));
        assert!(!model.is_new());
    }

    #[test]
    fn test_to_json_includes_nested_models() {
        let parent = user(json!({"name": "Ada"}));
        let child = user(json!({"name": "Babbage"}));
        parent.set("friend", &child).unwrap();
        assert_eq!(
            parent.to_json(),
            json!({"name": "Ada", "role": "member", "friend": {"name": "Babbage", "role": "member"}})
        );
    }

    #[tokio::test]
    async fn test_validate_all_and_single() {
        let model = user(json!({"name": "Al", "email": "nope"}));
        let errors = model.validate(Selection::All).await.unwrap();
        assert_eq!(
            errors["name"],
            FieldErrors::Messages(vec!["Must have a length of at least 3".into()])
        );
        assert_eq!(errors["email"].first(), Some("Must be a valid email address"));
        assert_eq!(model.errors(), errors);

        // Re-validating one attribute only replaces that attribute's errors.
        model.set("email", "al@example.com").unwrap();
        let errors = model.validate("email").await.unwrap();
        assert!(errors.is_empty());
        assert!(model.attribute_errors("email").is_none());
        assert!(model.attribute_errors("name").is_some());
    }

    #[tokio::test]
    async fn test_unknown_attribute_never_fails() {
        let model = user(json!({"name": "Ada"}));
        assert!(model.validate("anything").await.unwrap().is_empty());
        assert!(model.validate_json(&json!(["x", "y"])).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_validate_json_rejects_bad_targets() {
        let model = user(json!({}));
        assert!(matches!(
            model.validate_json(&json!(42)).await,
            Err(ModelError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_first_error_only_still_runs_every_rule() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = |calls: Arc<AtomicUsize>| {
            validation::Rule::test("counted", move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                false
            })
            .format("counted")
        };
        let definition =
            ModelDefinition::builder("user", Arc::new(MockTransport::new()), Arc::new(MessageRegistry::new()))
                .rule("name", rules::required())
                .rule("name", counted(calls.clone()))
                .options(ModelOptions {
                    use_first_error_only: true,
                    ..ModelOptions::default()
                })
                .build()
                .unwrap();
        let model = Model::new(definition, Attributes::new()).unwrap();

        let errors = model.validate(Selection::All).await.unwrap();
        assert_eq!(errors["name"], FieldErrors::Message("Required".into()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_nested_model_errors() {
        let parent = user(json!({"name": "Ada"}));
        let child = user(json!({"name": "Bo"}));
        parent.set("friend", &child).unwrap();

        let errors = parent.validate(Selection::All).await.unwrap();
        let FieldErrors::Nested(nested) = &errors["friend"] else {
            panic!("expected nested errors, got {errors:?}");
        };
        assert!(nested.contains_key("name"));
        assert_eq!(child.errors(), *nested);
    }

    #[tokio::test]
    async fn test_nested_validation_can_be_disabled() {
        let options = ModelOptions {
            validate_recursively: false,
            ..ModelOptions::default()
        };
        let parent = Model::from_json(definition(options), json!({"name": "Ada"})).unwrap();
        parent.set("friend", user(json!({"name": "Bo"}))).unwrap();
        let errors = parent.validate(Selection::All).await.unwrap();
        assert!(!errors.contains_key("friend"));
    }

    #[tokio::test]
    async fn test_validate_on_change() {
        let options = ModelOptions {
            validate_on_change: true,
            ..ModelOptions::default()
        };
        let model = Model::from_json(definition(options), json!({"name": "Ada"})).unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        let tx = Mutex::new(Some(tx));
        model.on("validate", move |event: &ModelEvent| {
            if let (Some(tx), EventDetail::Validated(errors)) = (tx.lock().take(), &event.detail) {
                let _ = tx.send(errors.clone());
            }
        });

        model.set("name", "Al").unwrap();
        let errors = rx.await.unwrap();
        assert!(errors.contains_key("name"));
    }
}
