use super::{BusyGuard, Operation, Outcome, Request, Response, TransportError};
use crate::attributes::check_reserved;
use crate::error::{ModelError, RequestError, ResponseError, ValidationError};
use crate::events::Signal;
use crate::model::{EventDetail, Model};
use crate::validation::collapse;
use crate::value::{self, Attributes, Selection, Value};
use tracing::{debug, info, instrument, warn};

const UNPROCESSABLE_ENTITY: u16 = 422;

impl Model {
    /// Loads attributes from the `fetch` route.
    #[instrument(skip_all, fields(entity_type = %self.definition().name(), uid = self.uid()))]
    pub async fn fetch(&self) -> Result<Outcome, ModelError> {
        let operation = Operation::Fetch;
        let Some(mut guard) = self.begin(operation) else {
            return Ok(Outcome::Cancelled);
        };

        let request = Request {
            url: self.url(operation)?,
            method: self.options().methods.fetch,
            data: None,
            params: self.definition().hooks().fetch_query(self),
            headers: self.definition().hooks().headers(self),
        };
        let response = match self.send(request).await {
            Ok(response) => response,
            Err(error) => return Err(self.fail(operation, &mut guard, self.classify(error))),
        };

        let attributes = match response.data() {
            serde_json::Value::Object(map) => assignable(map),
            _ => {
                let error = ResponseError::new("Expected an object in fetch response", Some(response));
                return Err(self.fail(operation, &mut guard, error.into()));
            }
        };
        let names: Vec<String> = attributes.keys().cloned().collect();
        self.set_many(attributes)?;
        self.sync(Selection::Many(names));

        Ok(self.succeed(operation, &mut guard, Some(response), None))
    }

    /// Creates or updates the remote resource.
    ///
    /// Validates first when `validate_on_save` is set. New models are created and
    /// added to every collection holding a back-reference; existing models are
    /// updated, sending only changed attributes when `patch` is set.
    #[instrument(skip_all, fields(entity_type = %self.definition().name(), uid = self.uid()))]
    pub async fn save(&self) -> Result<Outcome, ModelError> {
        let operation = Operation::Save;
        if !self.is_busy(operation) && self.is_redundant_save() {
            debug!("Nothing changed; skipping save");
            return Ok(Outcome::Completed(None));
        }
        let Some(mut guard) = self.begin(operation) else {
            return Ok(Outcome::Cancelled);
        };
        let definition = self.definition().clone();
        let options = definition.options();

        if options.validate_on_save {
            let errors = self.validate(Selection::All).await?;
            if !errors.is_empty() {
                return Err(self.fail(operation, &mut guard, ValidationError::new(errors).into()));
            }
        }

        let creating = self.is_new();
        let patching = options.patch && !creating;
        let changed = self.changed().unwrap_or_default();

        let mut snapshot = self.attributes();
        if patching {
            snapshot.retain(|name, _| changed.contains(name));
        }
        let removed: Vec<String> = changed
            .into_iter()
            .filter(|name| !snapshot.contains_key(name))
            .collect();
        let mut body = snapshot.clone();
        if options.mutate_before_save {
            definition.mutations().mutate_all(&mut body);
        }

        let method = match (creating, patching) {
            (true, _) => options.methods.create,
            (false, true) => options.methods.patch,
            (false, false) => options.methods.update,
        };
        let request = Request {
            url: self.url(operation)?,
            method,
            data: Some(value::to_json(&body)),
            params: None,
            headers: definition.hooks().headers(self),
        };
        let response = match self.send(request).await {
            Ok(response) => response,
            Err(error) => return Err(self.fail(operation, &mut guard, self.classify(error))),
        };

        let overrides = match save_overrides(&response, &options.identifier) {
            Ok(overrides) => overrides,
            Err(message) => {
                let error = ResponseError::new(message, Some(response));
                return Err(self.fail(operation, &mut guard, error.into()));
            }
        };

        // Values written while the request was in flight stay dirty.
        self.commit(&snapshot, &body, &removed);
        if !overrides.is_empty() {
            let names: Vec<String> = overrides.keys().cloned().collect();
            self.set_many(overrides)?;
            self.sync(Selection::Many(names));
        }

        if creating {
            for collection in self.collections() {
                collection.add(self);
            }
        }
        let event = if creating { "create" } else { "update" };
        Ok(self.succeed(operation, &mut guard, Some(response), Some(event)))
    }

    /// Deletes the remote resource and removes the model from its collections.
    ///
    /// A model without an identifier was never persisted, so no request is made.
    #[instrument(skip_all, fields(entity_type = %self.definition().name(), uid = self.uid()))]
    pub async fn delete(&self) -> Result<Outcome, ModelError> {
        let operation = Operation::Delete;
        let Some(mut guard) = self.begin(operation) else {
            return Ok(Outcome::Cancelled);
        };

        if self.is_new() {
            debug!("Model was never saved; nothing to delete remotely");
            self.detach();
            return Ok(self.succeed(operation, &mut guard, None, None));
        }

        let request = Request {
            url: self.url(operation)?,
            method: self.options().methods.delete,
            data: None,
            params: None,
            headers: self.definition().hooks().headers(self),
        };
        let response = match self.send(request).await {
            Ok(response) => response,
            Err(error) => return Err(self.fail(operation, &mut guard, self.classify(error))),
        };

        self.detach();
        Ok(self.succeed(operation, &mut guard, Some(response), None))
    }

    /// An existing model with nothing to send, when unchanged saves are disabled.
    fn is_redundant_save(&self) -> bool {
        !self.options().save_unchanged && !self.is_new() && self.changed().is_none()
    }

    /// Steps 1 to 3 of every operation. `None` means the operation is cancelled.
    fn begin(&self, operation: Operation) -> Option<BusyGuard> {
        if self.is_busy(operation) {
            debug!(%operation, "Already in progress; skipping");
            return None;
        }
        if self.definition().hooks().before(operation, self) == Signal::Cancel {
            debug!(%operation, "Skipped by hook");
            return None;
        }
        let Some(guard) = BusyGuard::acquire(self, operation) else {
            debug!(%operation, "Already in progress; skipping");
            return None;
        };
        if !self.emit(&operation.event("before"), EventDetail::None) {
            debug!(%operation, "Cancelled by listener");
            return None;
        }
        Some(guard)
    }

    fn url(&self, operation: Operation) -> Result<String, ModelError> {
        let definition = self.definition();
        let template = definition.route(operation)?;
        let mut parameters = match self.to_json() {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        parameters.extend(definition.hooks().route_parameters(self));
        Ok(definition.resolver().resolve(template, &parameters))
    }

    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        debug!(method = %request.method, url = %request.url, "Sending request");
        let transport = self.definition().transport().clone();
        transport.send(request).await
    }

    /// HTTP 422 is a validation failure; everything else is fatal.
    fn classify(&self, error: TransportError) -> ModelError {
        match error.response() {
            Some(response) if response.status() == UNPROCESSABLE_ENTITY => {
                let errors = response.validation_errors();
                let errors = if self.options().use_first_error_only {
                    collapse(errors)
                } else {
                    errors
                };
                ValidationError::new(errors).into()
            }
            _ => RequestError::new(error).into(),
        }
    }

    fn succeed(
        &self,
        operation: Operation,
        guard: &mut BusyGuard,
        response: Option<Response>,
        event: Option<&str>,
    ) -> Outcome {
        self.settle_errors(None);
        guard.release();
        info!(%operation, status = ?response.as_ref().map(Response::status), "Completed");

        let detail = EventDetail::Response(response.clone());
        self.emit(&operation.event("success"), detail.clone());
        if let Some(event) = event {
            self.emit(event, detail.clone());
        }
        self.definition().hooks().on_success(self, operation, response.as_ref());
        self.emit(&operation.event("always"), detail);
        Outcome::Completed(response)
    }

    fn fail(&self, operation: Operation, guard: &mut BusyGuard, error: ModelError) -> ModelError {
        self.settle_errors(Some(&error));
        guard.release();
        warn!(%operation, error = %error, fatal = error.is_fatal(), "Failed");

        let detail = EventDetail::Error(error.clone());
        self.emit(&operation.event("failure"), detail.clone());
        self.definition().hooks().on_failure(self, operation, &error);
        self.emit(&operation.event("always"), detail);
        error
    }

    fn detach(&self) {
        for collection in self.collections() {
            collection.remove(self);
        }
    }
}

/// Attributes from a response object, skipping reserved names.
fn assignable(map: &serde_json::Map<String, serde_json::Value>) -> Attributes {
    map.iter()
        .filter(|(name, _)| check_reserved(name).is_ok())
        .map(|(name, value)| (name.clone(), Value::Data(value.clone())))
        .collect()
}

/// Interprets a save response body as attribute overrides.
fn save_overrides(response: &Response, identifier: &str) -> Result<Attributes, String> {
    match response.data() {
        serde_json::Value::Null => Ok(Attributes::new()),
        serde_json::Value::String(s) if s.is_empty() => Ok(Attributes::new()),
        serde_json::Value::Array(_) => {
            Err("Expected an object, an identifier or an empty body in save response".to_string())
        }
        serde_json::Value::Object(map) => Ok(assignable(map)),
        scalar => Ok(Attributes::from([(identifier.to_string(), Value::Data(scalar.clone()))])),
    }
}
