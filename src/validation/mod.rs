//! # Validation Engine
//!
//! Attributes are validated against lists of independent [`Rule`]s declared on a
//! [`ModelDefinition`](crate::model::ModelDefinition). Every rule in the list runs,
//! their failure messages are concatenated in declaration order, and the result is
//! keyed by attribute name in a [`ValidationErrors`] map. An empty map means valid.
//!
//! ## Nested models
//!
//! When an attribute holds another [`Model`] and `validate_recursively` is set, the
//! child is validated first (updating its own stored errors). A failing child is
//! reported on the parent as [`FieldErrors::Nested`], taking precedence over the
//! parent's own rules for that attribute.
//!
//! ## First error only
//!
//! With `use_first_error_only`, every rule still runs to completion; only the first
//! message is kept.

pub mod rule;
pub mod rules;

pub use rule::{Check, Rule, Verdict};

use crate::model::Model;
use crate::value::{Selection, Value};
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Errors keyed by attribute name.
pub type ValidationErrors = BTreeMap<String, FieldErrors>;

/// The errors reported for one attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldErrors {
    Messages(Vec<String>),
    /// A single message, used when only the first error is kept.
    Message(String),
    /// Errors of a nested model.
    Nested(ValidationErrors),
}

impl FieldErrors {
    /// Builds the errors for a list of messages, or `None` if there are none.
    pub fn from_messages(messages: Vec<String>, first_only: bool) -> Option<Self> {
        let mut messages = messages.into_iter().filter(|m| !m.is_empty()).peekable();
        messages.peek()?;
        if first_only {
            messages.next().map(FieldErrors::Message)
        } else {
            Some(FieldErrors::Messages(messages.collect()))
        }
    }

    /// Interprets a server-provided error value: a list of strings, a string, or an object.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(message) if !message.is_empty() => {
                Some(FieldErrors::Message(message.clone()))
            }
            serde_json::Value::Array(items) => {
                let messages = items.iter().filter_map(|item| match item {
                    serde_json::Value::String(s) => Some(s.clone()),
                    serde_json::Value::Null => None,
                    other => Some(other.to_string()),
                });
                FieldErrors::from_messages(messages.collect(), false)
            }
            serde_json::Value::Object(_) => {
                let nested = parse_errors(value);
                (!nested.is_empty()).then_some(FieldErrors::Nested(nested))
            }
            _ => None,
        }
    }

    /// The first message, searching nested errors in key order.
    pub fn first(&self) -> Option<&str> {
        match self {
            FieldErrors::Messages(messages) => messages.first().map(String::as_str),
            FieldErrors::Message(message) => Some(message),
            FieldErrors::Nested(errors) => errors.values().find_map(FieldErrors::first),
        }
    }

    /// Keeps only the first message of every list, recursively.
    pub fn collapse(self) -> Self {
        match self {
            FieldErrors::Messages(messages) => match messages.into_iter().next() {
                Some(first) => FieldErrors::Message(first),
                None => FieldErrors::Messages(Vec::new()),
            },
            FieldErrors::Nested(errors) => FieldErrors::Nested(collapse(errors)),
            message => message,
        }
    }
}

/// Parses a JSON object of attribute errors, skipping entries that carry no message.
pub fn parse_errors(body: &serde_json::Value) -> ValidationErrors {
    body.as_object()
        .map(|map| {
            map.iter()
                .filter_map(|(name, value)| FieldErrors::from_json(value).map(|e| (name.clone(), e)))
                .collect()
        })
        .unwrap_or_default()
}

/// Applies [`FieldErrors::collapse`] to every attribute.
pub fn collapse(errors: ValidationErrors) -> ValidationErrors {
    errors
        .into_iter()
        .map(|(name, field)| (name, field.collapse()))
        .collect()
}

/// Rule lists keyed by attribute name.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: BTreeMap<String, Vec<Rule>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, attribute: &str, rule: Rule) -> Self {
        self.add(attribute, rule);
        self
    }

    pub fn add(&mut self, attribute: &str, rule: Rule) {
        self.rules.entry(attribute.to_string()).or_default().push(rule);
    }

    pub fn rules_for(&self, attribute: &str) -> &[Rule] {
        self.rules.get(attribute).map_or(&[], Vec::as_slice)
    }

    /// Attributes with at least one rule, in key order.
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Validates one attribute of `owner`. Resolves to `None` when it is valid.
pub(crate) fn validate_attribute(owner: &Model, attribute: &str) -> BoxFuture<'static, Option<FieldErrors>> {
    let definition = owner.definition();
    let options = definition.options();
    let first_only = options.use_first_error_only;
    let value = owner.get(attribute);

    let nested = match &value {
        Some(Value::Model(child)) if options.validate_recursively => Some(child.validate(Selection::All)),
        _ => None,
    };
    let data = value.map_or(serde_json::Value::Null, |v| v.to_json());
    let checks: Vec<_> = definition
        .rules()
        .rules_for(attribute)
        .iter()
        .map(|rule| rule.check(&data, attribute, owner))
        .collect();

    async move {
        let nested = async move {
            match nested {
                Some(child) => child.await.ok().filter(|errors| !errors.is_empty()),
                None => None,
            }
        };
        let (nested, outcomes) = futures::join!(nested, join_all(checks));

        if let Some(errors) = nested {
            return Some(FieldErrors::Nested(errors));
        }
        let messages: Vec<String> = outcomes.into_iter().filter_map(Result::err).collect();
        FieldErrors::from_messages(messages, first_only)
    }
    .boxed()
}

/// Validates every selected attribute concurrently.
pub(crate) async fn validate_attributes(owner: &Model, attributes: Vec<String>) -> ValidationErrors {
    let checks = attributes.iter().map(|attribute| validate_attribute(owner, attribute));
    let results = join_all(checks).await;

    attributes
        .into_iter()
        .zip(results)
        .filter_map(|(attribute, errors)| errors.map(|e| (attribute, e)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_from_messages() {
        assert_eq!(FieldErrors::from_messages(vec![], false), None);
        assert_eq!(
            FieldErrors::from_messages(vec!["a".into(), "b".into()], false),
            Some(FieldErrors::Messages(vec!["a".into(), "b".into()]))
        );
        assert_eq!(
            FieldErrors::from_messages(vec!["a".into(), "b".into()], true),
            Some(FieldErrors::Message("a".into()))
        );
    }

    #[test]
    fn test_parse_server_errors() {
        let errors = parse_errors(&json!({
            "name": ["Required"],
            "email": "Taken",
            "address": {"zip": ["Invalid"]},
            "ignored": null,
        }));

        assert_eq!(errors.len(), 3);
        assert_eq!(errors["name"], FieldErrors::Messages(vec!["Required".into()]));
        assert_eq!(errors["email"], FieldErrors::Message("Taken".into()));
        assert_eq!(errors["address"].first(), Some("Invalid"));
        assert!(parse_errors(&json!("nope")).is_empty());
    }

    #[test]
    fn test_collapse_keeps_first_messages() {
        let errors = parse_errors(&json!({"name": ["Required", "Too short"], "nested": {"a": ["x", "y"]}}));
        let collapsed = collapse(errors);
        assert_eq!(collapsed["name"], FieldErrors::Message("Required".into()));
        assert_eq!(
            collapsed["nested"],
            FieldErrors::Nested(BTreeMap::from([("a".to_string(), FieldErrors::Message("x".into()))]))
        );
    }

    #[test]
    fn test_serializes_untagged() {
        let mut errors = ValidationErrors::new();
        errors.insert("name".into(), FieldErrors::Messages(vec!["Required".into()]));
        errors.insert("email".into(), FieldErrors::Message("Taken".into()));
        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            json!({"name": ["Required"], "email": "Taken"})
        );
    }

    #[test]
    fn test_rule_set() {
        let rules = RuleSet::new()
            .with("name", rules::required())
            .with("name", rules::length(3))
            .with("email", rules::email());
        assert_eq!(rules.rules_for("name").len(), 2);
        assert!(rules.rules_for("missing").is_empty());
        assert_eq!(rules.attributes().collect::<Vec<_>>(), vec!["email", "name"]);
    }
}
