//! # Attribute Values
//!
//! Attributes are either plain JSON data or a nested [`Model`]. Keeping the nested
//! case explicit lets validation recurse into child entities and lets the dirty
//! tracker compare children by identity instead of walking their buffers.

use crate::error::ModelError;
use crate::model::Model;
use std::collections::BTreeMap;

/// Named attribute values, ordered by key.
pub type Attributes = BTreeMap<String, Value>;

/// A single attribute value.
#[derive(Debug, Clone)]
pub enum Value {
    /// Plain data.
    Data(serde_json::Value),
    /// A nested entity.
    Model(Model),
}

impl Value {
    pub fn null() -> Self {
        Value::Data(serde_json::Value::Null)
    }

    pub fn as_data(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Data(data) => Some(data),
            Value::Model(_) => None,
        }
    }

    pub fn as_model(&self) -> Option<&Model> {
        match self {
            Value::Model(model) => Some(model),
            Value::Data(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_data().and_then(serde_json::Value::as_str)
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_data().and_then(serde_json::Value::as_i64)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_data().and_then(serde_json::Value::as_f64)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_data().and_then(serde_json::Value::as_bool)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Data(serde_json::Value::Null))
    }

    /// True for null, the empty string, and empty arrays or objects.
    ///
    /// Used to decide whether an identifier is present.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Data(serde_json::Value::Null) => true,
            Value::Data(serde_json::Value::String(s)) => s.is_empty(),
            Value::Data(serde_json::Value::Array(items)) => items.is_empty(),
            Value::Data(serde_json::Value::Object(map)) => map.is_empty(),
            _ => false,
        }
    }

    /// JSON representation; nested models serialize their working attributes.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Data(data) => data.clone(),
            Value::Model(model) => model.to_json(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Data(a), Value::Data(b)) => a == b,
            (Value::Model(a), Value::Model(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Value::Data(value)
    }
}

impl From<Model> for Value {
    fn from(model: Model) -> Self {
        Value::Model(model)
    }
}

impl From<&Model> for Value {
    fn from(model: &Model) -> Self {
        Value::Model(model.clone())
    }
}

macro_rules! data_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Data(serde_json::Value::from(value))
                }
            }
        )*
    };
}

data_from!(&str, String, bool, i32, i64, u32, u64, f64);

/// Builds an attribute map from a JSON object. Non-objects yield an empty map.
pub fn attributes(json: serde_json::Value) -> Attributes {
    match json {
        serde_json::Value::Object(map) => map
            .into_iter()
            .map(|(key, value)| (key, Value::Data(value)))
            .collect(),
        _ => Attributes::new(),
    }
}

/// Serializes an attribute map into a JSON object.
pub fn to_json(attributes: &Attributes) -> serde_json::Value {
    serde_json::Value::Object(
        attributes
            .iter()
            .map(|(key, value)| (key.clone(), value.to_json()))
            .collect(),
    )
}

/// Which attributes an operation applies to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    All,
    One(String),
    Many(Vec<String>),
}

impl Selection {
    /// Interprets a loosely-typed target: null, a name, or a list of names.
    pub fn from_json(target: &serde_json::Value) -> Result<Self, ModelError> {
        match target {
            serde_json::Value::Null => Ok(Selection::All),
            serde_json::Value::String(name) => Ok(Selection::One(name.clone())),
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        ModelError::InvalidArgument(format!(
                            "expected a list of attribute names, found {item}"
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Selection::Many),
            other => Err(ModelError::InvalidArgument(format!(
                "expected an attribute name or a list of names, found {other}"
            ))),
        }
    }

    /// Resolves to concrete names, using `all` when every attribute is selected.
    pub fn resolve(&self, all: impl FnOnce() -> Vec<String>) -> Vec<String> {
        match self {
            Selection::All => all(),
            Selection::One(name) => vec![name.clone()],
            Selection::Many(names) => names.clone(),
        }
    }
}

impl From<&str> for Selection {
    fn from(name: &str) -> Self {
        Selection::One(name.to_string())
    }
}

impl From<String> for Selection {
    fn from(name: String) -> Self {
        Selection::One(name)
    }
}

impl From<Vec<String>> for Selection {
    fn from(names: Vec<String>) -> Self {
        Selection::Many(names)
    }
}

impl From<Vec<&str>> for Selection {
    fn from(names: Vec<&str>) -> Self {
        Selection::Many(names.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for Selection {
    fn from(names: &[&str]) -> Self {
        Selection::Many(names.iter().map(|n| n.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Selection {
    fn from(names: [&str; N]) -> Self {
        Selection::Many(names.iter().map(|n| n.to_string()).collect())
    }
}

impl From<Option<&str>> for Selection {
    fn from(name: Option<&str>) -> Self {
        name.map_or(Selection::All, Selection::from)
    }
}
