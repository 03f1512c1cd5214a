//! Model configuration.
//!
//! Option sets deserialize from JSON using the camelCase names:
//!
//! ```rust
//! use resource_model::model::ModelOptions;
//!
//! let options = ModelOptions::from_json(r#"{"patch": true, "useFirstErrorOnly": true}"#).unwrap();
//! assert!(options.patch);
//! assert!(options.use_first_error_only);
//! assert_eq!(options.identifier, "id");
//! ```

use crate::error::ModelError;
use crate::persistence::{Method, DEFAULT_ROUTE_PARAMETER_PATTERN};
use serde::{Deserialize, Serialize};

/// HTTP method per request kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MethodTable {
    pub fetch: Method,
    pub create: Method,
    pub update: Method,
    pub patch: Method,
    pub delete: Method,
}

impl Default for MethodTable {
    fn default() -> Self {
        Self {
            fetch: Method::Get,
            create: Method::Post,
            update: Method::Post,
            patch: Method::Patch,
            delete: Method::Delete,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModelOptions {
    pub methods: MethodTable,
    /// Attribute holding the primary key.
    pub identifier: String,
    /// Regex with one capture group naming a route parameter.
    pub route_parameter_pattern: String,
    /// Save existing models with only their changed attributes.
    pub patch: bool,
    pub use_first_error_only: bool,
    pub validate_on_change: bool,
    pub validate_on_save: bool,
    pub validate_recursively: bool,
    pub mutate_on_change: bool,
    pub mutate_before_sync: bool,
    pub mutate_before_save: bool,
    /// Send a save request even when nothing changed.
    pub save_unchanged: bool,
    /// Batch deletes send identifiers in the body rather than the query string.
    pub use_delete_body: bool,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            methods: MethodTable::default(),
            identifier: "id".to_string(),
            route_parameter_pattern: DEFAULT_ROUTE_PARAMETER_PATTERN.to_string(),
            patch: false,
            use_first_error_only: false,
            validate_on_change: false,
            validate_on_save: true,
            validate_recursively: true,
            mutate_on_change: false,
            mutate_before_sync: true,
            mutate_before_save: true,
            save_unchanged: true,
            use_delete_body: true,
        }
    }
}

impl ModelOptions {
    pub fn from_json(source: &str) -> Result<Self, ModelError> {
        serde_json::from_str(source).map_err(|e| ModelError::Configuration(format!("invalid model options: {e}")))
    }
}
