//! Route templates such as `/users/{id}`.

use crate::error::ModelError;
use regex_lite::{Captures, Regex};

/// Matches `{name}` and captures `name`.
pub const DEFAULT_ROUTE_PARAMETER_PATTERN: &str = r"\{([^}]+)\}";

/// Substitutes route parameters into URL templates.
#[derive(Debug, Clone)]
pub struct RouteResolver {
    pattern: Regex,
}

impl RouteResolver {
    /// `pattern` must contain at least one capture group naming the parameter.
    pub fn new(pattern: &str) -> Result<Self, ModelError> {
        let regex = Regex::new(pattern)
            .map_err(|e| ModelError::Configuration(format!("invalid route parameter pattern '{pattern}': {e}")))?;
        if regex.captures_len() < 2 {
            return Err(ModelError::Configuration(format!(
                "route parameter pattern '{pattern}' has no capture group"
            )));
        }
        Ok(Self { pattern: regex })
    }

    /// Replaces every token in `template`. Unknown parameters render as `undefined`.
    pub fn resolve(&self, template: &str, parameters: &serde_json::Map<String, serde_json::Value>) -> String {
        self.pattern
            .replace_all(template, |caps: &Captures<'_>| {
                let name = caps.get(1).map_or("", |m| m.as_str()).trim();
                match parameters.get(name) {
                    None => "undefined".to_string(),
                    Some(serde_json::Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                }
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_default_pattern() {
        let resolver = RouteResolver::new(DEFAULT_ROUTE_PARAMETER_PATTERN).unwrap();
        let url = resolver.resolve("/users/{id}/posts/{post}", &params(json!({"id": 7, "post": "intro"})));
        assert_eq!(url, "/users/7/posts/intro");
    }

    #[test]
    fn test_unmatched_tokens_render_literally() {
        let resolver = RouteResolver::new(DEFAULT_ROUTE_PARAMETER_PATTERN).unwrap();
        assert_eq!(
            resolver.resolve("/users/{id}/{team}", &params(json!({"id": null}))),
            "/users/null/undefined"
        );
    }

    #[test]
    fn test_custom_pattern() {
        let resolver = RouteResolver::new(r":(\w+)").unwrap();
        assert_eq!(resolver.resolve("/users/:id", &params(json!({"id": 3}))), "/users/3");
        assert!(matches!(RouteResolver::new("("), Err(ModelError::Configuration(_))));
        assert!(matches!(RouteResolver::new(r"\{id\}"), Err(ModelError::Configuration(_))));
    }
}
