//! `${name}` message templates.

use std::fmt;
use std::sync::Arc;

/// Values available to a template while rendering.
pub type MessageContext = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Field(String),
}

/// A compiled message template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Compiles `source`. An unterminated `${` is kept as literal text.
    pub fn compile(source: &str) -> Self {
        let mut segments = Vec::new();
        let mut rest = source;

        while let Some(start) = rest.find("${") {
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                break;
            };
            if start > 0 {
                segments.push(Segment::Text(rest[..start].to_string()));
            }
            segments.push(Segment::Field(after[..end].trim().to_string()));
            rest = &after[end + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_string()));
        }

        Self { segments }
    }

    pub fn render(&self, context: &MessageContext) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Text(text) => text.clone(),
                Segment::Field(name) => context
                    .get(name)
                    .map_or_else(|| "undefined".to_string(), display),
            })
            .collect()
    }
}

fn display(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

type Formatter = Arc<dyn Fn(&MessageContext) -> String + Send + Sync>;

/// A message: either a compiled template or a custom formatting function.
#[derive(Clone)]
pub enum MessageFormat {
    Template(Template),
    Custom(Formatter),
}

impl MessageFormat {
    pub fn custom<F>(format: F) -> Self
    where
        F: Fn(&MessageContext) -> String + Send + Sync + 'static,
    {
        MessageFormat::Custom(Arc::new(format))
    }

    pub fn render(&self, context: &MessageContext) -> String {
        match self {
            MessageFormat::Template(template) => template.render(context),
            MessageFormat::Custom(format) => format(context),
        }
    }
}

impl fmt::Debug for MessageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageFormat::Template(template) => f.debug_tuple("Template").field(template).finish(),
            MessageFormat::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl From<&str> for MessageFormat {
    fn from(source: &str) -> Self {
        MessageFormat::Template(Template::compile(source))
    }
}

impl From<String> for MessageFormat {
    fn from(source: String) -> Self {
        MessageFormat::Template(Template::compile(&source))
    }
}

impl From<Template> for MessageFormat {
    fn from(template: Template) -> Self {
        MessageFormat::Template(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context(value: serde_json::Value) -> MessageContext {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_render_fields() {
        let template = Template::compile("Must be between ${min} and ${max}");
        assert_eq!(
            template.render(&context(json!({"min": 1, "max": 5}))),
            "Must be between 1 and 5"
        );
    }

    #[test]
    fn test_strings_render_unquoted_and_missing_render_undefined() {
        let template = Template::compile("${attribute} is ${value}, ${missing}");
        assert_eq!(
            template.render(&context(json!({"attribute": "name", "value": null}))),
            "name is null, undefined"
        );
    }

    #[test]
    fn test_unterminated_placeholder_is_literal() {
        let template = Template::compile("cost: ${amount");
        assert_eq!(template.render(&MessageContext::new()), "cost: ${amount");
    }

    #[test]
    fn test_custom_format() {
        let format = MessageFormat::custom(|ctx| format!("{} keys", ctx.len()));
        assert_eq!(format.render(&context(json!({"a": 1}))), "1 keys");
    }
}
