//! Built-in rules.
//!
//! Each constructor returns a fresh [`Rule`] whose name matches a message in the
//! default `en-us` bundle. Context data such as `min` and `max` is attached so
//! templates can interpolate it.

use super::rule::Rule;
use crate::error::ModelError;
use crate::model::Model;
use regex_lite::Regex;
use serde_json::Value as Json;
use std::sync::{Arc, OnceLock};

fn as_number(value: &Json) -> Option<f64> {
    match value {
        Json::Number(n) => n.as_f64(),
        Json::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn measure(value: &Json) -> Option<usize> {
    match value {
        Json::String(s) => Some(s.chars().count()),
        Json::Array(items) => Some(items.len()),
        Json::Object(map) => Some(map.len()),
        _ => None,
    }
}

fn text_matches(value: &Json, test: impl Fn(&str) -> bool) -> bool {
    value.as_str().is_some_and(test)
}

/// Whole numbers render without a fractional part in messages.
fn bound(n: f64) -> Json {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        Json::from(n as i64)
    } else {
        Json::from(n)
    }
}

fn pattern(cell: &'static OnceLock<Option<Regex>>, source: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(source).ok()).as_ref()
}

/// Fails for null, blank strings and empty collections.
pub fn required() -> Rule {
    Rule::test("required", |value| match value {
        Json::Null => false,
        Json::String(s) => !s.trim().is_empty(),
        Json::Array(items) => !items.is_empty(),
        Json::Object(map) => !map.is_empty(),
        _ => true,
    })
}

pub fn string() -> Rule {
    Rule::test("string", Json::is_string)
}

pub fn number() -> Rule {
    Rule::test("number", Json::is_number)
}

/// A number, or a string that parses as one.
pub fn numeric() -> Rule {
    Rule::test("numeric", |value| as_number(value).is_some())
}

pub fn integer() -> Rule {
    Rule::test("integer", |value| value.is_i64() || value.is_u64())
}

pub fn boolean() -> Rule {
    Rule::test("boolean", Json::is_boolean)
}

pub fn array() -> Rule {
    Rule::test("array", Json::is_array)
}

pub fn object() -> Rule {
    Rule::test("object", Json::is_object)
}

pub fn is_null() -> Rule {
    Rule::test("isnull", Json::is_null)
}

pub fn empty() -> Rule {
    Rule::test("empty", |value| value.is_null() || measure(value) == Some(0))
}

/// Null or a whitespace-only string.
pub fn is_blank() -> Rule {
    Rule::test("isblank", |value| {
        value.is_null() || text_matches(value, |s| s.trim().is_empty())
    })
}

pub fn email() -> Rule {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    Rule::test("email", |value| {
        pattern(&EMAIL, r"^[^\s@]+@[^\s@]+\.[^\s@]+$")
            .is_some_and(|re| text_matches(value, |s| re.is_match(s)))
    })
}

pub fn url() -> Rule {
    static URL: OnceLock<Option<Regex>> = OnceLock::new();
    Rule::test("url", |value| {
        pattern(&URL, r"(?i)^https?://[^\s/$.?#][^\s]*$")
            .is_some_and(|re| text_matches(value, |s| re.is_match(s)))
    })
}

pub fn uuid() -> Rule {
    static UUID: OnceLock<Option<Regex>> = OnceLock::new();
    Rule::test("uuid", |value| {
        pattern(
            &UUID,
            r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$",
        )
        .is_some_and(|re| text_matches(value, |s| re.is_match(s)))
    })
}

pub fn alpha() -> Rule {
    Rule::test("alpha", |value| {
        text_matches(value, |s| !s.is_empty() && s.chars().all(char::is_alphabetic))
    })
}

pub fn alphanumeric() -> Rule {
    Rule::test("alphanumeric", |value| {
        text_matches(value, |s| !s.is_empty() && s.chars().all(char::is_alphanumeric))
    })
}

pub fn ascii() -> Rule {
    Rule::test("ascii", |value| text_matches(value, |s| s.is_ascii()))
}

/// A string containing valid JSON.
pub fn json() -> Rule {
    Rule::test("json", |value| {
        text_matches(value, |s| serde_json::from_str::<Json>(s).is_ok())
    })
}

/// At least `min` characters or items.
pub fn length(min: usize) -> Rule {
    Rule::test("length_min", move |value| measure(value).is_some_and(|n| n >= min)).with("min", min)
}

pub fn length_between(min: usize, max: usize) -> Rule {
    Rule::test("length_between", move |value| {
        measure(value).is_some_and(|n| (min..=max).contains(&n))
    })
    .with("min", min)
    .with("max", max)
}

pub fn max_length(max: usize) -> Rule {
    Rule::test("length_max", move |value| measure(value).is_some_and(|n| n <= max)).with("max", max)
}

pub fn exact_length(expected: usize) -> Rule {
    Rule::test("length", move |value| measure(value) == Some(expected)).with("length", expected)
}

pub fn min(min: f64) -> Rule {
    Rule::test("min", move |value| as_number(value).is_some_and(|n| n >= min)).with("min", bound(min))
}

pub fn max(max: f64) -> Rule {
    Rule::test("max", move |value| as_number(value).is_some_and(|n| n <= max)).with("max", bound(max))
}

/// Inclusive range.
pub fn between(min: f64, max: f64) -> Rule {
    Rule::test("between", move |value| as_number(value).is_some_and(|n| n >= min && n <= max))
        .with("min", bound(min))
        .with("max", bound(max))
}

pub fn gt(min: f64) -> Rule {
    Rule::test("gt", move |value| as_number(value).is_some_and(|n| n > min)).with("min", bound(min))
}

pub fn gte(min: f64) -> Rule {
    Rule::test("gte", move |value| as_number(value).is_some_and(|n| n >= min)).with("min", bound(min))
}

pub fn lt(max: f64) -> Rule {
    Rule::test("lt", move |value| as_number(value).is_some_and(|n| n < max)).with("max", bound(max))
}

pub fn lte(max: f64) -> Rule {
    Rule::test("lte", move |value| as_number(value).is_some_and(|n| n <= max)).with("max", bound(max))
}

pub fn positive() -> Rule {
    Rule::test("positive", |value| as_number(value).is_some_and(|n| n > 0.0))
}

pub fn negative() -> Rule {
    Rule::test("negative", |value| as_number(value).is_some_and(|n| n < 0.0))
}

pub fn equals(expected: impl Into<Json>) -> Rule {
    let expected = expected.into();
    let compare = expected.clone();
    Rule::test("equals", move |value| *value == compare).with("a", expected)
}

pub fn not(rejected: impl Into<Json>) -> Rule {
    let rejected = rejected.into();
    let compare = rejected.clone();
    Rule::test("not", move |value| *value != compare).with("a", rejected)
}

/// Must equal the owner's `other` attribute.
pub fn same(other: &str) -> Rule {
    let attribute: Arc<str> = Arc::from(other);
    Rule::new("same", move |value: &Json, _: &str, owner: &Model| {
        owner.get(&attribute).map_or(Json::Null, |v| v.to_json()) == *value
    })
    .with("other", other)
}

/// A string matching the regular expression `source`.
pub fn matches(source: &str) -> Result<Rule, ModelError> {
    let re = Regex::new(source)
        .map_err(|e| ModelError::InvalidArgument(format!("invalid pattern '{source}': {e}")))?;
    Ok(Rule::test("match", move |value| text_matches(value, |s| re.is_match(s))).with("pattern", source))
}
