//! Default `en-us` messages for the built-in rules.

use super::Bundle;

const MESSAGES: &[(&str, &str)] = &[
    ("alpha", "Can only use letters"),
    ("alphanumeric", "Can only use letters and numbers"),
    ("array", "Must be an array"),
    ("ascii", "Must only use ASCII characters"),
    ("between", "Must be between ${min} and ${max}"),
    ("boolean", "Must be true or false"),
    ("email", "Must be a valid email address"),
    ("empty", "Must be empty"),
    ("equals", "Must be equal to ${a}"),
    ("gt", "Must be greater than ${min}"),
    ("gte", "Must be greater than or equal to ${min}"),
    ("integer", "Must be an integer"),
    ("isblank", "Must be blank"),
    ("isnull", "Must be null"),
    ("json", "Must be valid JSON"),
    ("length", "Must have a length of ${length}"),
    ("length_between", "Must have a length between ${min} and ${max}"),
    ("length_max", "Must have a length of no more than ${max}"),
    ("length_min", "Must have a length of at least ${min}"),
    ("lt", "Must be less than ${max}"),
    ("lte", "Must be less than or equal to ${max}"),
    ("match", "Must match \"${pattern}\""),
    ("max", "Must be no more than ${max}"),
    ("min", "Must be at least ${min}"),
    ("negative", "Must be negative"),
    ("not", "Can not be ${a}"),
    ("number", "Must be a number"),
    ("numeric", "Must be numeric"),
    ("object", "Must be an object"),
    ("positive", "Must be positive"),
    ("required", "Required"),
    ("same", "Must have the same value as \"${other}\""),
    ("string", "Must be a string"),
    ("url", "Must be a valid URL"),
    ("uuid", "Must be a valid UUID"),
];

pub fn bundle() -> Bundle {
    Bundle {
        locale: "en-us".to_string(),
        messages: MESSAGES
            .iter()
            .map(|(name, text)| (name.to_string(), text.to_string()))
            .collect(),
    }
}
