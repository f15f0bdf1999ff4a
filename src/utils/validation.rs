use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Field-level validation failures, accumulated so the caller sees every
/// problem at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.has_errors() { Err(self) } else { Ok(()) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.fields {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{}: {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Parses an integer form field. Missing optional fields fall back to
/// `default`; anything unparsable is recorded against the field.
pub fn parse_int_field(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&str>,
    required: bool,
    default: i64,
) -> i64 {
    let value = value.map(str::trim).unwrap_or("");

    if value.is_empty() {
        if required {
            errors.add(field, "field is required");
        }
        return default;
    }

    match value.parse::<i64>() {
        Ok(parsed) => parsed,
        Err(_) => {
            errors.add(field, "must be a number");
            default
        }
    }
}

/// Lenient integer parse for query parameters: anything missing or
/// malformed becomes `default`.
pub fn parse_int_or(value: Option<&str>, default: i64) -> i64 {
    value
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(default)
}
