//! Schema layer: validates raw payloads against a resolved resource and reports every failure at once.

mod query;
mod validation;

pub use query::{parse_list_query, ListQuery, DEFAULT_LIMIT, MAX_LIMIT};
pub use validation::{Mode, RequestValidator, Validated};

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    TypeMismatch,
    Missing,
    Empty,
    NotPositive,
    TooSmall,
    TooLarge,
    TooShort,
    TooLong,
    Pattern,
    Format,
    NotAllowed,
    UnknownField,
    ReadOnly,
}

/// One violated field. `field` is the wire path, e.g. `items[1].unitPrice`.
#[derive(Clone, Debug, Serialize)]
pub struct FieldError {
    pub field: String,
    pub reason: Reason,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, reason: Reason, message: impl Into<String>) -> Self {
        FieldError {
            field: field.into(),
            reason,
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn push(&mut self, error: FieldError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[FieldError] {
        &self.0
    }

    /// Field paths in report order.
    pub fn fields(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.field.as_str()).collect()
    }
}

impl From<Vec<FieldError>> for ValidationErrors {
    fn from(errors: Vec<FieldError>) -> Self {
        ValidationErrors(errors)
    }
}
