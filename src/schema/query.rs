//! List query parsing: paging plus equality filters coerced by field type.

use super::{FieldError, Reason, ValidationErrors};
use crate::case::to_camel_case;
use crate::config::{FieldType, ResolvedResource, ID_COLUMN};
use crate::store::Page;
use serde_json::Value;
use std::collections::HashMap;

pub const DEFAULT_LIMIT: u32 = 100;
pub const MAX_LIMIT: u32 = 1000;

#[derive(Clone, Debug)]
pub struct ListQuery {
    /// (storage column, value), sorted by column for stable SQL.
    pub filters: Vec<(String, Value)>,
    pub page: Page,
}

/// Parse `?limit=&offset=&<field>=` for a resource. Unknown keys and bad values are reported together.
pub fn parse_list_query(
    resource: &ResolvedResource,
    params: &HashMap<String, String>,
) -> Result<ListQuery, ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let mut query = ListQuery {
        filters: Vec::new(),
        page: Page {
            limit: DEFAULT_LIMIT,
            offset: 0,
        },
    };

    // errors are reported in key order
    let mut entries: Vec<(&String, &String)> = params.iter().collect();
    entries.sort();
    for (key, raw) in entries {
        match key.as_str() {
            "limit" => match raw.parse::<u32>() {
                Ok(0) => errors.push(FieldError::new(key, Reason::TooSmall, "limit must be at least 1")),
                Ok(n) if n > MAX_LIMIT => errors.push(FieldError::new(
                    key,
                    Reason::TooLarge,
                    format!("limit must be at most {}", MAX_LIMIT),
                )),
                Ok(n) => query.page.limit = n,
                Err(_) => errors.push(FieldError::new(key, Reason::TypeMismatch, "limit must be a non-negative integer")),
            },
            "offset" => match raw.parse::<u32>() {
                Ok(n) => query.page.offset = n,
                Err(_) => errors.push(FieldError::new(key, Reason::TypeMismatch, "offset must be a non-negative integer")),
            },
            _ => match filter_column(resource, key) {
                Some((column, field_type)) => match coerce(&field_type, raw) {
                    Some(value) => query.filters.push((column, value)),
                    None => errors.push(FieldError::new(
                        key,
                        Reason::TypeMismatch,
                        format!("{} filter must be a valid {}", key, field_type.name()),
                    )),
                },
                None => errors.push(FieldError::new(key, Reason::UnknownField, format!("{} is not a filterable field", key))),
            },
        }
    }

    if errors.is_empty() {
        query.filters.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(query)
    } else {
        Err(errors)
    }
}

/// Filterable columns: id, scalar fields, and the parent key of a child resource.
fn filter_column(resource: &ResolvedResource, wire: &str) -> Option<(String, FieldType)> {
    if wire == ID_COLUMN {
        return Some((ID_COLUMN.to_string(), FieldType::Uuid));
    }
    if let Some(parent) = &resource.parent {
        if to_camel_case(&parent.foreign_key) == wire {
            return Some((parent.foreign_key.clone(), FieldType::Uuid));
        }
    }
    resource
        .scalar_fields()
        .find(|f| f.wire_name == wire)
        .map(|f| (f.name.clone(), f.field_type.clone()))
}

fn coerce(field_type: &FieldType, s: &str) -> Option<Value> {
    match field_type {
        FieldType::String => Some(Value::String(s.to_string())),
        FieldType::Enum(values) => values.iter().any(|v| v == s).then(|| Value::String(s.to_string())),
        FieldType::Integer => s.parse::<i64>().ok().map(|n| Value::Number(n.into())),
        FieldType::Number => s
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        FieldType::Boolean => {
            if s.eq_ignore_ascii_case("true") {
                Some(Value::Bool(true))
            } else if s.eq_ignore_ascii_case("false") {
                Some(Value::Bool(false))
            } else {
                None
            }
        }
        FieldType::Uuid => uuid::Uuid::parse_str(s).ok().map(|u| Value::String(u.to_string())),
        FieldType::Timestamp => chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|ts| Value::String(ts.with_timezone(&chrono::Utc).to_rfc3339_opts(chrono::SecondsFormat::Millis, true))),
        FieldType::Collection(_) => None,
    }
}
