//! Request validation against a resolved resource schema.

use super::{FieldError, Reason, ValidationErrors};
use crate::config::{FieldType, ResolvedField, ResolvedModel, ResolvedResource};
use crate::store::Row;
use chrono::SecondsFormat;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Input schema: required fields must be present.
    Create,
    /// Partial schema: every field optional.
    Patch,
}

/// Typed result of validation, keyed by storage names.
#[derive(Clone, Debug, Default)]
pub struct Validated {
    /// Scalar columns of the validated resource.
    pub values: Row,
    /// Collection field name -> validated child rows.
    pub collections: BTreeMap<String, Vec<Row>>,
}

pub struct RequestValidator;

impl RequestValidator {
    /// Validate a payload in one pass. On failure every violated field is reported.
    pub fn validate(
        payload: &Value,
        resource: &ResolvedResource,
        model: &ResolvedModel,
        mode: Mode,
    ) -> Result<Validated, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let validated = validate_object(payload, resource, model, mode, "", &mut errors);
        if errors.is_empty() {
            Ok(validated)
        } else {
            Err(errors)
        }
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn validate_object(
    payload: &Value,
    resource: &ResolvedResource,
    model: &ResolvedModel,
    mode: Mode,
    prefix: &str,
    errors: &mut ValidationErrors,
) -> Validated {
    let mut out = Validated::default();
    let Some(obj) = payload.as_object() else {
        let field = if prefix.is_empty() { "body" } else { prefix };
        errors.push(FieldError::new(field, Reason::TypeMismatch, "expected a JSON object"));
        return out;
    };

    let read_only = resource.read_only_wire_names();
    for key in obj.keys() {
        if resource.field_by_wire(key).is_some() {
            continue;
        }
        let path = join(prefix, key);
        if read_only.contains(key) {
            errors.push(FieldError::new(path, Reason::ReadOnly, format!("{} is assigned by the server", key)));
        } else {
            errors.push(FieldError::new(path, Reason::UnknownField, format!("{} is not a field of {}", key, resource.name)));
        }
    }

    for field in &resource.fields {
        let path = join(prefix, &field.wire_name);
        match (obj.get(&field.wire_name), mode) {
            (None, Mode::Patch) => {}
            (None | Some(Value::Null), Mode::Create) => {
                if field.required {
                    errors.push(FieldError::new(path, Reason::Missing, format!("{} is required", field.wire_name)));
                }
            }
            (Some(Value::Null), Mode::Patch) => {
                if field.required || matches!(field.field_type, FieldType::Collection(_)) {
                    errors.push(FieldError::new(path, Reason::Missing, format!("{} cannot be cleared", field.wire_name)));
                } else {
                    out.values.insert(field.name.clone(), Value::Null);
                }
            }
            (Some(v), _) => match &field.field_type {
                FieldType::Collection(c) => {
                    let Some(child) = model.child(c) else {
                        errors.push(FieldError::new(path, Reason::UnknownField, "collection has no schema"));
                        continue;
                    };
                    if let Some(rows) = validate_collection(&path, v, field, child, model, errors) {
                        out.collections.insert(field.name.clone(), rows);
                    }
                }
                _ => {
                    if let Some(value) = check_scalar(&path, v, field, errors) {
                        out.values.insert(field.name.clone(), value);
                    }
                }
            },
        }
    }
    out
}

fn validate_collection(
    path: &str,
    v: &Value,
    field: &ResolvedField,
    child: &ResolvedResource,
    model: &ResolvedModel,
    errors: &mut ValidationErrors,
) -> Option<Vec<Row>> {
    let Some(items) = v.as_array() else {
        errors.push(FieldError::new(path, Reason::TypeMismatch, format!("{} must be an array", field.wire_name)));
        return None;
    };
    let before = errors.len();
    if field.rules.non_empty == Some(true) && items.is_empty() {
        errors.push(FieldError::new(path, Reason::Empty, format!("{} must contain at least one item", field.wire_name)));
    }
    if let Some(min) = field.rules.min_length {
        if items.len() < min as usize {
            errors.push(FieldError::new(path, Reason::TooShort, format!("{} needs at least {} items", field.wire_name, min)));
        }
    }
    if let Some(max) = field.rules.max_length {
        if items.len() > max as usize {
            errors.push(FieldError::new(path, Reason::TooLong, format!("{} allows at most {} items", field.wire_name, max)));
        }
    }
    let mut rows = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let item_path = format!("{}[{}]", path, i);
        let validated = validate_object(item, child, model, Mode::Create, &item_path, errors);
        rows.push(validated.values);
    }
    (errors.len() == before).then_some(rows)
}

/// Type-check and constrain one scalar value. Returns the normalized value when it passes.
fn check_scalar(path: &str, v: &Value, field: &ResolvedField, errors: &mut ValidationErrors) -> Option<Value> {
    let name = &field.wire_name;
    let mismatch = |errors: &mut ValidationErrors| {
        errors.push(FieldError::new(
            path,
            Reason::TypeMismatch,
            format!("{} must be {}", name, type_phrase(&field.field_type)),
        ));
    };
    let before = errors.len();
    let value = match &field.field_type {
        FieldType::String => {
            let Some(s) = v.as_str() else {
                mismatch(errors);
                return None;
            };
            check_string(path, s, field, errors);
            v.clone()
        }
        FieldType::Number => {
            let Some(n) = v.as_f64() else {
                mismatch(errors);
                return None;
            };
            check_number(path, n, field, errors);
            v.clone()
        }
        FieldType::Integer => {
            let Some(n) = v.as_i64() else {
                mismatch(errors);
                return None;
            };
            check_number(path, n as f64, field, errors);
            v.clone()
        }
        FieldType::Boolean => {
            if !v.is_boolean() {
                mismatch(errors);
                return None;
            }
            v.clone()
        }
        FieldType::Uuid => match v.as_str().map(uuid::Uuid::parse_str) {
            Some(Ok(u)) => Value::String(u.to_string()),
            _ => {
                mismatch(errors);
                return None;
            }
        },
        FieldType::Timestamp => match v.as_str().map(chrono::DateTime::parse_from_rfc3339) {
            Some(Ok(ts)) => Value::String(ts.with_timezone(&chrono::Utc).to_rfc3339_opts(SecondsFormat::Millis, true)),
            _ => {
                mismatch(errors);
                return None;
            }
        },
        FieldType::Enum(values) => {
            let Some(s) = v.as_str() else {
                mismatch(errors);
                return None;
            };
            if !values.iter().any(|allowed| allowed == s) {
                errors.push(FieldError::new(
                    path,
                    Reason::NotAllowed,
                    format!("{} must be one of: {}", name, values.join(", ")),
                ));
            }
            v.clone()
        }
        FieldType::Collection(_) => {
            mismatch(errors);
            return None;
        }
    };
    if let Some(ref allowed) = field.rules.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            errors.push(FieldError::new(
                path,
                Reason::NotAllowed,
                format!("{} must be one of: {:?}", name, allowed.iter().take(5).collect::<Vec<_>>()),
            ));
        }
    }
    (errors.len() == before).then_some(value)
}

fn check_string(path: &str, s: &str, field: &ResolvedField, errors: &mut ValidationErrors) {
    let name = &field.wire_name;
    let rule = &field.rules;
    if rule.non_empty == Some(true) && s.trim().is_empty() {
        errors.push(FieldError::new(path, Reason::Empty, format!("{} must not be empty", name)));
    }
    let len = s.chars().count();
    if let Some(min) = rule.min_length {
        if len < min as usize {
            errors.push(FieldError::new(path, Reason::TooShort, format!("{} must be at least {} characters", name, min)));
        }
    }
    if let Some(max) = rule.max_length {
        if len > max as usize {
            errors.push(FieldError::new(path, Reason::TooLong, format!("{} must be at most {} characters", name, max)));
        }
    }
    if let Some(re) = &field.pattern {
        if !re.is_match(s) {
            errors.push(FieldError::new(path, Reason::Pattern, format!("{} does not match required pattern", name)));
        }
    }
    if let Some(format) = &rule.format {
        let ok = match format.to_lowercase().as_str() {
            "email" => is_email(s),
            "uuid" => uuid::Uuid::parse_str(s).is_ok(),
            _ => true,
        };
        if !ok {
            errors.push(FieldError::new(path, Reason::Format, format!("{} must be a valid {}", name, format)));
        }
    }
}

fn check_number(path: &str, n: f64, field: &ResolvedField, errors: &mut ValidationErrors) {
    let name = &field.wire_name;
    let rule = &field.rules;
    if rule.positive == Some(true) && n <= 0.0 {
        errors.push(FieldError::new(path, Reason::NotPositive, format!("{} must be greater than 0", name)));
    }
    if let Some(min) = rule.minimum {
        if n < min {
            errors.push(FieldError::new(path, Reason::TooSmall, format!("{} must be at least {}", name, min)));
        }
    }
    if let Some(max) = rule.maximum {
        if n > max {
            errors.push(FieldError::new(path, Reason::TooLarge, format!("{} must be at most {}", name, max)));
        }
    }
}

fn is_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.'),
        None => false,
    }
}

fn type_phrase(t: &FieldType) -> &'static str {
    match t {
        FieldType::String | FieldType::Enum(_) => "a string",
        FieldType::Number => "a number",
        FieldType::Integer => "an integer",
        FieldType::Boolean => "a boolean",
        FieldType::Uuid => "a UUID string",
        FieldType::Timestamp => "an RFC 3339 timestamp",
        FieldType::Collection(_) => "an array",
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}
