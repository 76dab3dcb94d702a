//! Config validation: referential integrity and API consistency.

use crate::config::resolved::{Operation, SERVER_COLUMNS};
use crate::config::{FieldTypeConfig, FullConfig, ResourceConfig};
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};

const KNOWN_FORMATS: &[&str] = &["email", "uuid"];

pub fn validate(config: &FullConfig) -> Result<(), ConfigError> {
    if config.schema.trim().is_empty() {
        return Err(ConfigError::Validation("schema must not be empty".into()));
    }

    let mut names = HashSet::new();
    let mut paths = HashSet::new();
    for r in &config.resources {
        if !names.insert(r.name.as_str()) {
            return Err(ConfigError::Duplicate {
                kind: "resource",
                name: r.name.clone(),
            });
        }
        if r.path_segment.is_empty() || r.path_segment.contains('/') || r.path_segment.starts_with('{') {
            return Err(ConfigError::Validation(format!(
                "resource '{}': path_segment must be a single literal segment",
                r.name
            )));
        }
        if !paths.insert(r.path_segment.as_str()) {
            return Err(ConfigError::Duplicate {
                kind: "path segment",
                name: r.path_segment.clone(),
            });
        }
    }

    let by_name: HashMap<&str, &ResourceConfig> = config.resources.iter().map(|r| (r.name.as_str(), r)).collect();
    // child resource -> (parent, foreign key)
    let mut owners: HashMap<&str, (&str, &str)> = HashMap::new();

    for r in &config.resources {
        for op in &r.operations {
            op.parse::<Operation>()
                .map_err(|e| ConfigError::Validation(format!("resource '{}': {}", r.name, e)))?;
        }

        let mut field_names = HashSet::new();
        for f in &r.fields {
            if SERVER_COLUMNS.contains(&f.name.as_str()) {
                return Err(ConfigError::ReservedField {
                    resource: r.name.clone(),
                    field: f.name.clone(),
                });
            }
            if !field_names.insert(f.name.as_str()) {
                return Err(ConfigError::Duplicate {
                    kind: "field",
                    name: format!("{}.{}", r.name, f.name),
                });
            }
            if let Some(format) = &f.rules.format {
                if !KNOWN_FORMATS.contains(&format.to_lowercase().as_str()) {
                    return Err(ConfigError::Validation(format!(
                        "field '{}.{}': unknown format '{}'",
                        r.name, f.name, format
                    )));
                }
            }
            if let Some(pattern) = &f.rules.pattern {
                regex::Regex::new(pattern).map_err(|e| {
                    ConfigError::Validation(format!("field '{}.{}': invalid pattern: {}", r.name, f.name, e))
                })?;
            }
            match f.type_ {
                FieldTypeConfig::Enum if f.values.is_empty() => {
                    return Err(ConfigError::Validation(format!(
                        "enum field '{}.{}' must list its values",
                        r.name, f.name
                    )));
                }
                FieldTypeConfig::Collection => {
                    let child_name = f.resource.as_deref().ok_or_else(|| {
                        ConfigError::Validation(format!("collection field '{}.{}' needs a resource", r.name, f.name))
                    })?;
                    let fk = f.foreign_key.as_deref().ok_or_else(|| {
                        ConfigError::Validation(format!("collection field '{}.{}' needs a foreign_key", r.name, f.name))
                    })?;
                    let child = by_name.get(child_name).ok_or_else(|| ConfigError::MissingReference {
                        kind: "resource",
                        id: child_name.to_string(),
                    })?;
                    if child.name == r.name {
                        return Err(ConfigError::Validation(format!(
                            "resource '{}' cannot own itself",
                            r.name
                        )));
                    }
                    if owners.insert(child_name, (r.name.as_str(), fk)).is_some() {
                        return Err(ConfigError::Validation(format!(
                            "resource '{}' is owned by more than one collection",
                            child_name
                        )));
                    }
                    if child.fields.iter().any(|cf| cf.name == fk) || SERVER_COLUMNS.contains(&fk) {
                        return Err(ConfigError::ReservedField {
                            resource: child_name.to_string(),
                            field: fk.to_string(),
                        });
                    }
                }
                _ => {}
            }
        }

        for d in &r.derived {
            if SERVER_COLUMNS.contains(&d.name.as_str()) || !field_names.insert(d.name.as_str()) {
                return Err(ConfigError::ReservedField {
                    resource: r.name.clone(),
                    field: d.name.clone(),
                });
            }
            let collection = r
                .fields
                .iter()
                .find(|f| f.name == d.sum.collection && f.type_ == FieldTypeConfig::Collection)
                .ok_or_else(|| ConfigError::MissingReference {
                    kind: "collection field",
                    id: format!("{}.{}", r.name, d.sum.collection),
                })?;
            let child = collection
                .resource
                .as_deref()
                .and_then(|c| by_name.get(c))
                .ok_or_else(|| ConfigError::MissingReference {
                    kind: "resource",
                    id: collection.resource.clone().unwrap_or_default(),
                })?;
            if d.sum.factors.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "derived field '{}.{}' needs at least one factor",
                    r.name, d.name
                )));
            }
            for factor in &d.sum.factors {
                let numeric = child.fields.iter().any(|cf| {
                    cf.name == *factor && matches!(cf.type_, FieldTypeConfig::Number | FieldTypeConfig::Integer)
                });
                if !numeric {
                    return Err(ConfigError::MissingReference {
                        kind: "numeric field",
                        id: format!("{}.{}", child.name, factor),
                    });
                }
            }
        }

        let mut artifact_names = HashSet::new();
        for a in &r.artifacts {
            if a.name.is_empty() || a.name.contains('/') || a.extension.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "resource '{}': artifact needs a name and an extension",
                    r.name
                )));
            }
            if !artifact_names.insert(a.name.as_str()) {
                return Err(ConfigError::Duplicate {
                    kind: "artifact",
                    name: format!("{}.{}", r.name, a.name),
                });
            }
        }
    }

    for (child, (parent, _)) in &owners {
        let Some(child_cfg) = by_name.get(child) else { continue };
        if child_cfg.fields.iter().any(|f| f.type_ == FieldTypeConfig::Collection) {
            return Err(ConfigError::Validation(format!(
                "resource '{}' is owned by '{}' and cannot own collections itself",
                child, parent
            )));
        }
        let writes = child_cfg
            .operations
            .iter()
            .any(|op| op == "create" || op == "update");
        if writes || !child_cfg.artifacts.is_empty() {
            return Err(ConfigError::Validation(format!(
                "resource '{}' is written through '{}'; only read, list and delete are allowed on it",
                child, parent
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FullConfig;

    fn parse(json: serde_json::Value) -> FullConfig {
        serde_json::from_value(json).expect("config")
    }

    #[test]
    fn rejects_duplicate_path_segments() {
        let config = parse(serde_json::json!({
            "resources": [
                { "name": "a", "path_segment": "things", "fields": [] },
                { "name": "b", "path_segment": "things", "fields": [] }
            ]
        }));
        assert!(matches!(validate(&config), Err(ConfigError::Duplicate { kind: "path segment", .. })));
    }

    #[test]
    fn rejects_reserved_field_names() {
        let config = parse(serde_json::json!({
            "resources": [
                { "name": "a", "path_segment": "a", "fields": [ { "name": "created_at", "type": "timestamp" } ] }
            ]
        }));
        assert!(matches!(validate(&config), Err(ConfigError::ReservedField { .. })));
    }

    #[test]
    fn rejects_collection_to_unknown_resource() {
        let config = parse(serde_json::json!({
            "resources": [
                { "name": "orders", "path_segment": "orders", "fields": [
                    { "name": "lines", "type": "collection", "resource": "order_lines", "foreign_key": "order_id" }
                ] }
            ]
        }));
        assert!(matches!(validate(&config), Err(ConfigError::MissingReference { kind: "resource", .. })));
    }

    #[test]
    fn rejects_writable_child_resource() {
        let config = parse(serde_json::json!({
            "resources": [
                { "name": "orders", "path_segment": "orders", "fields": [
                    { "name": "lines", "type": "collection", "resource": "order_lines", "foreign_key": "order_id" }
                ] },
                { "name": "order_lines", "path_segment": "order-lines", "operations": ["create"], "fields": [] }
            ]
        }));
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_unknown_operation_and_bad_pattern() {
        let config = parse(serde_json::json!({
            "resources": [ { "name": "a", "path_segment": "a", "operations": ["upsert"], "fields": [] } ]
        }));
        assert!(validate(&config).is_err());
        let config = parse(serde_json::json!({
            "resources": [ { "name": "a", "path_segment": "a", "fields": [
                { "name": "code", "type": "string", "pattern": "([a-z" }
            ] } ]
        }));
        assert!(validate(&config).is_err());
    }
}
