//! Load resource definitions from a JSON file and resolve them into the runtime model.

use crate::case::{to_camel_case, to_pascal_case};
use crate::config::resolved::*;
use crate::config::types::*;
use crate::config::{validate, FullConfig};
use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::Path;

/// Read and parse the resources file. Does not validate; call [`resolve`].
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<FullConfig, ConfigError> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}

/// Build resolved model from full config. Validates first.
pub fn resolve(config: &FullConfig) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;

    // child resource name -> owning parent
    let parents: HashMap<&str, ParentLink> = config
        .resources
        .iter()
        .flat_map(|r| {
            r.fields.iter().filter_map(move |f| match (&f.type_, &f.resource, &f.foreign_key) {
                (FieldTypeConfig::Collection, Some(child), Some(fk)) => Some((
                    child.as_str(),
                    ParentLink {
                        resource: r.name.clone(),
                        foreign_key: fk.clone(),
                    },
                )),
                _ => None,
            })
        })
        .collect();

    let mut model = ResolvedModel::default();
    for r in &config.resources {
        let fields = r.fields.iter().map(resolve_field).collect::<Result<Vec<_>, _>>()?;
        let operations = r
            .operations
            .iter()
            .map(|op| op.parse::<Operation>().map_err(ConfigError::Validation))
            .collect::<Result<Vec<_>, _>>()?;
        let derived: Vec<DerivedField> = r
            .derived
            .iter()
            .map(|d| DerivedField {
                name: d.name.clone(),
                wire_name: to_camel_case(&d.name),
                sum: DerivedSum {
                    collection: d.sum.collection.clone(),
                    factors: d.sum.factors.clone(),
                },
            })
            .collect();
        let parent = parents.get(r.name.as_str()).cloned();

        let mut columns = vec![ColumnInfo {
            name: ID_COLUMN.into(),
            pg_type: "uuid",
            nullable: false,
        }];
        for f in &fields {
            if let Some(pg_type) = f.field_type.pg_type() {
                columns.push(ColumnInfo {
                    name: f.name.clone(),
                    pg_type,
                    nullable: !f.required,
                });
            }
        }
        if let Some(p) = &parent {
            columns.push(ColumnInfo {
                name: p.foreign_key.clone(),
                pg_type: "uuid",
                nullable: false,
            });
        }
        for d in &derived {
            columns.push(ColumnInfo {
                name: d.name.clone(),
                pg_type: "double precision",
                nullable: false,
            });
        }
        for ts in [CREATED_AT_COLUMN, UPDATED_AT_COLUMN] {
            columns.push(ColumnInfo {
                name: ts.into(),
                pg_type: "timestamptz",
                nullable: false,
            });
        }

        let resource = ResolvedResource {
            name: r.name.clone(),
            version: r.version,
            title: to_pascal_case(&r.name),
            description: r.description.clone(),
            schema_name: config.schema.clone(),
            table_name: r.table.clone().unwrap_or_else(|| r.name.clone()),
            path_segment: r.path_segment.clone(),
            operations,
            fields,
            derived,
            artifacts: r
                .artifacts
                .iter()
                .map(|a| ArtifactSpec {
                    name: a.name.clone(),
                    content_type: a.content_type.clone(),
                    extension: a.extension.clone(),
                })
                .collect(),
            parent,
            columns,
        };
        check_output_superset(&resource)?;

        let idx = model.resources.len();
        model.by_name.insert(resource.name.clone(), idx);
        model.by_path.insert(resource.path_segment.clone(), idx);
        model.resources.push(resource);
    }
    Ok(model)
}

fn resolve_field(f: &FieldConfig) -> Result<ResolvedField, ConfigError> {
    let field_type = match f.type_ {
        FieldTypeConfig::String => FieldType::String,
        FieldTypeConfig::Number => FieldType::Number,
        FieldTypeConfig::Integer => FieldType::Integer,
        FieldTypeConfig::Boolean => FieldType::Boolean,
        FieldTypeConfig::Uuid => FieldType::Uuid,
        FieldTypeConfig::Timestamp => FieldType::Timestamp,
        FieldTypeConfig::Enum => FieldType::Enum(f.values.clone()),
        FieldTypeConfig::Collection => FieldType::Collection(CollectionRef {
            resource: f.resource.clone().unwrap_or_default(),
            foreign_key: f.foreign_key.clone().unwrap_or_default(),
        }),
    };
    let pattern = f
        .rules
        .pattern
        .as_deref()
        .map(regex::Regex::new)
        .transpose()
        .map_err(|e| ConfigError::Validation(format!("field '{}': {}", f.name, e)))?;
    Ok(ResolvedField {
        name: f.name.clone(),
        wire_name: to_camel_case(&f.name),
        field_type,
        required: f.rules.required == Some(true),
        rules: f.rules.clone(),
        pattern,
        description: f.description.clone(),
    })
}

/// Output wire names must cover every input wire name exactly once.
fn check_output_superset(resource: &ResolvedResource) -> Result<(), ConfigError> {
    let output = resource.output_wire_names();
    let mut seen = std::collections::HashSet::new();
    for name in &output {
        if !seen.insert(name.as_str()) {
            return Err(ConfigError::ReservedField {
                resource: resource.name.clone(),
                field: name.clone(),
            });
        }
    }
    for f in &resource.fields {
        if !seen.contains(f.wire_name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "resource '{}': output schema is missing input field '{}'",
                resource.name, f.wire_name
            )));
        }
    }
    Ok(())
}
