//! Resolved resource model: config validated and flattened for runtime use.

use crate::config::ValidationRule;
use regex::Regex;
use std::collections::HashMap;

/// Server-assigned columns present on every stored record.
pub const ID_COLUMN: &str = "id";
pub const CREATED_AT_COLUMN: &str = "created_at";
pub const UPDATED_AT_COLUMN: &str = "updated_at";
pub const SERVER_COLUMNS: [&str; 3] = [ID_COLUMN, CREATED_AT_COLUMN, UPDATED_AT_COLUMN];

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    List,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::List => "list",
        }
    }
}

impl std::str::FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Operation::Create),
            "read" => Ok(Operation::Read),
            "update" => Ok(Operation::Update),
            "delete" => Ok(Operation::Delete),
            "list" => Ok(Operation::List),
            other => Err(format!("unknown operation '{}'", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CollectionRef {
    pub resource: String,
    pub foreign_key: String,
}

#[derive(Clone, Debug)]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Uuid,
    Timestamp,
    Enum(Vec<String>),
    Collection(CollectionRef),
}

impl FieldType {
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Uuid => "uuid",
            FieldType::Timestamp => "timestamp",
            FieldType::Enum(_) => "enum",
            FieldType::Collection(_) => "array",
        }
    }

    /// PostgreSQL column type; None for collections (stored in the child table).
    pub fn pg_type(&self) -> Option<&'static str> {
        match self {
            FieldType::String | FieldType::Enum(_) => Some("text"),
            FieldType::Number => Some("double precision"),
            FieldType::Integer => Some("bigint"),
            FieldType::Boolean => Some("boolean"),
            FieldType::Uuid => Some("uuid"),
            FieldType::Timestamp => Some("timestamptz"),
            FieldType::Collection(_) => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedField {
    /// Storage name (snake_case).
    pub name: String,
    /// Wire name (camelCase).
    pub wire_name: String,
    pub field_type: FieldType,
    pub required: bool,
    pub rules: ValidationRule,
    /// Compiled `rules.pattern`.
    pub pattern: Option<Regex>,
    pub description: Option<String>,
}

#[derive(Clone, Debug)]
pub struct DerivedSum {
    pub collection: String,
    pub factors: Vec<String>,
}

/// Server-computed field; never accepted from clients.
#[derive(Clone, Debug)]
pub struct DerivedField {
    pub name: String,
    pub wire_name: String,
    pub sum: DerivedSum,
}

#[derive(Clone, Debug)]
pub struct ArtifactSpec {
    pub name: String,
    pub content_type: String,
    pub extension: String,
}

/// Link from a child resource to the parent that owns it.
#[derive(Clone, Debug)]
pub struct ParentLink {
    pub resource: String,
    pub foreign_key: String,
}

/// Storage column with its PostgreSQL type.
#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    pub pg_type: &'static str,
    pub nullable: bool,
}

#[derive(Clone, Debug)]
pub struct ResolvedResource {
    pub name: String,
    pub version: u32,
    /// PascalCase name used for schema components.
    pub title: String,
    pub description: Option<String>,
    pub schema_name: String,
    pub table_name: String,
    pub path_segment: String,
    pub operations: Vec<Operation>,
    /// Client-supplied fields (the input schema).
    pub fields: Vec<ResolvedField>,
    pub derived: Vec<DerivedField>,
    pub artifacts: Vec<ArtifactSpec>,
    pub parent: Option<ParentLink>,
    /// Every stored column: id, scalar fields, parent key, derived fields, timestamps.
    pub columns: Vec<ColumnInfo>,
}

impl ResolvedResource {
    pub fn field_by_wire(&self, wire: &str) -> Option<&ResolvedField> {
        self.fields.iter().find(|f| f.wire_name == wire)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Fields stored as columns of this resource's table.
    pub fn scalar_fields(&self) -> impl Iterator<Item = &ResolvedField> {
        self.fields
            .iter()
            .filter(|f| !matches!(f.field_type, FieldType::Collection(_)))
    }

    /// (field, child ref) for each collection field.
    pub fn collections(&self) -> impl Iterator<Item = (&ResolvedField, &CollectionRef)> {
        self.fields.iter().filter_map(|f| match &f.field_type {
            FieldType::Collection(c) => Some((f, c)),
            _ => None,
        })
    }

    pub fn artifact(&self, name: &str) -> Option<&ArtifactSpec> {
        self.artifacts.iter().find(|a| a.name == name)
    }

    /// Wire names of the output schema: id, input fields, parent key, derived fields, timestamps.
    pub fn output_wire_names(&self) -> Vec<String> {
        let mut names = vec![crate::case::to_camel_case(ID_COLUMN)];
        names.extend(self.fields.iter().map(|f| f.wire_name.clone()));
        if let Some(parent) = &self.parent {
            names.push(crate::case::to_camel_case(&parent.foreign_key));
        }
        names.extend(self.derived.iter().map(|d| d.wire_name.clone()));
        names.push(crate::case::to_camel_case(CREATED_AT_COLUMN));
        names.push(crate::case::to_camel_case(UPDATED_AT_COLUMN));
        names
    }

    /// Wire names a client may never supply.
    pub fn read_only_wire_names(&self) -> Vec<String> {
        let inputs: Vec<&str> = self.fields.iter().map(|f| f.wire_name.as_str()).collect();
        self.output_wire_names()
            .into_iter()
            .filter(|n| !inputs.contains(&n.as_str()))
            .collect()
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResolvedModel {
    pub resources: Vec<ResolvedResource>,
    pub by_name: HashMap<String, usize>,
    pub by_path: HashMap<String, usize>,
}

impl ResolvedModel {
    pub fn resource(&self, name: &str) -> Option<&ResolvedResource> {
        self.by_name.get(name).map(|&i| &self.resources[i])
    }

    pub fn resource_by_path(&self, path: &str) -> Option<&ResolvedResource> {
        self.by_path.get(path).map(|&i| &self.resources[i])
    }

    /// Child resource behind a collection field.
    pub fn child(&self, collection: &CollectionRef) -> Option<&ResolvedResource> {
        self.resource(&collection.resource)
    }
}
