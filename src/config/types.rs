//! Raw resource definitions as they appear in the resources JSON file.

use serde::{Deserialize, Serialize};

/// Semantic type of a field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldTypeConfig {
    String,
    Number,
    Integer,
    Boolean,
    Uuid,
    Timestamp,
    Enum,
    /// Array of child records owned by this resource.
    Collection,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub non_empty: Option<bool>,
    #[serde(default)]
    pub positive: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Storage name (snake_case). The wire name is its camelCase form.
    pub name: String,
    #[serde(rename = "type")]
    pub type_: FieldTypeConfig,
    /// Value set for `enum` fields.
    #[serde(default)]
    pub values: Vec<String>,
    /// Child resource name for `collection` fields.
    #[serde(default)]
    pub resource: Option<String>,
    /// Column on the child resource pointing back at this resource (`collection` fields).
    #[serde(default)]
    pub foreign_key: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(flatten)]
    pub rules: ValidationRule,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SumConfig {
    pub collection: String,
    /// Child fields multiplied together per item before summing.
    pub factors: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DerivedConfig {
    pub name: String,
    pub sum: SumConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtifactConfig {
    pub name: String,
    pub content_type: String,
    pub extension: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: u32,
    pub path_segment: String,
    /// Defaults to `name`.
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Subset of create, read, update, delete, list.
    #[serde(default)]
    pub operations: Vec<String>,
    pub fields: Vec<FieldConfig>,
    #[serde(default)]
    pub derived: Vec<DerivedConfig>,
    #[serde(default)]
    pub artifacts: Vec<ArtifactConfig>,
}

fn default_version() -> u32 {
    1
}

fn default_schema() -> String {
    "public".into()
}

/// Every resource definition in one struct.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FullConfig {
    /// PostgreSQL schema holding the resource tables.
    #[serde(default = "default_schema")]
    pub schema: String,
    pub resources: Vec<ResourceConfig>,
}

impl Default for FullConfig {
    fn default() -> Self {
        FullConfig {
            schema: default_schema(),
            resources: Vec::new(),
        }
    }
}
