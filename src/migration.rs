//! Apply the resolved model to the database: schema, tables, foreign-key indexes.
//! Parents are created before children so `REFERENCES` always resolves.

use crate::config::{ResolvedModel, ResolvedResource, ID_COLUMN};
use crate::sql::{qualified_table, quoted};
use crate::store::StoreError;
use sqlx::PgPool;

/// DDL statements for the whole model, in execution order. Idempotent (IF NOT EXISTS).
pub fn migration_statements(model: &ResolvedModel) -> Vec<String> {
    let mut out = Vec::new();
    let mut schemas: Vec<&str> = model.resources.iter().map(|r| r.schema_name.as_str()).collect();
    schemas.sort_unstable();
    schemas.dedup();
    for s in schemas {
        out.push(format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(s)));
    }

    let ordered = model
        .resources
        .iter()
        .filter(|r| r.parent.is_none())
        .chain(model.resources.iter().filter(|r| r.parent.is_some()));
    for r in ordered {
        out.extend(table_statements(r, model));
    }
    out
}

fn table_statements(resource: &ResolvedResource, model: &ResolvedModel) -> Vec<String> {
    let table = qualified_table(resource);
    let mut col_defs: Vec<String> = resource
        .columns
        .iter()
        .map(|c| {
            let mut def = format!("{} {}", quoted(&c.name), c.pg_type);
            if c.name == ID_COLUMN {
                def.push_str(" PRIMARY KEY");
            } else if !c.nullable {
                def.push_str(" NOT NULL");
            }
            def
        })
        .collect();

    let mut stmts = Vec::new();
    if let Some(link) = &resource.parent {
        if let Some(parent) = model.resource(&link.resource) {
            col_defs.push(format!(
                "FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE CASCADE",
                quoted(&link.foreign_key),
                qualified_table(parent),
                quoted(ID_COLUMN)
            ));
        }
    }
    stmts.push(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        table,
        col_defs.join(",\n  ")
    ));
    if let Some(link) = &resource.parent {
        stmts.push(format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
            quoted(&format!("{}_{}_idx", resource.table_name, link.foreign_key)),
            table,
            quoted(&link.foreign_key)
        ));
    }
    if let Some(desc) = &resource.description {
        stmts.push(format!("COMMENT ON TABLE {} IS '{}'", table, desc.replace('\'', "''")));
    }
    stmts
}

pub async fn apply_migrations(pool: &PgPool, model: &ResolvedModel) -> Result<(), StoreError> {
    for sql in migration_statements(model) {
        tracing::debug!(sql = %sql, "migration");
        sqlx::query(&sql).execute(pool).await?;
    }
    tracing::info!(resources = model.resources.len(), "schema up to date");
    Ok(())
}
