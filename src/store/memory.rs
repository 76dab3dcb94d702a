//! In-process store. Used by tests and `STORE=memory`.

use super::{ChildRows, Page, Row, Store, StoreError};
use crate::config::{ResolvedResource, CREATED_AT_COLUMN, ID_COLUMN};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Tables keyed by resource name. A single write lock per call makes every graph write atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Row>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn same(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn matches(row: &Row, filters: &[(String, Value)]) -> bool {
    filters
        .iter()
        .all(|(col, want)| row.get(col).map(|v| same(v, want)).unwrap_or(false))
}

fn sort_key(row: &Row) -> (String, String) {
    let text = |col: &str| row.get(col).and_then(Value::as_str).unwrap_or_default().to_string();
    (text(CREATED_AT_COLUMN), text(ID_COLUMN))
}

fn row_id(row: &Row) -> Option<&str> {
    row.get(ID_COLUMN).and_then(Value::as_str)
}

/// Keep only known columns, fill the rest with null, and enforce NOT NULL like the database would.
fn conform(resource: &ResolvedResource, row: &Row) -> Result<Row, StoreError> {
    let mut out = Row::new();
    for c in &resource.columns {
        let v = row.get(&c.name).cloned().unwrap_or(Value::Null);
        if v.is_null() && !c.nullable {
            return Err(StoreError::Conflict(format!(
                "null value in column \"{}\" of relation \"{}\"",
                c.name, resource.table_name
            )));
        }
        out.insert(c.name.clone(), v);
    }
    Ok(out)
}

fn check_unique_id(tables: &HashMap<String, Vec<Row>>, resource: &ResolvedResource, row: &Row) -> Result<(), StoreError> {
    let id = row_id(row);
    let taken = tables
        .get(&resource.name)
        .map(|rows| rows.iter().any(|r| row_id(r) == id))
        .unwrap_or(false);
    if taken {
        return Err(StoreError::Conflict(format!(
            "duplicate key value violates unique constraint \"{}_pkey\"",
            resource.table_name
        )));
    }
    Ok(())
}

/// Conform parent and children up front so a failure leaves the tables untouched.
fn prepare_children(children: &[ChildRows<'_>], parent_id: &str) -> Result<Vec<(String, Vec<Row>)>, StoreError> {
    children
        .iter()
        .map(|c| {
            let rows = c
                .rows
                .iter()
                .map(|r| {
                    let row = conform(c.resource, r)?;
                    match row.get(c.foreign_key).and_then(Value::as_str) {
                        Some(fk) if fk == parent_id => Ok(row),
                        _ => Err(StoreError::Conflict(format!(
                            "foreign key \"{}\" does not reference the parent row",
                            c.foreign_key
                        ))),
                    }
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok((c.resource.name.clone(), rows))
        })
        .collect()
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert(&self, resource: &ResolvedResource, row: Row) -> Result<Row, StoreError> {
        let row = conform(resource, &row)?;
        let mut tables = self.tables.write().await;
        check_unique_id(&tables, resource, &row)?;
        tables.entry(resource.name.clone()).or_default().push(row.clone());
        Ok(row)
    }

    async fn fetch(&self, resource: &ResolvedResource, id: &str) -> Result<Option<Row>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&resource.name)
            .and_then(|rows| rows.iter().find(|r| row_id(r) == Some(id)))
            .cloned())
    }

    async fn fetch_where(
        &self,
        resource: &ResolvedResource,
        filters: &[(String, Value)],
        page: Option<Page>,
    ) -> Result<Vec<Row>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Row> = tables
            .get(&resource.name)
            .map(|rows| rows.iter().filter(|r| matches(r, filters)).cloned().collect())
            .unwrap_or_default();
        rows.sort_by_key(sort_key);
        Ok(match page {
            Some(p) => rows
                .into_iter()
                .skip(p.offset as usize)
                .take(p.limit as usize)
                .collect(),
            None => rows,
        })
    }

    async fn fetch_where_in(
        &self,
        resource: &ResolvedResource,
        column: &str,
        values: &[Value],
    ) -> Result<Vec<Row>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Row> = tables
            .get(&resource.name)
            .map(|rows| {
                rows.iter()
                    .filter(|r| r.get(column).map(|v| values.iter().any(|w| same(v, w))).unwrap_or(false))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by_key(sort_key);
        Ok(rows)
    }

    async fn update(&self, resource: &ResolvedResource, id: &str, changes: Row) -> Result<Option<Row>, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(row) = tables
            .get_mut(&resource.name)
            .and_then(|rows| rows.iter_mut().find(|r| row_id(r) == Some(id)))
        else {
            return Ok(None);
        };
        let mut next = row.clone();
        for (k, v) in changes {
            if k != ID_COLUMN && resource.column(&k).is_some() {
                next.insert(k, v);
            }
        }
        *row = conform(resource, &next)?;
        Ok(Some(row.clone()))
    }

    async fn delete(&self, resource: &ResolvedResource, id: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(&resource.name) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|r| row_id(r) != Some(id));
        if rows.len() == before {
            return Ok(false);
        }
        for (_, collection) in resource.collections() {
            if let Some(children) = tables.get_mut(&collection.resource) {
                children.retain(|r| r.get(&collection.foreign_key).and_then(Value::as_str) != Some(id));
            }
        }
        Ok(true)
    }

    async fn insert_graph(
        &self,
        resource: &ResolvedResource,
        row: Row,
        children: Vec<ChildRows<'_>>,
    ) -> Result<Row, StoreError> {
        let row = conform(resource, &row)?;
        let parent_id = row_id(&row).unwrap_or_default().to_string();
        let prepared = prepare_children(&children, &parent_id)?;

        let mut tables = self.tables.write().await;
        check_unique_id(&tables, resource, &row)?;
        tables.entry(resource.name.clone()).or_default().push(row.clone());
        for (name, rows) in prepared {
            tables.entry(name).or_default().extend(rows);
        }
        Ok(row)
    }

    async fn replace_graph(
        &self,
        resource: &ResolvedResource,
        id: &str,
        changes: Row,
        children: Vec<ChildRows<'_>>,
    ) -> Result<Option<Row>, StoreError> {
        let prepared = prepare_children(&children, id)?;

        let mut tables = self.tables.write().await;
        let Some(current) = tables
            .get(&resource.name)
            .and_then(|rows| rows.iter().find(|r| row_id(r) == Some(id)))
            .cloned()
        else {
            return Ok(None);
        };
        let mut next = current;
        for (k, v) in changes {
            if k != ID_COLUMN && resource.column(&k).is_some() {
                next.insert(k, v);
            }
        }
        let next = conform(resource, &next)?;

        if let Some(rows) = tables.get_mut(&resource.name) {
            if let Some(slot) = rows.iter_mut().find(|r| row_id(r) == Some(id)) {
                *slot = next.clone();
            }
        }
        for (c, (name, rows)) in children.iter().zip(prepared) {
            let table = tables.entry(name).or_default();
            table.retain(|r| r.get(c.foreign_key).and_then(Value::as_str) != Some(id));
            table.extend(rows);
        }
        Ok(Some(next))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
