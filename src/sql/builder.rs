//! Builds parameterized INSERT, SELECT, UPDATE, DELETE from a resolved resource.

use crate::config::{ResolvedResource, CREATED_AT_COLUMN, ID_COLUMN};
use crate::store::{Page, Row};
use serde_json::Value;

/// Quote identifier for PostgreSQL (safe: only from config).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(resource: &ResolvedResource) -> String {
    format!("{}.{}", quoted(&resource.schema_name), quoted(&resource.table_name))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }

    /// Push a value and return its placeholder cast to the column type, e.g. `$2::uuid`.
    fn placeholder(&mut self, resource: &ResolvedResource, column: &str, v: Value) -> String {
        let n = self.push_param(v);
        match resource.column(column) {
            Some(c) => format!("${}::{}", n, c.pg_type),
            None => format!("${}", n),
        }
    }
}

fn select_column_list(resource: &ResolvedResource) -> String {
    resource
        .columns
        .iter()
        .map(|c| quoted(&c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn where_equals(q: &mut QueryBuf, resource: &ResolvedResource, filters: &[(String, Value)]) -> String {
    let mut parts = Vec::new();
    for (col, val) in filters {
        if resource.column(col).is_none() {
            continue;
        }
        let ph = q.placeholder(resource, col, val.clone());
        parts.push(format!("{} = {}", quoted(col), ph));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

fn order_clause() -> String {
    format!(" ORDER BY {}, {}", quoted(CREATED_AT_COLUMN), quoted(ID_COLUMN))
}

/// SELECT by id. Caller binds the id as the sole param.
pub fn select_by_id(resource: &ResolvedResource) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = $1::uuid",
        select_column_list(resource),
        qualified_table(resource),
        quoted(ID_COLUMN)
    );
    q
}

/// SELECT with equality filters on known columns, ordered by creation time, optionally paged.
pub fn select_list(resource: &ResolvedResource, filters: &[(String, Value)], page: Option<Page>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_clause = where_equals(&mut q, resource, filters);
    let page_clause = page
        .map(|p| format!(" LIMIT {} OFFSET {}", p.limit, p.offset))
        .unwrap_or_default();
    q.sql = format!(
        "SELECT {} FROM {}{}{}{}",
        select_column_list(resource),
        qualified_table(resource),
        where_clause,
        order_clause(),
        page_clause
    );
    q
}

/// SELECT rows WHERE column IN (...). Used for batch-loading child rows.
pub fn select_by_column_in(resource: &ResolvedResource, column: &str, values: &[Value]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let cols = select_column_list(resource);
    let table = qualified_table(resource);
    if values.is_empty() {
        q.sql = format!("SELECT {} FROM {} WHERE 1 = 0", cols, table);
        return q;
    }
    let placeholders: Vec<String> = values
        .iter()
        .map(|v| q.placeholder(resource, column, v.clone()))
        .collect();
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} IN ({}){}",
        cols,
        table,
        quoted(column),
        placeholders.join(", "),
        order_clause()
    );
    q
}

/// INSERT every column of the resource; columns absent from the row are bound as NULL.
pub fn insert(resource: &ResolvedResource, row: &Row) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::with_capacity(resource.columns.len());
    let mut placeholders = Vec::with_capacity(resource.columns.len());
    for c in &resource.columns {
        let val = row.get(&c.name).cloned().unwrap_or(Value::Null);
        placeholders.push(q.placeholder(resource, &c.name, val));
        cols.push(quoted(&c.name));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        qualified_table(resource),
        cols.join(", "),
        placeholders.join(", "),
        select_column_list(resource)
    );
    q
}

/// UPDATE by id: SET only the known, non-id columns present in `changes`.
/// Falls back to a plain SELECT when nothing is settable.
pub fn update(resource: &ResolvedResource, id: &str, changes: &Row) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for (k, v) in changes {
        if k == ID_COLUMN || resource.column(k).is_none() {
            continue;
        }
        let ph = q.placeholder(resource, k, v.clone());
        sets.push(format!("{} = {}", quoted(k), ph));
    }
    if sets.is_empty() {
        q = select_by_id(resource);
        q.params.push(Value::String(id.to_string()));
        return q;
    }
    let id_param = q.push_param(Value::String(id.to_string()));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = ${}::uuid RETURNING {}",
        qualified_table(resource),
        sets.join(", "),
        quoted(ID_COLUMN),
        id_param,
        select_column_list(resource)
    );
    q
}

/// DELETE by id. Caller binds the id as the sole param.
pub fn delete(resource: &ResolvedResource) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "DELETE FROM {} WHERE {} = $1::uuid RETURNING {}",
        qualified_table(resource),
        quoted(ID_COLUMN),
        quoted(ID_COLUMN)
    );
    q
}

/// DELETE every row whose `column` equals the bound param, e.g. all items of one invoice.
pub fn delete_by_column(resource: &ResolvedResource, column: &str, value: Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.placeholder(resource, column, value);
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        qualified_table(resource),
        quoted(column),
        ph
    );
    q
}
