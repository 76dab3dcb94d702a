//! PostgreSQL store: parameterized SQL from the resolved model, graph writes in one transaction.

use super::{ChildRows, Page, Row, Store, StoreError};
use crate::config::{ResolvedModel, ResolvedResource};
use crate::migration::apply_migrations;
use crate::sql::{self, PgBindValue, QueryBuf};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::{ConnectOptions, PgConnection, PgPool, Postgres};
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create the database if missing, open a pool, and bring tables in line with the model.
    pub async fn connect(url: &str, max_connections: u32, model: &ResolvedModel) -> Result<Self, StoreError> {
        ensure_database_exists(url).await?;
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await?;
        apply_migrations(&pool, model).await?;
        Ok(PgStore { pool })
    }
}

fn bound(q: &QueryBuf) -> sqlx::query::Query<'_, Postgres, PgArguments> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(PgBindValue::from_json(p));
    }
    query
}

async fn fetch_one_tx(conn: &mut PgConnection, resource: &ResolvedResource, q: &QueryBuf) -> Result<Option<Row>, StoreError> {
    let row = bound(q).fetch_optional(&mut *conn).await?;
    row.map(|r| decode_row(resource, &r)).transpose()
}

async fn insert_children(conn: &mut PgConnection, children: &[ChildRows<'_>]) -> Result<(), StoreError> {
    for c in children {
        for row in &c.rows {
            bound(&sql::insert(c.resource, row)).execute(&mut *conn).await?;
        }
    }
    Ok(())
}

#[async_trait]
impl Store for PgStore {
    async fn insert(&self, resource: &ResolvedResource, row: Row) -> Result<Row, StoreError> {
        let q = sql::insert(resource, &row);
        let r = bound(&q).fetch_one(&self.pool).await?;
        decode_row(resource, &r)
    }

    async fn fetch(&self, resource: &ResolvedResource, id: &str) -> Result<Option<Row>, StoreError> {
        let mut q = sql::select_by_id(resource);
        q.params.push(Value::String(id.to_string()));
        let row = bound(&q).fetch_optional(&self.pool).await?;
        row.map(|r| decode_row(resource, &r)).transpose()
    }

    async fn fetch_where(
        &self,
        resource: &ResolvedResource,
        filters: &[(String, Value)],
        page: Option<Page>,
    ) -> Result<Vec<Row>, StoreError> {
        let q = sql::select_list(resource, filters, page);
        let rows = bound(&q).fetch_all(&self.pool).await?;
        rows.iter().map(|r| decode_row(resource, r)).collect()
    }

    async fn fetch_where_in(
        &self,
        resource: &ResolvedResource,
        column: &str,
        values: &[Value],
    ) -> Result<Vec<Row>, StoreError> {
        let q = sql::select_by_column_in(resource, column, values);
        let rows = bound(&q).fetch_all(&self.pool).await?;
        rows.iter().map(|r| decode_row(resource, r)).collect()
    }

    async fn update(&self, resource: &ResolvedResource, id: &str, changes: Row) -> Result<Option<Row>, StoreError> {
        let q = sql::update(resource, id, &changes);
        let row = bound(&q).fetch_optional(&self.pool).await?;
        row.map(|r| decode_row(resource, &r)).transpose()
    }

    async fn delete(&self, resource: &ResolvedResource, id: &str) -> Result<bool, StoreError> {
        let mut q = sql::delete(resource);
        q.params.push(Value::String(id.to_string()));
        Ok(bound(&q).fetch_optional(&self.pool).await?.is_some())
    }

    async fn insert_graph(
        &self,
        resource: &ResolvedResource,
        row: Row,
        children: Vec<ChildRows<'_>>,
    ) -> Result<Row, StoreError> {
        let mut tx = self.pool.begin().await?;
        let q = sql::insert(resource, &row);
        let parent = bound(&q).fetch_one(&mut *tx).await?;
        let parent = decode_row(resource, &parent)?;
        insert_children(&mut *tx, &children).await?;
        tx.commit().await?;
        Ok(parent)
    }

    async fn replace_graph(
        &self,
        resource: &ResolvedResource,
        id: &str,
        changes: Row,
        children: Vec<ChildRows<'_>>,
    ) -> Result<Option<Row>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let Some(parent) = fetch_one_tx(&mut *tx, resource, &sql::update(resource, id, &changes)).await? else {
            return Ok(None);
        };
        for c in &children {
            let q = sql::delete_by_column(c.resource, c.foreign_key, Value::String(id.to_string()));
            bound(&q).execute(&mut *tx).await?;
        }
        insert_children(&mut *tx, &children).await?;
        tx.commit().await?;
        Ok(Some(parent))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Decode a row by the declared column types of the resource.
fn decode_row(resource: &ResolvedResource, row: &PgRow) -> Result<Row, StoreError> {
    let mut out = Row::new();
    for c in &resource.columns {
        out.insert(c.name.clone(), cell_to_value(row, &c.name, c.pg_type)?);
    }
    Ok(out)
}

fn cell_to_value(row: &PgRow, name: &str, pg_type: &str) -> Result<Value, sqlx::Error> {
    use sqlx::Row as _;
    let v = match pg_type {
        "uuid" => row
            .try_get::<Option<uuid::Uuid>, _>(name)?
            .map(|u| Value::String(u.to_string())),
        "bigint" => row.try_get::<Option<i64>, _>(name)?.map(Value::from),
        "double precision" => row
            .try_get::<Option<f64>, _>(name)?
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        "boolean" => row.try_get::<Option<bool>, _>(name)?.map(Value::Bool),
        "timestamptz" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name)?
            .map(|d| Value::String(d.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))),
        _ => row.try_get::<Option<String>, _>(name)?.map(Value::String),
    };
    Ok(v.unwrap_or(Value::Null))
}

/// Connects to the server's `postgres` database and runs CREATE DATABASE when the target is missing.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), StoreError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| StoreError::Other(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", sql::quoted(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

/// "postgres://u@h:5432/app?sslmode=disable" -> ("postgres://u@h:5432/postgres?sslmode=disable", "app")
fn parse_db_name_from_url(url: &str) -> Result<(String, String), StoreError> {
    let path_start = url
        .rfind('/')
        .ok_or_else(|| StoreError::Other("DATABASE_URL: no path".into()))?
        + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let (db_name, query) = match path_and_query.split_once('?') {
        Some((db, q)) => (db.trim(), format!("?{}", q)),
        None => (path_and_query.trim(), String::new()),
    };
    let base = url.get(..path_start).unwrap_or(url);
    Ok((format!("{}postgres{}", base, query), db_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_url_keeps_query_string() {
        let (admin, db) = parse_db_name_from_url("postgres://u:p@db:5432/shop?sslmode=disable").expect("parse");
        assert_eq!(admin, "postgres://u:p@db:5432/postgres?sslmode=disable");
        assert_eq!(db, "shop");
    }

    #[test]
    fn url_without_path_is_rejected() {
        assert!(parse_db_name_from_url("no-slashes-here").is_err());
    }
}
