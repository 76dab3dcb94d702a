//! Persistence collaborator: rows keyed by storage column, behind one async trait.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{ensure_database_exists, PgStore};

use crate::config::ResolvedResource;
use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// Stored record: snake_case column -> JSON value. Timestamps are RFC 3339 strings.
pub type Row = Map<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("store error: {0}")]
    Other(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(e.to_string()),
            sqlx::Error::Database(db) => match db.code().as_deref() {
                // unique, foreign key, check, not null
                Some("23505") | Some("23503") | Some("23514") | Some("23502") => {
                    StoreError::Conflict(db.message().to_string())
                }
                _ => StoreError::Other(e.to_string()),
            },
            _ => StoreError::Other(e.to_string()),
        }
    }
}

/// Child rows written together with their parent. Each row already carries `foreign_key`.
pub struct ChildRows<'a> {
    pub resource: &'a ResolvedResource,
    pub foreign_key: &'a str,
    pub rows: Vec<Row>,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert(&self, resource: &ResolvedResource, row: Row) -> Result<Row, StoreError>;

    async fn fetch(&self, resource: &ResolvedResource, id: &str) -> Result<Option<Row>, StoreError>;

    /// Equality filters on storage columns, ordered by creation time. `None` returns every match.
    async fn fetch_where(
        &self,
        resource: &ResolvedResource,
        filters: &[(String, Value)],
        page: Option<Page>,
    ) -> Result<Vec<Row>, StoreError>;

    /// Rows whose `column` is any of `values`.
    async fn fetch_where_in(
        &self,
        resource: &ResolvedResource,
        column: &str,
        values: &[Value],
    ) -> Result<Vec<Row>, StoreError>;

    /// Apply `changes` to an existing row. `Ok(None)` when the id is unknown.
    async fn update(&self, resource: &ResolvedResource, id: &str, changes: Row) -> Result<Option<Row>, StoreError>;

    /// Delete a row and any children owned by it. `Ok(false)` when the id is unknown.
    async fn delete(&self, resource: &ResolvedResource, id: &str) -> Result<bool, StoreError>;

    /// Insert a parent row and all of its children atomically.
    async fn insert_graph(
        &self,
        resource: &ResolvedResource,
        row: Row,
        children: Vec<ChildRows<'_>>,
    ) -> Result<Row, StoreError>;

    /// Update a parent row and replace the listed child collections atomically.
    async fn replace_graph(
        &self,
        resource: &ResolvedResource,
        id: &str,
        changes: Row,
        children: Vec<ChildRows<'_>>,
    ) -> Result<Option<Row>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
