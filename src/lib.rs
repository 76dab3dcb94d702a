//! Resource kit: schema-driven REST resources with PostgreSQL persistence and generated OpenAPI docs.

pub mod case;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod migration;
pub mod openapi;
pub mod render;
pub mod response;
pub mod routes;
pub mod schema;
mod secret;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{load_from_path, resolve, FullConfig, ResolvedModel, ResolvedResource};
pub use dispatch::{build_app, Middleware, MiddlewareChain};
pub use error::{AppError, ConfigError};
pub use migration::apply_migrations;
pub use render::{Artifact, HttpRenderer, RenderError, Renderer};
pub use routes::{common_routes, docs_routes, RouteTable};
pub use service::CrudService;
pub use settings::{Environment, Settings, StoreKind};
pub use state::AppState;
pub use store::{ensure_database_exists, MemoryStore, PgStore, Row, Store, StoreError};
