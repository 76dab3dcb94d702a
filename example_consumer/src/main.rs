//! Example server: hosts the resources in `resources.json` on resource-kit.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Set `STORE=memory` to run without PostgreSQL.

use resource_kit::{
    build_app, load_from_path, resolve, AppState, HttpRenderer, MemoryStore, MiddlewareChain, PgStore, Settings,
    Store, StoreKind,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("resource_kit=info,example_consumer=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let config = load_from_path(&settings.resources_path).await?;
    let model = resolve(&config)?;

    let store: Arc<dyn Store> = match settings.store {
        StoreKind::Postgres => {
            Arc::new(PgStore::connect(&settings.database_url, settings.db_max_connections, &model).await?)
        }
        StoreKind::Memory => {
            tracing::warn!("using the in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };
    let renderer = Arc::new(HttpRenderer::new(settings.renderer_url.clone(), settings.renderer_timeout)?);

    let bind_addr = settings.bind_addr;
    let prefix = settings.api_prefix.clone();
    let chain = MiddlewareChain::default_for(&settings);
    let state = AppState::new(model, store, renderer, settings)?;
    let app = build_app(state, chain);

    let listener = TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;
    tracing::info!("listening on http://{} (api at '{}', docs at /docs)", addr, prefix);
    axum::serve(listener, app).await?;
    Ok(())
}
