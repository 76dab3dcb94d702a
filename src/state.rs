//! Shared application state. Built once at startup; every field is immutable afterwards.

use crate::config::ResolvedModel;
use crate::error::ConfigError;
use crate::openapi::build_openapi;
use crate::render::Renderer;
use crate::routes::RouteTable;
use crate::settings::Settings;
use crate::store::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub model: Arc<ResolvedModel>,
    pub routes: Arc<RouteTable>,
    pub store: Arc<dyn Store>,
    pub renderer: Arc<dyn Renderer>,
    /// Serialized OpenAPI document served at `/docs/openapi.json`.
    pub openapi: Arc<serde_json::Value>,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Build the route table and the OpenAPI document for `model`.
    pub fn new(
        model: ResolvedModel,
        store: Arc<dyn Store>,
        renderer: Arc<dyn Renderer>,
        settings: Settings,
    ) -> Result<Self, ConfigError> {
        let routes = RouteTable::build(&model)?;
        let doc = build_openapi(&model, &routes, &settings.api_prefix, settings.api_token.is_some());
        let openapi = serde_json::to_value(doc).map_err(|e| ConfigError::Validation(format!("openapi: {}", e)))?;
        tracing::info!(
            resources = model.resources.len(),
            routes = routes.routes().len(),
            "route table built"
        );
        Ok(AppState {
            model: Arc::new(model),
            routes: Arc::new(routes),
            store,
            renderer,
            openapi: Arc::new(openapi),
            settings: Arc::new(settings),
        })
    }
}
