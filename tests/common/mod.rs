//! Shared fixtures for the HTTP tests: sample resources, fake renderer, failing stores.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use bytes::Bytes;
use resource_kit::store::{ChildRows, Page};
use resource_kit::{
    build_app, resolve, AppState, Artifact, FullConfig, MemoryStore, MiddlewareChain, RenderError, Renderer,
    ResolvedResource, Row, Settings, Store, StoreError,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

pub fn sample_config() -> FullConfig {
    serde_json::from_value(json!({
        "resources": [
            { "name": "products", "path_segment": "products",
              "operations": ["create", "read", "update", "delete", "list"],
              "fields": [
                { "name": "name", "type": "string", "required": true, "non_empty": true, "max_length": 120 },
                { "name": "price", "type": "number", "required": true, "positive": true },
                { "name": "status", "type": "enum", "values": ["draft", "active", "archived"] }
              ] },
            { "name": "invoices", "path_segment": "invoices",
              "operations": ["create", "read", "update", "delete", "list"],
              "fields": [
                { "name": "customer_name", "type": "string", "required": true, "non_empty": true },
                { "name": "items", "type": "collection", "resource": "invoice_items",
                  "foreign_key": "invoice_id", "required": true, "non_empty": true }
              ],
              "derived": [ { "name": "total", "sum": { "collection": "items", "factors": ["quantity", "unit_price"] } } ],
              "artifacts": [ { "name": "pdf", "content_type": "application/pdf", "extension": "pdf" } ] },
            { "name": "invoice_items", "path_segment": "invoice-items", "operations": ["list"],
              "fields": [
                { "name": "description", "type": "string", "required": true, "non_empty": true },
                { "name": "quantity", "type": "integer", "required": true, "positive": true },
                { "name": "unit_price", "type": "number", "required": true, "minimum": 0 }
              ] }
        ]
    }))
    .expect("sample config")
}

#[derive(Clone, Copy, Debug)]
pub enum FakeRenderer {
    Ok,
    Fails,
    Down,
    Slow,
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn render(&self, name: &str, _artifact: &str, document: &Value) -> Result<Artifact, RenderError> {
        match self {
            FakeRenderer::Ok => Ok(Artifact {
                content_type: None,
                bytes: Bytes::from(format!("%PDF {} {}", name, document["customerName"])),
            }),
            FakeRenderer::Fails => Err(RenderError::Failed {
                status: 500,
                message: "template error".into(),
            }),
            FakeRenderer::Down => Err(RenderError::Unavailable("connection refused".into())),
            FakeRenderer::Slow => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Err(RenderError::Unavailable("too slow".into()))
            }
        }
    }
}

/// Delegates to a [`MemoryStore`] but fails graph writes, or every call when `down`.
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub down: bool,
}

impl FlakyStore {
    fn check(&self) -> Result<(), StoreError> {
        if self.down {
            Err(StoreError::Unavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn insert(&self, resource: &ResolvedResource, row: Row) -> Result<Row, StoreError> {
        self.check()?;
        self.inner.insert(resource, row).await
    }

    async fn fetch(&self, resource: &ResolvedResource, id: &str) -> Result<Option<Row>, StoreError> {
        self.check()?;
        self.inner.fetch(resource, id).await
    }

    async fn fetch_where(
        &self,
        resource: &ResolvedResource,
        filters: &[(String, Value)],
        page: Option<Page>,
    ) -> Result<Vec<Row>, StoreError> {
        self.check()?;
        self.inner.fetch_where(resource, filters, page).await
    }

    async fn fetch_where_in(
        &self,
        resource: &ResolvedResource,
        column: &str,
        values: &[Value],
    ) -> Result<Vec<Row>, StoreError> {
        self.check()?;
        self.inner.fetch_where_in(resource, column, values).await
    }

    async fn update(&self, resource: &ResolvedResource, id: &str, changes: Row) -> Result<Option<Row>, StoreError> {
        self.check()?;
        self.inner.update(resource, id, changes).await
    }

    async fn delete(&self, resource: &ResolvedResource, id: &str) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.delete(resource, id).await
    }

    async fn insert_graph(
        &self,
        _resource: &ResolvedResource,
        _row: Row,
        _children: Vec<ChildRows<'_>>,
    ) -> Result<Row, StoreError> {
        Err(StoreError::Unavailable("connection reset during transaction".into()))
    }

    async fn replace_graph(
        &self,
        _resource: &ResolvedResource,
        _id: &str,
        _changes: Row,
        _children: Vec<ChildRows<'_>>,
    ) -> Result<Option<Row>, StoreError> {
        Err(StoreError::Unavailable("connection reset during transaction".into()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check()
    }
}

pub fn app_with(settings: Settings, store: Arc<dyn Store>, renderer: FakeRenderer) -> Router {
    let model = resolve(&sample_config()).expect("model");
    let chain = MiddlewareChain::default_for(&settings);
    let state = AppState::new(model, store, Arc::new(renderer), settings).expect("state");
    build_app(state, chain)
}

pub fn app() -> Router {
    app_with(Settings::default(), Arc::new(MemoryStore::new()), FakeRenderer::Ok)
}

pub async fn send(app: &Router, req: Request<Body>) -> Response {
    app.clone().oneshot(req).await.expect("infallible")
}

pub fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("request")
}

pub async fn body_json(res: Response) -> Value {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.expect("body");
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

pub async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = send(app, req).await;
    let status = res.status();
    (status, body_json(res).await)
}
