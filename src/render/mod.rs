//! Rendering collaborator: turns an entity document into artifact bytes (e.g. a PDF).

mod http;

pub use http::HttpRenderer;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    /// Unreachable or timed out.
    #[error("renderer unavailable: {0}")]
    Unavailable(String),
    /// Reachable but reported a failure.
    #[error("renderer failed with status {status}: {message}")]
    Failed { status: u16, message: String },
}

#[derive(Clone, Debug)]
pub struct Artifact {
    /// Content type reported by the renderer, if any.
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render `document` under `name` (e.g. `invoices-<id>`) as the artifact kind `artifact`.
    async fn render(&self, name: &str, artifact: &str, document: &Value) -> Result<Artifact, RenderError>;
}

/// Collaborator address for one entity: `"{resource}-{id}"`.
pub fn artifact_name(resource: &str, id: &str) -> String {
    format!("{}-{}", resource, id)
}
