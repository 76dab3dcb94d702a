use super::{Artifact, RenderError, Renderer};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

/// POSTs `{artifact, document}` to `{base_url}/render/{name}` and returns the response body.
#[derive(Clone)]
pub struct HttpRenderer {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRenderer {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RenderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RenderError::Unavailable(e.to_string()))?;
        Ok(HttpRenderer {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, name: &str) -> String {
        format!("{}/render/{}", self.base_url, name)
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn render(&self, name: &str, artifact: &str, document: &Value) -> Result<Artifact, RenderError> {
        let response = self
            .client
            .post(self.url(name))
            .json(&json!({ "artifact": artifact, "document": document }))
            .send()
            .await
            .map_err(|e| RenderError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            return Err(RenderError::Unavailable(format!("{} returned 503", self.url(name))));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RenderError::Failed {
                status: status.as_u16(),
                message,
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RenderError::Unavailable(e.to_string()))?;
        tracing::debug!(name, artifact, size = bytes.len(), "artifact rendered");
        Ok(Artifact { content_type, bytes })
    }
}
