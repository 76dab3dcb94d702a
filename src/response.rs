//! Declared success variants of the generic handlers.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListMeta {
    pub count: usize,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Serialize)]
struct ListBody {
    data: Vec<Value>,
    meta: ListMeta,
}

#[derive(Debug)]
pub enum Reply {
    /// 201 with the created entity.
    Created(Value),
    /// 200 with one entity.
    Found(Value),
    /// 200 with `{data, meta}`.
    Page { data: Vec<Value>, meta: ListMeta },
    /// 204.
    NoContent,
    /// 200 with artifact bytes, served as an attachment.
    Artifact {
        content_type: String,
        filename: String,
        bytes: Bytes,
    },
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self {
            Reply::Created(v) => (StatusCode::CREATED, Json(v)).into_response(),
            Reply::Found(v) => (StatusCode::OK, Json(v)).into_response(),
            Reply::Page { data, meta } => (StatusCode::OK, Json(ListBody { data, meta })).into_response(),
            Reply::NoContent => StatusCode::NO_CONTENT.into_response(),
            Reply::Artifact {
                content_type,
                filename,
                bytes,
            } => {
                let content_type = HeaderValue::from_str(&content_type)
                    .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
                let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
                    .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
                (
                    StatusCode::OK,
                    [(header::CONTENT_TYPE, content_type), (header::CONTENT_DISPOSITION, disposition)],
                    bytes,
                )
                    .into_response()
            }
        }
    }
}
