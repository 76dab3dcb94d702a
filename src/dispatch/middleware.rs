//! Ordered middleware chain around the dispatcher. The first registered entry is the outermost.

use crate::error::{AppError, ErrorBody};
use crate::secret::constant_time_eq;
use crate::settings::Settings;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Json, Router,
};
use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::catch_panic::CatchPanicLayer;

#[derive(Clone, Debug)]
pub enum Middleware {
    /// Logs method, path, status and latency of every request.
    RequestLog,
    /// Turns a handler panic into a 500 with the standard error body.
    CatchPanic,
    /// Rejects with 504 when the inner service exceeds the deadline.
    Timeout(Duration),
    /// Rejects with 401 unless `Authorization: Bearer <token>` matches.
    BearerAuth(Arc<str>),
    /// Caps buffered request bodies; the dispatcher answers 413 `payload_too_large` past it.
    BodyLimit(usize),
}

impl Middleware {
    fn apply(&self, router: Router<AppState>) -> Router<AppState> {
        match self {
            Middleware::RequestLog => router.layer(middleware::from_fn(log_request)),
            Middleware::CatchPanic => router.layer(CatchPanicLayer::custom(panic_response)),
            Middleware::Timeout(limit) => router.layer(middleware::from_fn_with_state(*limit, enforce_timeout)),
            Middleware::BearerAuth(token) => {
                router.layer(middleware::from_fn_with_state(token.clone(), require_bearer))
            }
            Middleware::BodyLimit(bytes) => router.layer(DefaultBodyLimit::max(*bytes)),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct MiddlewareChain {
    entries: Vec<Middleware>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `m` inside everything registered so far.
    pub fn with(mut self, m: Middleware) -> Self {
        self.entries.push(m);
        self
    }

    pub fn entries(&self) -> &[Middleware] {
        &self.entries
    }

    /// Logging, panic guard, body limit, timeout, then auth when a token is configured.
    pub fn default_for(settings: &Settings) -> Self {
        let mut chain = MiddlewareChain::new()
            .with(Middleware::RequestLog)
            .with(Middleware::CatchPanic)
            .with(Middleware::BodyLimit(settings.body_limit_bytes))
            .with(Middleware::Timeout(settings.request_timeout));
        if let Some(token) = &settings.api_token {
            chain = chain.with(Middleware::BearerAuth(Arc::from(token.as_str())));
        }
        chain
    }

    /// Wrap `router`; `Router::layer` makes the last call outermost, so entries go in reverse.
    pub fn apply(&self, router: Router<AppState>) -> Router<AppState> {
        self.entries.iter().rev().fold(router, |r, m| m.apply(r))
    }
}

async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(req).await;
    let status = response.status();
    let latency_ms = started.elapsed().as_millis() as u64;
    if status.is_server_error() {
        tracing::warn!(%method, %path, status = status.as_u16(), latency_ms, "request");
    } else {
        tracing::info!(%method, %path, status = status.as_u16(), latency_ms, "request");
    }
    response
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody::new("internal_error", "internal server error")),
    )
        .into_response()
}

async fn enforce_timeout(State(limit): State<Duration>, req: Request, next: Next) -> Response {
    match tokio::time::timeout(limit, next.run(req)).await {
        Ok(response) => response,
        Err(_) => AppError::Timeout.into_response(),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

async fn require_bearer(State(expected): State<Arc<str>>, req: Request, next: Next) -> Response {
    match bearer_token(req.headers()) {
        Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => next.run(req).await,
        _ => AppError::Unauthorized.into_response(),
    }
}
