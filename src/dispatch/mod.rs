//! Request dispatch: one catch-all handler resolves every resource request against the route table.

mod middleware;

pub use middleware::{Middleware, MiddlewareChain};

use crate::config::ResolvedResource;
use crate::error::{AppError, ErrorBody};
use crate::handlers::{self, HandlerInput};
use crate::routes::{common_routes, docs_routes, Action, Lookup, RouteMatch};
use crate::schema::{parse_list_query, Mode, RequestValidator};
use crate::service::parse_id;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Query, State},
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use serde_json::Value;
use std::collections::HashMap;

/// Assemble the service: common and docs routes, plus resource routes under the api prefix wrapped in `chain`.
pub fn build_app(state: AppState, chain: MiddlewareChain) -> Router {
    let prefix = state.settings.api_prefix.clone();
    let base = Router::new().merge(common_routes()).merge(docs_routes(state.clone()));

    let app = if prefix.is_empty() {
        let api = chain.apply(Router::new().fallback(dispatch));
        base.merge(api)
    } else {
        let api = Router::new()
            .route("/", any(dispatch))
            .route("/*rest", any(dispatch));
        base.nest(&prefix, chain.apply(api)).fallback(unknown_route)
    };
    app.with_state(state)
}

async fn unknown_route(method: Method, uri: Uri) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody::new(
            "not_found",
            format!("route {} {} not found", method, uri.path()),
        )),
    )
        .into_response()
}

async fn dispatch(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, AppError> {
    let matched = match state.routes.find(&method, uri.path()) {
        Lookup::Found(m) => m,
        Lookup::MethodNotAllowed(allow) => return Err(AppError::MethodNotAllowed { allow }),
        Lookup::NotFound => return Err(AppError::NotFound(format!("route {} {}", method, uri.path()))),
    };
    let resource = state
        .model
        .resource(&matched.route.resource)
        .ok_or_else(|| AppError::Internal(format!("route references unknown resource {}", matched.route.resource)))?;

    let input = handler_input(&state, resource, &matched, &uri, body)?;
    tracing::debug!(operation = %matched.route.operation_id, "dispatching");
    let reply = handlers::invoke(&state, resource, input).await?;
    Ok(reply.into_response())
}

fn handler_input(
    state: &AppState,
    resource: &ResolvedResource,
    matched: &RouteMatch<'_>,
    uri: &Uri,
    body: Result<Bytes, BytesRejection>,
) -> Result<HandlerInput, AppError> {
    let route = matched.route;
    let id = || -> Result<String, AppError> {
        let raw = matched.params.get("id").map(String::as_str).unwrap_or_default();
        parse_id(raw).ok_or_else(|| AppError::NotFound(format!("{} {}", route.resource, raw)))
    };
    let payload = |mode: Mode| {
        let value = json_body(body)?;
        RequestValidator::validate(&value, resource, &state.model, mode).map_err(AppError::from)
    };

    let input = match &route.action {
        Action::Create => HandlerInput::Create(payload(Mode::Create)?),
        Action::Read => HandlerInput::Read { id: id()? },
        Action::Update => {
            let id = id()?;
            HandlerInput::Update {
                id,
                input: payload(Mode::Patch)?,
            }
        }
        Action::Delete => HandlerInput::Delete { id: id()? },
        Action::List => {
            let Query(params) = Query::<HashMap<String, String>>::try_from_uri(uri)
                .map_err(|e| AppError::BadRequest(format!("malformed query string: {}", e)))?;
            HandlerInput::List(parse_list_query(resource, &params)?)
        }
        Action::Render(artifact) => HandlerInput::Render {
            id: id()?,
            artifact: artifact.clone(),
        },
    };
    Ok(input)
}

/// An empty body reads as `null`, which the validator reports as a type mismatch on `body`.
fn json_body(body: Result<Bytes, BytesRejection>) -> Result<Value, AppError> {
    let bytes = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge
        } else {
            AppError::BadRequest(rejection.body_text())
        }
    })?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes).map_err(|e| AppError::BadRequest(format!("invalid JSON body: {}", e)))
}
