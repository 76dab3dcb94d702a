//! Documentation surface: the OpenAPI document and a Swagger UI page that renders it.
//! Outside development both require HTTP Basic credentials.

use crate::error::ErrorBody;
use crate::secret::constant_time_eq;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use base64::Engine;

const SWAGGER_UI_VERSION: &str = "5.17.14";

async fn openapi_json(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(state.openapi.as_ref().clone())
}

async fn docs_page() -> Html<String> {
    Html(format!(
        r##"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>{name} API</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@{v}/swagger-ui.css">
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@{v}/swagger-ui-bundle.js" crossorigin></script>
  <script>
    window.onload = () => {{
      window.ui = SwaggerUIBundle({{ url: "/docs/openapi.json", dom_id: "#swagger-ui" }});
    }};
  </script>
</body>
</html>
"##,
        name = env!("CARGO_PKG_NAME"),
        v = SWAGGER_UI_VERSION
    ))
}

/// `Authorization: Basic base64(user:pass)` -> (user, pass)
fn basic_credentials(value: &str) -> Option<(String, String)> {
    let encoded = value.strip_prefix("Basic ")?.trim();
    let decoded = base64::engine::general_purpose::STANDARD.decode(encoded).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, pass) = text.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

async fn require_docs_auth(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if state.settings.is_development() {
        return next.run(req).await;
    }
    let supplied = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(basic_credentials);
    let authorized = match (&state.settings.docs_credentials, supplied) {
        (Some(expected), Some((user, pass))) => {
            // both halves are always compared
            let user_ok = constant_time_eq(expected.username.as_bytes(), user.as_bytes());
            let pass_ok = constant_time_eq(expected.password.as_bytes(), pass.as_bytes());
            user_ok & pass_ok
        }
        _ => false,
    };
    if authorized {
        return next.run(req).await;
    }
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, r#"Basic realm="docs""#)],
        Json(ErrorBody::new("unauthorized", "documentation requires credentials")),
    )
        .into_response()
}

/// GET /docs, GET /docs/openapi.json.
pub fn docs_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/docs", get(docs_page))
        .route("/docs/openapi.json", get(openapi_json))
        .route_layer(middleware::from_fn_with_state(state, require_docs_auth))
}
