//! End-to-end tests over the assembled router with the in-memory store.

mod common;

use axum::http::{header, Method, StatusCode};
use base64::Engine;
use common::*;
use resource_kit::{Environment, MemoryStore, Settings};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn invoice() -> Value {
    json!({
        "customerName": "Acme",
        "items": [
            { "description": "Bolt", "quantity": 2, "unitPrice": 5.5 },
            { "description": "Nut", "quantity": 1, "unitPrice": 3.0 }
        ]
    })
}

async fn create(app: &axum::Router, path: &str, body: Value) -> Value {
    let (status, created) = call(app, json_request("POST", path, &body)).await;
    assert_eq!(status, StatusCode::CREATED, "create {}: {}", path, created);
    created
}

#[tokio::test]
async fn product_lifecycle() {
    let app = app();
    let created = create(&app, "/api/products", json!({ "name": "Lamp", "price": 19.5 })).await;
    let id = created["id"].as_str().expect("id").to_string();
    assert!(uuid::Uuid::parse_str(&id).is_ok());
    assert!(created["createdAt"].as_str().expect("createdAt").ends_with('Z'));

    let (status, found) = call(&app, get(&format!("/api/products/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["name"], "Lamp");

    let (status, updated) = call(
        &app,
        json_request("PATCH", &format!("/api/products/{}", id), &json!({ "price": 21 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Lamp");
    assert_eq!(updated["price"].as_f64(), Some(21.0));

    let res = send(
        &app,
        axum::http::Request::builder()
            .method("DELETE")
            .uri(format!("/api/products/{}", id))
            .body(axum::body::Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let (status, body) = call(&app, get(&format!("/api/products/{}", id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn invalid_product_reports_every_field() {
    let app = app();
    let (status, body) = call(&app, json_request("POST", "/api/products", &json!({ "name": "", "price": -1 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
    let details = body["details"].as_array().expect("details");
    assert_eq!(details.len(), 2);
    assert_eq!(details[0]["field"], "name");
    assert_eq!(details[0]["reason"], "empty");
    assert_eq!(details[1]["field"], "price");
    assert_eq!(details[1]["reason"], "not_positive");
}

#[tokio::test]
async fn malformed_and_empty_bodies_are_rejected() {
    let app = app();
    let req = axum::http::Request::builder()
        .method("POST")
        .uri("/api/products")
        .body(axum::body::Body::from("{not json"))
        .expect("request");
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");

    let req = axum::http::Request::builder()
        .method("POST")
        .uri("/api/products")
        .body(axum::body::Body::empty())
        .expect("request");
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "body");
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let app = app();
    let missing = uuid::Uuid::new_v4();
    for uri in [
        format!("/api/products/{}", missing),
        "/api/products/not-a-uuid".to_string(),
        format!("/api/invoices/{}/pdf", missing),
    ] {
        let (status, body) = call(&app, get(&uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body["code"], "not_found");
    }

    let (status, _) = call(
        &app,
        json_request("PATCH", &format!("/api/products/{}", missing), &json!({ "price": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn wrong_method_lists_allowed_methods() {
    let app = app();
    let res = send(&app, json_request("PUT", "/api/products", &json!({}))).await;
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    let allow = res.headers().get(header::ALLOW).and_then(|v| v.to_str().ok()).map(str::to_string);
    assert_eq!(allow.as_deref(), Some("GET, POST"));

    // child resources expose list only
    let res = send(&app, json_request("POST", "/api/invoice-items", &json!({}))).await;
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let app = app();
    for uri in ["/api/widgets", "/api/products/a/b/c", "/nowhere"] {
        let (status, body) = call(&app, get(uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body["code"], "not_found");
    }
}

#[tokio::test]
async fn invoice_carries_items_and_total() {
    let app = app();
    let created = create(&app, "/api/invoices", invoice()).await;
    assert_eq!(created["total"].as_f64(), Some(14.0));
    let items = created["items"].as_array().expect("items");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["description"], "Bolt");
    assert_eq!(items[0]["invoiceId"], created["id"]);

    let id = created["id"].as_str().expect("id");
    let (status, listed) = call(&app, get(&format!("/api/invoice-items?invoiceId={}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["meta"]["count"], 2);

    let (status, patched) = call(
        &app,
        json_request(
            "PATCH",
            &format!("/api/invoices/{}", id),
            &json!({ "items": [ { "description": "Gear", "quantity": 4, "unitPrice": 2.5 } ] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["total"].as_f64(), Some(10.0));
    assert_eq!(patched["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(patched["customerName"], "Acme");
}

#[tokio::test]
async fn nested_item_errors_name_their_position() {
    let app = app();
    let body = json!({
        "customerName": "Acme",
        "items": [
            { "description": "Bolt", "quantity": 2, "unitPrice": 5.5 },
            { "description": "Nut", "quantity": 0, "unitPrice": 3.0 }
        ]
    });
    let (status, body) = call(&app, json_request("POST", "/api/invoices", &body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "items[1].quantity");
}

#[tokio::test]
async fn failed_graph_write_leaves_nothing_behind() {
    let store = Arc::new(FlakyStore {
        inner: MemoryStore::new(),
        down: false,
    });
    let app = app_with(Settings::default(), store, FakeRenderer::Ok);

    let (status, body) = call(&app, json_request("POST", "/api/invoices", &invoice())).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "persistence_unavailable");

    let (_, invoices) = call(&app, get("/api/invoices")).await;
    assert_eq!(invoices["data"], json!([]));
    let (_, items) = call(&app, get("/api/invoice-items")).await;
    assert_eq!(items["data"], json!([]));
}

#[tokio::test]
async fn list_pages_and_filters() {
    let app = app();
    for (name, status) in [("A", "active"), ("B", "draft"), ("C", "active")] {
        create(&app, "/api/products", json!({ "name": name, "price": 1, "status": status })).await;
        tokio::time::sleep(Duration::from_millis(3)).await;
    }

    let (status, page) = call(&app, get("/api/products?limit=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["meta"], json!({ "count": 2, "limit": 2, "offset": 0 }));
    assert_eq!(page["data"][0]["name"], "A");

    let (_, page) = call(&app, get("/api/products?limit=2&offset=2")).await;
    assert_eq!(page["data"].as_array().map(Vec::len), Some(1));
    assert_eq!(page["data"][0]["name"], "C");

    let (_, active) = call(&app, get("/api/products?status=active")).await;
    assert_eq!(active["meta"]["count"], 2);

    let (status, body) = call(&app, get("/api/products?colour=red&limit=0")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn renders_invoice_artifact_as_attachment() {
    let app = app();
    let created = create(&app, "/api/invoices", invoice()).await;
    let id = created["id"].as_str().expect("id");

    let res = send(&app, get(&format!("/api/invoices/{}/pdf", id))).await;
    assert_eq!(res.status(), StatusCode::OK);
    let header_str = |name: header::HeaderName| res.headers().get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    assert_eq!(header_str(header::CONTENT_TYPE).as_deref(), Some("application/pdf"));
    assert_eq!(
        header_str(header::CONTENT_DISPOSITION),
        Some(format!("attachment; filename=\"invoices-{}.pdf\"", id))
    );
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.expect("body");
    assert!(bytes.starts_with(format!("%PDF invoices-{}", id).as_bytes()));
}

#[tokio::test]
async fn renderer_failures_are_distinguished() {
    for (renderer, expected, code) in [
        (FakeRenderer::Fails, StatusCode::BAD_GATEWAY, "renderer_failed"),
        (FakeRenderer::Down, StatusCode::SERVICE_UNAVAILABLE, "renderer_unavailable"),
    ] {
        let app = app_with(Settings::default(), Arc::new(MemoryStore::new()), renderer);
        let created = create(&app, "/api/invoices", invoice()).await;
        let id = created["id"].as_str().expect("id");
        let (status, body) = call(&app, get(&format!("/api/invoices/{}/pdf", id))).await;
        assert_eq!(status, expected);
        assert_eq!(body["code"], code);
    }
}

#[tokio::test]
async fn slow_requests_time_out() {
    let settings = Settings {
        request_timeout: Duration::from_millis(50),
        ..Settings::default()
    };
    let app = app_with(settings, Arc::new(MemoryStore::new()), FakeRenderer::Slow);
    let created = create(&app, "/api/invoices", invoice()).await;
    let id = created["id"].as_str().expect("id");
    let (status, body) = call(&app, get(&format!("/api/invoices/{}/pdf", id))).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["code"], "timeout");
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let settings = Settings {
        body_limit_bytes: 64,
        ..Settings::default()
    };
    let app = app_with(settings, Arc::new(MemoryStore::new()), FakeRenderer::Ok);
    let body = json!({ "name": "x".repeat(500), "price": 1 }).to_string();

    let declared = axum::http::Request::builder()
        .method("POST")
        .uri("/api/products")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, body.len())
        .body(axum::body::Body::from(body.clone()))
        .expect("request");
    let res = send(&app, declared).await;
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let content_type = res.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).map(str::to_string);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    assert_eq!(body_json(res).await["code"], "payload_too_large");

    let (status, undeclared) = call(&app, json_request("POST", "/api/products", &serde_json::from_str(&body).expect("json"))).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(undeclared["code"], "payload_too_large");
}

#[tokio::test]
async fn bearer_token_guards_resource_routes_only() {
    let settings = Settings {
        api_token: Some("s3cret".into()),
        ..Settings::default()
    };
    let app = app_with(settings, Arc::new(MemoryStore::new()), FakeRenderer::Ok);

    let res = send(&app, get("/api/products")).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.headers().contains_key(header::WWW_AUTHENTICATE));

    let req = axum::http::Request::builder()
        .uri("/api/products")
        .header(header::AUTHORIZATION, "Bearer s3cret")
        .body(axum::body::Body::empty())
        .expect("request");
    assert_eq!(send(&app, req).await.status(), StatusCode::OK);

    assert_eq!(send(&app, get("/health")).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn docs_require_credentials_outside_development() {
    let dev = app();
    let page = send(&dev, get("/docs")).await;
    assert_eq!(page.status(), StatusCode::OK);
    let html = axum::body::to_bytes(page.into_body(), usize::MAX).await.expect("body");
    let html = String::from_utf8_lossy(&html);
    assert!(html.contains(r##"dom_id: "#swagger-ui""##));
    assert!(html.contains("/docs/openapi.json"));

    let (status, doc) = call(&dev, get("/docs/openapi.json")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/api/invoices/{id}/pdf"]["get"].is_object());

    let settings = Settings {
        environment: Environment::Production,
        docs_credentials: Some(resource_kit::settings::DocsCredentials {
            username: "admin".into(),
            password: "pw".into(),
        }),
        ..Settings::default()
    };
    let prod = app_with(settings, Arc::new(MemoryStore::new()), FakeRenderer::Ok);
    let res = send(&prod, get("/docs")).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.headers().contains_key(header::WWW_AUTHENTICATE));

    let auth = format!("Basic {}", base64::engine::general_purpose::STANDARD.encode("admin:pw"));
    let req = axum::http::Request::builder()
        .method(Method::GET)
        .uri("/docs/openapi.json")
        .header(header::AUTHORIZATION, auth)
        .body(axum::body::Body::empty())
        .expect("request");
    assert_eq!(send(&prod, req).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn readiness_reflects_store_health() {
    let (status, body) = call(&app(), get("/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let store = Arc::new(FlakyStore {
        inner: MemoryStore::new(),
        down: true,
    });
    let app = app_with(Settings::default(), store, FakeRenderer::Ok);
    let (status, body) = call(&app, get("/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
}
