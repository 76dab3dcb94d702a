//! Fixtures shared by unit tests.

use crate::config::{resolve, FullConfig, ResolvedModel};

pub(crate) fn sample_config() -> FullConfig {
    serde_json::from_value(serde_json::json!({
        "resources": [
            { "name": "products", "path_segment": "products",
              "operations": ["create", "read", "update", "delete", "list"],
              "fields": [
                { "name": "name", "type": "string", "required": true, "non_empty": true, "max_length": 120 },
                { "name": "price", "type": "number", "required": true, "positive": true },
                { "name": "sku", "type": "string", "pattern": "^[A-Z0-9-]+$" },
                { "name": "stock", "type": "integer", "minimum": 0 },
                { "name": "status", "type": "enum", "values": ["draft", "active", "archived"] },
                { "name": "active", "type": "boolean" }
              ] },
            { "name": "invoices", "path_segment": "invoices",
              "operations": ["create", "read", "update", "delete", "list"],
              "fields": [
                { "name": "customer_name", "type": "string", "required": true, "non_empty": true },
                { "name": "customer_email", "type": "string", "format": "email" },
                { "name": "items", "type": "collection", "resource": "invoice_items",
                  "foreign_key": "invoice_id", "required": true, "non_empty": true }
              ],
              "derived": [ { "name": "total", "sum": { "collection": "items", "factors": ["quantity", "unit_price"] } } ],
              "artifacts": [ { "name": "pdf", "content_type": "application/pdf", "extension": "pdf" } ] },
            { "name": "invoice_items", "path_segment": "invoice-items", "operations": ["list"],
              "fields": [
                { "name": "description", "type": "string", "required": true, "non_empty": true },
                { "name": "quantity", "type": "integer", "required": true, "positive": true },
                { "name": "unit_price", "type": "number", "required": true, "minimum": 0 },
                { "name": "product_id", "type": "uuid" }
              ] }
        ]
    }))
    .expect("sample config")
}

pub(crate) fn sample_model() -> ResolvedModel {
    resolve(&sample_config()).expect("sample model")
}
