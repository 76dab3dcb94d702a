//! Case conversion at the API boundary: storage columns are snake_case, wire keys are camelCase.

use serde_json::{Map, Value};

/// "unit_price" -> "unitPrice", "created_at" -> "createdAt"
pub fn to_camel_case(s: &str) -> String {
    let mut parts = s.split('_').filter(|p| !p.is_empty());
    let mut out = parts.next().unwrap_or_default().to_string();
    for part in parts {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

/// "invoice_items" -> "InvoiceItems". Used for OpenAPI component names.
pub fn to_pascal_case(s: &str) -> String {
    let camel = to_camel_case(s);
    let mut chars = camel.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Rename the top-level keys of a storage row to camelCase for the response.
pub fn row_to_wire(row: Map<String, Value>) -> Map<String, Value> {
    row.into_iter().map(|(k, v)| (to_camel_case(&k), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_between_cases() {
        assert_eq!(to_camel_case("created_at"), "createdAt");
        assert_eq!(to_camel_case("name"), "name");
        assert_eq!(to_camel_case("customer_email"), "customerEmail");
        assert_eq!(to_pascal_case("invoice_items"), "InvoiceItems");
    }

    #[test]
    fn row_keys_become_camel_case() {
        let mut row = Map::new();
        row.insert("unit_price".into(), Value::from(2.5));
        row.insert("id".into(), Value::from("x"));
        let wire = row_to_wire(row);
        assert!(wire.contains_key("unitPrice"));
        assert!(wire.contains_key("id"));
    }
}
