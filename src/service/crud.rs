//! Generic CRUD over the persistence collaborator. Assigns ids and timestamps, fills child keys,
//! computes derived fields, and shapes storage rows into wire documents.

use crate::case::row_to_wire;
use crate::config::{ResolvedModel, ResolvedResource, CREATED_AT_COLUMN, ID_COLUMN, UPDATED_AT_COLUMN};
use crate::error::AppError;
use crate::schema::{ListQuery, Validated};
use crate::store::{ChildRows, Row, Store};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

pub struct CrudService;

/// Canonical form of a path id, or None when it is not a UUID (no such entity can exist).
pub fn parse_id(raw: &str) -> Option<String> {
    uuid::Uuid::parse_str(raw).ok().map(|u| u.to_string())
}

fn timestamp(t: DateTime<Utc>) -> Value {
    Value::String(t.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn new_id() -> Value {
    Value::String(uuid::Uuid::new_v4().to_string())
}

impl CrudService {
    /// Insert a new entity (and its collections as one unit). Returns the wire document.
    pub async fn create(
        store: &dyn Store,
        model: &ResolvedModel,
        resource: &ResolvedResource,
        input: Validated,
    ) -> Result<Value, AppError> {
        let now = Utc::now();
        let mut row = input.values;
        let id = uuid::Uuid::new_v4().to_string();
        row.insert(ID_COLUMN.into(), Value::String(id.clone()));
        row.insert(CREATED_AT_COLUMN.into(), timestamp(now));
        row.insert(UPDATED_AT_COLUMN.into(), timestamp(now));

        if resource.collections().next().is_none() {
            let stored = store.insert(resource, row).await?;
            tracing::info!(resource = %resource.name, id = %id, "created");
            return Ok(document(resource, stored, &BTreeMap::new()));
        }

        let mut collections = input.collections;
        for (field, _) in resource.collections() {
            collections.entry(field.name.clone()).or_default();
        }
        row.extend(derived_values(resource, &collections));
        let children = child_rows(model, resource, &id, now, &collections)?;
        let stored = store.insert_graph(resource, row, children_for_store(model, resource, &children)?).await?;
        tracing::info!(
            resource = %resource.name,
            id = %id,
            children = children.values().map(Vec::len).sum::<usize>(),
            "created with collections"
        );
        Ok(document(resource, stored, &children))
    }

    /// Fetch one entity with its collections.
    pub async fn read(
        store: &dyn Store,
        model: &ResolvedModel,
        resource: &ResolvedResource,
        id: &str,
    ) -> Result<Option<Value>, AppError> {
        let Some(row) = store.fetch(resource, id).await? else {
            return Ok(None);
        };
        let mut docs = Self::with_children(store, model, resource, vec![row]).await?;
        Ok(docs.pop())
    }

    /// Apply a partial update. A collection present in the patch replaces all of its items.
    pub async fn update(
        store: &dyn Store,
        model: &ResolvedModel,
        resource: &ResolvedResource,
        id: &str,
        input: Validated,
    ) -> Result<Option<Value>, AppError> {
        let now = Utc::now();
        let mut changes = input.values;
        changes.insert(UPDATED_AT_COLUMN.into(), timestamp(now));

        if input.collections.is_empty() {
            if store.update(resource, id, changes).await?.is_none() {
                return Ok(None);
            }
        } else {
            changes.extend(derived_values(resource, &input.collections));
            let children = child_rows(model, resource, id, now, &input.collections)?;
            let replaced = store
                .replace_graph(resource, id, changes, children_for_store(model, resource, &children)?)
                .await?;
            if replaced.is_none() {
                return Ok(None);
            }
        }
        tracing::info!(resource = %resource.name, id = %id, "updated");
        Self::read(store, model, resource, id).await
    }

    pub async fn delete(store: &dyn Store, resource: &ResolvedResource, id: &str) -> Result<bool, AppError> {
        let deleted = store.delete(resource, id).await?;
        if deleted {
            tracing::info!(resource = %resource.name, id = %id, "deleted");
        }
        Ok(deleted)
    }

    /// One page of entities matching the query's equality filters.
    pub async fn list(
        store: &dyn Store,
        model: &ResolvedModel,
        resource: &ResolvedResource,
        query: &ListQuery,
    ) -> Result<Vec<Value>, AppError> {
        let rows = store.fetch_where(resource, &query.filters, Some(query.page)).await?;
        Self::with_children(store, model, resource, rows).await
    }

    /// Batch-load collections for `rows` (one query per collection) and build documents.
    async fn with_children(
        store: &dyn Store,
        model: &ResolvedModel,
        resource: &ResolvedResource,
        rows: Vec<Row>,
    ) -> Result<Vec<Value>, AppError> {
        let ids: Vec<Value> = rows.iter().filter_map(|r| r.get(ID_COLUMN).cloned()).collect();
        // field name -> parent id -> child rows
        let mut grouped: HashMap<String, HashMap<String, Vec<Row>>> = HashMap::new();
        for (field, collection) in resource.collections() {
            let child = model
                .child(collection)
                .ok_or_else(|| AppError::Internal(format!("unknown child resource {}", collection.resource)))?;
            let children = store.fetch_where_in(child, &collection.foreign_key, &ids).await?;
            let by_parent = grouped.entry(field.name.clone()).or_default();
            for c in children {
                if let Some(parent_id) = c.get(&collection.foreign_key).and_then(Value::as_str) {
                    by_parent.entry(parent_id.to_string()).or_default().push(c);
                }
            }
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let id = row.get(ID_COLUMN).and_then(Value::as_str).unwrap_or_default().to_string();
                let collections: BTreeMap<String, Vec<Row>> = grouped
                    .iter_mut()
                    .map(|(field, by_parent)| (field.clone(), by_parent.remove(&id).unwrap_or_default()))
                    .collect();
                document(resource, row, &collections)
            })
            .collect())
    }
}

/// Derived sums over the supplied collections. Collections not supplied are left untouched.
pub fn derived_values(resource: &ResolvedResource, collections: &BTreeMap<String, Vec<Row>>) -> Row {
    let mut out = Row::new();
    for d in &resource.derived {
        let Some(items) = collections.get(&d.sum.collection) else {
            continue;
        };
        let total: f64 = items
            .iter()
            .map(|item| {
                d.sum
                    .factors
                    .iter()
                    .map(|f| item.get(f).and_then(Value::as_f64).unwrap_or(0.0))
                    .product::<f64>()
            })
            .sum();
        let value = serde_json::Number::from_f64(total).map(Value::Number).unwrap_or(Value::Null);
        out.insert(d.name.clone(), value);
    }
    out
}

/// Complete child rows with id, parent key and timestamps. Items are stamped one millisecond
/// apart so reads return them in submission order.
fn child_rows(
    model: &ResolvedModel,
    resource: &ResolvedResource,
    parent_id: &str,
    now: DateTime<Utc>,
    collections: &BTreeMap<String, Vec<Row>>,
) -> Result<BTreeMap<String, Vec<Row>>, AppError> {
    let mut out = BTreeMap::new();
    for (field, collection) in resource.collections() {
        let Some(items) = collections.get(&field.name) else {
            continue;
        };
        model
            .child(collection)
            .ok_or_else(|| AppError::Internal(format!("unknown child resource {}", collection.resource)))?;
        let rows = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let at = timestamp(now + Duration::milliseconds(i as i64));
                let mut row = item.clone();
                row.insert(ID_COLUMN.into(), new_id());
                row.insert(collection.foreign_key.clone(), Value::String(parent_id.to_string()));
                row.insert(CREATED_AT_COLUMN.into(), at.clone());
                row.insert(UPDATED_AT_COLUMN.into(), at);
                row
            })
            .collect();
        out.insert(field.name.clone(), rows);
    }
    Ok(out)
}

fn children_for_store<'a>(
    model: &'a ResolvedModel,
    resource: &'a ResolvedResource,
    children: &BTreeMap<String, Vec<Row>>,
) -> Result<Vec<ChildRows<'a>>, AppError> {
    let mut out = Vec::new();
    for (field, collection) in resource.collections() {
        let Some(rows) = children.get(&field.name) else {
            continue;
        };
        let child = model
            .child(collection)
            .ok_or_else(|| AppError::Internal(format!("unknown child resource {}", collection.resource)))?;
        out.push(ChildRows {
            resource: child,
            foreign_key: &collection.foreign_key,
            rows: rows.clone(),
        });
    }
    Ok(out)
}

/// Wire document: camelCase keys, collections embedded under their field's wire name.
fn document(resource: &ResolvedResource, row: Row, collections: &BTreeMap<String, Vec<Row>>) -> Value {
    let mut wire = row_to_wire(row);
    for (field, _) in resource.collections() {
        let items = collections
            .get(&field.name)
            .map(|rows| rows.iter().cloned().map(|r| Value::Object(row_to_wire(r))).collect())
            .unwrap_or_default();
        wire.insert(field.wire_name.clone(), Value::Array(items));
    }
    Value::Object(wire)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{parse_list_query, Mode, RequestValidator};
    use crate::store::MemoryStore;
    use crate::test_support::sample_model;
    use serde_json::json;

    fn validated(model: &ResolvedModel, resource: &str, payload: Value, mode: Mode) -> Validated {
        let r = model.resource(resource).expect("resource");
        RequestValidator::validate(&payload, r, model, mode).expect("valid payload")
    }

    #[test]
    fn derived_total_is_sum_of_products() {
        let model = sample_model();
        let invoices = model.resource("invoices").expect("invoices");
        let input = validated(
            &model,
            "invoices",
            json!({
                "customerName": "Acme",
                "items": [
                    { "description": "Bolt", "quantity": 3, "unitPrice": 1.5 },
                    { "description": "Nut", "quantity": 2, "unitPrice": 0.25 }
                ]
            }),
            Mode::Create,
        );
        let derived = derived_values(invoices, &input.collections);
        assert_eq!(derived["total"], json!(5.0));
    }

    #[test]
    fn malformed_ids_are_rejected() {
        assert!(parse_id("not-a-uuid").is_none());
        assert_eq!(
            parse_id("0B6F6A4E-5D1C-4E5B-9A53-3F1E2D4C5B6A").as_deref(),
            Some("0b6f6a4e-5d1c-4e5b-9a53-3f1e2d4c5b6a")
        );
    }

    #[tokio::test]
    async fn create_read_update_delete_with_collection() {
        let model = sample_model();
        let invoices = model.resource("invoices").expect("invoices");
        let store = MemoryStore::new();

        let input = validated(
            &model,
            "invoices",
            json!({
                "customerName": "Acme",
                "items": [
                    { "description": "Bolt", "quantity": 3, "unitPrice": 2.0 },
                    { "description": "Nut", "quantity": 1, "unitPrice": 1.0 }
                ]
            }),
            Mode::Create,
        );
        let created = CrudService::create(&store, &model, invoices, input).await.expect("create");
        let id = created["id"].as_str().expect("id").to_string();
        assert_eq!(created["total"], json!(7.0));
        assert_eq!(created["items"][0]["invoiceId"], json!(id));
        assert_eq!(created["items"][1]["description"], "Nut");

        let read = CrudService::read(&store, &model, invoices, &id).await.expect("read").expect("exists");
        assert_eq!(read["items"].as_array().map(Vec::len), Some(2));
        assert_eq!(read["items"][0]["description"], "Bolt");

        let patch = validated(
            &model,
            "invoices",
            json!({ "items": [ { "description": "Washer", "quantity": 10, "unitPrice": 0.1 } ] }),
            Mode::Patch,
        );
        let updated = CrudService::update(&store, &model, invoices, &id, patch)
            .await
            .expect("update")
            .expect("exists");
        assert_eq!(updated["items"].as_array().map(Vec::len), Some(1));
        assert_eq!(updated["customerName"], "Acme");
        assert_eq!(updated["total"], json!(1.0));

        assert!(CrudService::delete(&store, invoices, &id).await.expect("delete"));
        assert!(CrudService::read(&store, &model, invoices, &id).await.expect("read").is_none());
        let items = model.resource("invoice_items").expect("items");
        let q = parse_list_query(items, &HashMap::new()).expect("query");
        assert!(CrudService::list(&store, &model, items, &q).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn update_of_missing_entity_is_none() {
        let model = sample_model();
        let products = model.resource("products").expect("products");
        let store = MemoryStore::new();
        let patch = validated(&model, "products", json!({ "price": 3.5 }), Mode::Patch);
        let id = uuid::Uuid::new_v4().to_string();
        assert!(CrudService::update(&store, &model, products, &id, patch).await.expect("update").is_none());
    }
}
