//! Entity handlers: create, read, update, delete, list. Inputs arrive already validated.

use crate::config::ResolvedResource;
use crate::error::AppError;
use crate::response::{ListMeta, Reply};
use crate::schema::{ListQuery, Validated};
use crate::service::CrudService;
use crate::state::AppState;

fn not_found(resource: &ResolvedResource, id: &str) -> AppError {
    AppError::NotFound(format!("{} {}", resource.name, id))
}

pub async fn create(state: &AppState, resource: &ResolvedResource, input: Validated) -> Result<Reply, AppError> {
    let created = CrudService::create(state.store.as_ref(), &state.model, resource, input).await?;
    Ok(Reply::Created(created))
}

pub async fn read(state: &AppState, resource: &ResolvedResource, id: &str) -> Result<Reply, AppError> {
    CrudService::read(state.store.as_ref(), &state.model, resource, id)
        .await?
        .map(Reply::Found)
        .ok_or_else(|| not_found(resource, id))
}

pub async fn update(
    state: &AppState,
    resource: &ResolvedResource,
    id: &str,
    input: Validated,
) -> Result<Reply, AppError> {
    CrudService::update(state.store.as_ref(), &state.model, resource, id, input)
        .await?
        .map(Reply::Found)
        .ok_or_else(|| not_found(resource, id))
}

pub async fn delete(state: &AppState, resource: &ResolvedResource, id: &str) -> Result<Reply, AppError> {
    if CrudService::delete(state.store.as_ref(), resource, id).await? {
        Ok(Reply::NoContent)
    } else {
        Err(not_found(resource, id))
    }
}

pub async fn list(state: &AppState, resource: &ResolvedResource, query: ListQuery) -> Result<Reply, AppError> {
    let data = CrudService::list(state.store.as_ref(), &state.model, resource, &query).await?;
    let meta = ListMeta {
        count: data.len(),
        limit: query.page.limit,
        offset: query.page.offset,
    };
    Ok(Reply::Page { data, meta })
}
