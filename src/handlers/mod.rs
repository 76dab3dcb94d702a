//! Generic handlers. Each returns exactly one declared [`Reply`] variant or an [`AppError`].

pub mod artifact;
pub mod entity;

use crate::config::ResolvedResource;
use crate::error::AppError;
use crate::response::Reply;
use crate::schema::{ListQuery, Validated};
use crate::state::AppState;

/// Validated request for one matched route.
#[derive(Debug)]
pub enum HandlerInput {
    Create(Validated),
    Read { id: String },
    Update { id: String, input: Validated },
    Delete { id: String },
    List(ListQuery),
    Render { id: String, artifact: String },
}

pub async fn invoke(state: &AppState, resource: &ResolvedResource, input: HandlerInput) -> Result<Reply, AppError> {
    match input {
        HandlerInput::Create(v) => entity::create(state, resource, v).await,
        HandlerInput::Read { id } => entity::read(state, resource, &id).await,
        HandlerInput::Update { id, input } => entity::update(state, resource, &id, input).await,
        HandlerInput::Delete { id } => entity::delete(state, resource, &id).await,
        HandlerInput::List(q) => entity::list(state, resource, q).await,
        HandlerInput::Render { id, artifact } => artifact::render(state, resource, &id, &artifact).await,
    }
}
