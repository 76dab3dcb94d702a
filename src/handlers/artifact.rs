//! Derived-artifact handler: load the entity, hand it to the renderer, stream back the bytes.

use crate::config::ResolvedResource;
use crate::error::AppError;
use crate::render::artifact_name;
use crate::response::Reply;
use crate::service::CrudService;
use crate::state::AppState;

pub async fn render(
    state: &AppState,
    resource: &ResolvedResource,
    id: &str,
    artifact: &str,
) -> Result<Reply, AppError> {
    let spec = resource
        .artifact(artifact)
        .ok_or_else(|| AppError::Internal(format!("{} has no artifact {}", resource.name, artifact)))?;
    let document = CrudService::read(state.store.as_ref(), &state.model, resource, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", resource.name, id)))?;

    let name = artifact_name(&resource.name, id);
    let started = std::time::Instant::now();
    let rendered = state.renderer.render(&name, &spec.name, &document).await;
    match &rendered {
        Ok(a) => tracing::info!(
            name = %name,
            artifact = %spec.name,
            bytes = a.bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "artifact rendered"
        ),
        Err(e) => tracing::warn!(name = %name, artifact = %spec.name, error = %e, "render failed"),
    }
    let rendered = rendered?;

    Ok(Reply::Artifact {
        content_type: rendered.content_type.unwrap_or_else(|| spec.content_type.clone()),
        filename: format!("{}.{}", name, spec.extension),
        bytes: rendered.bytes,
    })
}
