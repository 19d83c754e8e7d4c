// rest/routes/sync.rs — Task Queue Mirror + Agent Registry read-through.
//
// The mirror and the registry are independent side-channels: nothing here
// touches the task store or emits events, except the reconcile report which
// reads (never writes) both worlds.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::ApiError;
use crate::rest::ApiJson;
use crate::AppContext;

pub async fn read_queue(State(ctx): State<Arc<AppContext>>) -> Result<Json<Value>, ApiError> {
    if !ctx.queue.exists() {
        return Err(ApiError::NotFound("TASK-QUEUE.md not found".to_string()));
    }

    let tasks = ctx.queue.read().await?;
    let last_modified = ctx.queue.last_modified().await?;
    Ok(Json(json!({
        "file": ctx.queue.path().display().to_string(),
        "tasks": tasks,
        "count": tasks.len(),
        "last_modified": last_modified,
    })))
}

#[derive(Deserialize)]
pub struct QueueUpdateRequest {
    pub id: String,
    pub status: Option<String>,
    pub notes: Option<String>,
}

pub async fn update_queue(
    State(ctx): State<Arc<AppContext>>,
    ApiJson(body): ApiJson<QueueUpdateRequest>,
) -> Result<Json<Value>, ApiError> {
    if body.id.trim().is_empty() {
        return Err(ApiError::BadRequest("Task ID required".to_string()));
    }
    if !ctx.queue.exists() {
        return Err(ApiError::NotFound("TASK-QUEUE.md not found".to_string()));
    }

    let updated = ctx
        .queue
        .update(&body.id, body.status.as_deref(), body.notes.as_deref())
        .await?;
    if !updated {
        return Err(ApiError::NotFound(format!("Task {} not found", body.id)));
    }

    Ok(Json(json!({
        "message": "Task updated",
        "id": body.id,
        "status": body.status,
        "notes": body.notes,
    })))
}

pub async fn list_agent_cards(State(ctx): State<Arc<AppContext>>) -> Result<Json<Value>, ApiError> {
    if !ctx.agents.dir_exists() {
        return Err(ApiError::NotFound("Agents directory not found".to_string()));
    }

    let agents = ctx.agents.list().await?;
    Ok(Json(json!({
        "agents": agents,
        "count": agents.len(),
        "directory": ctx.agents.dir().display().to_string(),
    })))
}

pub async fn get_agent_card(
    State(ctx): State<Arc<AppContext>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let Some((card, last_modified)) = ctx.agents.read_card(&name).await? else {
        return Err(ApiError::NotFound("Agent not found".to_string()));
    };
    Ok(Json(json!({
        "name": name,
        "card": card,
        "card_path": ctx.agents.card_path_string(&name),
        "last_modified": last_modified,
    })))
}

/// On-demand drift report between the mirror and the store. Read-only and
/// idempotent — conflicts are reported, never resolved.
pub async fn reconcile(State(ctx): State<Arc<AppContext>>) -> Result<Json<Value>, ApiError> {
    let report = ctx.queue.reconcile(ctx.tasks.store()).await?;
    Ok(Json(json!(report)))
}
