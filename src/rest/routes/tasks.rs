// rest/routes/tasks.rs — Task CRUD routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::ApiError;
use crate::rest::ApiJson;
use crate::tasks::model::{NewTask, TaskFilter, TaskPatch};
use crate::AppContext;

pub async fn list_tasks(
    State(ctx): State<Arc<AppContext>>,
    Query(filter): Query<TaskFilter>,
) -> Result<Json<Value>, ApiError> {
    let tasks = ctx.tasks.list(&filter).await?;
    Ok(Json(json!({ "tasks": tasks, "count": tasks.len() })))
}

pub async fn get_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let task = ctx.tasks.get(&id).await?;
    Ok(Json(json!(task)))
}

pub async fn create_task(
    State(ctx): State<Arc<AppContext>>,
    ApiJson(body): ApiJson<NewTask>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let task = ctx.tasks.create(body).await?;
    Ok((StatusCode::CREATED, Json(json!(task))))
}

pub async fn update_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<TaskPatch>,
) -> Result<Json<Value>, ApiError> {
    let task = ctx.tasks.update(&id, &patch).await?;
    Ok(Json(json!(task)))
}

pub async fn archive_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let task = ctx.tasks.archive(&id).await?;
    Ok(Json(json!({
        "message": "Task archived",
        "id": id,
        "task": task,
    })))
}

pub async fn get_relationships(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let dependencies = ctx.tasks.relationships(&id).await?;
    Ok(Json(json!({ "dependencies": dependencies })))
}

#[derive(Deserialize)]
pub struct CreateLinkRequest {
    pub link_type: String,
    pub link_url: Option<String>,
    pub link_text: Option<String>,
}

pub async fn create_link(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<CreateLinkRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let link_id = ctx
        .tasks
        .link(
            &id,
            &body.link_type,
            body.link_url.as_deref(),
            body.link_text.as_deref(),
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Link created", "id": link_id })),
    ))
}

#[derive(Deserialize)]
pub struct CreateDependencyRequest {
    pub depends_on: String,
}

pub async fn create_dependency(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<CreateDependencyRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let edge = ctx.tasks.add_dependency(&id, &body.depends_on).await?;
    Ok((StatusCode::CREATED, Json(json!(edge))))
}
