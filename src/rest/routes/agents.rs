// rest/routes/agents.rs — Agent Registry routes.

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

pub async fn list_agents(State(ctx): State<Arc<AppContext>>) -> Result<Json<Value>, ApiError> {
    let agents = ctx.agents.list().await?;
    Ok(Json(json!({ "agents": agents, "count": agents.len() })))
}

pub async fn get_agent(
    State(ctx): State<Arc<AppContext>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let Some((card, _)) = ctx.agents.read_card(&name).await? else {
        return Err(ApiError::NotFound("Agent not found".to_string()));
    };
    Ok(Json(json!({
        "name": name,
        "card": card,
        "card_path": ctx.agents.card_path_string(&name),
    })))
}

#[derive(Deserialize)]
pub struct UpdateAgentRequest {
    pub state: Option<String>,
    pub current_task: Option<String>,
}

pub async fn update_agent(
    State(ctx): State<Arc<AppContext>>,
    Path(name): Path<String>,
    ApiJson(body): ApiJson<UpdateAgentRequest>,
) -> Result<Json<Value>, ApiError> {
    let result = ctx
        .agents
        .update(&name, body.state.as_deref(), body.current_task.as_deref())
        .await?;
    if result.is_none() {
        return Err(ApiError::NotFound("Agent not found".to_string()));
    }

    Ok(Json(json!({
        "message": "Agent updated",
        "name": name,
        "state": body.state,
        "current_task": body.current_task,
    })))
}
