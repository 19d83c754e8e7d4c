// rest/mod.rs — Public REST API server.
//
// Axum HTTP server, versioned under /api/v1, permissive CORS (the dashboard
// UI is served from a different origin). Errors leave through ApiError and
// always carry the `{error}` envelope.
//
// Endpoints:
//   GET    /api/v1/health
//   GET    /api/v1/events                  (SSE fallback for the push channel)
//   GET    /api/v1/tasks
//   POST   /api/v1/tasks
//   GET    /api/v1/tasks/{id}
//   PATCH  /api/v1/tasks/{id}
//   DELETE /api/v1/tasks/{id}              (archive — logical delete)
//   GET    /api/v1/tasks/{id}/relationships
//   POST   /api/v1/tasks/{id}/links
//   POST   /api/v1/tasks/{id}/dependencies
//   GET    /api/v1/agents
//   GET    /api/v1/agents/{name}
//   PATCH  /api/v1/agents/{name}
//   GET    /api/v1/sync/tasks
//   POST   /api/v1/sync/tasks/update
//   GET    /api/v1/sync/agents
//   GET    /api/v1/sync/agents/{name}
//   GET    /api/v1/sync/reconcile

pub mod routes;
pub mod sse;

use anyhow::Result;
use axum::{
    extract::{FromRequest, Request},
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::error::ApiError;
use crate::AppContext;

pub async fn start_rest_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!(addr = %addr, "REST API listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/api/v1/health", get(routes::health::health))
        .route("/api/v1/events", get(sse::task_events_sse))
        // Tasks
        .route(
            "/api/v1/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route(
            "/api/v1/tasks/{id}",
            get(routes::tasks::get_task)
                .patch(routes::tasks::update_task)
                .delete(routes::tasks::archive_task),
        )
        .route(
            "/api/v1/tasks/{id}/relationships",
            get(routes::tasks::get_relationships),
        )
        .route("/api/v1/tasks/{id}/links", post(routes::tasks::create_link))
        .route(
            "/api/v1/tasks/{id}/dependencies",
            post(routes::tasks::create_dependency),
        )
        // Agents
        .route("/api/v1/agents", get(routes::agents::list_agents))
        .route(
            "/api/v1/agents/{name}",
            get(routes::agents::get_agent).patch(routes::agents::update_agent),
        )
        // Sync (mirror + registry read-through)
        .route("/api/v1/sync/tasks", get(routes::sync::read_queue))
        .route("/api/v1/sync/tasks/update", post(routes::sync::update_queue))
        .route("/api/v1/sync/agents", get(routes::sync::list_agent_cards))
        .route(
            "/api/v1/sync/agents/{name}",
            get(routes::sync::get_agent_card),
        )
        .route("/api/v1/sync/reconcile", get(routes::sync::reconcile))
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

/// `Json` extractor whose rejection speaks the `{error}` envelope instead of
/// axum's default plain-text body. This is where unknown enum values in
/// request bodies become 400s.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: serde::de::DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        }
    }
}
