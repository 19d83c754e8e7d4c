// rest/sse.rs — SSE bridge for the task event fan-out.
//
// GET /api/v1/events
//
// Fallback for clients that cannot hold a WebSocket open: the handler
// subscribes to the broadcast channel and forwards every task event. Late
// subscribers see only events broadcast after they connect — there is no
// backlog or replay on either transport.

use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use futures_util::stream;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

use crate::AppContext;

pub async fn task_events_sse(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    let rx = ctx.broadcaster.subscribe();

    let s = stream::unfold(rx, move |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event_str) => {
                    // Name the SSE event after the wire-level `type` field.
                    let kind = serde_json::from_str::<serde_json::Value>(&event_str)
                        .ok()
                        .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(str::to_string))
                        .unwrap_or_else(|| "event".to_string());
                    let sse_event = Event::default().data(event_str).event(kind);
                    return Some((Ok::<Event, std::convert::Infallible>(sse_event), rx));
                }
                // A slow consumer skips what it missed and keeps streaming.
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(s).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}
