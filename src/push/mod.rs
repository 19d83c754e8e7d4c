//! WebSocket push channel.
//!
//! Every open connection receives every task event as one JSON text frame
//! `{"type": ..., "task": {...}}`: no per-subscriber filtering, no delivery
//! guarantee, no backlog for late joiners. Delivery is best-effort push to
//! whatever subscriber set exists at broadcast time; a connection that drops
//! mid-broadcast is gone from the set on the next event, nothing more.
//!
//! Incoming frames are not a command surface: pings are answered, close
//! frames end the connection, and text frames are ignored.

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::AppContext;

pub async fn start_push_server(ctx: Arc<AppContext>) -> Result<()> {
    let addr = format!("{}:{}", ctx.config.bind_address, ctx.config.push_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "push channel listening (WebSocket)");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(c) => c,
            Err(e) => {
                error!(err = %e, "accept error");
                continue;
            }
        };
        debug!(peer = %peer, "new push subscriber");
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, ctx).await {
                warn!(peer = %peer, err = %e, "push connection error");
            }
        });
    }
}

async fn handle_connection(stream: tokio::net::TcpStream, ctx: Arc<AppContext>) -> Result<()> {
    let ws = accept_async(stream).await?;
    let (mut sink, mut stream) = ws.split();

    let mut broadcast_rx = ctx.broadcaster.subscribe();

    loop {
        tokio::select! {
            // Incoming frame from the subscriber
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!(err = %e, "ws error");
                        break;
                    }
                    // Text/binary frames carry nothing for us
                    _ => {}
                }
            }
            // Outgoing task event
            event = broadcast_rx.recv() => {
                match event {
                    Ok(json) => {
                        if let Err(e) = sink.send(Message::Text(json)).await {
                            warn!(err = %e, "push send error");
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "push subscriber lagged");
                    }
                }
            }
        }
    }
    Ok(())
}
