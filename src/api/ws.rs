//! WebSocket feed: alert sync on connect, then alert and optimizing events.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use super::AppState;
use crate::alerts::{Alert, FeedEvent};
use crate::disruption::DisruptionOrchestrator;
use crate::session::FloorSession;

/// Messages pushed to WebSocket clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FloorWsMessage {
    /// Full alert list, newest first, plus the current optimizing flag.
    AlertsSync { alerts: Vec<Alert>, optimizing: bool },
    NewAlert { alert: Alert },
    Optimizing { optimizing: bool },
}

impl From<FeedEvent> for FloorWsMessage {
    fn from(event: FeedEvent) -> Self {
        match event {
            FeedEvent::NewAlert { alert } => Self::NewAlert { alert },
            // The feed does not know the flag; the socket loop fills it in.
            FeedEvent::AlertsSync { alerts } => Self::AlertsSync {
                alerts,
                optimizing: false,
            },
        }
    }
}

pub(super) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    info!("WebSocket client connecting");
    ws.on_upgrade(|socket| handle_socket(socket, state.session, state.orchestrator))
}

async fn send_json(socket: &mut WebSocket, msg: &FloorWsMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Failed to serialize WS message");
            true
        }
    }
}

async fn sync_message(
    session: &FloorSession,
    orchestrator: &DisruptionOrchestrator,
) -> FloorWsMessage {
    FloorWsMessage::AlertsSync {
        alerts: session.alert_list().await,
        optimizing: orchestrator.is_optimizing(),
    }
}

async fn handle_socket(
    mut socket: WebSocket,
    session: Arc<FloorSession>,
    orchestrator: Arc<DisruptionOrchestrator>,
) {
    info!("WebSocket client connected");

    // Subscribe before the initial sync so nothing raised in between is lost
    let mut alerts_rx = session.alerts().subscribe();
    let mut flag_rx = orchestrator.flag().subscribe();
    let mut optimizing = *flag_rx.borrow_and_update() > 0;

    if !send_json(&mut socket, &sync_message(&session, &orchestrator).await).await {
        warn!("Failed to send initial sync, client disconnected");
        return;
    }

    loop {
        tokio::select! {
            result = alerts_rx.recv() => {
                let msg = match result {
                    Ok(FeedEvent::AlertsSync { alerts }) => FloorWsMessage::AlertsSync {
                        alerts,
                        optimizing: orchestrator.is_optimizing(),
                    },
                    Ok(event) => event.into(),
                    Err(RecvError::Lagged(n)) => {
                        warn!(missed = n, "WS client lagged behind alert feed");
                        sync_message(&session, &orchestrator).await
                    }
                    Err(RecvError::Closed) => {
                        debug!("Alert feed closed");
                        break;
                    }
                };
                if !send_json(&mut socket, &msg).await {
                    debug!("Client disconnected during send");
                    break;
                }
            }

            changed = flag_rx.changed() => {
                if changed.is_err() {
                    debug!("Optimizing flag dropped");
                    break;
                }
                let now_optimizing = *flag_rx.borrow_and_update() > 0;
                // Count changes between two in-flight requests are not news
                if now_optimizing != optimizing {
                    optimizing = now_optimizing;
                    let msg = FloorWsMessage::Optimizing { optimizing };
                    if !send_json(&mut socket, &msg).await {
                        break;
                    }
                }
            }

            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    Some(Ok(Message::Text(text))) => {
                        debug!(text = %text.as_str(), "Ignoring client message");
                    }
                    _ => {}
                }
            }
        }
    }

    info!("WebSocket connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertKind;
    use chrono::Utc;

    #[test]
    fn ws_message_tags() {
        let alert = Alert::new(AlertKind::Info, "Schedule Optimized", "ok", Utc::now());
        let json = serde_json::to_value(FloorWsMessage::from(FeedEvent::NewAlert { alert })).unwrap();
        assert_eq!(json["type"], "new_alert");
        assert_eq!(json["alert"]["title"], "Schedule Optimized");

        let json = serde_json::to_value(FloorWsMessage::Optimizing { optimizing: true }).unwrap();
        assert_eq!(json["type"], "optimizing");
        assert_eq!(json["optimizing"], true);
    }
}
