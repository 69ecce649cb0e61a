use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::geo;
use crate::models::events::OfferBroadcast;
use crate::state::AppState;
use crate::zones::zone_transition;

/// Messages a rider client sends over the zone feed socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RiderMessage {
    Position { lat: f64, lng: f64 },
}

/// Messages the zone feed pushes to the rider client.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ZoneFeedMessage {
    /// Acknowledges a zone subscription change.
    Zone {
        cell: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        left: Option<String>,
    },
    Offer(OfferBroadcast),
    Error { message: String },
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// One connected rider. The session owns the rider's zone membership: each
/// reported position is bucketed at precision 5, and crossing into a new
/// cell swaps the broadcast subscription (dropping the old receiver is the
/// unsubscribe). Offers published to the subscribed cell are forwarded.
struct ZoneSession {
    cell: Option<String>,
    rx: Option<broadcast::Receiver<OfferBroadcast>>,
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut session = ZoneSession { cell: None, rx: None };

    info!("rider zone session connected");
    state.metrics.zone_sessions.inc();

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                let Some(Ok(msg)) = incoming else {
                    break;
                };
                if handle_client_message(msg, &state, &mut session, &mut sender)
                    .await
                    .is_err()
                {
                    break;
                }
            }
            offer = recv_offer(&mut session.rx) => {
                match offer {
                    Ok(payload) => {
                        if send_json(&mut sender, &ZoneFeedMessage::Offer(payload))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "zone session lagged behind offer feed");
                    }
                    Err(RecvError::Closed) => {
                        session.rx = None;
                    }
                }
            }
        }
    }

    state.metrics.zone_sessions.dec();
    info!("rider zone session disconnected");
}

/// Awaits the next offer on the subscribed topic, or never resolves while
/// the session has no subscription.
async fn recv_offer(
    rx: &mut Option<broadcast::Receiver<OfferBroadcast>>,
) -> Result<OfferBroadcast, RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn handle_client_message(
    msg: Message,
    state: &AppState,
    session: &mut ZoneSession,
    sender: &mut SplitSink<WebSocket, Message>,
) -> Result<(), axum::Error> {
    let text = match msg {
        Message::Text(text) => text,
        Message::Close(_) => return Err(axum::Error::new("client closed")),
        // Pings are answered by axum; ignore everything else.
        _ => return Ok(()),
    };

    let parsed: Result<RiderMessage, _> = serde_json::from_str(&text);
    let RiderMessage::Position { lat, lng } = match parsed {
        Ok(msg) => msg,
        Err(err) => {
            warn!(error = %err, "malformed zone feed message");
            return send_json(
                sender,
                &ZoneFeedMessage::Error {
                    message: "malformed message".to_string(),
                },
            )
            .await;
        }
    };

    if geo::validate(lat, lng).is_err() {
        return send_json(
            sender,
            &ZoneFeedMessage::Error {
                message: "coordinates out of range".to_string(),
            },
        )
        .await;
    }

    let next_cell = geo::encode(lat, lng, geo::RIDER_ZONE_PRECISION);
    let change = zone_transition(session.cell.as_deref(), &next_cell);
    if change.is_noop() {
        return Ok(());
    }

    if let Some(cell) = &change.subscribe {
        session.rx = Some(state.zones.subscribe(cell));
        session.cell = Some(cell.clone());
        debug!(cell = %cell, left = ?change.unsubscribe, "zone subscription moved");
    }

    send_json(
        sender,
        &ZoneFeedMessage::Zone {
            cell: next_cell,
            left: change.unsubscribe,
        },
    )
    .await
}

async fn send_json(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ZoneFeedMessage,
) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(err) => {
            warn!(error = %err, "failed to serialize zone feed message");
            return Ok(());
        }
    };
    sender.send(Message::Text(json)).await
}
