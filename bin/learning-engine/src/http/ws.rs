// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::events::{ClientEvent, DirectEvent, PushEvent};
use crate::http::handlers::adaptations_for;
use crate::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4();
    info!(%client_id, "listener connected");

    let (mut sender, mut receiver) = socket.split();
    let mut pushed = state.events.subscribe();
    let (direct_tx, mut direct_rx) = mpsc::channel::<DirectEvent>(16);

    let greeting = DirectEvent::Connected {
        message: "Connected to adaptive learning engine".to_string(),
    };
    if direct_tx.send(greeting).await.is_err() {
        return;
    }

    let mut send_task = tokio::spawn(async move {
        loop {
            let encoded = tokio::select! {
                direct = direct_rx.recv() => match direct {
                    Some(event) => serde_json::to_string(&event),
                    None => break,
                },
                event = pushed.recv() => match event {
                    Ok(event) => serde_json::to_string(&event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(%client_id, skipped, "listener lagging, events dropped");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };
            let text = match encoded {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "failed to encode event");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_state = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            match message {
                Message::Text(text) => {
                    if let Err(message) = handle_client_event(&recv_state, text.as_str()).await {
                        debug!(%client_id, %message, "rejected listener event");
                        if direct_tx.send(DirectEvent::Error { message }).await.is_err() {
                            break;
                        }
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
    info!(%client_id, "listener disconnected");
}

/// Applies one listener message. The error string is returned to that
/// listener only; successful events are broadcast to everyone.
pub async fn handle_client_event(state: &AppState, text: &str) -> Result<PushEvent, String> {
    let event: ClientEvent =
        serde_json::from_str(text).map_err(|e| format!("Malformed event: {e}"))?;
    let push = match event {
        ClientEvent::EmotionUpdate(update) => {
            PushEvent::AdaptationsGenerated(adaptations_for(state, &update).await)
        }
        ClientEvent::QuantumCollapse(_) => {
            PushEvent::QuantumCollapsed(state.estimator.write().await.force_collapse())
        }
    };
    state.publish(push.clone());
    Ok(push)
}
