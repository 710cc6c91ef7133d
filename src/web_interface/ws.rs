//! WebSocket bridge into the signaling relay.
//!
//! Each socket gets a reader loop turning text frames into `RelayInput`s and
//! a writer task draining the connection's `Outbound` channel.

use futures::{SinkExt, StreamExt};
use log::{debug, error, info, trace, warn};
use tokio::sync::mpsc::{self, Sender};
use uuid::Uuid;
use warp::ws::{Message, WebSocket, Ws};
use warp::{Filter, Rejection, Reply};

use crate::session_management::connection::{ConnectionHandle, Outbound};
use crate::signaling::messages::ClientMessage;
use crate::signaling::relay::RelayInput;

/// GET /ws
pub fn ws_route(
    relay: Sender<RelayInput>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("ws")
        .and(warp::path::end())
        .and(warp::ws())
        .map(move |ws: Ws| {
            let relay = relay.clone();
            ws.on_upgrade(move |socket| client_connected(socket, relay))
        })
}

/// Serves one upgraded socket until either side closes it.
pub async fn client_connected(socket: WebSocket, relay: Sender<RelayInput>) {
    let id = Uuid::new_v4().to_string();
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();

    let writer_id = id.clone();
    tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            match outbound {
                Outbound::Message(message) => {
                    if let Err(e) = ws_tx.send(Message::text(message.to_json())).await {
                        warn!("[{}] websocket write failed: {}", writer_id, e);
                        break;
                    }
                }
                Outbound::Close => {
                    debug!("[{}] closing socket on relay request", writer_id);
                    if let Err(e) = ws_tx.close().await {
                        debug!("[{}] websocket close failed: {}", writer_id, e);
                    }
                    break;
                }
            }
        }
    });

    if relay
        .send(RelayInput::Connect(ConnectionHandle::new(id.clone(), tx)))
        .await
        .is_err()
    {
        error!("[{}] relay is gone, dropping socket", id);
        return;
    }

    while let Some(frame) = ws_rx.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                info!("[{}] websocket error: {}", id, e);
                break;
            }
        };
        if frame.is_close() {
            break;
        }
        let Ok(text) = frame.to_str() else {
            trace!("[{}] non-text frame ignored", id);
            continue;
        };
        trace!("[{}] -> {}", id, text);
        let Some(message) = ClientMessage::parse(text) else {
            debug!("[{}] dropped malformed frame", id);
            continue;
        };
        let input = RelayInput::Message {
            connection_id: id.clone(),
            message,
        };
        if relay.send(input).await.is_err() {
            error!("[{}] relay is gone, dropping socket", id);
            return;
        }
    }

    if relay.send(RelayInput::Disconnect(id.clone())).await.is_err() {
        warn!("[{}] relay is gone, disconnect not delivered", id);
    }
}
