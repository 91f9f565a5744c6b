//! WebSocket upgrade handler.
//!
//! The socket is split and adapted into the hub's frame sink and stream;
//! admission (credential check, duplicate rejection) happens in the hub,
//! which closes the socket itself when it refuses the connection.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt, future};
use tracing::debug;

use gateway_realtime::{ConnectRequest, Frame};

use crate::state::AppState;

/// GET /ws?session_id={id}&token={access}
pub async fn ws_upgrade(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
    Query(request): Query<ConnectRequest>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(state, request, socket))
}

async fn handle_socket(state: AppState, request: ConnectRequest, socket: WebSocket) {
    let (ws_tx, ws_rx) = socket.split();

    let sink = ws_tx.with(|frame: Frame| future::ready(Ok::<_, axum::Error>(to_message(frame))));
    let stream = ws_rx.map(|result| result.map(to_frame));

    if let Err(e) = state.hub.admit(request, sink, stream).await {
        debug!(error = %e, "WebSocket admission failed");
    }
}

fn to_frame(message: Message) -> Frame {
    match message {
        Message::Text(text) => Frame::Text(text.as_str().to_owned()),
        Message::Binary(data) => Frame::Binary(data.to_vec()),
        // The socket has already queued its own pong; the client only needs
        // to see the activity.
        Message::Ping(data) | Message::Pong(data) => Frame::Pong(data.to_vec()),
        Message::Close(_) => Frame::Close,
    }
}

fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(data) => Message::Binary(data.into()),
        Frame::Ping(data) => Message::Ping(data.into()),
        Frame::Pong(data) => Message::Pong(data.into()),
        Frame::Close => Message::Close(None),
    }
}
