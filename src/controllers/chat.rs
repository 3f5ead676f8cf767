use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::debug;

use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/chat", get(ws_handler))
}

// GET /api/chat - upgrade to the chat assistant socket
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_chat(socket, state))
}

async fn run_chat(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    while let Some(Ok(message)) = receiver.next().await {
        match message {
            Message::Text(text) => {
                let reply = state.chat.respond(text.trim()).await;
                if sender.send(Message::Text(reply.into())).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            // Pings are answered by axum automatically; ignore the rest.
            _ => {}
        }
    }
    debug!("chat session closed");
}
