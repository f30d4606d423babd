//! Bidirectional event channel: client requests in, session events out.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use server_api::ensure_user;
use shared::{
    domain::{ConnectionId, UserId},
    error::{ApiError, ErrorCode},
    protocol::{ClientRequest, ServerEvent},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, info, warn};

use crate::{api::UserQuery, app_state::AppState};

pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(q): Query<UserQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket, UserId(q.user_id)))
}

async fn ws_connection(state: Arc<AppState>, socket: WebSocket, user_id: UserId) {
    let connection_id = ConnectionId::new();
    let (mut sender, mut receiver) = socket.split();

    let attached = match ensure_user(&state.api, user_id).await {
        Ok(()) => state.api.sessions.attach(user_id).await,
        Err(err) => Err(err),
    };
    let session = match attached {
        Ok(session) => session,
        Err(err) => {
            warn!(%connection_id, user_id = user_id.0, message = %err.message, "ws: rejected");
            if let Ok(text) = serde_json::to_string(&ServerEvent::Error(err)) {
                let _ = sender.send(Message::Text(text)).await;
            }
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };
    info!(%connection_id, user_id = user_id.0, "ws: connected");

    let events_rx = session.lock().await.subscribe();
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<ServerEvent>();

    let send_task = tokio::spawn(async move {
        let mut events = BroadcastStream::new(events_rx);
        loop {
            let event = tokio::select! {
                next = events.next() => match next {
                    Some(Ok(event)) => event,
                    Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                        warn!(%connection_id, skipped, "ws: subscriber lagged");
                        continue;
                    }
                    None => break,
                },
                reply = reply_rx.recv() => match reply {
                    Some(event) => event,
                    None => break,
                },
            };
            let text = match serde_json::to_string(&event) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        let request = match serde_json::from_str::<ClientRequest>(&text) {
            Ok(request) => request,
            Err(err) => {
                let _ = reply_tx.send(ServerEvent::Error(ApiError::new(
                    ErrorCode::Validation,
                    format!("invalid client request: {err}"),
                )));
                continue;
            }
        };
        debug!(%connection_id, user_id = user_id.0, ?request, "ws: request");
        let result = session.lock().await.handle(request).await;
        if let Err(err) = result {
            let _ = reply_tx.send(ServerEvent::Error(err));
        }
    }

    send_task.abort();
    state.api.sessions.detach(user_id).await;
    info!(%connection_id, user_id = user_id.0, "ws: disconnected");
}
