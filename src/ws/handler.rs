//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::lobby::LobbyHandle;
use crate::session::SessionId;
use crate::util::rate_limit::SessionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Failure writing to the socket
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("encode failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("socket closed: {0}")]
    Socket(#[from] axum::Error),
}

/// WebSocket upgrade handler. Each connection gets a fresh session id.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let session_id = Uuid::new_v4();
    debug!(session_id = %session_id, "WebSocket upgrade");
    ws.on_upgrade(move |socket| handle_socket(socket, session_id, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, session_id: SessionId, state: AppState) {
    info!(session_id = %session_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    let welcome = ServerMsg::Welcome {
        session_id,
        server_time: unix_millis(),
    };
    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(session_id = %session_id, error = %e, "Failed to send welcome");
        return;
    }

    let Some(outbox_rx) = state.lobby.connect(session_id).await else {
        error!(session_id = %session_id, "Lobby unavailable");
        return;
    };

    let rate_limiter = SessionRateLimiter::new(state.config.input_rate_limit);
    run_session(session_id, ws_sink, ws_stream, &state.lobby, outbox_rx, rate_limiter).await;

    // Releases the nickname and tears down any room
    state.lobby.disconnect(session_id).await;

    info!(session_id = %session_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    session_id: SessionId,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    lobby: &LobbyHandle,
    mut outbox_rx: mpsc::Receiver<ServerMsg>,
    rate_limiter: SessionRateLimiter,
) {
    // Writer task: lobby outbox -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = outbox_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(session_id = %session_id, error = %e, "WebSocket send failed");
                break;
            }
        }
        debug!(session_id = %session_id, "Outbox closed");
    });

    // Reader loop: WebSocket -> lobby
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let client_msg = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(session_id = %session_id, error = %e, "Failed to parse client message");
                        continue;
                    }
                };

                if !admit(&rate_limiter, &client_msg) {
                    warn!(session_id = %session_id, "Rate limited input message");
                    continue;
                }

                if !lobby.send(session_id, client_msg).await {
                    debug!(session_id = %session_id, "Lobby channel closed");
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(session_id = %session_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(session_id = %session_id, "Client initiated close");
                break;
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Throttled events spend from the session budget; control events always pass
fn admit(rate_limiter: &SessionRateLimiter, msg: &ClientMsg) -> bool {
    !msg.is_throttled() || rate_limiter.check_input()
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), SendError> {
    let json = serde_json::to_string(msg)?;
    sink.send(Message::Text(json)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::rate_limit::DEFAULT_INPUT_RATE_LIMIT;

    #[test]
    fn test_control_events_pass_after_paddle_burst() {
        let limiter = SessionRateLimiter::new(DEFAULT_INPUT_RATE_LIMIT);

        let moves_allowed = (0..144)
            .filter(|i| admit(&limiter, &ClientMsg::PaddleMove { y: *i as f32 }))
            .count();
        assert_eq!(moves_allowed, DEFAULT_INPUT_RATE_LIMIT as usize);
        assert!(!admit(&limiter, &ClientMsg::PaddleMove { y: 10.0 }));

        assert!(admit(&limiter, &ClientMsg::ContinueAfterPoint));
        assert!(admit(&limiter, &ClientMsg::PlayerReady));
        assert!(admit(&limiter, &ClientMsg::LeaveGame));
        assert!(admit(&limiter, &ClientMsg::JoinRoom { code: "ABC234".into() }));
    }

    #[test]
    fn test_chat_and_ping_share_the_budget() {
        let limiter = SessionRateLimiter::new(2);

        assert!(admit(&limiter, &ClientMsg::ChatMessage { message: "hi".into() }));
        assert!(admit(&limiter, &ClientMsg::Ping { t: 1 }));
        assert!(!admit(&limiter, &ClientMsg::PaddleMove { y: 0.0 }));
        assert!(admit(&limiter, &ClientMsg::CreateRoom));
    }
}
