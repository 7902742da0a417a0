//! Lobby actor - runs the lobby on a single task
//!
//! Sessions, HTTP handlers and room tick loops talk to the lobby only by
//! sending commands, so every mutation happens in arrival order on one task.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::game::params::PARAMS;
use crate::session::{RoomId, SessionId};
use crate::ws::protocol::{ClientMsg, ServerMsg};

use super::service::{Lobby, LobbyStats};

/// Queued commands before senders start waiting
const COMMAND_BUFFER: usize = 1024;

/// Per-session outbound queue
const OUTBOX_BUFFER: usize = 256;

/// Everything the lobby can be asked to do
#[derive(Debug)]
pub enum Command {
    /// New transport connection
    Connect {
        session_id: SessionId,
        outbox: mpsc::Sender<ServerMsg>,
    },
    /// Inbound client event
    Client { session_id: SessionId, msg: ClientMsg },
    /// Transport closed
    Disconnect { session_id: SessionId },
    /// Room timer fired
    Tick { room_id: RoomId, generation: u64 },
    /// Counters for the health endpoint
    Stats { reply: oneshot::Sender<LobbyStats> },
}

/// Owns the lobby and drains the command channel
pub struct LobbyActor {
    lobby: Lobby,
    commands_rx: mpsc::Receiver<Command>,
}

/// Cloneable sender side used by the rest of the server
#[derive(Clone)]
pub struct LobbyHandle {
    commands_tx: mpsc::Sender<Command>,
}

impl LobbyActor {
    /// Create the actor and the handle used to reach it
    pub fn new(seed: u64) -> (Self, LobbyHandle) {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let lobby = Lobby::new(PARAMS, seed, commands_tx.downgrade());

        (Self { lobby, commands_rx }, LobbyHandle { commands_tx })
    }

    /// Process commands until every handle is dropped
    pub async fn run(mut self) {
        info!("Lobby started");

        while let Some(command) = self.commands_rx.recv().await {
            self.lobby.handle(command);
        }

        info!("Lobby stopped");
    }
}

impl LobbyHandle {
    /// Register a connection. Returns the receiver for its outbound messages.
    pub async fn connect(&self, session_id: SessionId) -> Option<mpsc::Receiver<ServerMsg>> {
        let (outbox, outbox_rx) = mpsc::channel(OUTBOX_BUFFER);
        self.commands_tx
            .send(Command::Connect { session_id, outbox })
            .await
            .ok()?;
        Some(outbox_rx)
    }

    /// Forward a client event. Returns false if the lobby is gone.
    pub async fn send(&self, session_id: SessionId, msg: ClientMsg) -> bool {
        self.commands_tx
            .send(Command::Client { session_id, msg })
            .await
            .is_ok()
    }

    pub async fn disconnect(&self, session_id: SessionId) {
        if self
            .commands_tx
            .send(Command::Disconnect { session_id })
            .await
            .is_err()
        {
            debug!(session_id = %session_id, "Lobby gone before disconnect");
        }
    }

    pub async fn stats(&self) -> Option<LobbyStats> {
        let (reply, rx) = oneshot::channel();
        self.commands_tx.send(Command::Stats { reply }).await.ok()?;
        rx.await.ok()
    }
}
