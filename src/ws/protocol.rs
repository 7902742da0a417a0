//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::snapshot::Snapshot;
use crate::game::Side;

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMsg {
    /// Claim a nickname (once per connection)
    SetNickname { nickname: String },

    /// Pair with the next random opponent
    JoinRandom,

    /// Open a private room and get its code
    CreateRoom,

    /// Join a private room by code
    JoinRoom { code: String },

    /// Ready to start the match
    PlayerReady,

    /// Desired paddle center y
    PaddleMove { y: f32 },

    /// Losing side resumes play after a point
    ContinueAfterPoint,

    /// Leave the current room or queue
    LeaveGame,

    /// Chat line for the opponent
    ChatMessage { message: String },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

impl ClientMsg {
    /// High-rate events that count against the per-session input budget
    pub fn is_throttled(&self) -> bool {
        matches!(
            self,
            Self::PaddleMove { .. } | Self::ChatMessage { .. } | Self::Ping { .. }
        )
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome { session_id: Uuid, server_time: u64 },

    /// Nickname registered (trimmed form)
    NicknameAccepted { nickname: String },

    /// Nickname held by another session
    NicknameTaken,

    /// Private room opened
    RoomCreated { code: String },

    /// Both slots filled; sent to each session with its own view
    MatchFound { opponent: String, side: Side },

    /// Opponent signalled ready
    ReadyStatus {
        #[serde(rename = "opponentReady")]
        opponent_ready: bool,
    },

    /// Match started
    GameStart(Snapshot),

    /// Per-tick state
    GameState(Snapshot),

    /// Play resumed after a point
    GameContinue(Snapshot),

    /// A point ended; the value differs per session
    PointScored {
        #[serde(rename = "youLost")]
        you_lost: bool,
    },

    /// The other session left; the room is gone
    OpponentLeft,

    /// Relayed chat line
    ChatMessage { sender: String, message: String },

    /// Rejected request
    ErrorMessage { code: String, message: String },

    /// Number of connected sessions
    PlayerCountUpdate { count: usize },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

impl ServerMsg {
    /// Error message for a rejected request
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::ErrorMessage {
            code: code.to_string(),
            message: message.into(),
        }
    }
}
