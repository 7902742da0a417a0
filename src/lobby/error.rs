//! Lobby request failures

/// Reasons a lobby request is refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    #[error("You are already in a game")]
    AlreadyInGame,

    #[error("Room not found")]
    RoomNotFound,

    #[error("Room is full")]
    RoomFull,

    #[error("Room code is required")]
    EmptyRoomCode,

    #[error("Could not allocate a room code, please try again")]
    CodesExhausted,

    #[error("Choose a nickname first")]
    NotRegistered,

    #[error("Unknown session")]
    UnknownSession,
}

impl LobbyError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyInGame => "already_in_game",
            Self::RoomNotFound => "room_not_found",
            Self::RoomFull => "room_full",
            Self::EmptyRoomCode => "room_code_required",
            Self::CodesExhausted => "room_codes_exhausted",
            Self::NotRegistered => "not_registered",
            Self::UnknownSession => "unknown_session",
        }
    }

    /// Errors about sessions the client cannot act on; dropped without a reply
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::NotRegistered | Self::UnknownSession)
    }
}
