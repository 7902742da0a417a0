//! Session identity

pub mod registry;

pub use registry::{IdentityRegistry, RoomId, Session, SessionId};

/// Nickname registration failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("Nickname cannot be empty")]
    Empty,

    #[error("Nickname must be at most 15 characters")]
    TooLong,

    #[error("Nickname is already taken")]
    Taken,

    #[error("Nickname is already set")]
    AlreadyRegistered,

    #[error("Unknown session")]
    UnknownSession,
}

impl RegistrationError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Empty => "nickname_empty",
            Self::TooLong => "nickname_too_long",
            Self::Taken => "nickname_taken",
            Self::AlreadyRegistered => "nickname_already_set",
            Self::UnknownSession => "unknown_session",
        }
    }
}
