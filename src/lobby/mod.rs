//! Rooms, readiness and the coordinating lobby service

pub mod actor;
pub mod error;
pub mod room;
pub mod service;
pub mod ticker;

pub use actor::{Command, LobbyActor, LobbyHandle};
pub use error::LobbyError;
pub use service::{Lobby, LobbyStats};
