//! Connected sessions and nickname ownership

use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::ws::protocol::ServerMsg;

use super::RegistrationError;

pub type SessionId = Uuid;
pub type RoomId = String;

/// Longest accepted nickname, in characters
pub const MAX_NICKNAME_LEN: usize = 15;

/// One connected participant
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub nickname: Option<String>,
    pub room: Option<RoomId>,
    pub ready: bool,
    outbox: mpsc::Sender<ServerMsg>,
}

impl Session {
    fn new(id: SessionId, outbox: mpsc::Sender<ServerMsg>) -> Self {
        Self {
            id,
            nickname: None,
            room: None,
            ready: false,
            outbox,
        }
    }

    /// Queue a message for this session without waiting
    pub fn send(&self, msg: ServerMsg) {
        match self.outbox.try_send(msg) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(session_id = %self.id, "Outbound queue full, dropping message");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(session_id = %self.id, "Outbound queue closed");
            }
        }
    }

    /// Leave whatever room the session was in
    pub fn clear_room(&mut self) {
        self.room = None;
        self.ready = false;
    }

    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or("anonymous")
    }
}

/// Trim and validate a requested nickname
pub fn normalize_nickname(raw: &str) -> Result<String, RegistrationError> {
    let nickname = raw.trim();
    if nickname.is_empty() {
        return Err(RegistrationError::Empty);
    }
    if nickname.chars().count() > MAX_NICKNAME_LEN {
        return Err(RegistrationError::TooLong);
    }
    Ok(nickname.to_string())
}

/// Registry of connected sessions
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    sessions: HashMap<SessionId, Session>,
    nicknames: HashSet<String>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a freshly connected session
    pub fn connect(&mut self, id: SessionId, outbox: mpsc::Sender<ServerMsg>) {
        if let Some(old) = self.sessions.insert(id, Session::new(id, outbox)) {
            // Transport ids are unique; a duplicate means the old record is dead
            if let Some(nickname) = old.nickname {
                self.nicknames.remove(&nickname);
            }
        }
    }

    /// Claim a nickname for a session. Returns the stored (trimmed) form.
    pub fn register(&mut self, id: SessionId, raw: &str) -> Result<String, RegistrationError> {
        let nickname = normalize_nickname(raw)?;

        let Some(session) = self.sessions.get_mut(&id) else {
            return Err(RegistrationError::UnknownSession);
        };
        if session.nickname.is_some() {
            return Err(RegistrationError::AlreadyRegistered);
        }
        if !self.nicknames.insert(nickname.clone()) {
            return Err(RegistrationError::Taken);
        }

        session.nickname = Some(nickname.clone());
        Ok(nickname)
    }

    /// Drop a session and release its nickname immediately
    pub fn disconnect(&mut self, id: SessionId) -> Option<Session> {
        let session = self.sessions.remove(&id)?;
        if let Some(nickname) = &session.nickname {
            self.nicknames.remove(nickname);
        }
        Some(session)
    }

    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    /// Session that has completed registration
    pub fn registered(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id).filter(|s| s.nickname.is_some())
    }

    #[cfg(test)]
    pub fn is_taken(&self, nickname: &str) -> bool {
        self.nicknames.contains(nickname)
    }

    /// Send a message to a single session, if it is still connected
    pub fn send_to(&self, id: &SessionId, msg: ServerMsg) {
        if let Some(session) = self.sessions.get(id) {
            session.send(msg);
        }
    }

    /// Send a message to every connected session
    pub fn broadcast(&self, msg: &ServerMsg) {
        for session in self.sessions.values() {
            session.send(msg.clone());
        }
    }

    pub fn connected_count(&self) -> usize {
        self.sessions.len()
    }
}
