//! A single match: two slots, readiness and the owned simulation

use tokio::sync::mpsc;
use tracing::warn;

use crate::game::{Side, Simulation};
use crate::session::{RoomId, SessionId};

use super::actor::Command;
use super::error::LobbyError;
use super::ticker::TickLoop;

/// Room lifecycle. A terminated room is removed from the lobby, so it has
/// no variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// Private room with only its creator
    WaitingForOpponent,
    /// Both slots filled, not everyone ready yet
    Lobby,
    /// Tick loop running
    Running,
    /// A point was scored; waiting for the loser to continue
    PointPause { loser: Side },
}

pub struct Room {
    pub id: RoomId,
    slots: [Option<SessionId>; 2],
    pub phase: RoomPhase,
    pub simulation: Option<Simulation>,
    pub started: bool,
    ticker: Option<TickLoop>,
    generation: u64,
}

impl Room {
    /// Private room holding only its creator (left slot)
    pub fn open(id: RoomId, host: SessionId) -> Self {
        Self::with_slots(id, [Some(host), None], RoomPhase::WaitingForOpponent)
    }

    /// Room formed by matchmaking with both slots filled
    pub fn paired(id: RoomId, left: SessionId, right: SessionId) -> Self {
        Self::with_slots(id, [Some(left), Some(right)], RoomPhase::Lobby)
    }

    fn with_slots(id: RoomId, slots: [Option<SessionId>; 2], phase: RoomPhase) -> Self {
        Self {
            id,
            slots,
            phase,
            simulation: None,
            started: false,
            ticker: None,
            generation: 0,
        }
    }

    /// Put a second session in the right slot
    pub fn seat(&mut self, session_id: SessionId) -> Result<Side, LobbyError> {
        if self.is_full() {
            return Err(LobbyError::RoomFull);
        }
        self.slots[Side::Right.slot()] = Some(session_id);
        self.phase = RoomPhase::Lobby;
        Ok(Side::Right)
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    pub fn occupant(&self, side: Side) -> Option<SessionId> {
        self.slots[side.slot()]
    }

    pub fn side_of(&self, session_id: SessionId) -> Option<Side> {
        Side::BOTH
            .into_iter()
            .find(|side| self.occupant(*side) == Some(session_id))
    }

    pub fn opponent_of(&self, session_id: SessionId) -> Option<SessionId> {
        let side = self.side_of(session_id)?;
        self.occupant(side.opponent())
    }

    /// Filled slots in slot order
    pub fn members(&self) -> impl Iterator<Item = SessionId> + '_ {
        self.slots.iter().flatten().copied()
    }

    /// Start the tick timer. Refused while one is already running.
    pub fn start_loop(&mut self, commands: &mpsc::WeakSender<Command>) -> bool {
        if self.ticker.is_some() {
            warn!(room_id = %self.id, "Tick loop already running");
            return false;
        }
        self.generation += 1;
        self.ticker = Some(TickLoop::spawn(self.id.clone(), self.generation, commands.clone()));
        true
    }

    /// Stop the tick timer if it is running
    pub fn stop_loop(&mut self) -> bool {
        match self.ticker.take() {
            Some(ticker) => {
                ticker.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.is_some()
    }

    #[cfg(test)]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a tick from the given timer generation should run.
    /// Ticks queued before a stop carry an old generation.
    pub fn accepts_tick(&self, generation: u64) -> bool {
        self.phase == RoomPhase::Running
            && self
                .ticker
                .as_ref()
                .is_some_and(|t| t.generation() == generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_open_room_then_seat() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let mut room = Room::open("ABC234".into(), a);

        assert_eq!(room.phase, RoomPhase::WaitingForOpponent);
        assert!(!room.is_full());
        assert_eq!(room.opponent_of(a), None);

        assert_eq!(room.seat(b), Ok(Side::Right));
        assert_eq!(room.phase, RoomPhase::Lobby);
        assert_eq!(room.seat(c), Err(LobbyError::RoomFull));
        assert_eq!(room.members().collect::<Vec<_>>(), vec![a, b]);
    }

    #[test]
    fn test_sides_and_opponents() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let room = Room::paired("m-1".into(), a, b);

        assert_eq!(room.side_of(a), Some(Side::Left));
        assert_eq!(room.side_of(b), Some(Side::Right));
        assert_eq!(room.side_of(Uuid::new_v4()), None);
        assert_eq!(room.opponent_of(a), Some(b));
        assert_eq!(room.opponent_of(b), Some(a));
    }

    #[tokio::test]
    async fn test_loop_start_and_stop_are_guarded() {
        let (tx, _rx) = mpsc::channel(4);
        let weak = tx.downgrade();
        let mut room = Room::paired("m-1".into(), Uuid::new_v4(), Uuid::new_v4());
        room.phase = RoomPhase::Running;

        assert!(room.start_loop(&weak));
        assert!(!room.start_loop(&weak));
        assert_eq!(room.generation(), 1);
        assert!(room.accepts_tick(1));
        assert!(!room.accepts_tick(0));

        assert!(room.stop_loop());
        assert!(!room.stop_loop());
        assert!(!room.accepts_tick(1));

        assert!(room.start_loop(&weak));
        assert_eq!(room.generation(), 2);
        assert!(!room.accepts_tick(1));
        assert!(room.accepts_tick(2));
        room.stop_loop();
    }
}
