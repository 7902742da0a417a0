//! Lobby service - owns sessions, the waiting queue and every room
//!
//! All mutation goes through `Lobby::handle`, which the lobby actor calls
//! for one command at a time. Rooms never share state with each other.

use std::collections::HashMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::game::params::PhysicsParams;
use crate::game::{Side, Simulation};
use crate::matchmaking::code::{generate_unique_room_code, normalize_room_code, random_room_id};
use crate::matchmaking::{QueueOutcome, WaitingQueue};
use crate::session::{IdentityRegistry, RegistrationError, RoomId, SessionId};
use crate::ws::protocol::{ClientMsg, ServerMsg};

use super::actor::Command;
use super::error::LobbyError;
use super::room::{Room, RoomPhase};

/// Longest relayed chat line, in characters
pub const MAX_CHAT_LEN: usize = 200;

/// Point-in-time counters for the health endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LobbyStats {
    pub connected_sessions: usize,
    pub waiting_sessions: usize,
    pub rooms: usize,
    pub running_rooms: usize,
    pub longest_wait_secs: u64,
}

/// The coordinating service object
pub struct Lobby {
    registry: IdentityRegistry,
    queue: WaitingQueue,
    rooms: HashMap<RoomId, Room>,
    params: PhysicsParams,
    rng: ChaCha8Rng,
    /// Used by room tick loops to reach the lobby actor
    commands: mpsc::WeakSender<Command>,
}

impl Lobby {
    pub fn new(params: PhysicsParams, seed: u64, commands: mpsc::WeakSender<Command>) -> Self {
        Self {
            registry: IdentityRegistry::new(),
            queue: WaitingQueue::new(),
            rooms: HashMap::new(),
            params,
            rng: ChaCha8Rng::seed_from_u64(seed),
            commands,
        }
    }

    /// Apply one command
    pub fn handle(&mut self, command: Command) {
        match command {
            Command::Connect { session_id, outbox } => self.connect(session_id, outbox),
            Command::Client { session_id, msg } => self.handle_client_msg(session_id, msg),
            Command::Disconnect { session_id } => self.disconnect(session_id),
            Command::Tick { room_id, generation } => self.tick(&room_id, generation),
            Command::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
        }
    }

    /// Translate a client event into the matching lobby operation
    pub fn handle_client_msg(&mut self, session_id: SessionId, msg: ClientMsg) {
        let result = match msg {
            ClientMsg::SetNickname { nickname } => {
                self.set_nickname(session_id, &nickname);
                Ok(())
            }
            ClientMsg::JoinRandom => self.enqueue_random(session_id).map(|_| ()),
            ClientMsg::CreateRoom => self.create_room(session_id).map(|_| ()),
            ClientMsg::JoinRoom { code } => self.join_room(session_id, &code).map(|_| ()),
            ClientMsg::PlayerReady => {
                self.player_ready(session_id);
                Ok(())
            }
            ClientMsg::PaddleMove { y } => {
                self.paddle_move(session_id, y);
                Ok(())
            }
            ClientMsg::ContinueAfterPoint => {
                self.continue_after_point(session_id);
                Ok(())
            }
            ClientMsg::LeaveGame => {
                self.leave(session_id);
                Ok(())
            }
            ClientMsg::ChatMessage { message } => {
                self.chat(session_id, &message);
                Ok(())
            }
            ClientMsg::Ping { t } => {
                self.registry.send_to(&session_id, ServerMsg::Pong { t });
                Ok(())
            }
        };

        if let Err(e) = result {
            if e.is_silent() {
                debug!(session_id = %session_id, error = %e, "Dropped request");
            } else {
                debug!(session_id = %session_id, error = %e, "Rejected request");
                self.registry
                    .send_to(&session_id, ServerMsg::error(e.code(), e.to_string()));
            }
        }
    }

    /// Track a new connection and publish the new count
    pub fn connect(&mut self, session_id: SessionId, outbox: mpsc::Sender<ServerMsg>) {
        self.registry.connect(session_id, outbox);
        info!(session_id = %session_id, connected = self.registry.connected_count(), "Session connected");
        self.publish_player_count();
    }

    /// Tear down everything a session owns
    pub fn disconnect(&mut self, session_id: SessionId) {
        self.leave(session_id);
        if let Some(session) = self.registry.disconnect(session_id) {
            info!(
                session_id = %session_id,
                nickname = session.display_name(),
                "Session disconnected"
            );
            self.publish_player_count();
        }
    }

    /// Registration exchange. Only the caller hears the result.
    pub fn set_nickname(&mut self, session_id: SessionId, raw: &str) {
        match self.registry.register(session_id, raw) {
            Ok(nickname) => {
                info!(session_id = %session_id, nickname = %nickname, "Nickname registered");
                self.registry
                    .send_to(&session_id, ServerMsg::NicknameAccepted { nickname });
            }
            Err(RegistrationError::Taken) => {
                self.registry.send_to(&session_id, ServerMsg::NicknameTaken);
            }
            Err(RegistrationError::UnknownSession) => {
                debug!(session_id = %session_id, "Nickname for unknown session");
            }
            Err(e) => {
                self.registry
                    .send_to(&session_id, ServerMsg::error(e.code(), e.to_string()));
            }
        }
    }

    /// Pair with the longest-waiting session or join the queue
    pub fn enqueue_random(&mut self, session_id: SessionId) -> Result<QueueOutcome, LobbyError> {
        self.ensure_free(session_id)?;

        loop {
            match self.queue.join(session_id) {
                QueueOutcome::Paired { left, right } => {
                    if !self.is_free(left) {
                        // Stale head; keep looking
                        warn!(session_id = %left, "Dropped unavailable session from queue");
                        continue;
                    }
                    let room_id = self.unused_room_id();
                    self.rooms
                        .insert(room_id.clone(), Room::paired(room_id.clone(), left, right));
                    self.assign(left, &room_id);
                    self.assign(right, &room_id);

                    info!(room_id = %room_id, left = %left, right = %right, "Random match formed");
                    self.announce_match(&room_id);
                    return Ok(QueueOutcome::Paired { left, right });
                }
                outcome => {
                    debug!(session_id = %session_id, queue_size = self.queue.len(), "Waiting for opponent");
                    return Ok(outcome);
                }
            }
        }
    }

    /// Open a private room and hand its code to the creator
    pub fn create_room(&mut self, session_id: SessionId) -> Result<RoomId, LobbyError> {
        self.ensure_free(session_id)?;

        let rooms = &self.rooms;
        let code = generate_unique_room_code(&mut self.rng, |c| rooms.contains_key(c))
            .ok_or(LobbyError::CodesExhausted)?;

        self.queue.remove(session_id);
        self.rooms
            .insert(code.clone(), Room::open(code.clone(), session_id));
        self.assign(session_id, &code);

        info!(room_id = %code, session_id = %session_id, "Room created");
        self.registry
            .send_to(&session_id, ServerMsg::RoomCreated { code: code.clone() });
        Ok(code)
    }

    /// Take the free slot of a private room
    pub fn join_room(&mut self, session_id: SessionId, raw_code: &str) -> Result<RoomId, LobbyError> {
        self.ensure_free(session_id)?;
        let code = normalize_room_code(raw_code).ok_or(LobbyError::EmptyRoomCode)?;

        let room = self.rooms.get_mut(&code).ok_or(LobbyError::RoomNotFound)?;
        room.seat(session_id)?;

        self.queue.remove(session_id);
        self.assign(session_id, &code);

        info!(room_id = %code, session_id = %session_id, "Joined room");
        self.announce_match(&code);
        Ok(code)
    }

    /// Mark a session ready; start the match once both are
    pub fn player_ready(&mut self, session_id: SessionId) {
        let Some((room_id, side)) = self.seat_of(session_id) else {
            debug!(session_id = %session_id, "Ready outside a room");
            return;
        };
        let Some(room) = self.rooms.get_mut(&room_id) else {
            return;
        };
        if room.phase != RoomPhase::Lobby {
            debug!(room_id = %room_id, phase = ?room.phase, "Ready ignored");
            return;
        }

        let Some(session) = self.registry.get_mut(&session_id) else {
            return;
        };
        if session.ready {
            return;
        }
        session.ready = true;

        let Some(opponent) = room.occupant(side.opponent()) else {
            return;
        };
        self.registry
            .send_to(&opponent, ServerMsg::ReadyStatus { opponent_ready: true });

        let opponent_ready = self.registry.get(&opponent).is_some_and(|s| s.ready);
        if opponent_ready && !room.started {
            let simulation = Simulation::new(self.params, &mut self.rng);
            let snapshot = simulation.snapshot();
            room.simulation = Some(simulation);
            room.started = true;
            room.phase = RoomPhase::Running;

            for member in room.members() {
                self.registry
                    .send_to(&member, ServerMsg::GameStart(snapshot.clone()));
            }
            room.start_loop(&self.commands);
            info!(room_id = %room_id, "Match started");
        }
    }

    /// Write the session's paddle immediately (last write wins between ticks)
    pub fn paddle_move(&mut self, session_id: SessionId, center_y: f32) {
        let Some((room_id, side)) = self.seat_of(session_id) else {
            return;
        };
        let Some(room) = self.rooms.get_mut(&room_id) else {
            return;
        };
        let ticking = room.is_ticking();
        let Some(simulation) = room.simulation.as_mut() else {
            return;
        };

        simulation.move_paddle(side, center_y);

        // A running loop carries the move on its next tick
        if !ticking {
            let msg = ServerMsg::GameState(simulation.snapshot());
            for member in room.members() {
                self.registry.send_to(&member, msg.clone());
            }
        }
    }

    /// Resume after a point. Only the session that lost the point can do this.
    pub fn continue_after_point(&mut self, session_id: SessionId) {
        let Some((room_id, side)) = self.seat_of(session_id) else {
            return;
        };
        let Some(room) = self.rooms.get_mut(&room_id) else {
            return;
        };
        if room.phase != (RoomPhase::PointPause { loser: side }) {
            debug!(room_id = %room_id, session_id = %session_id, phase = ?room.phase, "Continue ignored");
            return;
        }
        let Some(simulation) = room.simulation.as_mut() else {
            return;
        };

        simulation.serve(&mut self.rng);
        let snapshot = simulation.snapshot();
        room.phase = RoomPhase::Running;

        for member in room.members() {
            self.registry
                .send_to(&member, ServerMsg::GameContinue(snapshot.clone()));
        }
        room.start_loop(&self.commands);
        debug!(room_id = %room_id, "Play resumed");
    }

    /// Leave the queue and any room. The room is destroyed and the
    /// opponent, if any, is told and freed to play again.
    pub fn leave(&mut self, session_id: SessionId) {
        self.queue.remove(session_id);

        let Some(session) = self.registry.get_mut(&session_id) else {
            return;
        };
        let Some(room_id) = session.room.take() else {
            return;
        };
        session.clear_room();

        let Some(mut room) = self.rooms.remove(&room_id) else {
            return;
        };
        room.stop_loop();

        if let Some(opponent) = room.opponent_of(session_id) {
            self.registry.send_to(&opponent, ServerMsg::OpponentLeft);
            if let Some(survivor) = self.registry.get_mut(&opponent) {
                survivor.clear_room();
            }
        }

        info!(room_id = %room_id, session_id = %session_id, "Room closed");
    }

    /// Relay a chat line to the opponent
    pub fn chat(&mut self, session_id: SessionId, raw: &str) {
        let message: String = raw.trim().chars().take(MAX_CHAT_LEN).collect();
        if message.is_empty() {
            return;
        }
        let Some((room_id, _)) = self.seat_of(session_id) else {
            return;
        };
        let Some(opponent) = self
            .rooms
            .get(&room_id)
            .and_then(|room| room.opponent_of(session_id))
        else {
            return;
        };
        let Some(sender) = self.registry.get(&session_id).map(|s| s.display_name().to_string()) else {
            return;
        };

        self.registry
            .send_to(&opponent, ServerMsg::ChatMessage { sender, message });
    }

    /// One simulation step for a room
    pub fn tick(&mut self, room_id: &str, generation: u64) {
        let Some(room) = self.rooms.get_mut(room_id) else {
            debug!(room_id = %room_id, "Tick for missing room");
            return;
        };
        if !room.accepts_tick(generation) {
            return;
        }
        let Some(simulation) = room.simulation.as_mut() else {
            return;
        };

        match simulation.step() {
            Some(scorer) => {
                let score = simulation.score;
                let loser = scorer.opponent();
                room.stop_loop();
                room.phase = RoomPhase::PointPause { loser };

                if let Some(id) = room.occupant(loser) {
                    self.registry
                        .send_to(&id, ServerMsg::PointScored { you_lost: true });
                }
                if let Some(id) = room.occupant(scorer) {
                    self.registry
                        .send_to(&id, ServerMsg::PointScored { you_lost: false });
                }

                info!(
                    room_id = %room_id,
                    scorer = %scorer,
                    left = score.left,
                    right = score.right,
                    "Point scored"
                );
            }
            None => {
                let msg = ServerMsg::GameState(simulation.snapshot());
                for member in room.members() {
                    self.registry.send_to(&member, msg.clone());
                }
            }
        }
    }

    pub fn stats(&self) -> LobbyStats {
        LobbyStats {
            connected_sessions: self.registry.connected_count(),
            waiting_sessions: self.queue.len(),
            rooms: self.rooms.len(),
            running_rooms: self.rooms.values().filter(|r| r.is_ticking()).count(),
            longest_wait_secs: self.queue.longest_wait().map_or(0, |d| d.as_secs()),
        }
    }

    fn publish_player_count(&self) {
        let count = self.registry.connected_count();
        self.registry
            .broadcast(&ServerMsg::PlayerCountUpdate { count });
    }

    /// Registered and not in a room
    fn ensure_free(&self, session_id: SessionId) -> Result<(), LobbyError> {
        let session = self
            .registry
            .get(&session_id)
            .ok_or(LobbyError::UnknownSession)?;
        if session.nickname.is_none() {
            return Err(LobbyError::NotRegistered);
        }
        if session.room.is_some() {
            return Err(LobbyError::AlreadyInGame);
        }
        Ok(())
    }

    fn is_free(&self, session_id: SessionId) -> bool {
        self.ensure_free(session_id).is_ok()
    }

    fn assign(&mut self, session_id: SessionId, room_id: &RoomId) {
        if let Some(session) = self.registry.get_mut(&session_id) {
            session.room = Some(room_id.clone());
            session.ready = false;
        }
    }

    /// Room and side of a registered session that is in a room
    fn seat_of(&self, session_id: SessionId) -> Option<(RoomId, Side)> {
        let room_id = self.registry.registered(&session_id)?.room.clone()?;
        let side = self.rooms.get(&room_id)?.side_of(session_id)?;
        Some((room_id, side))
    }

    fn unused_room_id(&mut self) -> RoomId {
        loop {
            let id = random_room_id(&mut self.rng);
            if !self.rooms.contains_key(&id) {
                return id;
            }
        }
    }

    /// Tell each member who they play against and which side they have
    fn announce_match(&self, room_id: &str) {
        let Some(room) = self.rooms.get(room_id) else {
            return;
        };
        for side in Side::BOTH {
            let (Some(me), Some(other)) = (room.occupant(side), room.occupant(side.opponent())) else {
                continue;
            };
            let opponent = self
                .registry
                .get(&other)
                .map(|s| s.display_name().to_string())
                .unwrap_or_default();
            self.registry
                .send_to(&me, ServerMsg::MatchFound { opponent, side });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::params::PARAMS;
    use crate::game::physics::Ball;
    use uuid::Uuid;

    struct Harness {
        lobby: Lobby,
        _commands: mpsc::Sender<Command>,
        _command_rx: mpsc::Receiver<Command>,
    }

    fn harness() -> Harness {
        let (tx, rx) = mpsc::channel(64);
        Harness {
            lobby: Lobby::new(PARAMS, 42, tx.downgrade()),
            _commands: tx,
            _command_rx: rx,
        }
    }

    /// Connected session with an outbox the test can drain
    fn join(lobby: &mut Lobby, nickname: &str) -> (SessionId, mpsc::Receiver<ServerMsg>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(1024);
        lobby.connect(id, tx);
        lobby.set_nickname(id, nickname);
        (id, rx)
    }

    fn drain(rx: &mut mpsc::Receiver<ServerMsg>) -> Vec<ServerMsg> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn room_of(lobby: &Lobby, id: SessionId) -> Option<RoomId> {
        lobby.registry.get(&id).and_then(|s| s.room.clone())
    }

    fn rooms_containing(lobby: &Lobby, id: SessionId) -> usize {
        lobby
            .rooms
            .values()
            .filter(|r| r.side_of(id).is_some())
            .count()
    }

    /// Two registered sessions paired randomly, both ready, loop running
    fn running_match(lobby: &mut Lobby) -> (SessionId, SessionId, RoomId, mpsc::Receiver<ServerMsg>, mpsc::Receiver<ServerMsg>) {
        let (a, mut ra) = join(lobby, "ann");
        let (b, mut rb) = join(lobby, "bob");
        lobby.enqueue_random(a).unwrap();
        lobby.enqueue_random(b).unwrap();
        lobby.player_ready(a);
        lobby.player_ready(b);
        drain(&mut ra);
        drain(&mut rb);
        let room_id = room_of(lobby, a).unwrap();
        (a, b, room_id, ra, rb)
    }

    #[test]
    fn test_nickname_exchange() {
        let mut h = harness();
        let (a, mut ra) = join(&mut h.lobby, " ann ");
        let (_, mut rb) = join(&mut h.lobby, "ann");

        assert!(drain(&mut ra).contains(&ServerMsg::NicknameAccepted { nickname: "ann".into() }));
        assert!(drain(&mut rb).contains(&ServerMsg::NicknameTaken));

        h.lobby.set_nickname(a, "other");
        let msgs = drain(&mut ra);
        assert!(matches!(
            msgs.as_slice(),
            [ServerMsg::ErrorMessage { code, .. }] if code == "nickname_already_set"
        ));
    }

    #[test]
    fn test_invalid_nickname_is_reported() {
        let mut h = harness();
        let (_, mut ra) = join(&mut h.lobby, "   ");
        assert!(drain(&mut ra).iter().any(|m| matches!(
            m,
            ServerMsg::ErrorMessage { code, .. } if code == "nickname_empty"
        )));
    }

    #[test]
    fn test_player_count_broadcast() {
        let mut h = harness();
        let (_, mut ra) = join(&mut h.lobby, "ann");
        let (b, _rb) = join(&mut h.lobby, "bob");

        let counts: Vec<_> = drain(&mut ra)
            .into_iter()
            .filter_map(|m| match m {
                ServerMsg::PlayerCountUpdate { count } => Some(count),
                _ => None,
            })
            .collect();
        assert_eq!(counts, vec![1, 2]);

        h.lobby.disconnect(b);
        assert!(drain(&mut ra).contains(&ServerMsg::PlayerCountUpdate { count: 1 }));
    }

    #[test]
    fn test_unregistered_session_is_ignored() {
        let mut h = harness();
        let id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(16);
        h.lobby.connect(id, tx);
        drain(&mut rx);

        h.lobby.handle_client_msg(id, ClientMsg::JoinRandom);
        h.lobby.handle_client_msg(id, ClientMsg::CreateRoom);
        assert!(drain(&mut rx).is_empty());
        assert!(h.lobby.queue.is_empty());
        assert!(h.lobby.rooms.is_empty());
    }

    #[test]
    fn test_random_match_first_waiting_is_left() {
        let mut h = harness();
        let (a, mut ra) = join(&mut h.lobby, "ann");
        let (b, mut rb) = join(&mut h.lobby, "bob");
        drain(&mut ra);
        drain(&mut rb);

        assert_eq!(h.lobby.enqueue_random(a), Ok(QueueOutcome::Waiting));
        assert_eq!(h.lobby.enqueue_random(b), Ok(QueueOutcome::Paired { left: a, right: b }));

        let room_id = room_of(&h.lobby, a).unwrap();
        assert_eq!(room_of(&h.lobby, b), Some(room_id.clone()));
        let room = &h.lobby.rooms[&room_id];
        assert_eq!(room.occupant(Side::Left), Some(a));
        assert_eq!(room.occupant(Side::Right), Some(b));
        assert_eq!(room.phase, RoomPhase::Lobby);

        assert_eq!(
            drain(&mut ra),
            vec![ServerMsg::MatchFound { opponent: "bob".into(), side: Side::Left }]
        );
        assert_eq!(
            drain(&mut rb),
            vec![ServerMsg::MatchFound { opponent: "ann".into(), side: Side::Right }]
        );
    }

    #[test]
    fn test_already_in_game_rejected() {
        let mut h = harness();
        let (a, mut ra) = join(&mut h.lobby, "ann");
        h.lobby.create_room(a).unwrap();
        drain(&mut ra);

        h.lobby.handle_client_msg(a, ClientMsg::JoinRandom);
        h.lobby.handle_client_msg(a, ClientMsg::CreateRoom);
        let msgs = drain(&mut ra);
        assert_eq!(msgs.len(), 2);
        assert!(msgs.iter().all(|m| matches!(
            m,
            ServerMsg::ErrorMessage { message, .. } if message == "You are already in a game"
        )));
        assert!(h.lobby.queue.is_empty());
        assert_eq!(h.lobby.rooms.len(), 1);
    }

    #[test]
    fn test_code_room_join_and_full() {
        let mut h = harness();
        let (a, mut ra) = join(&mut h.lobby, "ann");
        let (b, mut rb) = join(&mut h.lobby, "bob");
        let (c, mut rc) = join(&mut h.lobby, "cat");
        drain(&mut ra);
        drain(&mut rb);
        drain(&mut rc);

        let code = h.lobby.create_room(a).unwrap();
        assert_eq!(drain(&mut ra), vec![ServerMsg::RoomCreated { code: code.clone() }]);

        // Codes are case-insensitive on entry
        h.lobby.join_room(b, &code.to_lowercase()).unwrap();
        assert_eq!(
            drain(&mut ra),
            vec![ServerMsg::MatchFound { opponent: "bob".into(), side: Side::Left }]
        );
        assert_eq!(
            drain(&mut rb),
            vec![ServerMsg::MatchFound { opponent: "ann".into(), side: Side::Right }]
        );

        h.lobby.handle_client_msg(c, ClientMsg::JoinRoom { code: code.clone() });
        assert_eq!(drain(&mut rc), vec![ServerMsg::error("room_full", "Room is full")]);
        assert_eq!(room_of(&h.lobby, c), None);
    }

    #[test]
    fn test_join_room_errors() {
        let mut h = harness();
        let (a, mut ra) = join(&mut h.lobby, "ann");
        drain(&mut ra);

        assert_eq!(h.lobby.join_room(a, "  "), Err(LobbyError::EmptyRoomCode));
        assert_eq!(h.lobby.join_room(a, "ZZZZZZ"), Err(LobbyError::RoomNotFound));

        h.lobby.handle_client_msg(a, ClientMsg::JoinRoom { code: "ZZZZZZ".into() });
        assert_eq!(drain(&mut ra), vec![ServerMsg::error("room_not_found", "Room not found")]);
    }

    #[test]
    fn test_creating_room_leaves_queue() {
        let mut h = harness();
        let (a, _ra) = join(&mut h.lobby, "ann");
        let (b, _rb) = join(&mut h.lobby, "bob");

        h.lobby.enqueue_random(a).unwrap();
        h.lobby.create_room(a).unwrap();
        assert!(h.lobby.queue.is_empty());

        // b must not be paired with a, who is already in a room
        assert_eq!(h.lobby.enqueue_random(b), Ok(QueueOutcome::Waiting));
        assert_eq!(rooms_containing(&h.lobby, a), 1);
    }

    #[test]
    fn test_session_in_at_most_one_room() {
        let mut h = harness();
        let sessions: Vec<_> = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|n| join(&mut h.lobby, n))
            .collect();
        let ids: Vec<SessionId> = sessions.iter().map(|(id, _)| *id).collect();

        let mut codes = Vec::new();
        for round in 0..40 {
            let id = ids[round % ids.len()];
            let other = ids[(round * 3 + 1) % ids.len()];
            match round % 5 {
                0 => {
                    let _ = h.lobby.enqueue_random(id);
                }
                1 => {
                    if let Ok(code) = h.lobby.create_room(id) {
                        codes.push(code);
                    }
                }
                2 => {
                    if let Some(code) = codes.last().cloned() {
                        let _ = h.lobby.join_room(id, &code);
                    }
                }
                3 => h.lobby.leave(other),
                _ => {
                    let _ = h.lobby.enqueue_random(other);
                }
            }

            for &s in &ids {
                let in_rooms = rooms_containing(&h.lobby, s);
                assert!(in_rooms <= 1, "round {round}: session in {in_rooms} rooms");
                assert_eq!(in_rooms == 1, room_of(&h.lobby, s).is_some());
                assert!(!(in_rooms == 1 && h.lobby.queue.contains(&s)));
            }
            assert!(h.lobby.rooms.values().all(|r| r.members().count() <= 2));
        }
    }

    #[tokio::test]
    async fn test_ready_handshake_starts_match() {
        let mut h = harness();
        let (a, mut ra) = join(&mut h.lobby, "ann");
        let (b, mut rb) = join(&mut h.lobby, "bob");
        h.lobby.enqueue_random(a).unwrap();
        h.lobby.enqueue_random(b).unwrap();
        drain(&mut ra);
        drain(&mut rb);

        h.lobby.player_ready(a);
        assert!(drain(&mut ra).is_empty());
        assert_eq!(drain(&mut rb), vec![ServerMsg::ReadyStatus { opponent_ready: true }]);

        // Duplicate ready is a no-op
        h.lobby.player_ready(a);
        assert!(drain(&mut rb).is_empty());

        h.lobby.player_ready(b);
        let room_id = room_of(&h.lobby, a).unwrap();
        let room = &h.lobby.rooms[&room_id];
        assert_eq!(room.phase, RoomPhase::Running);
        assert!(room.started && room.is_ticking());

        let ra_msgs = drain(&mut ra);
        assert_eq!(ra_msgs.len(), 2);
        assert_eq!(ra_msgs[0], ServerMsg::ReadyStatus { opponent_ready: true });
        let ServerMsg::GameStart(snapshot) = &ra_msgs[1] else {
            panic!("expected game-start, got {:?}", ra_msgs[1]);
        };
        assert_eq!(snapshot.ball.x, 400.0);
        assert_eq!(snapshot.paddles.left.y, 200.0);
        assert!(matches!(drain(&mut rb).as_slice(), [ServerMsg::GameStart(_)]));
    }

    #[tokio::test]
    async fn test_tick_broadcasts_state() {
        let mut h = harness();
        let (_, _, room_id, mut ra, mut rb) = running_match(&mut h.lobby);
        let generation = h.lobby.rooms[&room_id].generation();

        h.lobby.tick(&room_id, generation);
        assert!(matches!(drain(&mut ra).as_slice(), [ServerMsg::GameState(_)]));
        assert!(matches!(drain(&mut rb).as_slice(), [ServerMsg::GameState(_)]));

        // Stale generation is ignored
        h.lobby.tick(&room_id, generation + 5);
        assert!(drain(&mut ra).is_empty());

        // Missing room is ignored
        h.lobby.tick("NOPE22", generation);
    }

    #[tokio::test]
    async fn test_left_edge_scores_right_and_halts() {
        let mut h = harness();
        let (a, b, room_id, mut ra, mut rb) = running_match(&mut h.lobby);
        let generation = h.lobby.rooms[&room_id].generation();

        let room = h.lobby.rooms.get_mut(&room_id).unwrap();
        room.simulation.as_mut().unwrap().ball = Ball { x: 0.0, y: 250.0, dx: -5.0, dy: 0.0 };

        h.lobby.tick(&room_id, generation);

        let room = &h.lobby.rooms[&room_id];
        let score = room.simulation.as_ref().unwrap().score;
        assert_eq!((score.left, score.right), (0, 1));
        assert!(!room.is_ticking());
        assert_eq!(room.phase, RoomPhase::PointPause { loser: Side::Left });
        assert_eq!(drain(&mut ra), vec![ServerMsg::PointScored { you_lost: true }]);
        assert_eq!(drain(&mut rb), vec![ServerMsg::PointScored { you_lost: false }]);

        // Loop is halted: further ticks do nothing
        h.lobby.tick(&room_id, generation);
        assert!(drain(&mut ra).is_empty());

        // Only the loser resumes
        h.lobby.continue_after_point(b);
        assert!(drain(&mut ra).is_empty());
        assert!(!h.lobby.rooms[&room_id].is_ticking());

        h.lobby.continue_after_point(a);
        let room = &h.lobby.rooms[&room_id];
        assert_eq!(room.phase, RoomPhase::Running);
        assert!(room.is_ticking());
        assert_eq!(room.generation(), generation + 1);
        let sim = room.simulation.as_ref().unwrap();
        assert_eq!((sim.ball.x, sim.ball.y), (400.0, 250.0));
        assert_eq!(sim.score.right, 1);
        assert!(matches!(drain(&mut ra).as_slice(), [ServerMsg::GameContinue(_)]));
        assert!(matches!(drain(&mut rb).as_slice(), [ServerMsg::GameContinue(_)]));
    }

    #[tokio::test]
    async fn test_rooms_tick_independently() {
        let mut h = harness();
        let (a, _, room_a, mut ra, _rb) = running_match(&mut h.lobby);

        let (c, mut rc) = join(&mut h.lobby, "cat");
        let (d, mut rd) = join(&mut h.lobby, "dan");
        h.lobby.enqueue_random(c).unwrap();
        h.lobby.enqueue_random(d).unwrap();
        h.lobby.player_ready(c);
        h.lobby.player_ready(d);
        drain(&mut ra);
        drain(&mut rc);
        drain(&mut rd);
        let room_b = room_of(&h.lobby, c).unwrap();
        assert_ne!(room_a, room_b);

        let gen_a = h.lobby.rooms[&room_a].generation();
        let gen_b = h.lobby.rooms[&room_b].generation();
        h.lobby.rooms.get_mut(&room_a).unwrap().simulation.as_mut().unwrap().ball =
            Ball { x: 0.0, y: 250.0, dx: -5.0, dy: 0.0 };
        let before_b = h.lobby.rooms[&room_b].simulation.as_ref().unwrap().snapshot();

        h.lobby.tick(&room_a, gen_a);

        let sim_a = h.lobby.rooms[&room_a].simulation.as_ref().unwrap();
        assert_eq!(sim_a.score.right, 1);
        assert_eq!(h.lobby.rooms[&room_a].phase, RoomPhase::PointPause { loser: Side::Left });
        assert_eq!(h.lobby.rooms[&room_b].simulation.as_ref().unwrap().snapshot(), before_b);
        assert_eq!(h.lobby.rooms[&room_b].phase, RoomPhase::Running);
        assert!(h.lobby.rooms[&room_b].is_ticking());
        assert!(drain(&mut rc).is_empty());
        assert!(drain(&mut rd).is_empty());

        // Room B's tick moves only room B
        let paused_a = h.lobby.rooms[&room_a].simulation.as_ref().unwrap().snapshot();
        h.lobby.tick(&room_b, gen_b);
        let after_b = h.lobby.rooms[&room_b].simulation.as_ref().unwrap().snapshot();
        assert_ne!(after_b.ball, before_b.ball);
        assert_eq!(after_b.score, before_b.score);
        assert_eq!(h.lobby.rooms[&room_a].simulation.as_ref().unwrap().snapshot(), paused_a);
        assert!(matches!(drain(&mut rc).as_slice(), [ServerMsg::GameState(_)]));
        assert_eq!(drain(&mut ra), vec![ServerMsg::PointScored { you_lost: true }]);

        // After resuming, room A runs on a newer generation than room B's timer
        h.lobby.continue_after_point(a);
        drain(&mut ra);
        assert_ne!(h.lobby.rooms[&room_a].generation(), gen_b);
        let resumed_a = h.lobby.rooms[&room_a].simulation.as_ref().unwrap().snapshot();
        h.lobby.tick(&room_a, gen_b);
        assert_eq!(h.lobby.rooms[&room_a].simulation.as_ref().unwrap().snapshot(), resumed_a);
        assert!(drain(&mut ra).is_empty());
    }

    #[tokio::test]
    async fn test_paddle_move_writes_own_slot() {
        let mut h = harness();
        let (a, b, room_id, mut ra, _rb) = running_match(&mut h.lobby);

        h.lobby.paddle_move(a, 10_000.0);
        h.lobby.paddle_move(b, 60.0);
        h.lobby.paddle_move(b, 120.0);

        let sim = h.lobby.rooms[&room_id].simulation.as_ref().unwrap();
        assert_eq!(sim.paddle(Side::Left).y, PARAMS.max_paddle_top());
        assert_eq!(sim.paddle(Side::Right).y, 70.0);
        // Running loop carries moves; nothing extra is sent
        assert!(drain(&mut ra).is_empty());
    }

    #[tokio::test]
    async fn test_paddle_move_during_pause_is_broadcast() {
        let mut h = harness();
        let (a, _b, room_id, mut ra, mut rb) = running_match(&mut h.lobby);
        h.lobby.rooms.get_mut(&room_id).unwrap().stop_loop();

        h.lobby.paddle_move(a, 50.0);
        assert!(matches!(drain(&mut ra).as_slice(), [ServerMsg::GameState(s)] if s.paddles.left.y == 0.0));
        assert_eq!(drain(&mut rb).len(), 1);
    }

    #[test]
    fn test_paddle_move_before_start_is_ignored() {
        let mut h = harness();
        let (a, mut ra) = join(&mut h.lobby, "ann");
        let (b, _rb) = join(&mut h.lobby, "bob");
        h.lobby.enqueue_random(a).unwrap();
        h.lobby.enqueue_random(b).unwrap();
        drain(&mut ra);

        h.lobby.paddle_move(a, 100.0);
        assert!(drain(&mut ra).is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_mid_match_frees_survivor() {
        let mut h = harness();
        let (a, b, room_id, _ra, mut rb) = running_match(&mut h.lobby);

        h.lobby.disconnect(a);

        let msgs = drain(&mut rb);
        assert_eq!(msgs[0], ServerMsg::OpponentLeft);
        assert!(msgs.contains(&ServerMsg::PlayerCountUpdate { count: 1 }));
        assert!(!h.lobby.rooms.contains_key(&room_id));
        let survivor = h.lobby.registry.get(&b).unwrap();
        assert!(survivor.room.is_none());
        assert!(!survivor.ready);

        // Nickname is free again and the survivor can requeue
        assert!(!h.lobby.registry.is_taken("ann"));
        assert_eq!(h.lobby.enqueue_random(b), Ok(QueueOutcome::Waiting));
    }

    #[test]
    fn test_leave_while_waiting_in_private_room() {
        let mut h = harness();
        let (a, mut ra) = join(&mut h.lobby, "ann");
        let code = h.lobby.create_room(a).unwrap();
        drain(&mut ra);

        h.lobby.handle_client_msg(a, ClientMsg::LeaveGame);
        assert!(!h.lobby.rooms.contains_key(&code));
        assert_eq!(room_of(&h.lobby, a), None);
        assert!(drain(&mut ra).is_empty());
    }

    #[test]
    fn test_disconnect_while_queued() {
        let mut h = harness();
        let (a, _ra) = join(&mut h.lobby, "ann");
        let (b, _rb) = join(&mut h.lobby, "bob");

        h.lobby.enqueue_random(a).unwrap();
        h.lobby.disconnect(a);
        assert_eq!(h.lobby.enqueue_random(b), Ok(QueueOutcome::Waiting));
    }

    #[test]
    fn test_chat_goes_to_opponent_only() {
        let mut h = harness();
        let (a, mut ra) = join(&mut h.lobby, "ann");
        let (b, mut rb) = join(&mut h.lobby, "bob");
        h.lobby.enqueue_random(a).unwrap();
        h.lobby.enqueue_random(b).unwrap();
        drain(&mut ra);
        drain(&mut rb);

        h.lobby.chat(a, "  good luck  ");
        h.lobby.chat(a, "   ");
        assert!(drain(&mut ra).is_empty());
        assert_eq!(
            drain(&mut rb),
            vec![ServerMsg::ChatMessage { sender: "ann".into(), message: "good luck".into() }]
        );

        h.lobby.chat(b, &"x".repeat(500));
        let msgs = drain(&mut ra);
        assert!(matches!(
            msgs.as_slice(),
            [ServerMsg::ChatMessage { message, .. }] if message.len() == MAX_CHAT_LEN
        ));
    }

    #[tokio::test]
    async fn test_stats() {
        let mut h = harness();
        let (_, _, _, _ra, _rb) = running_match(&mut h.lobby);
        let (c, _rc) = join(&mut h.lobby, "cat");
        h.lobby.enqueue_random(c).unwrap();

        assert_eq!(
            h.lobby.stats(),
            LobbyStats {
                connected_sessions: 3,
                waiting_sessions: 1,
                rooms: 1,
                running_rooms: 1,
                longest_wait_secs: 0,
            }
        );
    }

    #[test]
    fn test_ping() {
        let mut h = harness();
        let (a, mut ra) = join(&mut h.lobby, "ann");
        drain(&mut ra);
        h.lobby.handle_client_msg(a, ClientMsg::Ping { t: 9 });
        assert_eq!(drain(&mut ra), vec![ServerMsg::Pong { t: 9 }]);
    }
}
