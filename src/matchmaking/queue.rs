//! Matchmaking queue implementation

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::session::SessionId;

/// Session waiting for a random opponent
#[derive(Debug, Clone)]
pub struct QueuedSession {
    pub session_id: SessionId,
    pub queued_at: Instant,
}

impl QueuedSession {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            queued_at: Instant::now(),
        }
    }

    /// How long this session has been waiting
    pub fn wait_time(&self) -> Duration {
        self.queued_at.elapsed()
    }
}

/// Result of asking for a random opponent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOutcome {
    /// Paired with the longest-waiting session, which takes the left slot
    Paired { left: SessionId, right: SessionId },
    /// Nobody was waiting; the caller is now at the back of the queue
    Waiting,
    /// The caller was already queued; its position is unchanged
    AlreadyWaiting,
}

/// FIFO of sessions awaiting a random opponent. Nobody times out.
#[derive(Debug, Default)]
pub struct WaitingQueue {
    queue: VecDeque<QueuedSession>,
}

impl WaitingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair with the head of the queue, or start waiting
    pub fn join(&mut self, session_id: SessionId) -> QueueOutcome {
        if self.contains(&session_id) {
            return QueueOutcome::AlreadyWaiting;
        }

        match self.queue.pop_front() {
            Some(head) => QueueOutcome::Paired {
                left: head.session_id,
                right: session_id,
            },
            None => {
                self.queue.push_back(QueuedSession::new(session_id));
                QueueOutcome::Waiting
            }
        }
    }

    /// Remove a session from the queue
    pub fn remove(&mut self, session_id: SessionId) -> Option<QueuedSession> {
        let pos = self.queue.iter().position(|q| q.session_id == session_id)?;
        self.queue.remove(pos)
    }

    /// Check if a session is in the queue
    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.queue.iter().any(|q| &q.session_id == session_id)
    }

    /// Get queue length
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Check if queue is empty
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Longest current wait, if anyone is queued
    pub fn longest_wait(&self) -> Option<Duration> {
        self.queue.front().map(QueuedSession::wait_time)
    }
}
