//! Wire snapshot of a room's simulation

use serde::{Deserialize, Serialize};

use super::physics::{Ball, Paddle};
use super::simulation::Score;

/// Serializable simulation state sent to both sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub ball: BallSnapshot,
    pub paddles: PaddlesSnapshot,
    pub score: Score,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallSnapshot {
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaddlesSnapshot {
    pub left: PaddleSnapshot,
    pub right: PaddleSnapshot,
}

/// Paddle top edge
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaddleSnapshot {
    pub y: f32,
}

impl From<&Ball> for BallSnapshot {
    fn from(ball: &Ball) -> Self {
        Self {
            x: ball.x,
            y: ball.y,
            dx: ball.dx,
            dy: ball.dy,
        }
    }
}

impl From<&Paddle> for PaddleSnapshot {
    fn from(paddle: &Paddle) -> Self {
        Self { y: paddle.y }
    }
}
