//! Authoritative simulation state for one room

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::params::PhysicsParams;
use super::physics::{Ball, Paddle, PhysicsSystem};
use super::snapshot::{BallSnapshot, PaddleSnapshot, PaddlesSnapshot, Snapshot};
use super::Side;

/// Points per side. Only ever incremented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub left: u32,
    pub right: u32,
}

impl Score {
    fn award(&mut self, side: Side) {
        match side {
            Side::Left => self.left += 1,
            Side::Right => self.right += 1,
        }
    }
}

/// Ball, paddles and score for a single match
#[derive(Debug, Clone)]
pub struct Simulation {
    params: PhysicsParams,
    pub ball: Ball,
    pub paddles: [Paddle; 2],
    pub score: Score,
}

impl Simulation {
    /// Fresh match: centered paddles, 0-0, ball served in a random direction
    pub fn new<R: Rng>(params: PhysicsParams, rng: &mut R) -> Self {
        let center_top = params.max_paddle_top() / 2.0;
        let mut sim = Self {
            params,
            ball: Ball { x: 0.0, y: 0.0, dx: 0.0, dy: 0.0 },
            paddles: [Paddle { y: center_top }; 2],
            score: Score::default(),
        };
        sim.serve(rng);
        sim
    }

    /// Put the ball at center field with a freshly randomized serve.
    /// Each axis sign is an independent coin flip.
    pub fn serve<R: Rng>(&mut self, rng: &mut R) {
        let sign = |heads: bool| if heads { 1.0 } else { -1.0 };
        self.ball = Ball {
            x: self.params.field_width / 2.0,
            y: self.params.field_height / 2.0,
            dx: sign(rng.gen_bool(0.5)) * self.params.initial_dx,
            dy: sign(rng.gen_bool(0.5)) * self.params.initial_dy,
        };
    }

    /// Move a paddle so it is centered on `center_y`, clamped to the field
    pub fn move_paddle(&mut self, side: Side, center_y: f32) {
        self.paddles[side.slot()].y = PhysicsSystem::clamp_paddle_top(center_y, &self.params);
    }

    pub fn paddle(&self, side: Side) -> &Paddle {
        &self.paddles[side.slot()]
    }

    /// Run one fixed tick. Returns the side that scored, if any.
    pub fn step(&mut self) -> Option<Side> {
        PhysicsSystem::integrate(&mut self.ball);
        PhysicsSystem::resolve_walls(&mut self.ball, &self.params);

        for side in Side::BOTH {
            let paddle = self.paddles[side.slot()];
            if PhysicsSystem::touches_paddle(&self.ball, &paddle, side, &self.params) {
                PhysicsSystem::bounce_off_paddle(&mut self.ball, &paddle, side, &self.params);
            }
        }

        let scorer = PhysicsSystem::scoring_side(&self.ball, &self.params)?;
        self.score.award(scorer);
        Some(scorer)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            ball: BallSnapshot::from(&self.ball),
            paddles: PaddlesSnapshot {
                left: PaddleSnapshot::from(self.paddle(Side::Left)),
                right: PaddleSnapshot::from(self.paddle(Side::Right)),
            },
            score: self.score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::params::PARAMS;
    use assert_approx_eq::assert_approx_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn sim(seed: u64) -> Simulation {
        Simulation::new(PARAMS, &mut ChaCha8Rng::seed_from_u64(seed))
    }

    #[test]
    fn test_new_match_is_centered() {
        let s = sim(1);
        assert_approx_eq!(s.ball.x, 400.0);
        assert_approx_eq!(s.ball.y, 250.0);
        assert_approx_eq!(s.ball.dx.abs(), PARAMS.initial_dx);
        assert_approx_eq!(s.ball.dy.abs(), PARAMS.initial_dy);
        assert_approx_eq!(s.paddles[0].y, 200.0);
        assert_approx_eq!(s.paddles[1].y, 200.0);
        assert_eq!(s.score, Score::default());
    }

    #[test]
    fn test_serve_covers_all_directions() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut s = sim(7);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            s.serve(&mut rng);
            seen.insert((s.ball.dx > 0.0, s.ball.dy > 0.0));
        }
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn test_ball_past_left_edge_scores_right() {
        let mut s = sim(3);
        s.ball = Ball { x: 0.0, y: 250.0, dx: -5.0, dy: 0.0 };

        assert_eq!(s.step(), Some(Side::Right));
        assert_eq!(s.score, Score { left: 0, right: 1 });
    }

    #[test]
    fn test_ball_past_right_edge_scores_left() {
        let mut s = sim(3);
        s.ball = Ball { x: 798.0, y: 20.0, dx: 5.0, dy: 0.0 };

        assert_eq!(s.step(), Some(Side::Left));
        assert_eq!(s.score, Score { left: 1, right: 0 });
    }

    #[test]
    fn test_centered_paddle_returns_ball() {
        let mut s = sim(5);
        s.ball = Ball { x: 40.0, y: 250.0, dx: -5.0, dy: 0.0 };

        assert_eq!(s.step(), None);
        assert!(s.ball.dx > 0.0);
        assert!(s.ball.x > PARAMS.left_paddle_face());
    }

    #[test]
    fn test_move_paddle_clamps() {
        let mut s = sim(9);
        s.move_paddle(Side::Right, 10_000.0);
        assert_approx_eq!(s.paddle(Side::Right).y, PARAMS.max_paddle_top());
        s.move_paddle(Side::Left, -10_000.0);
        assert_approx_eq!(s.paddle(Side::Left).y, 0.0);
    }

    #[test]
    fn test_rally_stays_in_bounds_until_score() {
        let mut s = sim(11);
        for _ in 0..10_000 {
            if s.step().is_some() {
                return;
            }
            assert!(s.ball.y >= PARAMS.ball_radius && s.ball.y <= PARAMS.field_height - PARAMS.ball_radius);
            assert!(s.ball.x > 0.0 && s.ball.x < PARAMS.field_width);
        }
        panic!("ball never left the field");
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let mut s = sim(13);
        s.move_paddle(Side::Left, 100.0);
        let snap = s.snapshot();
        assert_approx_eq!(snap.paddles.left.y, 50.0);
        assert_approx_eq!(snap.ball.x, s.ball.x);
        assert_eq!(snap.score, s.score);
    }
}
