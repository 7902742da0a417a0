//! Ball and paddle physics

use super::params::PhysicsParams;
use super::Side;

/// Gap left between the ball and a surface it was pushed off
const NUDGE: f32 = 1.0;

/// Ball state (center position and per-tick velocity)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ball {
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
}

impl Ball {
    pub fn speed(&self) -> f32 {
        self.dx.hypot(self.dy)
    }
}

/// Paddle state. `y` is the top edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paddle {
    pub y: f32,
}

/// Physics system for the ball and paddles
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Advance the ball one tick (Euler step)
    pub fn integrate(ball: &mut Ball) {
        ball.x += ball.dx;
        ball.y += ball.dy;
    }

    /// Reflect off the top/bottom walls. Returns true if a wall was hit.
    pub fn resolve_walls(ball: &mut Ball, params: &PhysicsParams) -> bool {
        let r = params.ball_radius;
        let floor = params.min_wall_bounce_dy;

        if ball.y - r <= 0.0 {
            ball.y = r;
            ball.dy = ball.dy.abs().max(floor);
            true
        } else if ball.y + r >= params.field_height {
            ball.y = params.field_height - r;
            ball.dy = -ball.dy.abs().max(floor);
            true
        } else {
            false
        }
    }

    /// Whether the ball is inside the collision window of the given paddle
    pub fn touches_paddle(ball: &Ball, paddle: &Paddle, side: Side, params: &PhysicsParams) -> bool {
        let r = params.ball_radius;
        let in_plane = match side {
            Side::Left => {
                let face = params.left_paddle_face();
                ball.x - r <= face && ball.x >= face - params.paddle_width
            }
            Side::Right => {
                let face = params.right_paddle_face();
                ball.x + r >= face && ball.x <= face + params.paddle_width
            }
        };

        in_plane && ball.y >= paddle.y && ball.y <= paddle.y + params.paddle_height
    }

    /// Index into `angle_tiers_deg` for an offset from the paddle center
    pub fn impact_tier(offset: f32, params: &PhysicsParams) -> usize {
        let tiers = params.angle_tiers_deg.len();
        let half = params.paddle_height / 2.0;
        let band = params.paddle_height / tiers as f32;
        let idx = ((offset + half) / band).floor();
        idx.clamp(0.0, (tiers - 1) as f32) as usize
    }

    /// Speed after a paddle hit
    pub fn next_hit_speed(speed: f32, params: &PhysicsParams) -> f32 {
        (speed * params.hit_speed_multiplier)
            .max(params.min_hit_speed)
            .min(params.max_speed())
    }

    /// Send the ball back from the paddle on `side`
    pub fn bounce_off_paddle(ball: &mut Ball, paddle: &Paddle, side: Side, params: &PhysicsParams) {
        let center = paddle.y + params.paddle_height / 2.0;
        let tier = Self::impact_tier(ball.y - center, params);
        let angle = params.angle_tiers_deg[tier].to_radians();
        let speed = Self::next_hit_speed(ball.speed(), params);

        // Away from the paddle that was just hit
        let direction = match side {
            Side::Left => 1.0,
            Side::Right => -1.0,
        };

        ball.dx = direction * speed * angle.cos();
        ball.dy = speed * angle.sin();
        ball.x = match side {
            Side::Left => params.left_paddle_face() + params.ball_radius + NUDGE,
            Side::Right => params.right_paddle_face() - params.ball_radius - NUDGE,
        };
    }

    /// Convert a requested paddle center into a clamped top edge
    pub fn clamp_paddle_top(center_y: f32, params: &PhysicsParams) -> f32 {
        if !center_y.is_finite() {
            return params.max_paddle_top() / 2.0;
        }
        (center_y - params.paddle_height / 2.0).clamp(0.0, params.max_paddle_top())
    }

    /// Which side scored, if the ball left the field
    pub fn scoring_side(ball: &Ball, params: &PhysicsParams) -> Option<Side> {
        if ball.x <= 0.0 {
            Some(Side::Right)
        } else if ball.x >= params.field_width {
            Some(Side::Left)
        } else {
            None
        }
    }
}
