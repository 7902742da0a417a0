//! Shared physics parameters
//!
//! One table drives the authoritative loop and is served to clients at
//! `GET /config`, so local prediction and rendering use the same numbers.

use serde::Serialize;

/// Field geometry, ball speeds and paddle bounce tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhysicsParams {
    /// Field width in world units
    pub field_width: f32,
    /// Field height in world units
    pub field_height: f32,
    /// Paddle height
    pub paddle_height: f32,
    /// Paddle thickness
    pub paddle_width: f32,
    /// Distance from a side wall to the paddle's front face
    pub paddle_inset: f32,
    /// Ball radius
    pub ball_radius: f32,
    /// Horizontal serve speed (sign is randomized)
    pub initial_dx: f32,
    /// Vertical serve speed (sign is randomized)
    pub initial_dy: f32,
    /// Speed multiplier applied on every paddle hit
    pub hit_speed_multiplier: f32,
    /// Lower bound for speed right after a paddle hit
    pub min_hit_speed: f32,
    /// Upper bound for speed, as a multiple of the serve speed
    pub max_speed_multiplier: f32,
    /// Lower bound for |dy| right after a wall bounce
    pub min_wall_bounce_dy: f32,
    /// Launch angle per impact band, top of paddle to bottom
    pub angle_tiers_deg: [f32; 10],
    /// Simulation ticks per second
    pub tick_rate: u32,
}

pub const PARAMS: PhysicsParams = PhysicsParams {
    field_width: 800.0,
    field_height: 500.0,
    paddle_height: 100.0,
    paddle_width: 10.0,
    paddle_inset: 30.0,
    ball_radius: 8.0,
    initial_dx: 5.0,
    initial_dy: 3.0,
    hit_speed_multiplier: 1.05,
    min_hit_speed: 6.0,
    max_speed_multiplier: 2.5,
    min_wall_bounce_dy: 2.0,
    angle_tiers_deg: [
        -45.0, -35.0, -25.0, -15.0, -5.0, 5.0, 15.0, 25.0, 35.0, 45.0,
    ],
    tick_rate: 60,
};

impl PhysicsParams {
    /// Magnitude of the serve velocity
    pub fn initial_speed(&self) -> f32 {
        self.initial_dx.hypot(self.initial_dy)
    }

    /// Hard cap on ball speed
    pub fn max_speed(&self) -> f32 {
        self.initial_speed() * self.max_speed_multiplier
    }

    /// Highest legal paddle top edge
    pub fn max_paddle_top(&self) -> f32 {
        self.field_height - self.paddle_height
    }

    /// x of the left paddle's front (right-facing) face
    pub fn left_paddle_face(&self) -> f32 {
        self.paddle_inset
    }

    /// x of the right paddle's front (left-facing) face
    pub fn right_paddle_face(&self) -> f32 {
        self.field_width - self.paddle_inset
    }
}

impl Default for PhysicsParams {
    fn default() -> Self {
        PARAMS
    }
}
