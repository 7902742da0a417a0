//! Random matchmaking and private room codes

pub mod code;
pub mod queue;

pub use queue::{QueueOutcome, WaitingQueue};
