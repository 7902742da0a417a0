//! Per-room fixed-rate tick task

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use crate::session::RoomId;
use crate::util::time::tick_duration;

use super::actor::Command;

/// Handle to a room's running tick timer. Dropping the handle does not stop
/// the task; call `cancel`.
#[derive(Debug)]
pub struct TickLoop {
    generation: u64,
    handle: JoinHandle<()>,
}

impl TickLoop {
    /// Start sending `Command::Tick` for `room_id` at the simulation rate.
    /// The first tick fires one period from now.
    pub fn spawn(room_id: RoomId, generation: u64, commands: mpsc::WeakSender<Command>) -> Self {
        let handle = tokio::spawn(async move {
            let period = tick_duration();
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticks.tick().await;

                let Some(tx) = commands.upgrade() else {
                    break;
                };
                let tick = Command::Tick {
                    room_id: room_id.clone(),
                    generation,
                };
                if tx.send(tick).await.is_err() {
                    break;
                }
            }

            debug!(room_id = %room_id, generation, "Tick loop exited");
        });

        Self { generation, handle }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Stop the timer. Consumes the handle so it can only happen once.
    pub fn cancel(self) {
        self.handle.abort();
    }
}
