//! Periodic keep-alive comments.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

use super::WireSender;
use crate::WIRE_TARGET;

/// Comment text carried by every heartbeat.
pub const HEARTBEAT_COMMENT: &str = "keep-alive";

/// Background timer sending a heartbeat every `interval` until stopped.
///
/// The first heartbeat is sent one full interval after start. Dropping the
/// handle stops the timer.
#[derive(Debug)]
pub struct Heartbeat {
    task: Option<JoinHandle<()>>,
}

impl Heartbeat {
    /// Starts the timer on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn start(sender: WireSender, interval: Duration) -> Self {
        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if sender.is_closed() {
                    debug!(target: WIRE_TARGET, "heartbeat stopping; client disconnected");
                    break;
                }
                sender.send_heartbeat(HEARTBEAT_COMMENT);
            }
        });
        Self { task: Some(task) }
    }

    /// Stops the timer. Further calls are no-ops.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Whether the timer is still scheduled.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.stop();
    }
}
