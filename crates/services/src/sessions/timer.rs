use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::debug;

/// Default spacing between timer ticks.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// One elapsed period, tagged with the timer generation that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTick {
    pub generation: u64,
}

/// Background task that emits `TimerTick`s for one session.
///
/// Ticks go through the provided channel and the task waits for each send to
/// be accepted before scheduling the next one, so with a capacity-1 channel
/// at most one tick is ever outstanding. The task is aborted on `stop`, on a
/// new `start`, and on drop.
#[derive(Debug, Default)]
pub struct SessionTimer {
    task: Option<JoinHandle<()>>,
    generation: Option<u64>,
}

impl SessionTimer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the tick task for `generation`, replacing any running one.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(&mut self, generation: u64, period: Duration, ticks: mpsc::Sender<TimerTick>) {
        self.stop();

        let task = tokio::spawn(async move {
            let mut clock = interval(period);
            clock.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            clock.tick().await;
            loop {
                clock.tick().await;
                if ticks.send(TimerTick { generation }).await.is_err() {
                    break;
                }
            }
        });

        debug!(generation, ?period, "session timer started");
        self.task = Some(task);
        self.generation = Some(generation);
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(generation = ?self.generation, "session timer stopped");
        }
        self.generation = None;
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    #[must_use]
    pub fn generation(&self) -> Option<u64> {
        self.generation
    }
}

impl Drop for SessionTimer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
