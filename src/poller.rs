use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::debug;

use crate::command::Command;
use crate::view::Tab;

/// Emits [`Command::PollTick`] at a fixed interval while the market tab is
/// active. The first tick fires immediately; missed ticks are skipped.
pub struct PollScheduler {
    interval: Duration,
    tx: broadcast::Sender<Command>,
    handle: Option<JoinHandle<()>>,
}

impl PollScheduler {
    pub fn new(interval: Duration, tx: broadcast::Sender<Command>) -> PollScheduler {
        PollScheduler {
            interval,
            tx,
            handle: None,
        }
    }

    pub fn start(&mut self, tab: Tab) {
        self.stop();
        if tab != Tab::Market {
            return;
        }
        let tx = self.tx.clone();
        let period = self.interval;
        debug!(?period, "market polling started");
        self.handle = Some(tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if tx.send(Command::PollTick).is_err() {
                    break;
                }
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("market polling stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
