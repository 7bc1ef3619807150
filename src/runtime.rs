use std::future::Future;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::time::Duration;
use tracing::{debug, warn};

use crate::app::Effect;
use crate::command::{Command, Outcome};
use crate::error_log::ErrorLogStore;
use crate::gateway::MarketGateway;
use crate::poller::PollScheduler;
use crate::view::Tab;

/// Carries out reducer effects. Gateway calls run as spawned tasks and
/// report their [`Outcome`] on an unbounded reply channel, so a lagging
/// command bus can only ever drop poll ticks.
pub struct EffectRunner {
    gateway: Arc<dyn MarketGateway>,
    replies: mpsc::UnboundedSender<Outcome>,
    poller: PollScheduler,
    journal: ErrorLogStore,
}

impl EffectRunner {
    pub fn new(
        gateway: Arc<dyn MarketGateway>,
        bus: broadcast::Sender<Command>,
        replies: mpsc::UnboundedSender<Outcome>,
        poll_interval: Duration,
        journal: ErrorLogStore,
    ) -> EffectRunner {
        let poller = PollScheduler::new(poll_interval, bus);
        EffectRunner {
            gateway,
            replies,
            poller,
            journal,
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_running()
    }

    pub fn dispatch(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            self.run(effect);
        }
    }

    pub fn shutdown(&mut self) {
        self.poller.stop();
    }

    fn run(&mut self, effect: Effect) {
        debug!(?effect, "dispatching effect");
        match effect {
            Effect::StartPolling => self.poller.start(Tab::Market),
            Effect::StopPolling => self.poller.stop(),
            Effect::FetchMarket { seq } => self.spawn(move |gateway| async move {
                Outcome::Market {
                    seq,
                    result: gateway.fetch_market().await,
                }
            }),
            Effect::FetchWatchlist { seq } => self.spawn(move |gateway| async move {
                Outcome::Watchlist {
                    seq,
                    result: gateway.fetch_watchlist().await,
                }
            }),
            Effect::SaveWatchlist(assets) => self.spawn(move |gateway| async move {
                let result = gateway.save_watchlist(&assets).await;
                Outcome::WatchlistSaved {
                    symbols: assets.into_iter().map(|asset| asset.symbol).collect(),
                    result,
                }
            }),
            Effect::DeleteWatchlistEntry(symbol) => self.spawn(move |gateway| async move {
                let result = gateway.delete_watchlist_entry(&symbol).await;
                Outcome::WatchlistEntryRemoved { symbol, result }
            }),
            Effect::FetchAnalysis(tag) => self.spawn(move |gateway| async move {
                let result = gateway.fetch_analysis(&tag.symbol, tag.interval).await;
                Outcome::Analysis { tag, result }
            }),
            Effect::SendChat { tag, text } => self.spawn(move |gateway| async move {
                let result = gateway.send_chat_query(&tag.symbol, &text).await;
                Outcome::ChatReply { tag, result }
            }),
            Effect::TriggerIngestion => self.spawn(move |gateway| async move {
                Outcome::Ingestion(gateway.trigger_ingestion().await)
            }),
        }
    }

    fn spawn<F, Fut>(&self, job: F)
    where
        F: FnOnce(Arc<dyn MarketGateway>) -> Fut,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        let task = job(self.gateway.clone());
        let replies = self.replies.clone();
        let journal = self.journal.clone();
        tokio::spawn(async move {
            let outcome = task.await;
            if let Some(err) = outcome.error() {
                warn!(request = outcome.label(), error = %err, "gateway call failed");
                if let Err(log_err) = journal.record(outcome.label(), err) {
                    warn!(error = %log_err, "failed to append error journal");
                }
            }
            let _ = replies.send(outcome);
        });
    }
}
