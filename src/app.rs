use std::time::Instant;

use crate::command::{Command, Intent, Outcome};
use crate::model::{Asset, IngestionStatus, Interval, base_symbol};
use crate::notify::{PipelinePhase, PipelineStatus, Severity, StatusChannel};
use crate::selection::SelectionSet;
use crate::session::{AnalysisTag, Applied, ChatTag, SessionController};
use crate::view::{FilterState, Snapshots, Tab, derive_rows};

/// Work the reducer asks the runtime to carry out.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartPolling,
    StopPolling,
    FetchMarket { seq: u64 },
    FetchWatchlist { seq: u64 },
    SaveWatchlist(Vec<Asset>),
    DeleteWatchlistEntry(String),
    FetchAnalysis(AnalysisTag),
    SendChat { tag: ChatTag, text: String },
    TriggerIngestion,
}

/// Orders fetch responses: only a response newer than the last applied one
/// may replace a snapshot.
#[derive(Debug, Default)]
struct FetchSequence {
    issued: u64,
    applied: u64,
}

impl FetchSequence {
    fn next(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    fn accept(&mut self, seq: u64) -> bool {
        if seq <= self.applied {
            return false;
        }
        self.applied = seq;
        true
    }
}

#[derive(Debug)]
pub struct DeskState {
    pub tab: Tab,
    pub filter: FilterState,
    pub selection: SelectionSet,
    pub session: SessionController,
    pub status: StatusChannel,
    pub pipeline: PipelineStatus,
    market: Vec<Asset>,
    watchlist: Vec<Asset>,
    default_interval: Interval,
    market_seq: FetchSequence,
    watchlist_seq: FetchSequence,
}

impl DeskState {
    pub fn new(default_interval: Interval) -> Self {
        DeskState {
            tab: Tab::Market,
            filter: FilterState::default(),
            selection: SelectionSet::new(),
            session: SessionController::new(),
            status: StatusChannel::default(),
            pipeline: PipelineStatus::default(),
            market: Vec::new(),
            watchlist: Vec::new(),
            default_interval,
            market_seq: FetchSequence::default(),
            watchlist_seq: FetchSequence::default(),
        }
    }

    /// Effects to run once before the first event.
    pub fn startup(&self) -> Vec<Effect> {
        vec![Effect::StartPolling]
    }

    pub fn market(&self) -> &[Asset] {
        &self.market
    }

    pub fn watchlist(&self) -> &[Asset] {
        &self.watchlist
    }

    pub fn snapshots(&self) -> Snapshots<'_> {
        Snapshots {
            market: &self.market,
            watchlist: &self.watchlist,
        }
    }

    pub fn rows(&self) -> Vec<&Asset> {
        derive_rows(self.snapshots(), &self.filter, self.tab)
    }

    /// Dismisses the toast and resets the pipeline label once due.
    pub fn expire(&mut self, now: Instant) -> bool {
        let toast = self.status.expire(now);
        let pipeline = self.pipeline.expire(now);
        toast || pipeline
    }

    fn fetch_market(&mut self) -> Effect {
        Effect::FetchMarket {
            seq: self.market_seq.next(),
        }
    }

    fn fetch_watchlist(&mut self) -> Effect {
        Effect::FetchWatchlist {
            seq: self.watchlist_seq.next(),
        }
    }
}

pub fn reduce(state: &mut DeskState, command: Command, now: Instant) -> Vec<Effect> {
    match command {
        Command::Input(intent) => reduce_intent(state, intent, now),
        Command::Reply(outcome) => reduce_outcome(state, outcome, now),
        Command::PollTick => {
            if state.tab == Tab::Market {
                vec![state.fetch_market()]
            } else {
                Vec::new()
            }
        }
        Command::Exit => Vec::new(),
    }
}

fn reduce_intent(state: &mut DeskState, intent: Intent, now: Instant) -> Vec<Effect> {
    match intent {
        Intent::SwitchTab(tab) => {
            if tab == state.tab {
                return Vec::new();
            }
            state.tab = tab;
            match tab {
                Tab::Market => vec![Effect::StartPolling],
                Tab::Watchlist => vec![Effect::StopPolling, state.fetch_watchlist()],
            }
        }
        Intent::SetSearch(term) => {
            state.filter.search_term = term;
            Vec::new()
        }
        Intent::SetCategory(category) => {
            state.filter.category = category;
            Vec::new()
        }
        Intent::ToggleSelect(symbol) => {
            if state.tab == Tab::Market && state.market.iter().any(|a| a.symbol == symbol) {
                state.selection.toggle(&symbol);
            }
            Vec::new()
        }
        Intent::ToggleSelectAll => {
            if state.tab == Tab::Market {
                let snapshots = Snapshots {
                    market: &state.market,
                    watchlist: &state.watchlist,
                };
                let rows = derive_rows(snapshots, &state.filter, Tab::Market);
                state.selection.toggle_all(&rows);
            }
            Vec::new()
        }
        Intent::CommitSelection => match state.selection.resolve(&state.market) {
            Ok(batch) => vec![Effect::SaveWatchlist(batch)],
            Err(err) => {
                state.status.notify(err.to_string(), Severity::Error, now);
                Vec::new()
            }
        },
        Intent::RemoveFromWatchlist(symbol) => vec![Effect::DeleteWatchlistEntry(symbol)],
        Intent::OpenSession { symbol, interval } => {
            let interval = interval.unwrap_or(state.default_interval);
            vec![Effect::FetchAnalysis(state.session.open(&symbol, interval))]
        }
        Intent::ChangeInterval(interval) => state
            .session
            .change_interval(interval)
            .map(Effect::FetchAnalysis)
            .into_iter()
            .collect(),
        Intent::SetChatInput(text) => {
            state.session.set_input(text);
            Vec::new()
        }
        Intent::SendMessage => state
            .session
            .send_message()
            .map(|request| Effect::SendChat {
                tag: request.tag,
                text: request.text,
            })
            .into_iter()
            .collect(),
        Intent::CloseSession => {
            state.session.close();
            Vec::new()
        }
        Intent::Refresh => match state.tab {
            Tab::Market => vec![state.fetch_market()],
            Tab::Watchlist => vec![state.fetch_watchlist()],
        },
        Intent::TriggerIngestion => {
            if state.pipeline.is_running() {
                return Vec::new();
            }
            state.pipeline.set(PipelinePhase::Running, now);
            vec![Effect::TriggerIngestion]
        }
    }
}

fn reduce_outcome(state: &mut DeskState, outcome: Outcome, now: Instant) -> Vec<Effect> {
    match outcome {
        Outcome::Market { seq, result } => {
            // failures keep the last snapshot on screen until the next tick
            if let Ok(assets) = result {
                if state.market_seq.accept(seq) {
                    state.market = assets;
                    state.selection.reconcile(&state.market);
                }
            }
            Vec::new()
        }
        Outcome::Watchlist { seq, result } => {
            if let Ok(assets) = result {
                if state.watchlist_seq.accept(seq) {
                    state.watchlist = assets;
                }
            }
            Vec::new()
        }
        Outcome::WatchlistSaved { symbols, result } => match result {
            Ok(()) => {
                state
                    .selection
                    .remove_all(symbols.iter().map(String::as_str));
                state.status.notify(
                    format!("{} assets saved to watchlist", symbols.len()),
                    Severity::Success,
                    now,
                );
                vec![state.fetch_watchlist()]
            }
            Err(_) => {
                state
                    .status
                    .notify("Watchlist store unreachable", Severity::Error, now);
                Vec::new()
            }
        },
        Outcome::WatchlistEntryRemoved { symbol, result } => match result {
            Ok(()) => {
                state.status.notify(
                    format!("{} removed", base_symbol(&symbol)),
                    Severity::Neutral,
                    now,
                );
                vec![state.fetch_watchlist()]
            }
            Err(_) => {
                state.status.notify(
                    format!("Could not remove {}", base_symbol(&symbol)),
                    Severity::Error,
                    now,
                );
                Vec::new()
            }
        },
        Outcome::Analysis { tag, result } => {
            if let Applied::Failed(_) = state.session.apply_analysis(&tag, result) {
                state.status.notify(
                    format!("Analysis unavailable for {}", base_symbol(&tag.symbol)),
                    Severity::Error,
                    now,
                );
            }
            Vec::new()
        }
        Outcome::ChatReply { tag, result } => {
            if let Applied::Failed(_) = state.session.apply_reply(&tag, result) {
                state
                    .status
                    .notify("AI engine offline", Severity::Error, now);
            }
            Vec::new()
        }
        Outcome::Ingestion(result) => match result {
            Ok(IngestionStatus::Success) => {
                state.pipeline.set(PipelinePhase::Succeeded, now);
                state
                    .status
                    .notify("Ingestion completed", Severity::Success, now);
                vec![state.fetch_market()]
            }
            Ok(IngestionStatus::Failure(reason)) => {
                state.pipeline.set(PipelinePhase::Failed, now);
                state
                    .status
                    .notify(format!("Ingestion failed: {reason}"), Severity::Error, now);
                Vec::new()
            }
            Err(_) => {
                state.pipeline.set(PipelinePhase::Failed, now);
                state
                    .status
                    .notify("Ingestion failed to run", Severity::Error, now);
                Vec::new()
            }
        },
    }
}
