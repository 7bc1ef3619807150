use crate::error::DeskError;
use crate::model::{Analysis, Asset, IngestionStatus, Interval};
use crate::session::{AnalysisTag, ChatTag};
use crate::view::{Category, Tab};

/// Everything the desk loop reacts to, whether it came from the keyboard,
/// the poll scheduler or a finished gateway call.
#[derive(Debug, Clone)]
pub enum Command {
    Input(Intent),
    Reply(Outcome),
    PollTick,
    Exit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    SwitchTab(Tab),
    SetSearch(String),
    SetCategory(Category),
    ToggleSelect(String),
    ToggleSelectAll,
    CommitSelection,
    RemoveFromWatchlist(String),
    OpenSession {
        symbol: String,
        interval: Option<Interval>,
    },
    ChangeInterval(Interval),
    SetChatInput(String),
    SendMessage,
    CloseSession,
    Refresh,
    TriggerIngestion,
}

/// Completion of a gateway call, carrying the context it was issued under.
#[derive(Debug, Clone)]
pub enum Outcome {
    Market {
        seq: u64,
        result: Result<Vec<Asset>, DeskError>,
    },
    Watchlist {
        seq: u64,
        result: Result<Vec<Asset>, DeskError>,
    },
    WatchlistSaved {
        symbols: Vec<String>,
        result: Result<(), DeskError>,
    },
    WatchlistEntryRemoved {
        symbol: String,
        result: Result<(), DeskError>,
    },
    Analysis {
        tag: AnalysisTag,
        result: Result<Analysis, DeskError>,
    },
    ChatReply {
        tag: ChatTag,
        result: Result<String, DeskError>,
    },
    Ingestion(Result<IngestionStatus, DeskError>),
}

impl Outcome {
    pub fn error(&self) -> Option<&DeskError> {
        match self {
            Outcome::Market { result, .. } | Outcome::Watchlist { result, .. } => {
                result.as_ref().err()
            }
            Outcome::WatchlistSaved { result, .. }
            | Outcome::WatchlistEntryRemoved { result, .. } => result.as_ref().err(),
            Outcome::Analysis { result, .. } => result.as_ref().err(),
            Outcome::ChatReply { result, .. } => result.as_ref().err(),
            Outcome::Ingestion(result) => result.as_ref().err(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Market { .. } => "market",
            Outcome::Watchlist { .. } => "watchlist",
            Outcome::WatchlistSaved { .. } => "watchlist save",
            Outcome::WatchlistEntryRemoved { .. } => "watchlist delete",
            Outcome::Analysis { .. } => "analysis",
            Outcome::ChatReply { .. } => "chat",
            Outcome::Ingestion(_) => "ingestion",
        }
    }
}
