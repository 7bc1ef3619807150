use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const QUOTE_SUFFIX: &str = "USDT";
const DEFAULT_RSI: f64 = 50.0;
const RSI_OVERSOLD: f64 = 30.0;
const RSI_OVERBOUGHT: f64 = 70.0;

/// One row of the market feed. Snapshots are replaced wholesale, never
/// patched field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub volume: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rsi: Option<f64>,
}

impl Asset {
    pub fn base_symbol(&self) -> &str {
        base_symbol(&self.symbol)
    }

    pub fn rsi_or_default(&self) -> f64 {
        self.rsi.unwrap_or(DEFAULT_RSI)
    }

    pub fn rsi_band(&self) -> RsiBand {
        let rsi = self.rsi_or_default();
        if rsi < RSI_OVERSOLD {
            RsiBand::Oversold
        } else if rsi > RSI_OVERBOUGHT {
            RsiBand::Overbought
        } else {
            RsiBand::Neutral
        }
    }

    pub fn volume_millions(&self) -> f64 {
        self.volume / 1_000_000.0
    }
}

/// Strips the quote currency suffix, e.g. `BTCUSDT` -> `BTC`.
pub fn base_symbol(symbol: &str) -> &str {
    symbol.strip_suffix(QUOTE_SUFFIX).unwrap_or(symbol)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsiBand {
    Oversold,
    Neutral,
    Overbought,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    #[serde(rename = "time")]
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Interval {
    M15,
    #[default]
    H1,
    H4,
    D1,
}

impl Interval {
    pub const ALL: [Interval; 4] = [Interval::M15, Interval::H1, Interval::H4, Interval::D1];

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::M15 => "15m",
            Interval::H1 => "1h",
            Interval::H4 => "4h",
            Interval::D1 => "1d",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Interval::ALL
            .into_iter()
            .find(|interval| interval.as_str() == normalized)
            .ok_or_else(|| format!("unsupported chart interval `{s}` (use 15m, 1h, 4h or 1d)"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub label: String,
    pub rsi: f64,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub history: Vec<Candle>,
    pub signal: Signal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatSender {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender: ChatSender,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        ChatMessage {
            sender: ChatSender::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        ChatMessage {
            sender: ChatSender::Assistant,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestionStatus {
    Success,
    Failure(String),
}
