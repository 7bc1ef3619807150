use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;

use crate::gateway::DEFAULT_API_URL;
use crate::model::Interval;

#[derive(Parser, Clone, Debug)]
#[command(name = "trade-watch", about = "Live market monitor with watchlist and analysis sessions")]
pub struct CliParams {
    /// Base URL of the market/watchlist API
    #[clap(
        long = "api-url",
        env = "TRADE_WATCH_API",
        default_value = DEFAULT_API_URL
    )]
    pub api_url: String,

    /// How often the market table refreshes while it is visible (e.g., 5s, 1m)
    #[clap(long = "poll-interval", value_name = "DURATION", default_value = "5s")]
    pub poll_interval: DurationSpec,

    /// Chart interval used when a detail session opens (15m, 1h, 4h, 1d)
    #[clap(long = "interval", value_name = "INTERVAL", default_value = "1h")]
    pub interval: Interval,

    /// JSON-lines journal of failed requests
    #[clap(long = "error-log", env = "TRADE_WATCH_ERROR_LOG", default_value = "error_logs.jsonl")]
    pub error_log: PathBuf,

    /// Diagnostic log file (the terminal is owned by the UI)
    #[clap(long = "log-file", env = "TRADE_WATCH_LOG_FILE", default_value = "trade-watch.log")]
    pub log_file: PathBuf,
}

impl CliParams {
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval.as_duration()
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DurationSpec(Duration);

impl DurationSpec {
    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl FromStr for DurationSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let duration = parse_duration_spec(s)?;
        Ok(DurationSpec(duration))
    }
}

fn parse_duration_spec(input: &str) -> Result<Duration, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("duration spec cannot be empty (examples: 5s, 1m)".to_string());
    }
    let split_idx = trimmed
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .ok_or_else(|| "duration spec must end with a unit like s, m, h, or d".to_string())?;
    if split_idx == 0 {
        return Err("duration spec must start with a number (examples: 5s, 1m)".to_string());
    }
    let (value_part, unit_part) = trimmed.split_at(split_idx);
    let value: f64 = value_part.parse().map_err(|_| {
        format!(
            "invalid numeric portion `{}` in duration spec `{}`",
            value_part, trimmed
        )
    })?;
    let unit = unit_part.trim().to_lowercase();
    let seconds_multiplier = match unit.as_str() {
        "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
        "m" | "min" | "mins" | "minute" | "minutes" => 60.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => 60.0 * 60.0,
        "d" | "day" | "days" => 60.0 * 60.0 * 24.0,
        other => {
            return Err(format!(
                "unsupported duration unit `{}` (use s, m, h, or d)",
                other
            ));
        }
    };
    let seconds = value * seconds_multiplier;
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(format!("duration must be positive: `{}`", trimmed));
    }
    if seconds > Duration::MAX.as_secs_f64() {
        return Err(format!("duration `{}` is too large", trimmed));
    }
    Ok(Duration::from_secs_f64(seconds))
}
