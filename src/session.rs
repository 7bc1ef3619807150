use crate::error::DeskError;
use crate::model::{Analysis, Candle, ChatMessage, Interval, Signal, base_symbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Opening,
    Open,
}

/// The single detail session: one symbol, its history for the chosen
/// interval and the conversation about it.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub symbol: String,
    pub interval: Interval,
    pub phase: SessionPhase,
    pub history: Vec<Candle>,
    pub signal: Option<Signal>,
    pub transcript: Vec<ChatMessage>,
    epoch: u64,
    first_load_pending: bool,
}

impl Session {
    pub fn is_loading(&self) -> bool {
        self.phase == SessionPhase::Opening
    }
}

/// Identifies the session state an analysis request was issued under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisTag {
    pub symbol: String,
    pub interval: Interval,
    pub epoch: u64,
    pub seq: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTag {
    pub symbol: String,
    pub epoch: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub tag: ChatTag,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Applied,
    Stale,
    Failed(DeskError),
}

#[derive(Debug, Default)]
pub struct SessionController {
    session: Option<Session>,
    input: String,
    next_epoch: u64,
    next_seq: u64,
    pending_seq: Option<u64>,
}

impl SessionController {
    pub fn new() -> Self {
        SessionController::default()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Opens `symbol`, or reloads it at `interval` when it is already the
    /// open symbol. Returns the tag the history fetch must carry.
    pub fn open(&mut self, symbol: &str, interval: Interval) -> AnalysisTag {
        let same_symbol = self
            .session
            .as_ref()
            .is_some_and(|session| session.symbol == symbol);
        if !same_symbol {
            self.next_epoch += 1;
            self.input.clear();
            self.session = Some(Session {
                symbol: symbol.to_string(),
                interval,
                phase: SessionPhase::Opening,
                history: Vec::new(),
                signal: None,
                transcript: vec![ChatMessage::assistant(format!(
                    "Analyzing {} market structure...",
                    base_symbol(symbol)
                ))],
                epoch: self.next_epoch,
                first_load_pending: true,
            });
        }
        self.issue(interval)
    }

    pub fn change_interval(&mut self, interval: Interval) -> Option<AnalysisTag> {
        self.session.as_ref()?;
        Some(self.issue(interval))
    }

    fn issue(&mut self, interval: Interval) -> AnalysisTag {
        self.next_seq += 1;
        self.pending_seq = Some(self.next_seq);
        let epoch = self.next_epoch;
        let symbol = self
            .session
            .as_mut()
            .map(|session| {
                session.interval = interval;
                session.symbol.clone()
            })
            .unwrap_or_default();
        AnalysisTag {
            symbol,
            interval,
            epoch,
            seq: self.next_seq,
        }
    }

    fn is_current(&self, tag: &AnalysisTag) -> bool {
        self.pending_seq == Some(tag.seq)
            && self.session.as_ref().is_some_and(|session| {
                session.epoch == tag.epoch
                    && session.symbol == tag.symbol
                    && session.interval == tag.interval
            })
    }

    pub fn apply_analysis(
        &mut self,
        tag: &AnalysisTag,
        result: Result<Analysis, DeskError>,
    ) -> Applied {
        if !self.is_current(tag) {
            return Applied::Stale;
        }
        self.pending_seq = None;
        let Some(session) = self.session.as_mut() else {
            return Applied::Stale;
        };
        session.phase = SessionPhase::Open;
        match result {
            Ok(analysis) => {
                session.history = analysis.history;
                if session.first_load_pending {
                    session.first_load_pending = false;
                    session.transcript = vec![ChatMessage::assistant(analysis_message(
                        &analysis.signal,
                    ))];
                }
                session.signal = Some(analysis.signal);
                Applied::Applied
            }
            Err(err) => {
                session.first_load_pending = false;
                Applied::Failed(err)
            }
        }
    }

    /// Appends the buffered text as a user message and hands back the reply
    /// request. Blank input and a closed session leave everything as is.
    pub fn send_message(&mut self) -> Option<ChatRequest> {
        if self.input.trim().is_empty() {
            return None;
        }
        let session = self.session.as_mut()?;
        let text = std::mem::take(&mut self.input);
        session.transcript.push(ChatMessage::user(text.clone()));
        Some(ChatRequest {
            tag: ChatTag {
                symbol: session.symbol.clone(),
                epoch: session.epoch,
            },
            text,
        })
    }

    /// Replies tagged for a session that has since closed or switched are
    /// dropped, failures included.
    pub fn apply_reply(&mut self, tag: &ChatTag, result: Result<String, DeskError>) -> Applied {
        let Some(session) = self
            .session
            .as_mut()
            .filter(|session| session.epoch == tag.epoch && session.symbol == tag.symbol)
        else {
            return Applied::Stale;
        };
        match result {
            Ok(reply) => {
                session.transcript.push(ChatMessage::assistant(reply));
                Applied::Applied
            }
            Err(err) => Applied::Failed(err),
        }
    }

    pub fn close(&mut self) {
        self.session = None;
        self.pending_seq = None;
        self.input.clear();
    }
}

fn analysis_message(signal: &Signal) -> String {
    let mut text = format!(
        "Market Intelligence\nSignal: {}\nRSI: {}",
        signal.label, signal.rsi
    );
    if let Some(reason) = signal.reason.as_deref().filter(|reason| !reason.is_empty()) {
        text.push_str("\nView: ");
        text.push_str(reason);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChatSender;

    fn analysis(close: f64, label: &str) -> Analysis {
        Analysis {
            history: vec![
                Candle {
                    timestamp: 1_700_000_000_000,
                    open: close - 1.0,
                    high: close + 2.0,
                    low: close - 2.0,
                    close,
                },
                Candle {
                    timestamp: 1_700_003_600_000,
                    open: close,
                    high: close + 1.0,
                    low: close - 1.0,
                    close: close + 0.5,
                },
            ],
            signal: Signal {
                label: label.to_string(),
                rsi: 42.5,
                reason: None,
            },
        }
    }

    fn offline() -> DeskError {
        DeskError::transport("fetch analysis", "connection refused")
    }

    #[test]
    fn open_seeds_placeholder_then_replaces_it() {
        let mut controller = SessionController::new();
        let tag = controller.open("BTCUSDT", Interval::H1);
        let session = controller.session().expect("session opening");
        assert!(session.is_loading());
        assert_eq!(session.transcript.len(), 1);
        assert!(session.transcript[0].text.contains("BTC"));

        assert_eq!(
            controller.apply_analysis(&tag, Ok(analysis(100.0, "BUY"))),
            Applied::Applied
        );
        let session = controller.session().expect("session open");
        assert_eq!(session.phase, SessionPhase::Open);
        assert_eq!(session.history.len(), 2);
        assert_eq!(session.transcript.len(), 1);
        assert!(session.transcript[0].text.starts_with("Market Intelligence"));
        assert!(session.transcript[0].text.contains("Signal: BUY"));
    }

    #[test]
    fn interval_switch_keeps_transcript_and_replaces_history() {
        let mut controller = SessionController::new();
        let tag = controller.open("BTCUSDT", Interval::H1);
        controller.apply_analysis(&tag, Ok(analysis(100.0, "BUY")));
        controller.set_input("should I buy?");
        controller.send_message().expect("message sent");
        let before = controller.session().map(|s| s.transcript.clone()).unwrap_or_default();

        let tag = controller.change_interval(Interval::H4).expect("session is open");
        assert_eq!(tag.interval, Interval::H4);
        controller.apply_analysis(&tag, Ok(analysis(200.0, "SELL")));

        let session = controller.session().expect("session open");
        assert_eq!(session.interval, Interval::H4);
        assert_eq!(session.transcript, before);
        assert_eq!(session.history[0].close, 200.0);
        assert_eq!(session.signal.as_ref().map(|s| s.label.as_str()), Some("SELL"));
    }

    #[test]
    fn reopening_same_symbol_with_new_interval_follows_same_symbol_path() {
        let mut controller = SessionController::new();
        let tag = controller.open("BTCUSDT", Interval::H1);
        controller.apply_analysis(&tag, Ok(analysis(100.0, "BUY")));
        controller.set_input("rsi?");
        controller.send_message();

        let tag = controller.open("BTCUSDT", Interval::D1);
        controller.apply_analysis(&tag, Ok(analysis(300.0, "HOLD")));
        let session = controller.session().expect("session open");
        assert_eq!(session.transcript.len(), 2);
        assert_eq!(session.history[0].close, 300.0);
    }

    #[test]
    fn symbol_switch_resets_transcript() {
        let mut controller = SessionController::new();
        let tag = controller.open("BTCUSDT", Interval::H1);
        controller.apply_analysis(&tag, Ok(analysis(100.0, "BUY")));
        controller.set_input("hello");
        controller.send_message();

        let tag = controller.open("ETHUSDT", Interval::H1);
        let session = controller.session().expect("session opening");
        assert_eq!(session.symbol, "ETHUSDT");
        assert_eq!(session.transcript.len(), 1);
        assert!(session.history.is_empty());
        controller.apply_analysis(&tag, Ok(analysis(3_000.0, "SELL")));
        let session = controller.session().expect("session open");
        assert_eq!(session.transcript.len(), 1);
        assert!(session.transcript[0].text.contains("SELL"));
    }

    #[test]
    fn late_response_for_previous_symbol_is_discarded() {
        let mut controller = SessionController::new();
        let eth = controller.open("ETHUSDT", Interval::H1);
        let btc = controller.open("BTCUSDT", Interval::H1);

        assert_eq!(
            controller.apply_analysis(&btc, Ok(analysis(64_000.0, "BUY"))),
            Applied::Applied
        );
        assert_eq!(
            controller.apply_analysis(&eth, Ok(analysis(3_000.0, "SELL"))),
            Applied::Stale
        );
        let session = controller.session().expect("session open");
        assert_eq!(session.symbol, "BTCUSDT");
        assert_eq!(session.history[0].close, 64_000.0);
        assert_eq!(session.signal.as_ref().map(|s| s.label.as_str()), Some("BUY"));
    }

    #[test]
    fn superseded_interval_request_is_discarded() {
        let mut controller = SessionController::new();
        let first = controller.open("BTCUSDT", Interval::H1);
        let second = controller.change_interval(Interval::M15).expect("session is open");
        assert_eq!(
            controller.apply_analysis(&second, Ok(analysis(10.0, "HOLD"))),
            Applied::Applied
        );
        assert_eq!(
            controller.apply_analysis(&first, Ok(analysis(20.0, "BUY"))),
            Applied::Stale
        );
        let session = controller.session().expect("session open");
        assert_eq!(session.interval, Interval::M15);
        assert_eq!(session.history[0].close, 10.0);
        // the interval switch happened before the first load landed
        assert!(session.transcript[0].text.contains("HOLD"));
    }

    #[test]
    fn reopen_after_close_is_a_full_reload() {
        let mut controller = SessionController::new();
        let tag = controller.open("BTCUSDT", Interval::H1);
        controller.apply_analysis(&tag, Ok(analysis(100.0, "BUY")));
        controller.set_input("hi");
        controller.send_message();
        controller.close();
        assert!(!controller.is_open());
        assert_eq!(
            controller.apply_analysis(&tag, Ok(analysis(1.0, "SELL"))),
            Applied::Stale
        );

        let tag = controller.open("BTCUSDT", Interval::H1);
        assert_eq!(controller.session().map(|s| s.transcript.len()), Some(1));
        controller.apply_analysis(&tag, Ok(analysis(100.0, "HOLD")));
        let session = controller.session().expect("session open");
        assert_eq!(session.transcript.len(), 1);
        assert!(session.transcript[0].text.contains("HOLD"));
    }

    #[test]
    fn failed_load_keeps_prior_state() {
        let mut controller = SessionController::new();
        let tag = controller.open("BTCUSDT", Interval::H1);
        controller.apply_analysis(&tag, Ok(analysis(100.0, "BUY")));
        let tag = controller.change_interval(Interval::D1).expect("session is open");
        assert!(matches!(
            controller.apply_analysis(&tag, Err(offline())),
            Applied::Failed(_)
        ));
        let session = controller.session().expect("session open");
        assert_eq!(session.phase, SessionPhase::Open);
        assert_eq!(session.history[0].close, 100.0);
        assert_eq!(session.transcript.len(), 1);
    }

    #[test]
    fn change_interval_without_session_is_noop() {
        let mut controller = SessionController::new();
        assert!(controller.change_interval(Interval::H4).is_none());
        assert!(controller.session().is_none());
    }

    #[test]
    fn blank_message_is_ignored() {
        let mut controller = SessionController::new();
        let tag = controller.open("BTCUSDT", Interval::H1);
        controller.apply_analysis(&tag, Ok(analysis(100.0, "BUY")));
        controller.set_input("  ");
        assert!(controller.send_message().is_none());
        assert_eq!(controller.session().map(|s| s.transcript.len()), Some(1));
        assert_eq!(controller.input(), "  ");
    }

    #[test]
    fn message_without_session_is_ignored() {
        let mut controller = SessionController::new();
        controller.set_input("anyone?");
        assert!(controller.send_message().is_none());
    }

    #[test]
    fn user_message_survives_failed_reply() {
        let mut controller = SessionController::new();
        let tag = controller.open("BTCUSDT", Interval::H1);
        controller.apply_analysis(&tag, Ok(analysis(100.0, "BUY")));
        controller.set_input("should I buy?");
        let request = controller.send_message().expect("message sent");
        assert_eq!(request.text, "should I buy?");
        assert_eq!(controller.input(), "");

        let outcome = controller.apply_reply(
            &request.tag,
            Err(DeskError::transport("chat", "engine offline")),
        );
        assert!(matches!(outcome, Applied::Failed(_)));
        let transcript = &controller.session().expect("session open").transcript;
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1].sender, ChatSender::User);
    }

    #[test]
    fn reply_lands_in_the_session_it_was_asked_in() {
        let mut controller = SessionController::new();
        controller.open("BTCUSDT", Interval::H1);
        controller.set_input("trend?");
        let request = controller.send_message().expect("message sent");
        assert_eq!(
            controller.apply_reply(&request.tag, Ok("Uptrend".to_string())),
            Applied::Applied
        );
        let transcript = &controller.session().expect("session open").transcript;
        assert_eq!(transcript.last().map(|m| m.sender), Some(ChatSender::Assistant));

        controller.set_input("and now?");
        let request = controller.send_message().expect("message sent");
        controller.open("ETHUSDT", Interval::H1);
        assert_eq!(
            controller.apply_reply(&request.tag, Ok("late".to_string())),
            Applied::Stale
        );
        assert_eq!(controller.session().map(|s| s.transcript.len()), Some(1));
    }

    #[test]
    fn failed_first_load_leaves_later_loads_on_the_same_symbol_path() {
        let mut controller = SessionController::new();
        let tag = controller.open("BTCUSDT", Interval::H1);
        assert!(matches!(
            controller.apply_analysis(&tag, Err(offline())),
            Applied::Failed(_)
        ));
        let session = controller.session().expect("session open");
        assert_eq!(session.phase, SessionPhase::Open);
        assert!(session.history.is_empty());
        assert!(session.transcript[0].text.starts_with("Analyzing BTC"));

        controller.set_input("buy?");
        let request = controller.send_message().expect("message sent");
        controller.apply_reply(&request.tag, Ok("yes".to_string()));
        let before = controller.session().map(|s| s.transcript.clone()).unwrap_or_default();
        assert_eq!(before.len(), 3);

        let tag = controller.change_interval(Interval::H4).expect("session is open");
        assert_eq!(
            controller.apply_analysis(&tag, Ok(analysis(200.0, "SELL"))),
            Applied::Applied
        );
        let session = controller.session().expect("session open");
        assert_eq!(session.transcript, before);
        assert_eq!(session.history[0].close, 200.0);
    }

    #[test]
    fn failed_reply_for_closed_or_switched_session_is_stale() {
        let mut controller = SessionController::new();
        controller.open("BTCUSDT", Interval::H1);
        controller.set_input("trend?");
        let request = controller.send_message().expect("message sent");
        controller.close();
        assert_eq!(
            controller.apply_reply(&request.tag, Err(DeskError::transport("chat", "offline"))),
            Applied::Stale
        );

        controller.open("BTCUSDT", Interval::H1);
        controller.set_input("again?");
        let request = controller.send_message().expect("message sent");
        controller.open("ETHUSDT", Interval::H1);
        assert_eq!(
            controller.apply_reply(&request.tag, Err(DeskError::transport("chat", "offline"))),
            Applied::Stale
        );
    }
}
