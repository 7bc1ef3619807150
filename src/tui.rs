use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols;
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Axis, Block, Cell, Chart, Clear, Dataset, GraphType, Paragraph, Row, Table, TableState, Wrap,
};
use tokio::sync::{broadcast, mpsc};
use tracing::warn;

use crate::app::{DeskState, reduce};
use crate::command::{Command, Intent, Outcome};
use crate::model::{Asset, ChatSender, Interval, RsiBand, base_symbol};
use crate::notify::{PipelinePhase, Severity};
use crate::runtime::EffectRunner;
use crate::session::Session;
use crate::view::{Category, Tab};

const SELECTED_MARK: &str = "★";
const UNSELECTED_MARK: &str = "☆";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputMode {
    Normal,
    Search,
    Chat,
}

pub struct TuiApp {
    state: DeskState,
    runner: EffectRunner,
    table: TableState,
    mode: InputMode,
    last_draw: Instant,
    min_redraw_gap: Duration,
}

impl TuiApp {
    pub fn new(state: DeskState, runner: EffectRunner) -> TuiApp {
        let min_redraw_gap = Duration::from_millis(100);
        TuiApp {
            state,
            runner,
            table: TableState::default().with_selected(Some(0)),
            mode: InputMode::Normal,
            last_draw: Instant::now()
                .checked_sub(min_redraw_gap)
                .unwrap_or_else(Instant::now),
            min_redraw_gap,
        }
    }

    pub fn dispose(&mut self) {
        self.runner.shutdown();
        ratatui::restore();
    }

    pub async fn run(
        &mut self,
        rx: &mut broadcast::Receiver<Command>,
        replies: &mut mpsc::UnboundedReceiver<Outcome>,
    ) -> Result<()> {
        color_eyre::install()?;
        let mut terminal = ratatui::init();
        let startup = self.state.startup();
        self.runner.dispatch(startup);
        let mut input_tick = tokio::time::interval(self.min_redraw_gap);
        terminal.draw(|frame| self.render(frame))?;
        self.last_draw = Instant::now();
        loop {
            tokio::select! {
                biased;
                _ = input_tick.tick() => {
                    let mut should_redraw = self.state.expire(Instant::now());
                    match self.poll_input()? {
                        InputResult::Exit => return Ok(()),
                        InputResult::Handled => should_redraw = true,
                        InputResult::Idle => {}
                    }
                    if should_redraw {
                        terminal.draw(|frame| self.render(frame))?;
                        self.last_draw = Instant::now();
                    }
                }
                Some(outcome) = replies.recv() => {
                    self.apply(Command::Reply(outcome));
                    if self.last_draw.elapsed() >= self.min_redraw_gap {
                        terminal.draw(|frame| self.render(frame))?;
                        self.last_draw = Instant::now();
                    }
                }
                result = rx.recv() => {
                    match result {
                        Ok(Command::Exit) | Err(broadcast::error::RecvError::Closed) => break,
                        Ok(command) => {
                            self.apply(command);
                            if self.last_draw.elapsed() >= self.min_redraw_gap {
                                terminal.draw(|frame| self.render(frame))?;
                                self.last_draw = Instant::now();
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "command bus lagged");
                            continue;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, command: Command) {
        let effects = reduce(&mut self.state, command, Instant::now());
        self.runner.dispatch(effects);
        self.clamp_cursor();
    }

    fn intent(&mut self, intent: Intent) {
        self.apply(Command::Input(intent));
    }

    fn clamp_cursor(&mut self) {
        let len = self.state.rows().len();
        let selected = self.table.selected().unwrap_or(0);
        self.table.select(Some(selected.min(len.saturating_sub(1))));
    }

    fn move_cursor(&mut self, delta: isize) {
        let len = self.state.rows().len();
        if len == 0 {
            return;
        }
        let current = self.table.selected().unwrap_or(0) as isize;
        let next = (current + delta).clamp(0, len as isize - 1);
        self.table.select(Some(next as usize));
    }

    fn cursor_symbol(&self) -> Option<String> {
        let rows = self.state.rows();
        self.table
            .selected()
            .and_then(|idx| rows.get(idx))
            .map(|asset| asset.symbol.clone())
    }

    /// Size of the active tab's snapshot before filtering.
    fn listed_count(&self) -> usize {
        self.state.snapshots().for_tab(self.state.tab).len()
    }

    fn poll_input(&mut self) -> Result<InputResult> {
        let mut result = InputResult::Idle;
        while event::poll(Duration::from_millis(0))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if self.handle_key_event(key) {
                    return Ok(InputResult::Exit);
                }
                result = InputResult::Handled;
            }
        }
        Ok(result)
    }

    /// Returns true when the user asked to quit.
    fn handle_key_event(&mut self, key: KeyEvent) -> bool {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return true;
        }
        match self.mode {
            InputMode::Search => {
                self.handle_search_key(key);
                false
            }
            InputMode::Chat => {
                self.handle_chat_key(key);
                false
            }
            InputMode::Normal if self.state.session.is_open() => self.handle_session_key(key),
            InputMode::Normal => self.handle_table_key(key),
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        let mut term = self.state.filter.search_term.clone();
        match key.code {
            KeyCode::Enter | KeyCode::Esc => self.mode = InputMode::Normal,
            KeyCode::Backspace => {
                term.pop();
                self.intent(Intent::SetSearch(term));
            }
            KeyCode::Char(c) => {
                term.push(c);
                self.intent(Intent::SetSearch(term));
            }
            _ => {}
        }
    }

    fn handle_chat_key(&mut self, key: KeyEvent) {
        let mut text = self.state.session.input().to_string();
        match key.code {
            KeyCode::Esc => self.mode = InputMode::Normal,
            KeyCode::Enter => self.intent(Intent::SendMessage),
            KeyCode::Backspace => {
                text.pop();
                self.intent(Intent::SetChatInput(text));
            }
            KeyCode::Char(c) => {
                text.push(c);
                self.intent(Intent::SetChatInput(text));
            }
            _ => {}
        }
    }

    fn handle_session_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => return true,
            KeyCode::Esc => self.intent(Intent::CloseSession),
            KeyCode::Char('i') => self.mode = InputMode::Chat,
            KeyCode::Char(c @ '1'..='4') => {
                let idx = c as usize - '1' as usize;
                self.intent(Intent::ChangeInterval(Interval::ALL[idx]));
            }
            _ => {}
        }
        false
    }

    fn handle_table_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => return true,
            KeyCode::Tab => self.intent(Intent::SwitchTab(self.state.tab.toggled())),
            KeyCode::Char('/') => self.mode = InputMode::Search,
            KeyCode::Char('a') => self.intent(Intent::SetCategory(Category::All)),
            KeyCode::Char('g') => self.intent(Intent::SetCategory(Category::Gainers)),
            KeyCode::Char('l') => self.intent(Intent::SetCategory(Category::Losers)),
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(1),
            KeyCode::Char(' ') => {
                if let Some(symbol) = self.cursor_symbol() {
                    self.intent(Intent::ToggleSelect(symbol));
                }
            }
            KeyCode::Char('A') => self.intent(Intent::ToggleSelectAll),
            KeyCode::Char('s') if self.state.tab == Tab::Market => {
                self.intent(Intent::CommitSelection)
            }
            KeyCode::Char('d') if self.state.tab == Tab::Watchlist => {
                if let Some(symbol) = self.cursor_symbol() {
                    self.intent(Intent::RemoveFromWatchlist(symbol));
                }
            }
            KeyCode::Enter => {
                if let Some(symbol) = self.cursor_symbol() {
                    self.intent(Intent::OpenSession {
                        symbol,
                        interval: None,
                    });
                }
            }
            KeyCode::Char('r') => self.intent(Intent::Refresh),
            KeyCode::Char('p') => self.intent(Intent::TriggerIngestion),
            _ => {}
        }
        false
    }

    fn render(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(5),
                Constraint::Length(3),
            ])
            .split(frame.area());
        self.render_header(frame, chunks[0]);
        self.render_table(frame, chunks[1]);
        self.render_footer(frame, chunks[2]);
        if let Some(session) = self.state.session.session() {
            self.render_session(frame, session);
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let search = if self.mode == InputMode::Search {
            format!("/{}_", self.state.filter.search_term)
        } else if self.state.filter.search_term.is_empty() {
            "/ to search".to_string()
        } else {
            format!("/{}", self.state.filter.search_term)
        };
        let mut spans = vec![
            Span::styled(
                self.state.tab.title(),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(search, Style::default().fg(Color::Cyan)),
            Span::raw("  "),
            Span::raw(format!("[{}]", self.state.filter.category.label())),
            Span::raw(format!(
                "  Listed: {}  Showing: {}",
                self.listed_count(),
                self.state.rows().len()
            )),
        ];
        if self.state.tab == Tab::Market && !self.state.selection.is_empty() {
            spans.push(Span::styled(
                format!("  s: save selected ({})", self.state.selection.len()),
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ));
        }
        let header = Paragraph::new(Line::from(spans)).block(Block::bordered().title("trade-watch"));
        frame.render_widget(header, area);
    }

    fn render_table(&mut self, frame: &mut Frame, area: Rect) {
        let show_marks = self.state.tab == Tab::Market;
        let rows: Vec<Row> = self
            .state
            .rows()
            .into_iter()
            .map(|asset| {
                let selected = self.state.selection.contains(&asset.symbol);
                asset_row(asset, show_marks, selected)
            })
            .collect();
        let empty = rows.is_empty();
        let mut header = vec!["Asset", "Price (USDT)", "24h Change", "RSI", "Volume"];
        let mut widths = vec![
            Constraint::Length(12),
            Constraint::Length(16),
            Constraint::Length(12),
            Constraint::Length(8),
            Constraint::Length(12),
        ];
        if show_marks {
            header.insert(0, "Fav");
            widths.insert(0, Constraint::Length(4));
        }
        let table = Table::new(rows, widths)
            .header(Row::new(header).style(Style::default().add_modifier(Modifier::BOLD)))
            .row_highlight_style(
                Style::default()
                    .bg(Color::LightCyan)
                    .fg(Color::Black)
                    .add_modifier(Modifier::BOLD),
            )
            .block(Block::bordered());
        frame.render_stateful_widget(table, area, &mut self.table);
        if empty && area.height > 4 {
            let inner = Rect::new(area.x + 2, area.y + 3, area.width.saturating_sub(4), 1);
            frame.render_widget(
                Paragraph::new("No assets match your criteria.")
                    .alignment(Alignment::Center)
                    .style(Style::default().fg(Color::DarkGray)),
                inner,
            );
        }
    }

    fn render_footer(&self, frame: &mut Frame, area: Rect) {
        let pipeline_color = match self.state.pipeline.phase() {
            PipelinePhase::Idle => Color::Gray,
            PipelinePhase::Running => Color::Yellow,
            PipelinePhase::Succeeded => Color::Green,
            PipelinePhase::Failed => Color::Red,
        };
        let mut spans = vec![Span::styled(
            format!("Pipeline: {}", self.state.pipeline.label()),
            Style::default().fg(pipeline_color),
        )];
        match self.state.status.current() {
            Some(message) => {
                spans.push(Span::raw("  |  "));
                spans.push(Span::styled(
                    message.text.clone(),
                    Style::default()
                        .fg(severity_color(message.severity))
                        .add_modifier(Modifier::BOLD),
                ));
            }
            None => spans.push(Span::styled(
                "  Tab switch · / search · a/g/l filter · Space/A select · s save · d remove · Enter analyze · r refresh · p ingest · q quit",
                Style::default().fg(Color::DarkGray),
            )),
        }
        let footer = Paragraph::new(Line::from(spans)).block(Block::bordered().title("Status"));
        frame.render_widget(footer, area);
    }

    fn render_session(&self, frame: &mut Frame, session: &Session) {
        let area = frame.area();
        if area.width < 40 || area.height < 12 {
            return;
        }
        let popup = Rect::new(
            area.x + area.width / 20,
            area.y + area.height / 10,
            area.width - area.width / 10,
            area.height - area.height / 5,
        );
        frame.render_widget(Clear, popup);
        let intervals: Vec<String> = Interval::ALL
            .iter()
            .enumerate()
            .map(|(idx, interval)| {
                if *interval == session.interval {
                    format!("[{}:{}]", idx + 1, interval.as_str().to_uppercase())
                } else {
                    format!(" {}:{} ", idx + 1, interval.as_str().to_uppercase())
                }
            })
            .collect();
        let title = format!(
            "{}/USDT  {}  (Esc close · i chat)",
            base_symbol(&session.symbol),
            intervals.join("")
        );
        let block = Block::bordered().title(title);
        let inner = block.inner(popup);
        frame.render_widget(block, popup);
        let halves = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(inner);
        self.render_history(frame, halves[0], session);
        self.render_transcript(frame, halves[1], session);
    }

    fn render_history(&self, frame: &mut Frame, area: Rect, session: &Session) {
        if session.is_loading() && session.history.is_empty() {
            let loading = Paragraph::new("Loading history...")
                .alignment(Alignment::Center)
                .block(Block::bordered().title("Chart"));
            frame.render_widget(loading, area);
            return;
        }
        let points: Vec<(f64, f64)> = session
            .history
            .iter()
            .map(|candle| (candle.timestamp as f64, candle.close))
            .collect();
        let (x_min, x_max) = match (session.history.first(), session.history.last()) {
            (Some(first), Some(last)) if last.timestamp > first.timestamp => {
                (first.timestamp as f64, last.timestamp as f64)
            }
            _ => (0.0, 1.0),
        };
        let low = session
            .history
            .iter()
            .map(|candle| candle.low)
            .fold(f64::INFINITY, f64::min);
        let high = session
            .history
            .iter()
            .map(|candle| candle.high)
            .fold(f64::NEG_INFINITY, f64::max);
        let (y_min, y_max) = if !low.is_finite() || !high.is_finite() {
            (0.0, 1.0)
        } else if (high - low).abs() < f64::EPSILON {
            let padding = (high.abs() * 0.05).max(1.0);
            (low - padding, high + padding)
        } else {
            let padding = (high - low) * 0.05;
            (low - padding, high + padding)
        };
        let dataset = Dataset::default()
            .name(base_symbol(&session.symbol).to_string())
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Cyan))
            .data(&points);
        let chart = Chart::new(vec![dataset])
            .block(Block::bordered().title(signal_title(session)))
            .x_axis(
                Axis::default()
                    .bounds([x_min, x_max])
                    .labels(vec![time_label(x_min), time_label(x_max)]),
            )
            .y_axis(
                Axis::default()
                    .bounds([y_min, y_max])
                    .labels(vec![format!("{y_min:.2}"), format!("{y_max:.2}")]),
            );
        frame.render_widget(chart, area);
    }

    fn render_transcript(&self, frame: &mut Frame, area: Rect, session: &Session) {
        let parts = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(3)])
            .split(area);
        let mut lines = Vec::new();
        for message in &session.transcript {
            let (label, color) = match message.sender {
                ChatSender::User => ("You", Color::Cyan),
                ChatSender::Assistant => ("AI", Color::Yellow),
            };
            for (idx, text) in message.text.lines().enumerate() {
                let prefix = if idx == 0 {
                    Span::styled(
                        format!("{label}: "),
                        Style::default().fg(color).add_modifier(Modifier::BOLD),
                    )
                } else {
                    Span::raw("    ")
                };
                lines.push(Line::from(vec![prefix, Span::raw(text.to_string())]));
            }
            lines.push(Line::from(""));
        }
        let visible = parts[0].height.saturating_sub(2) as usize;
        let scroll = lines.len().saturating_sub(visible) as u16;
        let transcript = Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0))
            .block(Block::bordered().title("Analysis Engine"));
        frame.render_widget(transcript, parts[0]);

        let (input, style) = if self.mode == InputMode::Chat {
            (
                format!("{}_", self.state.session.input()),
                Style::default().fg(Color::White),
            )
        } else {
            (
                "press i to ask for a prediction".to_string(),
                Style::default().fg(Color::DarkGray),
            )
        };
        let input = Paragraph::new(input)
            .style(style)
            .block(Block::bordered().title("Ask"));
        frame.render_widget(input, parts[1]);
    }
}

enum InputResult {
    Idle,
    Handled,
    Exit,
}

fn asset_row(asset: &Asset, show_marks: bool, selected: bool) -> Row<'static> {
    let change_color = if asset.change >= 0.0 {
        Color::Green
    } else {
        Color::Red
    };
    let arrow = if asset.change >= 0.0 { "▲" } else { "▼" };
    let rsi_color = match asset.rsi_band() {
        RsiBand::Oversold => Color::Green,
        RsiBand::Neutral => Color::Yellow,
        RsiBand::Overbought => Color::Red,
    };
    let mut cells = vec![
        Cell::from(format!("{}/USDT", asset.base_symbol())),
        Cell::from(format!("${:.2}", asset.price)),
        Cell::from(format!("{arrow} {:.2}%", asset.change.abs()))
            .style(Style::default().fg(change_color)),
        Cell::from(format!("{:.0}", asset.rsi_or_default())).style(Style::default().fg(rsi_color)),
        Cell::from(format!("{:.2}M", asset.volume_millions())),
    ];
    if show_marks {
        let mark = if selected { SELECTED_MARK } else { UNSELECTED_MARK };
        cells.insert(0, Cell::from(mark).style(Style::default().fg(Color::Yellow)));
    }
    Row::new(cells)
}

fn signal_title(session: &Session) -> String {
    match &session.signal {
        Some(signal) => format!("Chart · {} · RSI {:.2}", signal.label, signal.rsi),
        None => "Chart".to_string(),
    }
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Success => Color::Green,
        Severity::Error => Color::Red,
        Severity::Neutral => Color::Yellow,
    }
}

fn time_label(ts_ms: f64) -> String {
    if !ts_ms.is_finite() || ts_ms <= 1.0 {
        return "--".to_string();
    }
    DateTime::from_timestamp_millis(ts_ms.round() as i64)
        .map(|dt| dt.with_timezone(&Local).format("%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "--".to_string())
}
