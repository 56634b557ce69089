//! # Terminal User Interface (TUI)
//!
//! Live view of the traced process using `ratatui`.
//!
//! The UI runs on its own thread and never touches the tracer. It talks to
//! the controller through two channels:
//!
//! ```text
//!  TUI thread ── Command ──▶ controller (main) ── Snapshot ──▶ TUI thread
//! ```
//!
//! Every [`SNAPSHOT_POLL_INTERVAL_MS`] the UI asks for a fresh snapshot, the
//! same way a browser front-end would poll.
//!
//! ## Sub-Modules
//!
//! - `status` - target summary (state, samples, CPU, memory)
//! - `threads` - thread list with top frames; Enter picks the focus thread
//! - `stack` - focus thread's stack with inclusive/exclusive counts
//! - `hotspot` - inclusive and exclusive TOP-N rankings
//! - `theme` - Color scheme

// Render functions are long; channel endpoints are moved into the UI thread
#![allow(clippy::too_many_lines, clippy::needless_pass_by_value)]

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{debug, warn};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Terminal,
};
use std::io;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use livetrace_common::{RANKING_LIMIT, SNAPSHOT_POLL_INTERVAL_MS};

mod hotspot;
mod stack;
mod status;
mod theme;
mod threads;

use hotspot::{RankingKind, RankingPanel};
use stack::StackPanel;
use status::SummaryPanel;
use theme::{state_color, CAUTION_AMBER, HUD_GREEN, INFO_DIM};
use threads::ThreadsPanel;

use crate::analysis::{frame_label, rank_snapshot, HotPath};
use crate::control::{Command, Controller, Reply};
use crate::profiling::Snapshot;

// =============================================================================
// STYLE CONSTANTS
// =============================================================================

const STYLE_HEADING: Style = Style::new().fg(HUD_GREEN).add_modifier(Modifier::BOLD);
const STYLE_LABEL: Style = Style::new().fg(CAUTION_AMBER).add_modifier(Modifier::BOLD);
const STYLE_DIM: Style = Style::new().fg(INFO_DIM);
const STYLE_KEY: Style = Style::new().fg(CAUTION_AMBER);
const STYLE_TEXT: Style = Style::new().fg(ratatui::style::Color::White);

const POLL_INTERVAL: Duration = Duration::from_millis(SNAPSHOT_POLL_INTERVAL_MS);

// =============================================================================
// SHARED PANEL HELPERS
// =============================================================================

/// Selection and scroll position of a list that changes under it
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ListCursor {
    selected: usize,
    offset: usize,
}

impl ListCursor {
    pub fn up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn down(&mut self, len: usize) {
        self.selected = (self.selected + 1).min(len.saturating_sub(1));
    }

    /// Selected index clamped to a list of `len` items
    #[must_use]
    pub fn index(&self, len: usize) -> Option<usize> {
        (len > 0).then(|| self.selected.min(len - 1))
    }

    /// First visible item so the selection stays within `visible` rows
    pub fn scroll(&mut self, len: usize, visible: usize) -> usize {
        let selected = self.index(len).unwrap_or(0);
        if selected < self.offset {
            self.offset = selected;
        } else if selected >= self.offset + visible {
            self.offset = selected + 1 - visible;
        }
        self.offset = self.offset.min(len.saturating_sub(visible));
        self.offset
    }
}

/// Truncate a string for display, adding "..." if too long
fn truncate_for_display(s: &str, max_len: usize) -> String {
    if s.chars().count() > max_len {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    } else {
        s.to_string()
    }
}

/// `file:line` with the directory stripped
fn short_source(source: &str) -> String {
    let (path, line) = source.rsplit_once(':').unwrap_or((source, ""));
    let file = std::path::Path::new(path).file_name().and_then(|n| n.to_str()).unwrap_or(path);
    format!("{file}:{line}")
}

fn border_style(active: bool) -> Style {
    Style::default().fg(if active { CAUTION_AMBER } else { HUD_GREEN })
}

// =============================================================================
// VIEW MODES
// =============================================================================

/// Current view mode determines what's displayed and how keys are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ViewMode {
    Normal,
    /// Text input for the target rule
    EditRule,
    /// Help overlay with keyboard shortcuts
    Help,
}

/// Panel receiving ↑/↓, in Tab order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Panel {
    Threads,
    Stack,
    Inclusive,
    Exclusive,
}

impl Panel {
    fn next(self) -> Self {
        match self {
            Self::Threads => Self::Stack,
            Self::Stack => Self::Inclusive,
            Self::Inclusive => Self::Exclusive,
            Self::Exclusive => Self::Threads,
        }
    }
}

// =============================================================================
// LIVE APP
// =============================================================================

/// UI state of the live view; everything it shows comes from the last snapshot
struct LiveApp {
    snapshot: Snapshot,
    inclusive: Vec<HotPath>,
    exclusive: Vec<HotPath>,

    threads_panel: ThreadsPanel,
    stack_panel: StackPanel,
    inclusive_panel: RankingPanel,
    exclusive_panel: RankingPanel,

    view_mode: ViewMode,
    active: Panel,
    /// Rule of the current target, re-applied by `r`
    rule: String,
    rule_input: String,
    /// One-line feedback shown in the status bar
    message: Option<String>,
    should_quit: bool,
}

impl LiveApp {
    fn new(rule: String) -> Self {
        Self {
            snapshot: Snapshot::default(),
            inclusive: Vec::new(),
            exclusive: Vec::new(),
            threads_panel: ThreadsPanel::default(),
            stack_panel: StackPanel::default(),
            inclusive_panel: RankingPanel::new(RankingKind::Inclusive),
            exclusive_panel: RankingPanel::new(RankingKind::Exclusive),
            view_mode: ViewMode::Normal,
            active: Panel::Threads,
            rule,
            rule_input: String::new(),
            message: None,
            should_quit: false,
        }
    }

    fn update(&mut self, snapshot: Snapshot) {
        let (inclusive, exclusive) = rank_snapshot(&snapshot, RANKING_LIMIT);
        self.inclusive = inclusive;
        self.exclusive = exclusive;
        self.snapshot = snapshot;
    }

    /// Handle keyboard input; returns the command to send, if any
    fn handle_key(&mut self, key: KeyCode) -> Option<Command> {
        match self.view_mode {
            ViewMode::Help => {
                // Any key closes help
                self.view_mode = ViewMode::Normal;
                None
            }
            ViewMode::EditRule => match key {
                KeyCode::Esc => {
                    self.view_mode = ViewMode::Normal;
                    None
                }
                KeyCode::Enter => {
                    self.view_mode = ViewMode::Normal;
                    self.rule = self.rule_input.trim().to_string();
                    self.message = Some(format!("target rule: '{}'", self.rule));
                    Some(Command::Process { rule: self.rule.clone() })
                }
                KeyCode::Backspace => {
                    self.rule_input.pop();
                    None
                }
                KeyCode::Char(c) => {
                    self.rule_input.push(c);
                    None
                }
                _ => None,
            },
            ViewMode::Normal => match key {
                KeyCode::Char('q' | 'Q') => {
                    self.should_quit = true;
                    None
                }
                KeyCode::Up => {
                    self.cursor().up();
                    None
                }
                KeyCode::Down => {
                    let len = self.active_len();
                    self.cursor().down(len);
                    None
                }
                KeyCode::Tab => {
                    self.active = self.active.next();
                    None
                }
                KeyCode::Enter => {
                    let thread = self.threads_panel.selected(&self.snapshot)?.thread_id;
                    self.message = Some(format!("focus TID:{thread}"));
                    Some(Command::Thread { thread })
                }
                KeyCode::Char('p' | 'P') => Some(Command::Pause),
                KeyCode::Char('r' | 'R') => Some(Command::Process { rule: self.rule.clone() }),
                KeyCode::Char('/') => {
                    self.rule_input = self.rule.clone();
                    self.view_mode = ViewMode::EditRule;
                    None
                }
                KeyCode::Char('y' | 'Y') => {
                    self.yank();
                    None
                }
                KeyCode::Char('?') => {
                    self.view_mode = ViewMode::Help;
                    None
                }
                _ => None,
            },
        }
    }

    fn cursor(&mut self) -> &mut ListCursor {
        match self.active {
            Panel::Threads => &mut self.threads_panel.cursor,
            Panel::Stack => &mut self.stack_panel.cursor,
            Panel::Inclusive => &mut self.inclusive_panel.cursor,
            Panel::Exclusive => &mut self.exclusive_panel.cursor,
        }
    }

    fn active_len(&self) -> usize {
        match self.active {
            Panel::Threads => self.snapshot.thread_summaries.len(),
            Panel::Stack => self.snapshot.focus_thread_stack.len(),
            Panel::Inclusive => self.inclusive.len(),
            Panel::Exclusive => self.exclusive.len(),
        }
    }

    /// Label of the highlighted row in the active panel
    fn selected_label(&self) -> Option<String> {
        match self.active {
            Panel::Threads => self.threads_panel.selected(&self.snapshot).map(|t| {
                self.snapshot
                    .symbol_table
                    .get(&t.top_instruction_offset)
                    .map_or_else(|| format!("0x{:x}", t.top_instruction_offset), |s| s.label())
            }),
            Panel::Stack => self.stack_panel.selected(&self.snapshot).map(|f| frame_label(f, &self.snapshot)),
            Panel::Inclusive => self.inclusive_panel.selected(&self.inclusive).map(|h| h.label.clone()),
            Panel::Exclusive => self.exclusive_panel.selected(&self.exclusive).map(|h| h.label.clone()),
        }
    }

    fn yank(&mut self) {
        let Some(label) = self.selected_label() else {
            return;
        };
        let copied = arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(label.clone()));
        self.message = Some(match copied {
            Ok(()) => format!("copied {label}"),
            Err(e) => {
                warn!("Clipboard unavailable: {e}");
                format!("clipboard unavailable: {e}")
            }
        });
    }

    fn render(&mut self, f: &mut ratatui::Frame) {
        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(0),    // Main panels
                Constraint::Length(3), // Status bar
            ])
            .split(f.area());

        self.render_header(f, outer[0]);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(outer[1]);
        let top = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
            .split(rows[0]);
        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(30), Constraint::Percentage(35), Constraint::Percentage(35)])
            .split(rows[1]);

        SummaryPanel::new(&self.snapshot).render(f, top[0]);
        self.stack_panel.render(f, top[1], &self.snapshot, self.active == Panel::Stack);
        self.threads_panel.render(f, bottom[0], &self.snapshot, self.active == Panel::Threads);
        self.inclusive_panel.render(f, bottom[1], &self.inclusive, self.active == Panel::Inclusive);
        self.exclusive_panel.render(f, bottom[2], &self.exclusive, self.active == Panel::Exclusive);

        match self.view_mode {
            ViewMode::EditRule => render_rule_overlay(f, f.area(), &self.rule_input),
            ViewMode::Help => render_help_overlay(f, f.area()),
            ViewMode::Normal => {}
        }

        self.render_status_bar(f, outer[2]);
    }

    fn render_header(&self, f: &mut ratatui::Frame, area: Rect) {
        let state = self.snapshot.state;
        let pid = match self.snapshot.process_id {
            0 => "---".to_string(),
            pid => pid.to_string(),
        };
        let header = Paragraph::new(Line::from(vec![
            Span::styled("LIVETRACE", STYLE_HEADING),
            Span::styled(" | ", STYLE_DIM),
            Span::styled(
                format!("[{}]", state.label().to_uppercase()),
                Style::new().fg(state_color(state)).add_modifier(Modifier::BOLD),
            ),
            Span::styled(" | ", STYLE_DIM),
            Span::styled(format!("PID:{pid}"), Style::new().fg(HUD_GREEN)),
            Span::styled(" | ", STYLE_DIM),
            Span::styled(format!("rule '{}'", self.rule), STYLE_DIM),
        ]))
        .block(Block::default().borders(Borders::ALL).border_style(Style::new().fg(state_color(state))));
        f.render_widget(header, area);
    }

    fn render_status_bar(&self, f: &mut ratatui::Frame, area: Rect) {
        let mut spans = vec![];
        for (key, action) in [
            ("Q", ":Quit "),
            ("Tab", ":Panel "),
            ("Enter", ":Focus "),
            ("P", ":Pause "),
            ("R", ":Restart "),
            ("/", ":Target "),
            ("Y", ":Yank "),
            ("?", ":Help "),
        ] {
            spans.push(Span::styled(key, STYLE_KEY));
            spans.push(Span::styled(action, STYLE_DIM));
        }
        if let Some(message) = &self.message {
            spans.push(Span::styled(format!(" {message}"), STYLE_TEXT));
        }

        let status = Paragraph::new(Line::from(spans))
            .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(HUD_GREEN)));
        f.render_widget(status, area);
    }
}

// =============================================================================
// OVERLAY RENDERERS
// =============================================================================

/// Render the help overlay explaining the panels and keyboard shortcuts
fn render_help_overlay(f: &mut ratatui::Frame, area: Rect) {
    let popup_area = centered_popup(area, 76, 22);

    let key_line = |key: &'static str, text: &'static str| {
        Line::from(vec![Span::styled(format!("  {key:<7}"), STYLE_KEY), Span::styled(text, STYLE_TEXT)])
    };

    let help_text = vec![
        Line::from(""),
        Line::from(Span::styled("  What You're Looking At", STYLE_HEADING)),
        Line::from(Span::styled("  Every thread of the target is sampled about once per millisecond.", STYLE_DIM)),
        Line::from(Span::styled("  The focus thread gets its full stack; the others only their top frame.", STYLE_DIM)),
        Line::from(""),
        Line::from(Span::styled("  How to Read It", STYLE_HEADING)),
        Line::from(vec![
            Span::styled("  Inclusive ", STYLE_LABEL),
            Span::styled("Samples where the address was anywhere on the stack.", STYLE_DIM),
        ]),
        Line::from(vec![
            Span::styled("  Exclusive ", STYLE_LABEL),
            Span::styled("Samples where the address was executing (innermost).", STYLE_DIM),
        ]),
        Line::from(""),
        Line::from(Span::styled("  Keys", STYLE_HEADING)),
        key_line("↑↓", "Move selection in the highlighted panel"),
        key_line("Tab", "Next panel"),
        key_line("Enter", "Make the selected thread the focus thread"),
        key_line("p", "Pause / resume sampling"),
        key_line("r", "Restart tracing the current target"),
        key_line("/", "Edit the target rule (PID or name)"),
        key_line("y", "Copy the selected label to the clipboard"),
        key_line("q", "Quit"),
        Line::from(""),
        Line::from(Span::styled("  Press any key to close", STYLE_DIM)),
    ];

    let help_widget = Paragraph::new(help_text).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Help ")
            .style(Style::new().bg(ratatui::style::Color::Black).fg(HUD_GREEN)),
    );

    f.render_widget(ratatui::widgets::Clear, popup_area);
    f.render_widget(help_widget, popup_area);
}

fn render_rule_overlay(f: &mut ratatui::Frame, area: Rect, input: &str) {
    let popup_area = centered_popup(area, 60, 5);
    let text = vec![
        Line::from(vec![Span::styled(" > ", STYLE_KEY), Span::styled(format!("{input}_"), STYLE_TEXT)]),
        Line::from(Span::styled(" PID or image name; empty stops tracing. Enter/Esc", STYLE_DIM)),
    ];
    let widget = Paragraph::new(text).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Target ")
            .style(Style::new().bg(ratatui::style::Color::Black).fg(CAUTION_AMBER)),
    );
    f.render_widget(ratatui::widgets::Clear, popup_area);
    f.render_widget(widget, popup_area);
}

/// Create a centered popup area with given width percentage and height in lines
fn centered_popup(area: Rect, width_percent: u16, height_lines: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Fill(1), Constraint::Length(height_lines), Constraint::Fill(1)])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - width_percent) / 2),
            Constraint::Percentage(width_percent),
            Constraint::Percentage((100 - width_percent) / 2),
        ])
        .split(vertical[1])[1]
}

// =============================================================================
// ENTRY POINTS
// =============================================================================

/// Run the live view until the user quits.
///
/// `commands` carries user actions (and snapshot requests) to the
/// controller; `snapshots` brings the replies back.
///
/// # Errors
/// The terminal could not be set up or drawn.
pub fn run_live(commands: Sender<Command>, snapshots: Receiver<Snapshot>, rule: String) -> Result<()> {
    // -------------------------------------------------------------------------
    // Terminal Setup
    // -------------------------------------------------------------------------
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = LiveApp::new(rule);
    let mut last_poll: Option<Instant> = None;

    // -------------------------------------------------------------------------
    // Main Event Loop
    // -------------------------------------------------------------------------
    let result = loop {
        if last_poll.map_or(true, |t| t.elapsed() >= POLL_INTERVAL) {
            if commands.send(Command::Snapshot).is_err() {
                break Ok(());
            }
            last_poll = Some(Instant::now());
        }

        while let Ok(snapshot) = snapshots.try_recv() {
            app.update(snapshot);
        }

        if let Err(e) = terminal.draw(|f| app.render(f)) {
            break Err(e.into());
        }

        match event::poll(Duration::from_millis(20)) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    if let Some(command) = app.handle_key(key.code) {
                        if commands.send(command).is_err() {
                            break Ok(());
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => break Err(e.into()),
            },
            Ok(false) => {}
            Err(e) => break Err(e.into()),
        }

        if app.should_quit {
            break Ok(());
        }
    };

    // Cleanup terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// Spawn the live view on its own thread
///
/// # Errors
/// The thread could not be spawned.
pub fn spawn(rule: String) -> Result<(JoinHandle<Result<()>>, Receiver<Command>, Sender<Snapshot>)> {
    let (command_tx, command_rx) = crossbeam_channel::unbounded();
    let (snapshot_tx, snapshot_rx) = crossbeam_channel::bounded(1);
    let handle = std::thread::Builder::new()
        .name("livetrace-tui".to_string())
        .spawn(move || run_live(command_tx, snapshot_rx, rule))?;
    Ok((handle, command_rx, snapshot_tx))
}

/// Serve the live view's commands until it exits or Ctrl+C.
///
/// # Errors
/// The UI thread failed or panicked.
pub async fn serve(
    controller: &mut Controller,
    ui: JoinHandle<Result<()>>,
    commands: Receiver<Command>,
    snapshots: Sender<Snapshot>,
) -> Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    while !ui.is_finished() {
        while let Ok(command) = commands.try_recv() {
            debug!("UI command {command:?}");
            if let Some(Reply::Snapshot { data }) = controller.dispatch_blocking(command) {
                match snapshots.try_send(data) {
                    // The UI has not picked up the previous one yet
                    Ok(()) | Err(TrySendError::Full(_)) => {}
                    Err(TrySendError::Disconnected(_)) => break,
                }
            }
        }

        tokio::select! {
            () = tokio::time::sleep(Duration::from_millis(10)) => {}
            _ = &mut ctrl_c => break,
        }
    }

    controller.shutdown();
    // Closing the channels ends the UI loop if it is still running
    drop(snapshots);
    drop(commands);
    match ui.join() {
        Ok(result) => result,
        Err(_) => anyhow::bail!("TUI thread panicked"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livetrace_common::{StackFrame, Symbol, ThreadSample};
    use std::collections::BTreeMap;

    fn snapshot() -> Snapshot {
        Snapshot {
            process_id: 7,
            focus_thread_id: 11,
            thread_summaries: vec![
                ThreadSample { thread_id: 10, cycles: 5, top_instruction_offset: 0x100 },
                ThreadSample { thread_id: 11, cycles: 9, top_instruction_offset: 0x1010 },
            ],
            symbol_table: BTreeMap::from([(
                0x1010,
                Symbol { function_name: "work".to_string(), function_start_address: 0x1000, displacement: 0x10, ..Symbol::default() },
            )]),
            focus_thread_stack: vec![StackFrame { instruction_offset: 0x1010, symbol: Some(0x1010), ..StackFrame::default() }],
            inclusive_counts: BTreeMap::from([(0x1010, 3)]),
            exclusive_counts: BTreeMap::from([(0x1010, 3)]),
            ..Snapshot::default()
        }
    }

    #[test]
    fn test_list_cursor_scroll() {
        let mut cursor = ListCursor::default();
        for _ in 0..9 {
            cursor.down(10);
        }
        assert_eq!(cursor.index(10), Some(9));
        assert_eq!(cursor.scroll(10, 4), 6);

        for _ in 0..9 {
            cursor.up();
        }
        assert_eq!(cursor.scroll(10, 4), 0);
        assert_eq!(cursor.index(0), None);
    }

    #[test]
    fn test_enter_focuses_selected_thread() {
        let mut app = LiveApp::new(String::new());
        app.update(snapshot());

        assert_eq!(app.handle_key(KeyCode::Down), None);
        assert_eq!(app.handle_key(KeyCode::Enter), Some(Command::Thread { thread: 11 }));
    }

    #[test]
    fn test_enter_without_threads_sends_nothing() {
        let mut app = LiveApp::new(String::new());
        assert_eq!(app.handle_key(KeyCode::Enter), None);
    }

    #[test]
    fn test_pause_and_restart_keys() {
        let mut app = LiveApp::new("my-app".to_string());
        assert_eq!(app.handle_key(KeyCode::Char('p')), Some(Command::Pause));
        assert_eq!(app.handle_key(KeyCode::Char('r')), Some(Command::Process { rule: "my-app".to_string() }));
    }

    #[test]
    fn test_edit_rule() {
        let mut app = LiveApp::new("old".to_string());
        assert_eq!(app.handle_key(KeyCode::Char('/')), None);
        assert_eq!(app.view_mode, ViewMode::EditRule);

        for _ in 0..3 {
            app.handle_key(KeyCode::Backspace);
        }
        for c in "1234".chars() {
            app.handle_key(KeyCode::Char(c));
        }
        // Keys are text while editing
        assert_eq!(app.handle_key(KeyCode::Char('q')), None);
        assert!(!app.should_quit);
        app.handle_key(KeyCode::Backspace);

        assert_eq!(app.handle_key(KeyCode::Enter), Some(Command::Process { rule: "1234".to_string() }));
        assert_eq!(app.rule, "1234");
        assert_eq!(app.view_mode, ViewMode::Normal);
    }

    #[test]
    fn test_tab_cycles_panels_and_labels() {
        let mut app = LiveApp::new(String::new());
        app.update(snapshot());

        assert_eq!(app.selected_label().as_deref(), Some("0x100"));
        app.handle_key(KeyCode::Tab);
        assert_eq!(app.selected_label().as_deref(), Some("work+0x10"));
        app.handle_key(KeyCode::Tab);
        assert_eq!(app.selected_label().as_deref(), Some("work+0x10"));
        app.handle_key(KeyCode::Tab);
        app.handle_key(KeyCode::Tab);
        assert_eq!(app.active, Panel::Threads);
    }

    #[test]
    fn test_help_closes_on_any_key() {
        let mut app = LiveApp::new(String::new());
        app.handle_key(KeyCode::Char('?'));
        assert_eq!(app.view_mode, ViewMode::Help);
        assert_eq!(app.handle_key(KeyCode::Char('q')), None);
        assert_eq!(app.view_mode, ViewMode::Normal);
        assert!(!app.should_quit);

        app.handle_key(KeyCode::Char('q'));
        assert!(app.should_quit);
    }

    #[test]
    fn test_short_source_and_truncate() {
        assert_eq!(short_source("/home/me/src/main.rs:42"), "main.rs:42");
        assert_eq!(truncate_for_display("abcdefghij", 6), "abc...");
        assert_eq!(truncate_for_display("abc", 6), "abc");
    }
}
