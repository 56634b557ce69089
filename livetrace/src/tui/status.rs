use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use livetrace_common::SessionState;

use super::theme::{gauge_bar, severity_color, state_color, CAUTION_AMBER, CRITICAL_RED, HUD_GREEN, INFO_DIM};
use crate::profiling::Snapshot;

/// Target summary panel: state, samples, CPU and memory
pub struct SummaryPanel {
    target: String,
    state: SessionState,
    error: Option<String>,
    samples: u64,
    rate: f64,
    elapsed_secs: f64,
    cpu_percent: f64,
    phys: u64,
    virt: u64,
}

impl SummaryPanel {
    #[allow(clippy::cast_precision_loss)]
    pub fn new(snapshot: &Snapshot) -> Self {
        let target = if snapshot.process_id == 0 {
            "---".to_string()
        } else {
            let name = std::path::Path::new(&snapshot.process_name)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(&snapshot.process_name);
            format!("{name} (PID:{})", snapshot.process_id)
        };

        Self {
            target,
            state: snapshot.state,
            error: snapshot.error.clone(),
            samples: snapshot.sample_count,
            rate: snapshot.sample_rate(),
            elapsed_secs: snapshot.elapsed_time as f64 / 1000.0,
            cpu_percent: snapshot.cpu_usage * 100.0,
            phys: snapshot.phys_mem_usage,
            virt: snapshot.virt_mem_usage,
        }
    }

    pub fn render(&self, f: &mut Frame, area: Rect) {
        let label = |text: &'static str| Span::styled(text, Style::default().fg(INFO_DIM));
        let value = |text: String| Span::styled(text, Style::default().fg(HUD_GREEN));

        let mut lines = vec![
            Line::from(vec![label(" Target  "), value(self.target.clone())]),
            Line::from(vec![
                label(" State   "),
                Span::styled(
                    self.state.label().to_uppercase(),
                    Style::default().fg(state_color(self.state)).add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(vec![
                label(" Samples "),
                value(self.samples.to_string()),
                Span::styled(format!(" ({:.0}/s, {:.1}s)", self.rate, self.elapsed_secs), Style::default().fg(INFO_DIM)),
            ]),
            Line::from(vec![
                label(" CPU     "),
                Span::styled(gauge_bar(self.cpu_percent, 10), Style::default().fg(severity_color(self.cpu_percent))),
                value(format!(" {:.1}%", self.cpu_percent)),
            ]),
            Line::from(vec![label(" Phys    "), value(format_bytes(self.phys))]),
            Line::from(vec![label(" Virt    "), value(format_bytes(self.virt))]),
        ];

        if let Some(error) = &self.error {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(format!(" [X] {error}"), Style::default().fg(CRITICAL_RED))));
        }

        let border_color = match self.state {
            SessionState::Failed => CRITICAL_RED,
            SessionState::Paused | SessionState::Preparing => CAUTION_AMBER,
            _ => HUD_GREEN,
        };
        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
            Block::default()
                .borders(Borders::ALL)
                .title("[ SUMMARY ]")
                .border_style(Style::default().fg(border_color)),
        );

        f.render_widget(paragraph, area);
    }
}

/// Human-readable byte count: `512 B`, `1.5 KiB`, `2.0 GiB`
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}
