//! Ranking panels: the focus thread's hottest addresses.
//!
//! # Rendering Pattern
//!
//! Each item takes 2 lines:
//! ```text
//! Line 1: [sel] label                 count  gauge
//! Line 2:       filename:line
//! ```
//!
//! The gauge is relative to the top entry, colored by its share.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use super::theme::{gauge_bar, severity_color, CAUTION_AMBER, INFO_DIM, SEL_LEFT, SEL_RIGHT};
use super::{border_style, short_source, truncate_for_display, ListCursor};
use crate::analysis::HotPath;

/// Which count map a panel ranks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingKind {
    Inclusive,
    Exclusive,
}

impl RankingKind {
    fn title(self) -> &'static str {
        match self {
            Self::Inclusive => "INCLUSIVE",
            Self::Exclusive => "EXCLUSIVE",
        }
    }
}

/// A TOP-N list over one count map
#[derive(Debug)]
pub struct RankingPanel {
    kind: RankingKind,
    pub cursor: ListCursor,
}

impl RankingPanel {
    #[must_use]
    pub fn new(kind: RankingKind) -> Self {
        Self { kind, cursor: ListCursor::default() }
    }

    #[must_use]
    pub fn selected<'a>(&self, ranking: &'a [HotPath]) -> Option<&'a HotPath> {
        ranking.get(self.cursor.index(ranking.len())?)
    }

    pub fn render(&mut self, f: &mut Frame, area: Rect, ranking: &[HotPath], active: bool) {
        let selected = self.cursor.index(ranking.len());
        let visible = (area.height.saturating_sub(2) as usize / 2).max(1);
        let offset = self.cursor.scroll(ranking.len(), visible);
        let max_label = (area.width as usize).saturating_sub(26);

        let mut lines = Vec::with_capacity(visible * 2);
        for (index, hot) in ranking.iter().enumerate().skip(offset).take(visible) {
            let is_selected = active && Some(index) == selected;
            let (sel_l, sel_r) = if is_selected { (SEL_LEFT, SEL_RIGHT) } else { (" ", " ") };
            let color = severity_color(hot.percentage);
            let name_style = if is_selected {
                Style::default().fg(color).add_modifier(Modifier::BOLD | Modifier::REVERSED)
            } else {
                Style::default().fg(color)
            };

            lines.push(Line::from(vec![
                Span::styled(sel_l, Style::default().fg(CAUTION_AMBER)),
                Span::styled(truncate_for_display(&hot.label, max_label), name_style),
                Span::styled(format!(" {:>7} ", hot.count), Style::default().fg(color)),
                Span::styled(gauge_bar(hot.percentage, 10), Style::default().fg(color)),
                Span::styled(sel_r, Style::default().fg(CAUTION_AMBER)),
            ]));

            let detail = hot.source.as_deref().map_or_else(|| format!("0x{:x}", hot.address), short_source);
            lines.push(Line::from(vec![Span::raw("   "), Span::styled(detail, Style::default().fg(INFO_DIM))]));
        }

        let paragraph = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("[ {} TOP {} ]", self.kind.title(), ranking.len()))
                .border_style(border_style(active)),
        );
        f.render_widget(paragraph, area);
    }
}
