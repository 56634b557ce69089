//! Thread list panel: one row per sampled thread with its top frame.
//!
//! ```text
//! ┌[ THREADS 12 ]──────────────────────────────┐
//! │▶* 4711  app::main+0x2a          183.2 ms ◀ │
//! │  4712  epoll_wait+0x4e            0.8 ms   │
//! └────────────────────────────────────────────┘
//! ```
//!
//! `*` marks the current focus thread.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use livetrace_common::ThreadSample;

use super::theme::{CAUTION_AMBER, HUD_CYAN, HUD_GREEN, INFO_DIM, SEL_LEFT, SEL_RIGHT};
use super::{border_style, truncate_for_display, ListCursor};
use crate::profiling::Snapshot;

/// Cursor over the thread list
#[derive(Debug, Default)]
pub struct ThreadsPanel {
    pub cursor: ListCursor,
}

impl ThreadsPanel {
    /// The highlighted thread, clamped to the current list
    #[must_use]
    pub fn selected<'a>(&self, snapshot: &'a Snapshot) -> Option<&'a ThreadSample> {
        snapshot.thread_summaries.get(self.cursor.index(snapshot.thread_summaries.len())?)
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn render(&mut self, f: &mut Frame, area: Rect, snapshot: &Snapshot, active: bool) {
        let threads = &snapshot.thread_summaries;
        let selected = self.cursor.index(threads.len());
        let visible = (area.height.saturating_sub(2) as usize).max(1);
        let offset = self.cursor.scroll(threads.len(), visible);
        let max_label = (area.width as usize).saturating_sub(28);

        let lines: Vec<Line> = threads
            .iter()
            .enumerate()
            .skip(offset)
            .take(visible)
            .map(|(index, thread)| {
                let is_selected = active && Some(index) == selected;
                let is_focus = thread.thread_id == snapshot.focus_thread_id;
                let (sel_l, sel_r) = if is_selected { (SEL_LEFT, SEL_RIGHT) } else { (" ", " ") };

                let label = snapshot
                    .symbol_table
                    .get(&thread.top_instruction_offset)
                    .map_or_else(|| format!("0x{:x}", thread.top_instruction_offset), |s| s.label());

                let mut name_style = Style::default().fg(if is_focus { HUD_CYAN } else { HUD_GREEN });
                if is_selected {
                    name_style = name_style.add_modifier(Modifier::BOLD | Modifier::REVERSED);
                }

                Line::from(vec![
                    Span::styled(sel_l, Style::default().fg(CAUTION_AMBER)),
                    Span::styled(if is_focus { "*" } else { " " }, Style::default().fg(HUD_CYAN)),
                    Span::styled(format!("{:>7} ", thread.thread_id), name_style),
                    Span::styled(truncate_for_display(&label, max_label), Style::default().fg(HUD_GREEN)),
                    Span::styled(format!(" {:>9.1} ms", thread.cycles as f64 / 1e6), Style::default().fg(INFO_DIM)),
                    Span::styled(sel_r, Style::default().fg(CAUTION_AMBER)),
                ])
            })
            .collect();

        let paragraph = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("[ THREADS {} ]", threads.len()))
                .border_style(border_style(active)),
        );
        f.render_widget(paragraph, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(ids: &[u32]) -> Snapshot {
        Snapshot {
            thread_summaries: ids
                .iter()
                .map(|&thread_id| ThreadSample { thread_id, cycles: 0, top_instruction_offset: 0x10 })
                .collect(),
            ..Snapshot::default()
        }
    }

    #[test]
    fn test_selection_clamps_to_list() {
        let mut panel = ThreadsPanel::default();
        let snap = snapshot(&[10, 11, 12]);

        for _ in 0..5 {
            panel.cursor.down(snap.thread_summaries.len());
        }
        assert_eq!(panel.selected(&snap).unwrap().thread_id, 12);

        // The list shrank between two refreshes
        assert_eq!(panel.selected(&snapshot(&[10])).unwrap().thread_id, 10);
        assert!(panel.selected(&snapshot(&[])).is_none());

        panel.cursor.up();
        assert_eq!(panel.selected(&snap).unwrap().thread_id, 11);
    }
}
