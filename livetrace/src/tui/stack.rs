//! Focus stack panel: the focus thread's latest stack, innermost first, with
//! the hit counts of every frame.

use ratatui::{
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    widgets::{Block, Borders, Cell, Row, Table},
    Frame,
};

use livetrace_common::StackFrame;

use super::theme::{CAUTION_AMBER, HUD_CYAN, HUD_GREEN, INFO_DIM};
use super::{border_style, short_source, ListCursor};
use crate::analysis::{frame_label, frame_source};
use crate::profiling::Snapshot;

#[derive(Debug, Default)]
pub struct StackPanel {
    pub cursor: ListCursor,
}

impl StackPanel {
    #[must_use]
    pub fn selected<'a>(&self, snapshot: &'a Snapshot) -> Option<&'a StackFrame> {
        snapshot.focus_thread_stack.get(self.cursor.index(snapshot.focus_thread_stack.len())?)
    }

    pub fn render(&mut self, f: &mut Frame, area: Rect, snapshot: &Snapshot, active: bool) {
        let frames = &snapshot.focus_thread_stack;
        let selected = self.cursor.index(frames.len());
        // Borders and header row
        let visible = (area.height.saturating_sub(3) as usize).max(1);
        let offset = self.cursor.scroll(frames.len(), visible);

        let rows: Vec<Row> = frames
            .iter()
            .enumerate()
            .skip(offset)
            .take(visible)
            .map(|(index, frame)| {
                let address = frame.instruction_offset;
                let inclusive = snapshot.inclusive_counts.get(&address).copied().unwrap_or(0);
                let exclusive = snapshot.exclusive_counts.get(&address).copied().unwrap_or(0);
                let source = frame_source(frame, snapshot).map(|s| short_source(&s)).unwrap_or_default();

                let mut style = Style::default().fg(if frame.symbol.is_some() { HUD_GREEN } else { INFO_DIM });
                if active && Some(index) == selected {
                    style = style.add_modifier(Modifier::BOLD | Modifier::REVERSED);
                }

                Row::new(vec![
                    Cell::from(format!("{index:>3}")).style(Style::default().fg(INFO_DIM)),
                    Cell::from(frame_label(frame, snapshot)),
                    Cell::from(source).style(Style::default().fg(INFO_DIM)),
                    Cell::from(format!("{inclusive:>8}")).style(Style::default().fg(HUD_CYAN)),
                    Cell::from(format!("{exclusive:>8}")).style(Style::default().fg(CAUTION_AMBER)),
                ])
                .style(style)
            })
            .collect();

        let header = Row::new(vec!["  #", "Function", "Source", "   Incl.", "   Excl."])
            .style(Style::default().fg(CAUTION_AMBER).add_modifier(Modifier::BOLD));

        let title = if snapshot.focus_thread_id == 0 {
            "[ STACK: no focus thread, Enter on a thread ]".to_string()
        } else {
            format!("[ STACK TID:{} {} frames ]", snapshot.focus_thread_id, frames.len())
        };

        let table = Table::new(
            rows,
            [
                Constraint::Length(4),
                Constraint::Fill(3),
                Constraint::Fill(2),
                Constraint::Length(9),
                Constraint::Length(9),
            ],
        )
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(title).border_style(border_style(active)));

        f.render_widget(table, area);
    }
}
