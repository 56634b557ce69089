//! TUI color theme
//!
//! HUD-inspired color scheme for the terminal interface

use ratatui::style::Color;

use livetrace_common::SessionState;

// HUD color scheme
pub const HUD_GREEN: Color = Color::Rgb(0, 255, 0);
pub const HUD_CYAN: Color = Color::Rgb(0, 220, 220);
pub const CRITICAL_RED: Color = Color::Rgb(255, 0, 0);
pub const CAUTION_AMBER: Color = Color::Rgb(255, 191, 0);
pub const INFO_DIM: Color = Color::Rgb(0, 180, 0);

/// Selection brackets around the highlighted row
pub const SEL_LEFT: &str = "▶";
pub const SEL_RIGHT: &str = "◀";

/// Get severity color based on percentage threshold
/// - Above 40%: Critical (Red)
/// - Above 20%: Caution (Amber)
/// - Otherwise: Normal (Green)
#[must_use]
pub fn severity_color(percentage: f64) -> Color {
    if percentage > 40.0 {
        CRITICAL_RED
    } else if percentage > 20.0 {
        CAUTION_AMBER
    } else {
        HUD_GREEN
    }
}

/// Color of the session state badge
#[must_use]
pub fn state_color(state: SessionState) -> Color {
    match state {
        SessionState::Running => HUD_GREEN,
        SessionState::Preparing | SessionState::Paused => CAUTION_AMBER,
        SessionState::Failed => CRITICAL_RED,
        SessionState::Exited => INFO_DIM,
    }
}

/// Text gauge of `width` cells, e.g. `██████░░░░` for 60%
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn gauge_bar(percentage: f64, width: usize) -> String {
    let filled = ((percentage.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled.min(width)))
}
