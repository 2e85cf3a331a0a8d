//! One-line playback progress bar.

use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::theme::{C_MUTED, C_PLAYING, C_SECONDARY};

const BLOCKS: [char; 9] = [' ', '▏', '▎', '▍', '▌', '▋', '▊', '▉', '█'];

/// `position` and `duration` in seconds; either may be unknown.
pub fn draw_progress(frame: &mut Frame, area: Rect, position: Option<f64>, duration: Option<f64>) {
    if area.width < 4 || area.height == 0 {
        return;
    }
    let left = position.map(fmt_time).unwrap_or_default();
    let right = duration.map(fmt_time).unwrap_or_else(|| "--:--".to_string());
    let label_w = (left.len() + right.len() + 2) as u16;
    let bar_w = area.width.saturating_sub(label_w).max(4) as usize;

    let progress = match (position, duration) {
        (Some(p), Some(d)) if d > 0.0 => (p / d).clamp(0.0, 1.0),
        _ => 0.0,
    };
    let bar = smooth_bar(progress, bar_w);

    let line = Line::from(vec![
        Span::styled(format!("{left} "), Style::default().fg(C_SECONDARY)),
        Span::styled(bar, Style::default().fg(C_PLAYING)),
        Span::styled(format!(" {right}"), Style::default().fg(C_MUTED)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

/// `width` cells filled to `progress` in eighth-cell steps.
fn smooth_bar(progress: f64, width: usize) -> String {
    let eighths = (progress * width as f64 * 8.0) as usize;
    let full = (eighths / 8).min(width);
    let mut bar = "█".repeat(full);
    if full < width {
        bar.push(BLOCKS[eighths % 8]);
        bar.push_str(&" ".repeat(width - full - 1));
    }
    bar
}

pub fn fmt_time(secs: f64) -> String {
    let s = secs.max(0.0) as u64;
    let (h, m, s) = (s / 3600, (s % 3600) / 60, s % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}
