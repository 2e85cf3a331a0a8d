//! Frame layout:
//!
//! ```text
//!   header      current directory, engine label
//!   panes       browser | playlist
//!   now playing track name + state, progress bar
//!   footer      key hints
//! ```

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use tuplet_engine::{track_name, PlaybackStatus};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::browser::EntryKind;
use crate::controller::Controller;
use crate::session::Pane;
use crate::theme::{
    style_default, style_directory, style_muted, style_playing, style_secondary, style_selected,
    C_ACCENT, C_ANCHOR,
};
use crate::widgets::pane::pane_block;
use crate::widgets::progress::draw_progress;
use crate::widgets::toast::ToastManager;

/// Rows taken by everything except the list contents.
pub const CHROME_ROWS: u16 = 6;

const KEY_HINTS: &str =
    "enter play/open  a add  d remove  tab pane  space pause  s stop  ←/→ seek  h hidden  q quit";

pub fn list_height(terminal_height: u16) -> usize {
    terminal_height.saturating_sub(CHROME_ROWS).max(1) as usize
}

pub fn draw(frame: &mut Frame, view: &Controller, engine_label: &str, toasts: &ToastManager) {
    let area = frame.area();
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(2),
            Constraint::Length(1),
        ])
        .split(area);

    draw_header(frame, rows[0], view, engine_label);

    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(rows[1]);
    draw_browser(frame, panes[0], view);
    draw_playlist(frame, panes[1], view);

    draw_now_playing(frame, rows[2], view.last_status());
    frame.render_widget(Paragraph::new(Span::styled(KEY_HINTS, style_muted())), rows[3]);

    toasts.draw(frame, area);
}

fn draw_header(frame: &mut Frame, area: Rect, view: &Controller, engine_label: &str) {
    let state = view.state();
    let mut spans = vec![
        Span::styled(
            " tuplet ",
            Style::default().fg(C_ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("[{engine_label}] "), style_secondary()),
        Span::styled(state.current_directory.display().to_string(), style_default()),
    ];
    if state.show_hidden {
        spans.push(Span::styled("  (hidden shown)", style_muted()));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_browser(frame: &mut Frame, area: Rect, view: &Controller) {
    let state = view.state();
    let focused = state.active_pane == Pane::Browser;
    let entries = view.entries();
    let hint = (!entries.is_empty()).then(|| format!("{}/{}", state.selected_index + 1, entries.len()));
    let block = pane_block("Files", hint, focused);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let width = inner.width as usize;
    let lines: Vec<Line> = entries
        .iter()
        .enumerate()
        .skip(state.scroll_offset)
        .take(inner.height as usize)
        .map(|(i, entry)| {
            let (marker, style) = match entry.kind {
                EntryKind::Parent | EntryKind::Directory => ("▸ ", style_directory()),
                EntryKind::File if view.is_last_played(&entry.path) => ("♪ ", style_playing()),
                EntryKind::File if entry.is_audio() => ("  ", style_default()),
                EntryKind::File => ("  ", style_muted()),
            };
            let label = match entry.kind {
                EntryKind::Directory => format!("{marker}{}/", entry.name),
                _ => format!("{marker}{}", entry.name),
            };
            row(label, width, style, i == state.selected_index, focused)
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), inner);
}

fn draw_playlist(frame: &mut Frame, area: Rect, view: &Controller) {
    let state = view.state();
    let focused = state.active_pane == Pane::Playlist;
    let hint = Some(format!("{} tracks", state.playlist.len()));
    let block = pane_block("Playlist", hint, focused);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if state.playlist.is_empty() {
        frame.render_widget(
            Paragraph::new(Span::styled(" a adds the selected file", style_muted())),
            inner,
        );
        return;
    }

    let width = inner.width as usize;
    let lines: Vec<Line> = state
        .playlist
        .iter()
        .enumerate()
        .skip(state.playlist_scroll_offset)
        .take(inner.height as usize)
        .map(|(i, path)| {
            let (marker, style) = if view.is_anchor(i) {
                ("▶ ", Style::default().fg(C_ANCHOR))
            } else if view.is_last_played(path) {
                ("♪ ", style_playing())
            } else {
                ("  ", style_default())
            };
            let label = format!("{marker}{:>2}. {}", i + 1, track_name(path));
            row(label, width, style, i == state.playlist_selected_index, focused)
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), inner);
}

fn row(label: String, width: usize, style: Style, selected: bool, focused: bool) -> Line<'static> {
    let text = fit(&label, width);
    if selected {
        Line::from(Span::styled(text, style_selected(focused)))
    } else {
        Line::from(Span::styled(text, style))
    }
}

fn draw_now_playing(frame: &mut Frame, area: Rect, status: &PlaybackStatus) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(area);

    let line = match (&status.track_name, status.is_idle) {
        (Some(name), false) => {
            let state = if status.paused { "paused " } else { "playing" };
            Line::from(vec![
                Span::styled(format!(" {state}  "), style_secondary()),
                Span::styled(name.clone(), style_playing().add_modifier(Modifier::BOLD)),
            ])
        }
        _ => Line::from(Span::styled(" stopped", style_muted())),
    };
    frame.render_widget(Paragraph::new(line), rows[0]);

    if status.is_playing() {
        draw_progress(frame, rows[1], status.position_secs, status.duration_secs);
    }
}

/// Pad or cut `s` to exactly `width` terminal columns.
fn fit(s: &str, width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    let mut used = s.width();
    let mut out = if used <= width {
        s.to_string()
    } else {
        let mut cut = String::with_capacity(width);
        used = 0;
        for c in s.chars() {
            let w = c.width().unwrap_or(0);
            if used + w > width - 1 {
                break;
            }
            cut.push(c);
            used += w;
        }
        cut.push('…');
        used += 1;
        cut
    };
    out.push_str(&" ".repeat(width - used));
    out
}
