//! Bordered pane block with focus styling.

use ratatui::{
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders},
};

use crate::theme::{style_border, C_MUTED, C_PRIMARY, C_SECONDARY};

/// `title` on the left, `hint` (counts, position) right-aligned.
pub fn pane_block<'a>(title: &'a str, hint: Option<String>, focused: bool) -> Block<'a> {
    let title_style = if focused {
        Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(C_MUTED)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(style_border(focused))
        .title(Line::from(Span::styled(format!(" {title} "), title_style)));

    match hint {
        Some(hint) => block.title_top(
            Line::from(Span::styled(
                format!(" {hint} "),
                Style::default().fg(C_SECONDARY),
            ))
            .right_aligned(),
        ),
        None => block,
    }
}
