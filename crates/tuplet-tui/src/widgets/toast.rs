//! Transient notices in the top-right corner.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Clear, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::controller::{Notice, NoticeLevel};
use crate::theme::{C_TOAST_ERROR, C_TOAST_INFO, C_TOAST_SUCCESS, C_TOAST_WARNING};

struct Toast {
    message: String,
    level: NoticeLevel,
    expires: Instant,
}

pub struct ToastManager {
    toasts: VecDeque<Toast>,
    max_visible: usize,
}

fn lifetime(level: NoticeLevel) -> Duration {
    match level {
        NoticeLevel::Info | NoticeLevel::Success => Duration::from_secs(3),
        NoticeLevel::Warning => Duration::from_secs(4),
        NoticeLevel::Error => Duration::from_secs(5),
    }
}

impl ToastManager {
    pub fn new() -> Self {
        Self {
            toasts: VecDeque::new(),
            max_visible: 4,
        }
    }

    pub fn push(&mut self, message: impl Into<String>, level: NoticeLevel) {
        let message = message.into();
        // Same text again just refreshes its place and lifetime.
        self.toasts.retain(|t| t.message != message);
        self.toasts.push_back(Toast {
            message,
            level,
            expires: Instant::now() + lifetime(level),
        });
        while self.toasts.len() > self.max_visible * 2 {
            self.toasts.pop_front();
        }
    }

    pub fn notice(&mut self, notice: Notice) {
        self.push(notice.text, notice.level);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(message, NoticeLevel::Error);
    }

    /// Drop expired toasts.  Returns true if any went away.
    pub fn tick(&mut self) -> bool {
        let now = Instant::now();
        let before = self.toasts.len();
        self.toasts.retain(|t| t.expires > now);
        self.toasts.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty()
    }

    pub fn draw(&self, frame: &mut Frame, area: Rect) {
        if self.is_empty() || area.height < 2 {
            return;
        }
        let max_width = (area.width / 2).clamp(30, 60).min(area.width);
        let mut y = area.y + 1;

        for toast in self.toasts.iter().rev().take(self.max_visible) {
            let (color, icon) = match toast.level {
                NoticeLevel::Info => (C_TOAST_INFO, "·"),
                NoticeLevel::Success => (C_TOAST_SUCCESS, "✓"),
                NoticeLevel::Warning => (C_TOAST_WARNING, "!"),
                NoticeLevel::Error => (C_TOAST_ERROR, "✗"),
            };
            let width = (toast.message.width() as u16 + 4).min(max_width);
            let toast_area = Rect {
                x: area.x + area.width.saturating_sub(width + 1),
                y,
                width,
                height: 1,
            };
            frame.render_widget(Clear, toast_area);
            frame.render_widget(
                Paragraph::new(Line::from(Span::styled(
                    format!(" {} {} ", icon, toast.message),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                ))),
                toast_area,
            );

            y += 1;
            if y >= area.y + area.height {
                break;
            }
        }
    }
}

impl Default for ToastManager {
    fn default() -> Self {
        Self::new()
    }
}
