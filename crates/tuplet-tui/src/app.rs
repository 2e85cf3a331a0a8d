//! Terminal event loop.
//!
//! Keys become controller inputs; the controller's outcome is applied here:
//! notices go to the toast stack, `persist` writes the session record, and
//! the engine command runs against whichever engine was chosen at startup.
//! A periodic tick first collects any resolved probe, then polls status.

use std::io;
use std::time::Duration;

use ratatui::crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tuplet_engine::{EngineCommand, PlaybackEngine};

use crate::controller::{Controller, Input, Outcome};
use crate::persist::SessionStore;
use crate::ui;
use crate::widgets::toast::ToastManager;

const SEEK_STEP_SECS: f64 = 5.0;

/// What a key asks for beyond a controller input.
#[derive(Debug, Clone, PartialEq)]
enum KeyAction {
    Input(Input),
    Quit,
    /// Quit and tell the daemon to exit too.
    QuitAll,
}

fn map_key(key: KeyEvent) -> Option<KeyAction> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return matches!(key.code, KeyCode::Char('c')).then_some(KeyAction::Quit);
    }
    let input = match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return Some(KeyAction::Quit),
        KeyCode::Char('Q') => return Some(KeyAction::QuitAll),
        KeyCode::Char('j') | KeyCode::Down => Input::MoveDown,
        KeyCode::Char('k') | KeyCode::Up => Input::MoveUp,
        KeyCode::PageDown => Input::PageDown,
        KeyCode::PageUp => Input::PageUp,
        KeyCode::Char('h') => Input::ToggleHidden,
        KeyCode::Enter => Input::Activate,
        KeyCode::Backspace => Input::GoToParent,
        KeyCode::Tab | KeyCode::BackTab => Input::SwitchPane,
        KeyCode::Char('a') => Input::AddToPlaylist,
        KeyCode::Char('d') | KeyCode::Delete => Input::RemoveFromPlaylist,
        KeyCode::Char(' ') => Input::TogglePlayPause,
        KeyCode::Char('s') => Input::Stop,
        KeyCode::Left => Input::SeekBy(-SEEK_STEP_SECS),
        KeyCode::Right => Input::SeekBy(SEEK_STEP_SECS),
        KeyCode::Char('r') => Input::Refresh,
        _ => return None,
    };
    Some(KeyAction::Input(input))
}

pub struct App<E: PlaybackEngine> {
    engine: E,
    controller: Controller,
    store: SessionStore,
    toasts: ToastManager,
    tick_every: Duration,
    /// Set after a failed status query so the error toasts once, not per tick.
    status_failing: bool,
    should_quit: bool,
}

impl<E: PlaybackEngine> App<E> {
    pub fn new(engine: E, controller: Controller, store: SessionStore, tick_every: Duration) -> Self {
        Self {
            engine,
            controller,
            store,
            toasts: ToastManager::new(),
            tick_every,
            status_failing: false,
            should_quit: false,
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let size = terminal.size()?;
        self.controller.handle(Input::Resize(ui::list_height(size.height)));

        let (event_tx, mut event_rx) = mpsc::channel::<Event>(256);
        // Polls so the thread notices the receiver is gone and exits.
        tokio::task::spawn_blocking(move || loop {
            match event::poll(Duration::from_millis(250)) {
                Ok(true) => match event::read() {
                    Ok(ev) => {
                        if event_tx.blocking_send(ev).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                Ok(false) if event_tx.is_closed() => break,
                Ok(false) => {}
                Err(_) => break,
            }
        });

        let mut status_tick = tokio::time::interval(self.tick_every);
        status_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut toast_tick = tokio::time::interval(Duration::from_millis(100));
        toast_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!("tui running with {} engine", self.engine.label());
        let mut needs_redraw = true;
        let result = loop {
            if needs_redraw {
                let label = self.engine.label();
                if let Err(e) =
                    terminal.draw(|f| ui::draw(f, &self.controller, label, &self.toasts))
                {
                    break Err(e.into());
                }
            }
            if self.should_quit {
                break Ok(());
            }

            needs_redraw = tokio::select! {
                ev = event_rx.recv() => match ev {
                    Some(ev) => self.handle_event(ev).await,
                    None => {
                        warn!("terminal event reader stopped");
                        self.should_quit = true;
                        true
                    }
                },
                _ = status_tick.tick() => {
                    self.tick().await;
                    true
                }
                _ = toast_tick.tick() => self.toasts.tick(),
            };
        };

        self.save();
        self.engine.shutdown().await;

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;
        result
    }

    /// Returns true if the screen needs redrawing.
    async fn handle_event(&mut self, ev: Event) -> bool {
        match ev {
            Event::Key(key) if key.kind != KeyEventKind::Release => {
                match map_key(key) {
                    Some(KeyAction::Input(input)) => self.apply(input).await,
                    Some(KeyAction::Quit) => self.should_quit = true,
                    Some(KeyAction::QuitAll) => {
                        if let Err(e) = self.engine.quit_daemon().await {
                            warn!("quit daemon: {}", e);
                        }
                        self.should_quit = true;
                    }
                    None => return false,
                }
                true
            }
            Event::Resize(_, h) => {
                self.controller.handle(Input::Resize(ui::list_height(h)));
                true
            }
            _ => false,
        }
    }

    async fn tick(&mut self) {
        if let Some(result) = self.engine.poll_pending() {
            self.apply(Input::ProbeResolved(result)).await;
        }
        if let Some(input) = self.poll_status().await {
            self.apply(input).await;
        }
    }

    async fn poll_status(&mut self) -> Option<Input> {
        match self.engine.query_status().await {
            Ok(status) => {
                self.status_failing = false;
                Some(Input::Tick(status))
            }
            // No tick on failure: an unreachable engine must not look like
            // a finished track.
            Err(e) => {
                if !self.status_failing {
                    warn!("status query failed: {}", e);
                    self.toasts.error(format!("Status unavailable: {e}"));
                }
                self.status_failing = true;
                None
            }
        }
    }

    /// Feed `input` to the controller and carry out what comes back.  A
    /// command can yield a follow-up input (a status query yields a tick).
    async fn apply(&mut self, input: Input) {
        let mut next = Some(input);
        while let Some(input) = next.take() {
            let Outcome {
                command,
                notice,
                persist,
            } = self.controller.handle(input);
            if let Some(notice) = notice {
                self.toasts.notice(notice);
            }
            if persist {
                self.save();
            }
            if let Some(command) = command {
                next = self.execute(command).await;
            }
        }
    }

    async fn execute(&mut self, command: EngineCommand) -> Option<Input> {
        debug!("engine command: {:?}", command);
        let result = match command {
            EngineCommand::Play { path, start_secs } => {
                self.engine.play(&path, start_secs);
                Ok(())
            }
            EngineCommand::Stop => self.engine.stop().await,
            EngineCommand::TogglePause => self.engine.toggle_pause().await,
            EngineCommand::Seek { secs } => self.engine.seek(secs).await,
            EngineCommand::Query => return self.poll_status().await,
        };
        if let Err(e) = result {
            warn!("engine command failed: {}", e);
            self.toasts.error(e.to_string());
        }
        None
    }

    fn save(&self) {
        if let Err(e) = self.store.save(&self.controller.snapshot()) {
            debug!("session save to {} failed: {:#}", self.store.path().display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_key_bindings() {
        assert_eq!(map_key(key(KeyCode::Char('j'))), Some(KeyAction::Input(Input::MoveDown)));
        assert_eq!(map_key(key(KeyCode::Enter)), Some(KeyAction::Input(Input::Activate)));
        assert_eq!(
            map_key(key(KeyCode::Left)),
            Some(KeyAction::Input(Input::SeekBy(-SEEK_STEP_SECS)))
        );
        assert_eq!(map_key(key(KeyCode::Char('Q'))), Some(KeyAction::QuitAll));
        assert_eq!(map_key(key(KeyCode::Char('x'))), None);
    }

    #[test]
    fn test_ctrl_c_quits_and_other_chords_are_ignored() {
        let ctrl = |c| KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL);
        assert_eq!(map_key(ctrl('c')), Some(KeyAction::Quit));
        assert_eq!(map_key(ctrl('a')), None);
    }
}
