//! Session state machine: `(input, state) -> (state', outcome)`.
//!
//! The controller never talks to the engine itself.  It hands back at most
//! one [`EngineCommand`] per input and the app loop carries it out; playback
//! results come back in as `Tick` and `ProbeResolved` inputs.

use std::path::{Path, PathBuf};

use tracing::debug;
use tuplet_engine::{track_name, EngineCommand, PlaybackStatus, ProbeResult};

use crate::browser::{self, Entry, EntryKind};
use crate::persist::PersistedSession;
use crate::session::{Pane, SessionState};

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    MoveDown,
    MoveUp,
    PageDown,
    PageUp,
    ToggleHidden,
    Activate,
    GoToParent,
    SwitchPane,
    AddToPlaylist,
    RemoveFromPlaylist,
    TogglePlayPause,
    Stop,
    /// Relative seek in seconds from the last reported position.
    SeekBy(f64),
    Tick(PlaybackStatus),
    ProbeResolved(ProbeResult),
    /// Rows available to each list.
    Resize(usize),
    /// Re-read the current directory.
    Refresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Message for the user.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    fn new(level: NoticeLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    pub command: Option<EngineCommand>,
    pub notice: Option<Notice>,
    /// The session record should be written.
    pub persist: bool,
}

impl Outcome {
    fn none() -> Self {
        Self::default()
    }

    fn command(command: EngineCommand) -> Self {
        Self {
            command: Some(command),
            ..Self::default()
        }
    }

    fn notice(level: NoticeLevel, text: impl Into<String>) -> Self {
        Self {
            notice: Some(Notice::new(level, text)),
            ..Self::default()
        }
    }

    fn persist() -> Self {
        Self {
            persist: true,
            ..Self::default()
        }
    }

    fn and_persist(mut self) -> Self {
        self.persist = true;
        self
    }
}

pub struct Controller {
    state: SessionState,
    entries: Vec<Entry>,
    visible_height: usize,
    last_status: PlaybackStatus,
    /// Path of the last `Play` issued, until its probe resolves.
    pending_play: Option<PathBuf>,
}

impl Controller {
    pub fn new(current_directory: PathBuf, visible_height: usize) -> Self {
        let state = SessionState::new(current_directory);
        let entries = browser::list_directory(&state.current_directory, state.show_hidden);
        Self {
            state,
            entries,
            visible_height: visible_height.max(1),
            last_status: PlaybackStatus::idle(),
            pending_play: None,
        }
    }

    /// Rebuild a session from its stored record.  `explicit_dir` (from the
    /// command line) wins over the stored directory; `fallback_dir` is used
    /// when neither is available.
    pub fn restore(
        saved: &PersistedSession,
        explicit_dir: Option<PathBuf>,
        fallback_dir: PathBuf,
        visible_height: usize,
    ) -> Self {
        let saved_dir = saved.current_directory.as_ref().map(PathBuf::from);
        let same_dir = explicit_dir.is_none() || explicit_dir == saved_dir;
        let dir = explicit_dir.or(saved_dir).unwrap_or(fallback_dir);

        let mut controller = Self::new(dir, visible_height);
        let state = &mut controller.state;
        state.playlist = saved.playlist.iter().map(PathBuf::from).collect();
        state.last_playing_path = saved.last_playing_path.as_ref().map(PathBuf::from);
        if same_dir {
            state.selected_index = saved.browser_selected.unwrap_or(0);
            state.scroll_offset = saved.browser_scroll.unwrap_or(0);
        }
        state.playlist_selected_index = saved.playlist_selected.unwrap_or(0);
        state.playlist_scroll_offset = saved.playlist_scroll.unwrap_or(0);
        controller.clamp_all();
        controller
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    #[cfg(test)]
    pub fn visible_height(&self) -> usize {
        self.visible_height
    }

    /// Status from the most recent tick.
    pub fn last_status(&self) -> &PlaybackStatus {
        &self.last_status
    }

    pub fn selected_entry(&self) -> Option<&Entry> {
        self.entries.get(self.state.selected_index)
    }

    pub fn snapshot(&self) -> PersistedSession {
        let s = &self.state;
        PersistedSession {
            playlist: s
                .playlist
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
            current_directory: Some(s.current_directory.to_string_lossy().into_owned()),
            last_playing_path: s
                .last_playing_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            browser_selected: Some(s.selected_index),
            browser_scroll: Some(s.scroll_offset),
            playlist_selected: Some(s.playlist_selected_index),
            playlist_scroll: Some(s.playlist_scroll_offset),
        }
    }

    pub fn handle(&mut self, input: Input) -> Outcome {
        match input {
            Input::MoveDown => self.move_by(1),
            Input::MoveUp => self.move_by(-1),
            Input::PageDown => self.move_by(self.visible_height as isize),
            Input::PageUp => self.move_by(-(self.visible_height as isize)),
            Input::ToggleHidden => {
                self.state.show_hidden = !self.state.show_hidden;
                self.relist();
                self.state.selected_index = 0;
                self.state.scroll_offset = 0;
                Outcome::persist()
            }
            Input::Activate => self.activate(),
            Input::GoToParent => self.go_to_parent(),
            Input::SwitchPane => {
                self.state.active_pane = self.state.active_pane.other();
                Outcome::none()
            }
            Input::AddToPlaylist => self.add_to_playlist(),
            Input::RemoveFromPlaylist => self.remove_from_playlist(),
            Input::TogglePlayPause => Outcome::command(EngineCommand::TogglePause),
            Input::Stop => {
                self.state.clear_anchor();
                self.pending_play = None;
                Outcome::command(EngineCommand::Stop)
            }
            Input::SeekBy(delta) => self.seek_by(delta),
            Input::Tick(status) => self.tick(status),
            Input::ProbeResolved(result) => self.probe_resolved(result),
            Input::Resize(height) => {
                self.visible_height = height.max(1);
                self.clamp_all();
                Outcome::none()
            }
            Input::Refresh => {
                self.relist();
                self.clamp_all();
                Outcome::none()
            }
        }
    }

    // ── navigation ────────────────────────────────────────────────────────────

    fn move_by(&mut self, delta: isize) -> Outcome {
        let height = self.visible_height;
        let (len, selected, scroll) = match self.state.active_pane {
            Pane::Browser => (
                self.entries.len(),
                &mut self.state.selected_index,
                &mut self.state.scroll_offset,
            ),
            Pane::Playlist => (
                self.state.playlist.len(),
                &mut self.state.playlist_selected_index,
                &mut self.state.playlist_scroll_offset,
            ),
        };
        if len == 0 {
            return Outcome::none();
        }
        let before = (*selected, *scroll);
        let target = (*selected as isize).saturating_add(delta).clamp(0, len as isize - 1);
        *selected = target as usize;
        follow_selection(*selected, scroll, len, height);
        if (*selected, *scroll) == before {
            Outcome::none()
        } else {
            Outcome::persist()
        }
    }

    fn relist(&mut self) {
        self.entries = browser::list_directory(&self.state.current_directory, self.state.show_hidden);
    }

    fn enter_directory(&mut self, dir: PathBuf) -> Outcome {
        debug!("browse {}", dir.display());
        self.state.current_directory = dir;
        self.state.selected_index = 0;
        self.state.scroll_offset = 0;
        self.relist();
        Outcome::persist()
    }

    fn go_to_parent(&mut self) -> Outcome {
        match browser::parent_of(&self.state.current_directory) {
            Some(parent) => self.enter_directory(parent),
            None => Outcome::none(),
        }
    }

    fn clamp_all(&mut self) {
        let height = self.visible_height;
        let s = &mut self.state;

        let len = self.entries.len();
        s.selected_index = s.selected_index.min(len.saturating_sub(1));
        follow_selection(s.selected_index, &mut s.scroll_offset, len, height);

        s.repair_anchor(None);
        let len = s.playlist.len();
        follow_selection(s.playlist_selected_index, &mut s.playlist_scroll_offset, len, height);
    }

    // ── activation ────────────────────────────────────────────────────────────

    fn activate(&mut self) -> Outcome {
        match self.state.active_pane {
            Pane::Browser => self.activate_entry(),
            Pane::Playlist => {
                let index = self.state.playlist_selected_index;
                let Some(path) = self.state.playlist.get(index).cloned() else {
                    return Outcome::none();
                };
                self.state.set_anchor(index);
                self.play(path)
            }
        }
    }

    fn activate_entry(&mut self) -> Outcome {
        let Some(entry) = self.selected_entry().cloned() else {
            return Outcome::none();
        };
        match entry.kind {
            EntryKind::Parent => self.go_to_parent(),
            EntryKind::Directory => self.enter_directory(entry.path),
            EntryKind::File if entry.is_audio() => {
                self.state.clear_anchor();
                self.play(entry.path)
            }
            EntryKind::File => {
                Outcome::notice(NoticeLevel::Warning, format!("Not an audio file: {}", entry.name))
            }
        }
    }

    fn play(&mut self, path: PathBuf) -> Outcome {
        self.pending_play = Some(path.clone());
        Outcome::command(EngineCommand::Play {
            path,
            start_secs: 0.0,
        })
    }

    // ── playlist ──────────────────────────────────────────────────────────────

    fn add_to_playlist(&mut self) -> Outcome {
        if self.state.active_pane != Pane::Browser {
            return Outcome::none();
        }
        let Some(entry) = self.selected_entry().cloned() else {
            return Outcome::none();
        };
        if !entry.is_audio() {
            return Outcome::notice(
                NoticeLevel::Warning,
                format!("Not an audio file: {}", entry.name),
            );
        }
        if self.state.playlist.contains(&entry.path) {
            return Outcome::notice(
                NoticeLevel::Info,
                format!("Already in playlist: {}", entry.name),
            );
        }
        self.state.playlist.push(entry.path);
        self.state.repair_anchor(None);
        Outcome::notice(NoticeLevel::Success, format!("Added: {}", entry.name)).and_persist()
    }

    fn remove_from_playlist(&mut self) -> Outcome {
        if self.state.active_pane != Pane::Playlist || self.state.playlist.is_empty() {
            return Outcome::none();
        }
        let index = self
            .state
            .playlist_selected_index
            .min(self.state.playlist.len() - 1);
        let removed = self.state.playlist.remove(index);
        self.state.repair_anchor(Some(index));
        let len = self.state.playlist.len();
        follow_selection(
            self.state.playlist_selected_index,
            &mut self.state.playlist_scroll_offset,
            len,
            self.visible_height,
        );
        Outcome::notice(NoticeLevel::Info, format!("Removed: {}", track_name(&removed)))
            .and_persist()
    }

    // ── playback feedback ─────────────────────────────────────────────────────

    fn seek_by(&mut self, delta: f64) -> Outcome {
        if self.last_status.is_idle {
            return Outcome::none();
        }
        let position = self.last_status.position_secs.unwrap_or(0.0);
        Outcome::command(EngineCommand::Seek {
            secs: (position + delta).max(0.0),
        })
    }

    fn tick(&mut self, status: PlaybackStatus) -> Outcome {
        let playing = status.is_playing();
        let just_finished = self.state.was_playing_last_tick && !playing;
        self.state.was_playing_last_tick = playing;
        self.last_status = status;

        if !just_finished
            || !self.state.playing_from_playlist
            || self.state.active_pane != Pane::Playlist
        {
            return Outcome::none();
        }
        self.advance_playlist()
    }

    fn advance_playlist(&mut self) -> Outcome {
        let next = self.state.playing_index.map(|i| i + 1);
        match next {
            Some(next) if next < self.state.playlist.len() => {
                self.state.playing_index = Some(next);
                self.state.playlist_selected_index = next;
                let len = self.state.playlist.len();
                follow_selection(
                    next,
                    &mut self.state.playlist_scroll_offset,
                    len,
                    self.visible_height,
                );
                let path = self.state.playlist[next].clone();
                debug!("autoplay {}", path.display());
                self.play(path).and_persist()
            }
            _ => {
                debug!("autoplay: end of playlist");
                self.state.clear_anchor();
                Outcome::none()
            }
        }
    }

    fn probe_resolved(&mut self, result: ProbeResult) -> Outcome {
        match result {
            ProbeResult::Committed { track_name } => {
                if let Some(path) = self.pending_play.take() {
                    self.state.last_playing_path = Some(path);
                }
                Outcome::notice(NoticeLevel::Success, format!("Playing: {track_name}"))
                    .and_persist()
            }
            ProbeResult::Failed { reason } => {
                self.pending_play = None;
                Outcome::notice(NoticeLevel::Error, format!("Cannot play: {reason}"))
            }
        }
    }

    /// True if playlist entry `index` is the one autoplay continues from.
    pub fn is_anchor(&self, index: usize) -> bool {
        self.state.playing_from_playlist && self.state.playing_index == Some(index)
    }

    pub fn is_last_played(&self, path: &Path) -> bool {
        self.state.last_playing_path.as_deref() == Some(path)
    }
}

/// Keep `selected` inside the window `[scroll, scroll + height)` and the
/// window inside the list.
fn follow_selection(selected: usize, scroll: &mut usize, len: usize, height: usize) {
    let height = height.max(1);
    if selected < *scroll {
        *scroll = selected;
    } else if selected >= *scroll + height {
        *scroll = selected + 1 - height;
    }
    *scroll = (*scroll).min(len.saturating_sub(height));
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        dir: tempfile::TempDir,
    }

    impl Fixture {
        /// `music/` holds a.mp3 b.mp3 c.mp3 notes.txt and a `sub/` directory.
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let music = dir.path().join("music");
            std::fs::create_dir_all(music.join("sub")).unwrap();
            for f in ["a.mp3", "b.mp3", "c.mp3", "notes.txt"] {
                std::fs::write(music.join(f), b"x").unwrap();
            }
            Self { dir }
        }

        fn music(&self) -> PathBuf {
            self.dir.path().join("music")
        }

        fn song(&self, name: &str) -> PathBuf {
            self.music().join(name)
        }

        fn controller(&self, height: usize) -> Controller {
            Controller::new(self.music(), height)
        }
    }

    fn playing(name: &str) -> PlaybackStatus {
        PlaybackStatus {
            track_name: Some(name.to_string()),
            position_secs: Some(10.0),
            duration_secs: Some(100.0),
            paused: false,
            is_idle: false,
        }
    }

    fn select(c: &mut Controller, name: &str) {
        let index = c.entries().iter().position(|e| e.name == name).unwrap();
        c.handle(Input::MoveUp);
        for _ in 0..c.entries().len() {
            c.handle(Input::MoveUp);
        }
        for _ in 0..index {
            c.handle(Input::MoveDown);
        }
        assert_eq!(c.selected_entry().unwrap().name, name);
    }

    /// Controller on the playlist pane with a.mp3 b.mp3 c.mp3 queued.
    fn with_playlist(f: &Fixture) -> Controller {
        let mut c = f.controller(10);
        for name in ["a.mp3", "b.mp3", "c.mp3"] {
            select(&mut c, name);
            c.handle(Input::AddToPlaylist);
        }
        c.handle(Input::SwitchPane);
        c
    }

    fn play_cmd(path: PathBuf) -> Option<EngineCommand> {
        Some(EngineCommand::Play {
            path,
            start_secs: 0.0,
        })
    }

    #[test]
    fn test_listing_order() {
        let f = Fixture::new();
        let c = f.controller(10);
        let names: Vec<_> = c.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["..", "sub", "a.mp3", "b.mp3", "c.mp3", "notes.txt"]);
    }

    #[test]
    fn test_navigation_stays_in_bounds() {
        let f = Fixture::new();
        let mut c = f.controller(2);
        let len = c.entries().len();
        let inputs = [
            Input::MoveUp,
            Input::PageDown,
            Input::PageDown,
            Input::PageDown,
            Input::MoveDown,
            Input::PageUp,
            Input::MoveDown,
            Input::MoveDown,
            Input::MoveDown,
            Input::MoveDown,
            Input::MoveDown,
            Input::PageUp,
            Input::PageUp,
            Input::PageUp,
            Input::Resize(4),
            Input::PageDown,
            Input::MoveUp,
        ];
        for input in inputs {
            c.handle(input);
            let s = c.state();
            assert!(s.selected_index < len);
            assert!(s.scroll_offset <= len.saturating_sub(c.visible_height()));
            assert!(s.selected_index >= s.scroll_offset);
            assert!(s.selected_index < s.scroll_offset + c.visible_height());
        }
    }

    #[test]
    fn test_page_moves_by_visible_height() {
        let f = Fixture::new();
        let mut c = f.controller(2);
        c.handle(Input::PageDown);
        assert_eq!(c.state().selected_index, 2);
        assert_eq!(c.state().scroll_offset, 1);
        c.handle(Input::PageDown);
        c.handle(Input::PageDown);
        assert_eq!(c.state().selected_index, 5);
        assert_eq!(c.state().scroll_offset, 4);
        c.handle(Input::PageUp);
        assert_eq!(c.state().selected_index, 3);
        assert_eq!(c.state().scroll_offset, 3);
    }

    #[test]
    fn test_cursor_changes_are_persisted() {
        let f = Fixture::new();
        let mut c = f.controller(2);
        assert!(c.handle(Input::MoveDown).persist);
        assert!(c.handle(Input::PageDown).persist);
        assert!(c.handle(Input::MoveUp).persist);
        assert!(c.handle(Input::PageUp).persist);
        assert!(c.handle(Input::ToggleHidden).persist);

        // Already at the top: nothing moved, nothing to write.
        assert!(!c.handle(Input::MoveUp).persist);

        c.handle(Input::SwitchPane);
        assert!(!c.handle(Input::MoveDown).persist);
    }

    #[test]
    fn test_autoplay_advance_is_persisted() {
        let f = Fixture::new();
        let mut c = with_playlist(&f);
        c.handle(Input::Activate);
        c.handle(Input::Tick(playing("a.mp3")));
        let out = c.handle(Input::Tick(PlaybackStatus::idle()));
        assert!(out.persist);
        assert_eq!(c.snapshot().playlist_selected, Some(1));
    }

    #[test]
    fn test_movement_on_empty_playlist_is_noop() {
        let f = Fixture::new();
        let mut c = f.controller(5);
        c.handle(Input::SwitchPane);
        assert_eq!(c.handle(Input::MoveDown), Outcome::none());
        assert_eq!(c.handle(Input::Activate), Outcome::none());
        assert_eq!(c.handle(Input::RemoveFromPlaylist), Outcome::none());
        assert_eq!(c.state().playlist_selected_index, 0);
    }

    #[test]
    fn test_switch_pane_keeps_cursors() {
        let f = Fixture::new();
        let mut c = with_playlist(&f);
        c.handle(Input::MoveDown);
        let browser_cursor = c.state().selected_index;
        c.handle(Input::SwitchPane);
        assert_eq!(c.state().active_pane, Pane::Browser);
        assert_eq!(c.state().playlist_selected_index, 1);
        assert_eq!(c.state().selected_index, browser_cursor);
    }

    #[test]
    fn test_toggle_hidden_resets_cursor() {
        let f = Fixture::new();
        std::fs::write(f.song(".hidden.mp3"), b"x").unwrap();
        let mut c = f.controller(10);
        select(&mut c, "c.mp3");
        c.handle(Input::ToggleHidden);
        assert!(c.state().show_hidden);
        assert_eq!(c.state().selected_index, 0);
        assert_eq!(c.state().scroll_offset, 0);
        assert!(c.entries().iter().any(|e| e.name == ".hidden.mp3"));
    }

    #[test]
    fn test_enter_directory_and_back() {
        let f = Fixture::new();
        let mut c = f.controller(10);
        select(&mut c, "sub");
        let out = c.handle(Input::Activate);
        assert!(out.persist);
        assert_eq!(out.command, None);
        assert_eq!(c.state().current_directory, f.music().join("sub"));
        assert_eq!(c.state().selected_index, 0);

        // `..` row behaves like GoToParent
        assert_eq!(c.selected_entry().unwrap().kind, EntryKind::Parent);
        let out = c.handle(Input::Activate);
        assert!(out.persist);
        assert_eq!(c.state().current_directory, f.music());

        let out = c.handle(Input::GoToParent);
        assert!(out.persist);
        assert_eq!(c.state().current_directory, f.dir.path());
    }

    #[test]
    fn test_go_to_parent_at_root_is_noop() {
        let mut c = Controller::new(PathBuf::from("/"), 10);
        assert_eq!(c.handle(Input::GoToParent), Outcome::none());
        assert_eq!(c.state().current_directory, PathBuf::from("/"));
    }

    #[test]
    fn test_activate_audio_file_clears_anchor_and_plays() {
        let f = Fixture::new();
        let mut c = with_playlist(&f);
        c.handle(Input::Activate);
        assert!(c.state().playing_from_playlist);

        c.handle(Input::SwitchPane);
        select(&mut c, "b.mp3");
        let out = c.handle(Input::Activate);
        assert_eq!(out.command, play_cmd(f.song("b.mp3")));
        assert!(!c.state().playing_from_playlist);
        assert_eq!(c.state().playing_index, None);
    }

    #[test]
    fn test_activate_non_audio_file_only_notices() {
        let f = Fixture::new();
        let mut c = f.controller(10);
        select(&mut c, "notes.txt");
        let out = c.handle(Input::Activate);
        assert_eq!(out.command, None);
        assert_eq!(out.notice.unwrap().level, NoticeLevel::Warning);
    }

    #[test]
    fn test_activate_from_playlist_sets_anchor() {
        let f = Fixture::new();
        let mut c = with_playlist(&f);
        c.handle(Input::MoveDown);
        let out = c.handle(Input::Activate);
        assert_eq!(out.command, play_cmd(f.song("b.mp3")));
        assert!(c.state().playing_from_playlist);
        assert_eq!(c.state().playing_index, Some(1));
    }

    #[test]
    fn test_add_twice_keeps_one_entry() {
        let f = Fixture::new();
        let mut c = f.controller(10);
        select(&mut c, "a.mp3");
        let first = c.handle(Input::AddToPlaylist);
        assert!(first.persist);
        let second = c.handle(Input::AddToPlaylist);
        assert!(!second.persist);
        assert_eq!(c.state().playlist.len(), 1);
        assert!(second.notice.unwrap().text.contains("Already in playlist"));
    }

    #[test]
    fn test_add_rejects_non_audio_and_wrong_pane() {
        let f = Fixture::new();
        let mut c = f.controller(10);
        select(&mut c, "notes.txt");
        let out = c.handle(Input::AddToPlaylist);
        assert!(out.notice.is_some());
        select(&mut c, "sub");
        c.handle(Input::AddToPlaylist);
        assert!(c.state().playlist.is_empty());

        select(&mut c, "a.mp3");
        c.handle(Input::SwitchPane);
        assert_eq!(c.handle(Input::AddToPlaylist), Outcome::none());
        assert!(c.state().playlist.is_empty());
    }

    #[test]
    fn test_remove_anchored_entry_clears_anchor() {
        let f = Fixture::new();
        let mut c = with_playlist(&f);
        c.handle(Input::Activate);
        assert_eq!(c.state().playing_index, Some(0));

        let out = c.handle(Input::RemoveFromPlaylist);
        assert!(out.persist);
        assert_eq!(out.command, None);
        assert_eq!(c.state().playlist, vec![f.song("b.mp3"), f.song("c.mp3")]);
        assert!(!c.state().playing_from_playlist);
        assert_eq!(c.state().playing_index, None);
    }

    #[test]
    fn test_remove_before_anchor_decrements() {
        let f = Fixture::new();
        let mut c = with_playlist(&f);
        c.handle(Input::MoveDown);
        c.handle(Input::MoveDown);
        c.handle(Input::Activate);
        assert_eq!(c.state().playing_index, Some(2));

        c.handle(Input::MoveUp);
        c.handle(Input::MoveUp);
        c.handle(Input::RemoveFromPlaylist);
        assert_eq!(c.state().playing_index, Some(1));
        assert!(c.state().playing_from_playlist);
        assert_eq!(c.state().playlist[1], f.song("c.mp3"));
    }

    #[test]
    fn test_remove_last_entry_clamps_cursor_and_clears_anchor() {
        let f = Fixture::new();
        let mut c = with_playlist(&f);
        c.handle(Input::PageDown);
        assert_eq!(c.state().playlist_selected_index, 2);
        c.handle(Input::RemoveFromPlaylist);
        assert_eq!(c.state().playlist_selected_index, 1);

        c.handle(Input::Activate);
        c.handle(Input::RemoveFromPlaylist);
        c.handle(Input::RemoveFromPlaylist);
        assert!(c.state().playlist.is_empty());
        assert!(!c.state().playing_from_playlist);
        assert_eq!(c.state().playing_index, None);
        assert_eq!(c.state().playlist_selected_index, 0);
    }

    #[test]
    fn test_toggle_pause_issues_command_only() {
        let f = Fixture::new();
        let mut c = f.controller(10);
        let before = c.state().clone();
        let out = c.handle(Input::TogglePlayPause);
        assert_eq!(out.command, Some(EngineCommand::TogglePause));
        assert_eq!(c.state(), &before);
    }

    #[test]
    fn test_autoplay_advances_on_finish() {
        let f = Fixture::new();
        let mut c = with_playlist(&f);
        c.handle(Input::Activate);
        c.handle(Input::Tick(playing("a.mp3")));
        assert!(c.state().was_playing_last_tick);

        let out = c.handle(Input::Tick(PlaybackStatus::idle()));
        assert_eq!(out.command, play_cmd(f.song("b.mp3")));
        assert_eq!(c.state().playing_index, Some(1));
        assert_eq!(c.state().playlist_selected_index, 1);

        // Still idle while the next track probes: no second advance.
        assert_eq!(c.handle(Input::Tick(PlaybackStatus::idle())).command, None);
        assert_eq!(c.state().playing_index, Some(1));
    }

    #[test]
    fn test_autoplay_stops_at_end_without_wrapping() {
        let f = Fixture::new();
        let mut c = with_playlist(&f);
        c.handle(Input::PageDown);
        c.handle(Input::Activate);
        assert_eq!(c.state().playing_index, Some(2));
        c.handle(Input::Tick(playing("c.mp3")));
        let out = c.handle(Input::Tick(PlaybackStatus::idle()));
        assert_eq!(out.command, None);
        assert!(!c.state().playing_from_playlist);
        assert_eq!(c.state().playing_index, None);
    }

    #[test]
    fn test_no_autoplay_outside_playlist_pane() {
        let f = Fixture::new();
        let mut c = with_playlist(&f);
        c.handle(Input::Activate);
        c.handle(Input::SwitchPane);
        c.handle(Input::Tick(playing("a.mp3")));
        let out = c.handle(Input::Tick(PlaybackStatus::idle()));
        assert_eq!(out.command, None);
        assert_eq!(c.state().playing_index, Some(0));
    }

    #[test]
    fn test_stop_prevents_autoplay() {
        let f = Fixture::new();
        let mut c = with_playlist(&f);
        c.handle(Input::Activate);
        c.handle(Input::Tick(playing("a.mp3")));
        let out = c.handle(Input::Stop);
        assert_eq!(out.command, Some(EngineCommand::Stop));
        assert_eq!(c.handle(Input::Tick(PlaybackStatus::idle())).command, None);
    }

    #[test]
    fn test_seek_by_uses_last_position() {
        let f = Fixture::new();
        let mut c = f.controller(10);
        assert_eq!(c.handle(Input::SeekBy(5.0)).command, None);
        c.handle(Input::Tick(playing("a.mp3")));
        assert_eq!(
            c.handle(Input::SeekBy(5.0)).command,
            Some(EngineCommand::Seek { secs: 15.0 })
        );
        assert_eq!(
            c.handle(Input::SeekBy(-60.0)).command,
            Some(EngineCommand::Seek { secs: 0.0 })
        );
    }

    #[test]
    fn test_probe_results() {
        let f = Fixture::new();
        let mut c = f.controller(10);
        select(&mut c, "a.mp3");
        c.handle(Input::Activate);

        let failed = c.handle(Input::ProbeResolved(ProbeResult::Failed {
            reason: "unsupported".into(),
        }));
        assert_eq!(failed.notice.unwrap().level, NoticeLevel::Error);
        assert!(!failed.persist);
        assert_eq!(c.state().last_playing_path, None);

        c.handle(Input::Activate);
        let ok = c.handle(Input::ProbeResolved(ProbeResult::Committed {
            track_name: "a.mp3".into(),
        }));
        assert!(ok.persist);
        assert_eq!(ok.notice.unwrap().text, "Playing: a.mp3");
        assert_eq!(c.state().last_playing_path, Some(f.song("a.mp3")));
        assert!(c.is_last_played(&f.song("a.mp3")));
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let f = Fixture::new();
        let mut c = with_playlist(&f);
        c.handle(Input::MoveDown);
        c.handle(Input::SwitchPane);
        c.handle(Input::MoveDown);
        c.handle(Input::MoveDown);
        let saved = c.snapshot();

        let restored = Controller::restore(&saved, None, PathBuf::from("/"), 10);
        let (a, b) = (c.state(), restored.state());
        assert_eq!(b.playlist, a.playlist);
        assert_eq!(b.current_directory, a.current_directory);
        assert_eq!(b.selected_index, a.selected_index);
        assert_eq!(b.scroll_offset, a.scroll_offset);
        assert_eq!(b.playlist_selected_index, a.playlist_selected_index);
        assert_eq!(b.playlist_scroll_offset, a.playlist_scroll_offset);
    }

    #[test]
    fn test_restore_drops_deleted_files_and_reclamps() {
        let f = Fixture::new();
        let store = crate::persist::SessionStore::new(f.dir.path().join("session.json"));
        let mut c = with_playlist(&f);
        c.handle(Input::PageDown);
        assert_eq!(c.state().playlist_selected_index, 2);
        store.save(&c.snapshot()).unwrap();

        std::fs::remove_file(f.song("c.mp3")).unwrap();
        let restored = Controller::restore(&store.load(), None, PathBuf::from("/"), 10);
        assert_eq!(restored.state().playlist, vec![f.song("a.mp3"), f.song("b.mp3")]);
        assert_eq!(restored.state().playlist_selected_index, 1);
        assert_eq!(restored.state().current_directory, f.music());
    }

    #[test]
    fn test_explicit_directory_wins_and_resets_browser_cursor() {
        let f = Fixture::new();
        let saved = PersistedSession {
            current_directory: Some(f.music().to_string_lossy().into_owned()),
            browser_selected: Some(3),
            ..PersistedSession::default()
        };
        let explicit = f.music().join("sub");
        let c = Controller::restore(&saved, Some(explicit.clone()), PathBuf::from("/"), 10);
        assert_eq!(c.state().current_directory, explicit);
        assert_eq!(c.state().selected_index, 0);

        let c = Controller::restore(&saved, None, PathBuf::from("/"), 10);
        assert_eq!(c.state().selected_index, 3);
    }
}
