use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pane {
    #[default]
    Browser,
    Playlist,
}

impl Pane {
    pub fn other(self) -> Self {
        match self {
            Pane::Browser => Pane::Playlist,
            Pane::Playlist => Pane::Browser,
        }
    }
}

/// Everything the UI remembers about one browsing session.  Only the
/// controller mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub current_directory: PathBuf,
    pub selected_index: usize,
    pub scroll_offset: usize,
    pub show_hidden: bool,
    /// Ordered, no duplicates.
    pub playlist: Vec<PathBuf>,
    pub playlist_selected_index: usize,
    pub playlist_scroll_offset: usize,
    pub active_pane: Pane,
    pub playing_from_playlist: bool,
    /// Playlist entry autoplay continues from.  `Some` only while
    /// `playing_from_playlist` holds and the index is in range.
    pub playing_index: Option<usize>,
    pub was_playing_last_tick: bool,
    pub last_playing_path: Option<PathBuf>,
}

impl SessionState {
    pub fn new(current_directory: PathBuf) -> Self {
        Self {
            current_directory,
            selected_index: 0,
            scroll_offset: 0,
            show_hidden: false,
            playlist: Vec::new(),
            playlist_selected_index: 0,
            playlist_scroll_offset: 0,
            active_pane: Pane::Browser,
            playing_from_playlist: false,
            playing_index: None,
            was_playing_last_tick: false,
            last_playing_path: None,
        }
    }

    pub fn clear_anchor(&mut self) {
        self.playing_from_playlist = false;
        self.playing_index = None;
    }

    pub fn set_anchor(&mut self, index: usize) {
        self.playing_from_playlist = true;
        self.playing_index = Some(index);
    }

    /// Restore the autoplay-anchor invariant after the playlist changed.
    /// `removed` is the index of an entry that was just taken out, if any.
    pub fn repair_anchor(&mut self, removed: Option<usize>) {
        if let (Some(removed), Some(anchor)) = (removed, self.playing_index) {
            if removed < anchor {
                self.playing_index = Some(anchor - 1);
            } else if removed == anchor {
                self.playing_index = None;
            }
        }

        let in_range = matches!(self.playing_index, Some(i) if i < self.playlist.len());
        if !self.playing_from_playlist || !in_range {
            self.clear_anchor();
        }

        let last = self.playlist.len().saturating_sub(1);
        self.playlist_selected_index = self.playlist_selected_index.min(last);
        self.playlist_scroll_offset = self.playlist_scroll_offset.min(last);
    }
}
