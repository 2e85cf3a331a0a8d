//! Directory listing for the browser pane.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// The synthetic `..` row.
    Parent,
    Directory,
    File,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub path: PathBuf,
    pub name: String,
    pub kind: EntryKind,
}

impl Entry {
    pub fn is_audio(&self) -> bool {
        self.kind == EntryKind::File && is_audio_file(&self.path)
    }
}

pub fn is_audio_file(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase());
    matches!(
        ext.as_deref(),
        Some(
            "mp3" | "flac" | "ogg" | "opus" | "m4a" | "aac" | "wav" | "aiff" | "wv" | "ape"
                | "mka" | "webm" | "mp4" | "m4b"
        )
    )
}

/// Parent directory, or `None` at the top of the tree.
pub fn parent_of(dir: &Path) -> Option<PathBuf> {
    let parent = dir.parent()?;
    (parent != dir && !parent.as_os_str().is_empty()).then(|| parent.to_path_buf())
}

/// List `dir`: `..` first when there is a parent, then directories, then
/// files, each group in case-insensitive name order.  An unreadable
/// directory lists as just its `..` row.
pub fn list_directory(dir: &Path, show_hidden: bool) -> Vec<Entry> {
    let mut entries = Vec::new();
    if let Some(parent) = parent_of(dir) {
        entries.push(Entry {
            path: parent,
            name: "..".to_string(),
            kind: EntryKind::Parent,
        });
    }

    let rd = match std::fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) => {
            warn!("cannot list {}: {}", dir.display(), e);
            return entries;
        }
    };

    let mut listed: Vec<Entry> = rd
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !show_hidden && name.starts_with('.') {
                return None;
            }
            let path = entry.path();
            // Follows symlinks, so a link to a directory browses like one.
            let kind = if path.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            Some(Entry { path, name, kind })
        })
        .collect();

    listed.sort_by(|a, b| match (a.kind, b.kind) {
        (EntryKind::Directory, EntryKind::File) => Ordering::Less,
        (EntryKind::File, EntryKind::Directory) => Ordering::Greater,
        _ => a
            .name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name)),
    });
    entries.extend(listed);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_directories_first_then_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        for f in ["b.mp3", "A.flac", "c.txt"] {
            std::fs::write(dir.path().join(f), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("zeta")).unwrap();
        std::fs::create_dir(dir.path().join("Alpha")).unwrap();

        let entries = list_directory(dir.path(), false);
        assert_eq!(names(&entries), vec!["..", "Alpha", "zeta", "A.flac", "b.mp3", "c.txt"]);
        assert_eq!(entries[0].kind, EntryKind::Parent);
        assert!(entries[3].is_audio());
        assert!(!entries[5].is_audio());
    }

    #[test]
    fn test_hidden_entries_filtered_unless_shown() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".secret.mp3"), b"x").unwrap();
        std::fs::write(dir.path().join("song.mp3"), b"x").unwrap();

        assert_eq!(names(&list_directory(dir.path(), false)), vec!["..", "song.mp3"]);
        assert_eq!(
            names(&list_directory(dir.path(), true)),
            vec!["..", ".secret.mp3", "song.mp3"]
        );
    }

    #[test]
    fn test_root_has_no_parent_row() {
        assert_eq!(parent_of(Path::new("/")), None);
        assert_eq!(parent_of(Path::new("/music")), Some(PathBuf::from("/")));
    }

    #[test]
    fn test_unreadable_directory_lists_only_parent() {
        let entries = list_directory(Path::new("/definitely/not/a/dir"), false);
        assert_eq!(names(&entries), vec![".."]);
    }

    #[test]
    fn test_audio_extensions() {
        assert!(is_audio_file(Path::new("x/Song.MP3")));
        assert!(is_audio_file(Path::new("x/book.m4b")));
        assert!(!is_audio_file(Path::new("x/cover.jpg")));
        assert!(!is_audio_file(Path::new("x/README")));
    }
}
