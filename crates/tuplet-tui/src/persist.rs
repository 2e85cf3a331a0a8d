//! Session record kept between runs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// What survives a restart.  Every field is optional on disk; cursor values
/// are clamped by the controller once the listing is known.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    #[serde(default)]
    pub playlist: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_playing_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_selected: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_scroll: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist_selected: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist_scroll: Option<usize>,
}

pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored session.  A missing or unreadable file gives the
    /// default; a bad field is dropped without affecting the others.
    pub fn load(&self) -> PersistedSession {
        let Ok(content) = std::fs::read_to_string(&self.path) else {
            return PersistedSession::default();
        };
        match serde_json::from_str::<Value>(&content) {
            Ok(value) => validate(&value),
            Err(e) => {
                debug!("session: ignoring unparseable {}: {}", self.path.display(), e);
                PersistedSession::default()
            }
        }
    }

    pub fn save(&self, session: &PersistedSession) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(session)?)?;
        Ok(())
    }
}

fn validate(value: &Value) -> PersistedSession {
    let existing = |key: &str, want_dir: bool| -> Option<String> {
        let raw = value.get(key)?.as_str()?;
        let path = Path::new(raw);
        let ok = if want_dir { path.is_dir() } else { path.exists() };
        if !ok {
            debug!("session: dropping {} {:?}, no longer exists", key, raw);
        }
        ok.then(|| raw.to_string())
    };
    let index = |key: &str| -> Option<usize> {
        value
            .get(key)?
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
    };

    let mut seen = HashSet::new();
    let playlist = value
        .get("playlist")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .filter(|p| Path::new(p).is_file())
                .filter(|p| seen.insert(p.to_string()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    PersistedSession {
        playlist,
        current_directory: existing("current_directory", true),
        last_playing_path: existing("last_playing_path", false),
        browser_selected: index("browser_selected"),
        browser_scroll: index("browser_scroll"),
        playlist_selected: index("playlist_selected"),
        playlist_scroll: index("playlist_scroll"),
    }
}
