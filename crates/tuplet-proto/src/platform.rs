use std::path::PathBuf;

pub const DAEMON_BINARY_NAME: &str = "tuplet-daemon";
pub const MPV_BINARY_NAME: &str = "mpv";

/// Well-known daemon socket path.  Callers take it from `Config` rather than
/// calling this directly; this only supplies the default.
pub fn daemon_socket_path() -> PathBuf {
    data_dir().join("daemon.sock")
}

/// Per-process mpv IPC socket so an in-process engine and the daemon never
/// fight over the same path.
pub fn mpv_socket_path() -> PathBuf {
    temp_dir().join(format!("tuplet-mpv-{}.sock", std::process::id()))
}

pub fn data_dir() -> PathBuf {
    // ~/.local/share/tuplet on every unix, macOS included
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".local")
        .join("share")
        .join("tuplet")
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("tuplet")
}

pub fn temp_dir() -> PathBuf {
    std::env::temp_dir()
}

fn find_beside_exe(name: &str) -> Option<PathBuf> {
    let current_exe = std::env::current_exe().ok()?;
    let dir = current_exe.parent()?;
    let p = dir.join(name);
    p.exists().then_some(p)
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|p| p.is_file())
}

/// Find the daemon binary: beside the current exe (cargo puts both
/// binaries in the same target dir), then PATH.
pub fn find_daemon_binary() -> Option<PathBuf> {
    find_beside_exe(DAEMON_BINARY_NAME).or_else(|| find_on_path(DAEMON_BINARY_NAME))
}

/// Find mpv for playback.  `MPV_PATH` overrides the search.
pub fn find_mpv_binary() -> Option<PathBuf> {
    if let Some(p) = std::env::var_os("MPV_PATH").map(PathBuf::from) {
        if p.exists() {
            return Some(p);
        }
    }
    find_beside_exe(MPV_BINARY_NAME).or_else(|| find_on_path(MPV_BINARY_NAME))
}
