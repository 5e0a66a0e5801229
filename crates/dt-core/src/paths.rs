use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const DT_DIR: &str = ".dt";
pub const CONFIG_FILE: &str = ".dt/config.yaml";
pub const STORE_FILE: &str = ".dt/store.json";
pub const RESPONSES_DIR: &str = ".dt/responses";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn dt_dir(root: &Path) -> PathBuf {
    root.join(DT_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn store_path(root: &Path) -> PathBuf {
    root.join(STORE_FILE)
}

/// Raw coach replies kept for offline `dt ingest` replays.
pub fn response_path(root: &Path, message_id: &str) -> PathBuf {
    root.join(RESPONSES_DIR).join(format!("{message_id}.md"))
}

pub fn is_initialized(root: &Path) -> bool {
    config_path(root).exists()
}
