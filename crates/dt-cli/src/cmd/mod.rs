pub mod artifact;
pub mod chat;
pub mod config;
pub mod history;
pub mod ingest;
pub mod init;
pub mod project;
pub mod stage;
pub mod status;

use anyhow::Context;
use dt_core::{config::Config, store::LocalStore, ProjectState};
use std::path::Path;

/// Load the workspace config and open its project store.
pub(crate) fn open_store(root: &Path) -> anyhow::Result<(Config, LocalStore)> {
    let config = Config::load(root).context("failed to load config")?;
    let store = LocalStore::open(root, &config);
    Ok((config, store))
}

/// The project every state command operates on.
pub(crate) fn current_project(store: &LocalStore) -> anyhow::Result<ProjectState> {
    store.current().context("failed to load current project")
}
