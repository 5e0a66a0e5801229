use crate::config::Config;
use crate::error::{DtError, Result};
use crate::paths;
use crate::project::ProjectState;
use crate::summary::{ActivityRecord, ProjectSummary};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// On-disk layout of `.dt/store.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    current_project_id: Option<String>,
    #[serde(default)]
    projects: Vec<ProjectState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_activity: Option<ActivityRecord>,
}

/// Single-user project persistence. Newest projects come first and the list
/// is capped at `max_projects`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    path: PathBuf,
    max_projects: usize,
}

impl LocalStore {
    pub fn new(root: &Path, max_projects: usize) -> Self {
        Self {
            path: paths::store_path(root),
            max_projects,
        }
    }

    pub fn open(root: &Path, config: &Config) -> Self {
        Self::new(root, config.store.max_projects)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<StoreFile> {
        if !self.path.exists() {
            return Ok(StoreFile::default());
        }
        let data = std::fs::read_to_string(&self.path)?;
        let mut file: StoreFile = serde_json::from_str(&data)?;
        for p in &mut file.projects {
            p.ensure_progress_records();
        }
        Ok(file)
    }

    fn write(&self, file: &StoreFile) -> Result<()> {
        let data = serde_json::to_string_pretty(file)?;
        crate::io::atomic_write(&self.path, data.as_bytes())
    }

    // ---------------------------------------------------------------------------
    // Operations
    // ---------------------------------------------------------------------------

    /// Insert or update `state`, make it current, and record the activity.
    /// Returns the state as stored.
    pub fn save(&self, state: &ProjectState) -> Result<ProjectState> {
        let mut file = self.read()?;
        let now = Utc::now();
        let mut stored = state.clone();
        stored.updated_at = now;

        match file.projects.iter_mut().find(|p| p.id == stored.id) {
            Some(existing) => *existing = stored.clone(),
            None => file.projects.insert(0, stored.clone()),
        }
        file.projects.truncate(self.max_projects);
        file.current_project_id = Some(stored.id.clone());
        file.last_activity = Some(ActivityRecord::of(&stored, now));

        self.write(&file)?;
        tracing::debug!(project = %stored.id, "project saved");
        Ok(stored)
    }

    pub fn create(&self, name: &str, description: &str) -> Result<ProjectState> {
        self.save(&ProjectState::new(name, description))
    }

    pub fn all(&self) -> Result<Vec<ProjectState>> {
        Ok(self.read()?.projects)
    }

    pub fn list(&self) -> Result<Vec<ProjectSummary>> {
        Ok(self.read()?.projects.iter().map(ProjectSummary::from).collect())
    }

    pub fn current_id(&self) -> Result<Option<String>> {
        Ok(self.read()?.current_project_id)
    }

    pub fn load_current(&self) -> Result<Option<ProjectState>> {
        let file = self.read()?;
        let Some(id) = file.current_project_id else {
            return Ok(None);
        };
        Ok(file.projects.into_iter().find(|p| p.id == id))
    }

    /// Like [`LocalStore::load_current`], but a missing project is an error.
    pub fn current(&self) -> Result<ProjectState> {
        self.load_current()?.ok_or(DtError::NoCurrentProject)
    }

    /// Load by exact id or unique id prefix and make it current.
    pub fn load(&self, id: &str) -> Result<ProjectState> {
        let mut file = self.read()?;
        let index = find_index(&file.projects, id)?;
        let project = file.projects[index].clone();
        file.current_project_id = Some(project.id.clone());
        self.write(&file)?;
        Ok(project)
    }

    /// Remove a project. Returns the removed project's id.
    pub fn delete(&self, id: &str) -> Result<String> {
        let mut file = self.read()?;
        let index = find_index(&file.projects, id)?;
        let removed = file.projects.remove(index);
        if file.current_project_id.as_deref() == Some(removed.id.as_str()) {
            file.current_project_id = None;
        }
        self.write(&file)?;
        Ok(removed.id)
    }

    pub fn last_activity(&self) -> Result<Option<ActivityRecord>> {
        Ok(self.read()?.last_activity)
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

fn find_index(projects: &[ProjectState], id: &str) -> Result<usize> {
    if let Some(i) = projects.iter().position(|p| p.id == id) {
        return Ok(i);
    }
    let mut matches = projects
        .iter()
        .enumerate()
        .filter(|(_, p)| !id.is_empty() && p.id.starts_with(id));
    match (matches.next(), matches.next()) {
        (Some((i, _)), None) => Ok(i),
        _ => Err(DtError::ProjectNotFound(id.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
