use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dt_core::merge::{apply_change, ChangeEvent, ProjectPatch};
use dt_core::project::{
    ChatMessage, Idea, Observation, PovStatement, ProjectState, Prototype, PrototypeFeedback,
    Survey, SurveyResponse,
};
use dt_core::types::{ArtifactKind, Stage, StageStatus};
use dt_core::DtError;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

use crate::collab::{ChangeFeed, FeedEvent, Presence, Repository};
use crate::{CoachError, Result};

const FEED_CAPACITY: usize = 256;

struct Inner {
    projects: Mutex<HashMap<String, ProjectState>>,
    presence: Mutex<HashMap<String, Vec<Presence>>>,
    feed: broadcast::Sender<(String, ChangeEvent)>,
    read_only: AtomicBool,
}

/// A process-local [`Repository`] and [`ChangeFeed`].
///
/// Every accepted write is merged into the stored copy and broadcast to all
/// subscribers of that project, including the writer. A subscriber that
/// falls more than the feed capacity behind gets [`FeedEvent::Resync`].
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_feed_capacity(FEED_CAPACITY)
    }

    pub fn with_feed_capacity(capacity: usize) -> Self {
        let (feed, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(Inner {
                projects: Mutex::new(HashMap::new()),
                presence: Mutex::new(HashMap::new()),
                feed,
                read_only: AtomicBool::new(false),
            }),
        }
    }

    /// Reject every write, as a backend with a revoked grant would.
    pub fn set_read_only(&self, read_only: bool) {
        self.inner.read_only.store(read_only, Ordering::Release);
    }

    fn write(&self, project_id: &str, event: ChangeEvent) -> Result<()> {
        if self.inner.read_only.load(Ordering::Acquire) {
            return Err(CoachError::Repository(format!(
                "project {project_id} is read-only"
            )));
        }
        {
            let mut projects = lock(&self.inner.projects);
            let stored = projects
                .get_mut(project_id)
                .ok_or_else(|| DtError::ProjectNotFound(project_id.to_string()))?;
            *stored = apply_change(stored, &event);
        }
        tracing::debug!(project = project_id, event = event.label(), "change accepted");
        // No subscribers is fine.
        let _ = self.inner.feed.send((project_id.to_string(), event));
        Ok(())
    }
}

#[async_trait]
impl Repository for MemoryBackend {
    async fn create_project(&self, state: &ProjectState) -> Result<()> {
        if self.inner.read_only.load(Ordering::Acquire) {
            return Err(CoachError::Repository("backend is read-only".into()));
        }
        lock(&self.inner.projects).insert(state.id.clone(), state.clone());
        Ok(())
    }

    async fn load_project(&self, project_id: &str) -> Result<ProjectState> {
        lock(&self.inner.projects)
            .get(project_id)
            .cloned()
            .ok_or_else(|| DtError::ProjectNotFound(project_id.to_string()).into())
    }

    async fn update_project(&self, project_id: &str, patch: &ProjectPatch) -> Result<()> {
        self.write(project_id, ChangeEvent::ProjectUpdated(patch.clone()))
    }

    async fn insert_observation(&self, project_id: &str, record: &Observation) -> Result<()> {
        self.write(project_id, ChangeEvent::ObservationInserted(record.clone()))
    }

    async fn insert_pov(&self, project_id: &str, record: &PovStatement) -> Result<()> {
        self.write(project_id, ChangeEvent::PovInserted(record.clone()))
    }

    async fn insert_idea(&self, project_id: &str, record: &Idea) -> Result<()> {
        self.write(project_id, ChangeEvent::IdeaInserted(record.clone()))
    }

    async fn insert_prototype(&self, project_id: &str, record: &Prototype) -> Result<()> {
        self.write(project_id, ChangeEvent::PrototypeInserted(record.clone()))
    }

    async fn insert_feedback(
        &self,
        project_id: &str,
        prototype_id: &str,
        feedback: &PrototypeFeedback,
    ) -> Result<()> {
        self.write(
            project_id,
            ChangeEvent::FeedbackInserted {
                prototype_id: prototype_id.to_string(),
                feedback: feedback.clone(),
            },
        )
    }

    async fn insert_survey(&self, project_id: &str, record: &Survey) -> Result<()> {
        self.write(project_id, ChangeEvent::SurveyInserted(record.clone()))
    }

    async fn insert_survey_response(
        &self,
        project_id: &str,
        record: &SurveyResponse,
    ) -> Result<()> {
        self.write(project_id, ChangeEvent::SurveyResponseInserted(record.clone()))
    }

    async fn insert_message(&self, project_id: &str, message: &ChatMessage) -> Result<()> {
        self.write(project_id, ChangeEvent::MessageInserted(message.clone()))
    }

    async fn set_artifact_active(
        &self,
        project_id: &str,
        kind: ArtifactKind,
        id: &str,
        is_active: bool,
    ) -> Result<()> {
        self.write(
            project_id,
            ChangeEvent::ArtifactActiveChanged {
                kind,
                id: id.to_string(),
                is_active,
            },
        )
    }

    async fn update_stage_progress(
        &self,
        project_id: &str,
        stage: Stage,
        status: StageStatus,
    ) -> Result<()> {
        self.write(project_id, ChangeEvent::StageProgressUpdated { stage, status })
    }
}

#[async_trait]
impl ChangeFeed for MemoryBackend {
    async fn subscribe(&self, project_id: &str) -> Result<BoxStream<'static, FeedEvent>> {
        let wanted = project_id.to_string();
        let stream = BroadcastStream::new(self.inner.feed.subscribe()).filter_map(move |item| {
            let event = match item {
                Ok((id, event)) if id == wanted => Some(FeedEvent::Change(event)),
                Ok(_) => None,
                // The skipped events may belong to other projects; resync anyway.
                Err(BroadcastStreamRecvError::Lagged(n)) => {
                    tracing::warn!(project = %wanted, skipped = n, "change feed lagged");
                    Some(FeedEvent::Resync)
                }
            };
            futures::future::ready(event)
        });
        Ok(stream.boxed())
    }

    async fn join(&self, project_id: &str, presence: Presence) -> Result<()> {
        let mut all = lock(&self.inner.presence);
        let here = all.entry(project_id.to_string()).or_default();
        here.retain(|p| p.collaborator_id != presence.collaborator_id);
        here.push(presence);
        Ok(())
    }

    async fn leave(&self, project_id: &str, collaborator_id: &str) -> Result<()> {
        if let Some(here) = lock(&self.inner.presence).get_mut(project_id) {
            here.retain(|p| p.collaborator_id != collaborator_id);
        }
        Ok(())
    }

    async fn online(&self, project_id: &str) -> Result<Vec<Presence>> {
        Ok(lock(&self.inner.presence)
            .get(project_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dt_core::project::Attribution;
    use dt_core::types::ObservationCategory;

    fn observation(id: &str) -> Observation {
        Observation {
            id: id.into(),
            content: "Riders stand under the awning".into(),
            category: ObservationCategory::Behavior,
            created_at: Utc::now(),
            source: None,
            is_active: true,
            attribution: Attribution::default(),
        }
    }

    fn presence(id: &str, nickname: &str) -> Presence {
        Presence {
            collaborator_id: id.into(),
            nickname: nickname.into(),
            color: "#F59E0B".into(),
            joined_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn writes_merge_into_stored_copy() {
        let backend = MemoryBackend::new();
        let state = ProjectState::new("p", "");
        backend.create_project(&state).await.unwrap();
        backend.insert_observation(&state.id, &observation("o1")).await.unwrap();
        backend.insert_observation(&state.id, &observation("o1")).await.unwrap();
        let stored = backend.load_project(&state.id).await.unwrap();
        assert_eq!(stored.observations.len(), 1);
    }

    #[tokio::test]
    async fn unknown_project_is_not_found() {
        let backend = MemoryBackend::new();
        let err = backend.load_project("ghost").await.unwrap_err();
        assert!(matches!(err, CoachError::Core(DtError::ProjectNotFound(_))));
        let err = backend
            .insert_observation("ghost", &observation("o1"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoachError::Core(DtError::ProjectNotFound(_))));
    }

    #[tokio::test]
    async fn feed_only_delivers_subscribed_project() {
        let backend = MemoryBackend::new();
        let a = ProjectState::new("a", "");
        let b = ProjectState::new("b", "");
        backend.create_project(&a).await.unwrap();
        backend.create_project(&b).await.unwrap();

        let mut feed = backend.subscribe(&a.id).await.unwrap();
        backend.insert_observation(&b.id, &observation("ob")).await.unwrap();
        backend.insert_observation(&a.id, &observation("oa")).await.unwrap();

        match feed.next().await.unwrap() {
            FeedEvent::Change(ChangeEvent::ObservationInserted(o)) => assert_eq!(o.id, "oa"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn lagging_subscriber_is_told_to_resync() {
        let backend = MemoryBackend::with_feed_capacity(2);
        let state = ProjectState::new("p", "");
        backend.create_project(&state).await.unwrap();
        let mut feed = backend.subscribe(&state.id).await.unwrap();

        for i in 0..5 {
            backend
                .insert_observation(&state.id, &observation(&format!("o{i}")))
                .await
                .unwrap();
        }
        assert_eq!(feed.next().await.unwrap(), FeedEvent::Resync);

        // The stored copy has everything the feed dropped.
        let reloaded = backend.load_project(&state.id).await.unwrap();
        assert_eq!(reloaded.observations.len(), 5);
        match feed.next().await.unwrap() {
            FeedEvent::Change(ChangeEvent::ObservationInserted(o)) => assert_eq!(o.id, "o3"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn feedback_inserts_append() {
        let backend = MemoryBackend::new();
        let now = Utc::now();
        let mut state = ProjectState::new("p", "");
        state.prototypes.push(Prototype {
            id: "p1".into(),
            name: "Kiosk".into(),
            description: String::new(),
            fidelity: dt_core::types::Fidelity::LowFidelity,
            features: vec![],
            feedbacks: vec![],
            whiteboard_id: None,
            created_at: now,
            updated_at: now,
            is_active: true,
            attribution: Attribution::default(),
        });
        backend.create_project(&state).await.unwrap();
        for id in ["f1", "f2", "f1"] {
            let feedback = PrototypeFeedback {
                id: id.into(),
                content: format!("note {id}"),
                kind: dt_core::types::FeedbackKind::Suggestion,
                source: String::new(),
                created_at: Utc::now(),
            };
            backend.insert_feedback(&state.id, "p1", &feedback).await.unwrap();
        }
        let stored = backend.load_project(&state.id).await.unwrap();
        assert_eq!(stored.prototypes[0].feedbacks.len(), 2);
    }

    #[tokio::test]
    async fn read_only_rejects_writes() {
        let backend = MemoryBackend::new();
        let state = ProjectState::new("p", "");
        backend.create_project(&state).await.unwrap();
        backend.set_read_only(true);
        let err = backend
            .update_stage_progress(&state.id, Stage::Define, StageStatus::InProgress)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("read-only"));
        backend.set_read_only(false);
        backend
            .update_stage_progress(&state.id, Stage::Define, StageStatus::InProgress)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn presence_join_and_leave() {
        let backend = MemoryBackend::new();
        backend.join("p", presence("c1", "Ada")).await.unwrap();
        backend.join("p", presence("c2", "Grace")).await.unwrap();
        backend.join("p", presence("c1", "Ada L.")).await.unwrap();
        let online = backend.online("p").await.unwrap();
        assert_eq!(online.len(), 2);
        assert_eq!(online[1].nickname, "Ada L.");

        backend.leave("p", "c2").await.unwrap();
        let online = backend.online("p").await.unwrap();
        assert_eq!(online.len(), 1);
        assert!(backend.online("elsewhere").await.unwrap().is_empty());
    }
}
