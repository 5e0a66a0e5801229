//! Shared projects: every record is written through a [`Repository`] and
//! peers learn about it from a [`ChangeFeed`].
//!
//! Local state is only changed by merging what the repository accepted, so
//! a session and its peers converge on the same document. Scalar fields race
//! last-writer-wins; collections are append-only with dedup on id.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dt_core::apply::{
    advance_target, build_feedback, build_idea, build_observation, build_pov, build_prototype,
    build_survey,
};
use dt_core::directive::{parse_directives, Directive};
use dt_core::merge::{apply_change, apply_changes, ChangeEvent, ProjectPatch};
use dt_core::project::{
    Attribution, ChatMessage, Idea, Observation, PovStatement, ProjectState, Prototype,
    PrototypeFeedback, Survey, SurveyAnswer, SurveyResponse,
};
use dt_core::prompt::recovery_prompt;
use dt_core::sanitize::strip_directives;
use dt_core::types::{ArtifactKind, Coach, Stage, StageStatus};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::session::{Outcome, Session, SkipReason, Turn};
use crate::transport::ChatTransport;
use crate::types::{ChatRequest, WireMessage};
use crate::{CoachError, Result};

// ─── Collaborator traits ──────────────────────────────────────────────────

/// The shared store behind a collaborative project.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn create_project(&self, state: &ProjectState) -> Result<()>;
    async fn load_project(&self, project_id: &str) -> Result<ProjectState>;
    async fn update_project(&self, project_id: &str, patch: &ProjectPatch) -> Result<()>;

    async fn insert_observation(&self, project_id: &str, record: &Observation) -> Result<()>;
    async fn insert_pov(&self, project_id: &str, record: &PovStatement) -> Result<()>;
    async fn insert_idea(&self, project_id: &str, record: &Idea) -> Result<()>;
    async fn insert_prototype(&self, project_id: &str, record: &Prototype) -> Result<()>;
    async fn insert_feedback(
        &self,
        project_id: &str,
        prototype_id: &str,
        feedback: &PrototypeFeedback,
    ) -> Result<()>;
    async fn insert_survey(&self, project_id: &str, record: &Survey) -> Result<()>;
    async fn insert_survey_response(&self, project_id: &str, record: &SurveyResponse)
        -> Result<()>;
    async fn insert_message(&self, project_id: &str, message: &ChatMessage) -> Result<()>;

    async fn set_artifact_active(
        &self,
        project_id: &str,
        kind: ArtifactKind,
        id: &str,
        is_active: bool,
    ) -> Result<()>;

    async fn update_stage_progress(
        &self,
        project_id: &str,
        stage: Stage,
        status: StageStatus,
    ) -> Result<()>;
}

/// Someone currently looking at a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presence {
    pub collaborator_id: String,
    pub nickname: String,
    pub color: String,
    pub joined_at: DateTime<Utc>,
}

impl Presence {
    pub fn attribution(&self) -> Attribution {
        Attribution::new(&self.collaborator_id, &self.nickname, &self.color)
    }
}

/// What a [`ChangeFeed`] subscriber receives.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Change(ChangeEvent),
    /// Changes were dropped before this subscriber saw them. Reload the
    /// project (see [`CollabSession::resync`]) before merging further events.
    Resync,
}

/// Real-time notifications for a project.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self, project_id: &str) -> Result<BoxStream<'static, FeedEvent>>;
    async fn join(&self, project_id: &str, presence: Presence) -> Result<()>;
    async fn leave(&self, project_id: &str, collaborator_id: &str) -> Result<()>;
    async fn online(&self, project_id: &str) -> Result<Vec<Presence>>;
}

// ─── CollabSession ────────────────────────────────────────────────────────

pub struct CollabSession<T, R> {
    session: Session<T>,
    repo: R,
    project_id: String,
}

impl<T: ChatTransport, R: Repository> CollabSession<T, R> {
    pub fn new(transport: T, repo: R, project_id: impl Into<String>, who: &Presence) -> Self {
        Self {
            session: Session::new(transport).with_attribution(who.attribution()),
            repo,
            project_id: project_id.into(),
        }
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Fold a peer's change into `state`.
    pub fn merge(&self, state: &ProjectState, event: &ChangeEvent) -> ProjectState {
        apply_change(state, event)
    }

    /// The repository's copy of the project, for when the feed lagged.
    pub async fn resync(&self) -> Result<ProjectState> {
        self.repo.load_project(&self.project_id).await
    }

    /// Like [`Session::send_message`], but both messages and every directive
    /// are written through the repository before they land in local state.
    ///
    /// Individual write failures are logged; the first one becomes the
    /// session's current error while the rest of the turn proceeds.
    pub async fn send_message(&self, state: ProjectState, text: &str) -> Turn {
        let text = text.trim();
        if text.is_empty() {
            return Turn::skipped(state, SkipReason::EmptyInput);
        }
        let Some(flight) = self.session.begin() else {
            return Turn::skipped(state, SkipReason::Busy);
        };

        let user = ChatMessage::user(text).with_attribution(self.session.attribution().clone());
        let mut state = state;
        state.push_message(user.clone());
        let mut first_error = self
            .repo
            .insert_message(&self.project_id, &user)
            .await
            .err();

        let coach = state.active_coach;
        let stage_at_send = state.current_stage;
        let request = ChatRequest::from_state(&state);

        let raw = match self.session.exchange(&flight, &request).await {
            Ok(raw) => raw,
            Err(e) => return self.session.fail(state, e),
        };

        let directives = parse_directives(&raw);
        let assistant = ChatMessage::assistant(strip_directives(&raw), coach);
        if let Err(e) = self.repo.insert_message(&self.project_id, &assistant).await {
            first_error.get_or_insert(e);
        }
        state.push_message(assistant);

        let state = self
            .persist_all(state, &directives, stage_at_send, &mut first_error)
            .await;
        if let Some(e) = first_error {
            self.session.record_error(&e);
        }
        Turn {
            state,
            outcome: Outcome::Completed { directives, raw },
        }
    }

    /// Like [`Session::retry_recording`]: the chat history is sent but left
    /// untouched, and every recovered directive is written through the
    /// repository.
    pub async fn retry_recording(&self, state: ProjectState, content: &str) -> Turn {
        let content = content.trim();
        if content.is_empty() {
            return Turn::skipped(state, SkipReason::EmptyInput);
        }
        let Some(prompt) = recovery_prompt(state.active_coach, content) else {
            return Turn::skipped(state, SkipReason::NotRecordable);
        };
        let Some(flight) = self.session.begin() else {
            return Turn::skipped(state, SkipReason::Busy);
        };

        let stage_at_send = state.current_stage;
        let request = ChatRequest::from_state(&state).with_extra(WireMessage::user(prompt));
        let raw = match self.session.exchange(&flight, &request).await {
            Ok(raw) => raw,
            Err(e) => return self.session.fail(state, e),
        };

        let directives = parse_directives(&raw);
        if directives.is_empty() {
            tracing::warn!(project = %self.project_id, "recovery reply carried no directive");
        }
        let mut first_error = None;
        let state = self
            .persist_all(state, &directives, stage_at_send, &mut first_error)
            .await;
        if let Some(e) = first_error {
            self.session.record_error(&e);
        }
        Turn {
            state,
            outcome: Outcome::Completed { directives, raw },
        }
    }

    /// Record an answer to one of the project's surveys for everyone.
    pub async fn add_survey_response(
        &self,
        state: &ProjectState,
        survey_id: &str,
        respondent_name: &str,
        answer: SurveyAnswer,
    ) -> Result<ProjectState> {
        if !state.contains_artifact(ArtifactKind::Survey, survey_id) {
            return Err(dt_core::DtError::ArtifactNotFound {
                kind: ArtifactKind::Survey.to_string(),
                id: survey_id.to_string(),
            }
            .into());
        }
        let mut record = SurveyResponse::new(survey_id, respondent_name, answer);
        record.attribution = self.session.attribution().clone();
        self.repo
            .insert_survey_response(&self.project_id, &record)
            .await?;
        Ok(apply_change(state, &ChangeEvent::SurveyResponseInserted(record)))
    }

    /// Soft delete or restore an artifact for everyone.
    pub async fn set_artifact_active(
        &self,
        state: &ProjectState,
        kind: ArtifactKind,
        id: &str,
        is_active: bool,
    ) -> Result<ProjectState> {
        if !state.contains_artifact(kind, id) {
            return Err(dt_core::DtError::ArtifactNotFound {
                kind: kind.to_string(),
                id: id.to_string(),
            }
            .into());
        }
        self.repo
            .set_artifact_active(&self.project_id, kind, id, is_active)
            .await?;
        Ok(apply_change(
            state,
            &ChangeEvent::ArtifactActiveChanged {
                kind,
                id: id.to_string(),
                is_active,
            },
        ))
    }

    /// Jump to `stage` for everyone.
    pub async fn switch_stage(&self, state: &ProjectState, stage: Stage) -> Result<ProjectState> {
        let patch = ProjectPatch::enter_stage(stage);
        self.repo.update_project(&self.project_id, &patch).await?;
        let mut events = vec![ChangeEvent::ProjectUpdated(patch)];
        events.extend(self.started(state, stage).await?);
        Ok(apply_changes(state, &events))
    }

    /// Hand the conversation to `coach` for everyone. The stage is unchanged.
    pub async fn switch_coach(&self, state: &ProjectState, coach: Coach) -> Result<ProjectState> {
        self.update(
            state,
            ProjectPatch {
                active_coach: Some(coach),
                ..Default::default()
            },
        )
        .await
    }

    /// Move everyone to the stage after the current one. A no-op at the
    /// final stage.
    pub async fn advance(&self, state: &ProjectState) -> Result<ProjectState> {
        let events = self
            .persist(state, &Directive::advance(), state.current_stage)
            .await?;
        Ok(apply_changes(state, &events))
    }

    pub async fn rename(&self, state: &ProjectState, name: &str) -> Result<ProjectState> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(state.clone());
        }
        self.update(
            state,
            ProjectPatch {
                name: Some(name.to_string()),
                ..Default::default()
            },
        )
        .await
    }

    // ─── Internal ─────────────────────────────────────────────────────────

    async fn update(&self, state: &ProjectState, mut patch: ProjectPatch) -> Result<ProjectState> {
        patch.updated_at = Some(Utc::now());
        self.repo.update_project(&self.project_id, &patch).await?;
        Ok(apply_change(state, &ChangeEvent::ProjectUpdated(patch)))
    }

    /// Persist each directive in order, merging what the repository
    /// accepted. The first failure is kept in `first_error`.
    async fn persist_all(
        &self,
        mut state: ProjectState,
        directives: &[Directive],
        stage_at_send: Stage,
        first_error: &mut Option<CoachError>,
    ) -> ProjectState {
        for directive in directives {
            match self.persist(&state, directive, stage_at_send).await {
                Ok(events) => state = apply_changes(&state, &events),
                Err(e) => {
                    tracing::warn!(
                        project = %self.project_id,
                        kind = directive.kind(),
                        error = %e,
                        "failed to persist directive"
                    );
                    first_error.get_or_insert(e);
                }
            }
        }
        state
    }

    async fn progress(&self, stage: Stage, status: StageStatus) -> Result<ChangeEvent> {
        self.repo
            .update_stage_progress(&self.project_id, stage, status)
            .await?;
        Ok(ChangeEvent::StageProgressUpdated { stage, status })
    }

    /// Start `stage` if it has not been started yet.
    async fn started(&self, state: &ProjectState, stage: Stage) -> Result<Option<ChangeEvent>> {
        if state.status_of(stage) != StageStatus::NotStarted {
            return Ok(None);
        }
        self.progress(stage, StageStatus::InProgress).await.map(Some)
    }

    /// Write one directive's effect and return the events to merge locally.
    async fn persist(
        &self,
        state: &ProjectState,
        directive: &Directive,
        stage_at_send: Stage,
    ) -> Result<Vec<ChangeEvent>> {
        let now = Utc::now();
        let who = self.session.attribution().clone();
        let pid = self.project_id.as_str();

        let (event, stage) = match directive {
            Directive::RecordObservation(data) => {
                let Some(mut record) = build_observation(data, now) else {
                    return Ok(vec![]);
                };
                record.attribution = who;
                self.repo.insert_observation(pid, &record).await?;
                (ChangeEvent::ObservationInserted(record), ArtifactKind::Observation.stage())
            }
            Directive::RecordPov(data) => {
                let Some(mut record) = build_pov(data, now) else {
                    return Ok(vec![]);
                };
                record.attribution = who;
                self.repo.insert_pov(pid, &record).await?;
                (ChangeEvent::PovInserted(record), ArtifactKind::Pov.stage())
            }
            Directive::RecordIdea(data) => {
                let Some(mut record) = build_idea(data, now) else {
                    return Ok(vec![]);
                };
                record.attribution = who;
                self.repo.insert_idea(pid, &record).await?;
                (ChangeEvent::IdeaInserted(record), ArtifactKind::Idea.stage())
            }
            Directive::RecordPrototype(data) => {
                let Some(mut record) = build_prototype(data, now) else {
                    return Ok(vec![]);
                };
                record.attribution = who;
                self.repo.insert_prototype(pid, &record).await?;
                (ChangeEvent::PrototypeInserted(record), ArtifactKind::Prototype.stage())
            }
            Directive::RecordSurvey(data) => {
                let Some(mut record) = build_survey(data, now) else {
                    return Ok(vec![]);
                };
                record.attribution = who;
                self.repo.insert_survey(pid, &record).await?;
                (ChangeEvent::SurveyInserted(record), ArtifactKind::Survey.stage())
            }
            Directive::RecordFeedback(data) => {
                let Some((prototype_id, feedback)) = build_feedback(state, data, now) else {
                    return Ok(vec![]);
                };
                self.repo
                    .insert_feedback(pid, &prototype_id, &feedback)
                    .await?;
                (
                    ChangeEvent::FeedbackInserted {
                        prototype_id,
                        feedback,
                    },
                    Stage::Test,
                )
            }
            Directive::AdvanceStage(data) => {
                // Anchor on the stage this reply was produced for, so two
                // peers advancing from the same stage write the same value.
                let mut anchored = state.clone();
                anchored.current_stage = stage_at_send;
                let Some(target) = advance_target(&anchored, data) else {
                    return Ok(vec![]);
                };
                let patch = ProjectPatch::enter_stage(target);
                self.repo.update_project(pid, &patch).await?;
                let mut events = vec![
                    ChangeEvent::ProjectUpdated(patch),
                    self.progress(stage_at_send, StageStatus::Completed).await?,
                ];
                events.extend(self.started(state, target).await?);
                return Ok(events);
            }
            Directive::Unknown { .. } => return Ok(vec![]),
        };

        let mut events = vec![event];
        events.extend(self.started(state, stage).await?);
        Ok(events)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
