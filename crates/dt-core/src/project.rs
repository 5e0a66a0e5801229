use crate::error::{DtError, Result};
use crate::types::{
    ArtifactKind, Coach, FeedbackKind, Fidelity, IdeaStatus, ObservationCategory, Role, Stage,
    StageStatus, SurveyKind,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_active() -> bool {
    true
}

fn is_true(b: &bool) -> bool {
    *b
}

// ---------------------------------------------------------------------------
// Attribution
// ---------------------------------------------------------------------------

/// Who produced a record when the project is shared between collaborators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribution {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collaborator_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collaborator_nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collaborator_color: Option<String>,
}

impl Attribution {
    pub fn new(id: impl Into<String>, nickname: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            collaborator_id: Some(id.into()),
            collaborator_nickname: Some(nickname.into()),
            collaborator_color: Some(color.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.collaborator_id.is_none()
            && self.collaborator_nickname.is_none()
            && self.collaborator_color.is_none()
    }
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub id: String,
    pub content: String,
    pub category: ObservationCategory,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default = "default_active", skip_serializing_if = "is_true")]
    pub is_active: bool,
    #[serde(flatten)]
    pub attribution: Attribution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PovStatement {
    pub id: String,
    pub user: String,
    pub need: String,
    pub insight: String,
    pub statement: String,
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_active", skip_serializing_if = "is_true")]
    pub is_active: bool,
    #[serde(flatten)]
    pub attribution: Attribution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Idea {
    pub id: String,
    pub title: String,
    pub description: String,
    pub votes: u32,
    pub status: IdeaStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default = "default_active", skip_serializing_if = "is_true")]
    pub is_active: bool,
    #[serde(flatten)]
    pub attribution: Attribution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrototypeFeedback {
    pub id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: FeedbackKind,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prototype {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub fidelity: Fidelity,
    pub features: Vec<String>,
    pub feedbacks: Vec<PrototypeFeedback>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whiteboard_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default = "default_active", skip_serializing_if = "is_true")]
    pub is_active: bool,
    #[serde(flatten)]
    pub attribution: Attribution,
}

/// A survey answer is free text, a chosen option, or a numeric rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SurveyAnswer {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyResponse {
    pub id: String,
    pub survey_id: String,
    pub respondent_name: String,
    pub response: SurveyAnswer,
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_active", skip_serializing_if = "is_true")]
    pub is_active: bool,
    #[serde(flatten)]
    pub attribution: Attribution,
}

impl SurveyResponse {
    pub fn new(
        survey_id: impl Into<String>,
        respondent_name: impl Into<String>,
        response: SurveyAnswer,
    ) -> Self {
        Self {
            id: new_id(),
            survey_id: survey_id.into(),
            respondent_name: respondent_name.into(),
            response,
            created_at: Utc::now(),
            is_active: true,
            attribution: Attribution::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Survey {
    pub id: String,
    pub question: String,
    #[serde(rename = "type")]
    pub kind: SurveyKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub responses: Vec<SurveyResponse>,
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_active", skip_serializing_if = "is_true")]
    pub is_active: bool,
    #[serde(flatten)]
    pub attribution: Attribution,
}

// ---------------------------------------------------------------------------
// StageProgress / ChatMessage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageProgress {
    pub stage: Stage,
    pub status: StageStatus,
    #[serde(default)]
    pub completed_tasks: Vec<String>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl StageProgress {
    fn new(stage: Stage) -> Self {
        Self {
            stage,
            status: StageStatus::NotStarted,
            completed_tasks: Vec::new(),
            notes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coach_type: Option<Coach>,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub attribution: Attribution,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            role,
            content: content.into(),
            coach_type: None,
            timestamp: Utc::now(),
            attribution: Attribution::default(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>, coach: Coach) -> Self {
        Self {
            coach_type: Some(coach),
            ..Self::new(Role::Assistant, content)
        }
    }

    pub fn with_attribution(mut self, attribution: Attribution) -> Self {
        self.attribution = attribution;
        self
    }
}

// ---------------------------------------------------------------------------
// ProjectState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectState {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invite_code: Option<String>,
    #[serde(default)]
    pub is_collaborative: bool,
    pub current_stage: Stage,
    #[serde(default)]
    pub observations: Vec<Observation>,
    #[serde(default)]
    pub pov_statements: Vec<PovStatement>,
    #[serde(default)]
    pub surveys: Vec<Survey>,
    #[serde(default)]
    pub ideas: Vec<Idea>,
    #[serde(default)]
    pub prototypes: Vec<Prototype>,
    pub stage_progress: Vec<StageProgress>,
    #[serde(default)]
    pub chat_history: Vec<ChatMessage>,
    pub active_coach: Coach,
}

impl ProjectState {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            name: name.into(),
            description: description.into(),
            created_at: now,
            updated_at: now,
            invite_code: None,
            is_collaborative: false,
            current_stage: Stage::Empathize,
            observations: Vec::new(),
            pov_statements: Vec::new(),
            surveys: Vec::new(),
            ideas: Vec::new(),
            prototypes: Vec::new(),
            stage_progress: Stage::all().iter().map(|s| StageProgress::new(*s)).collect(),
            chat_history: Vec::new(),
            active_coach: Coach::Orchestrator,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    // ---------------------------------------------------------------------------
    // Stage progress
    // ---------------------------------------------------------------------------

    pub fn status_of(&self, stage: Stage) -> StageStatus {
        self.stage_progress
            .iter()
            .find(|p| p.stage == stage)
            .map(|p| p.status)
            .unwrap_or_default()
    }

    pub fn set_status(&mut self, stage: Stage, status: StageStatus) {
        self.ensure_progress_records();
        if let Some(p) = self.stage_progress.iter_mut().find(|p| p.stage == stage) {
            p.status = status;
        }
    }

    /// Move `stage` from not-started to in-progress. Never downgrades.
    pub fn mark_started(&mut self, stage: Stage) {
        if self.status_of(stage) == StageStatus::NotStarted {
            self.set_status(stage, StageStatus::InProgress);
        }
    }

    /// Restore the one-record-per-stage shape after loading foreign data.
    pub fn ensure_progress_records(&mut self) {
        let mut records = Vec::with_capacity(Stage::all().len());
        for stage in Stage::all() {
            let existing = self.stage_progress.iter().find(|p| p.stage == *stage).cloned();
            records.push(existing.unwrap_or_else(|| StageProgress::new(*stage)));
        }
        self.stage_progress = records;
    }

    // ---------------------------------------------------------------------------
    // Stage / coach switching
    // ---------------------------------------------------------------------------

    /// Jump to any stage. The stage's default coach takes over and its
    /// progress starts if it had not.
    pub fn switch_stage(&mut self, stage: Stage) {
        self.current_stage = stage;
        self.active_coach = stage.default_coach();
        self.mark_started(stage);
        self.touch();
    }

    pub fn switch_coach(&mut self, coach: Coach) {
        self.active_coach = coach;
        self.touch();
    }

    /// Advance one stage forward. Returns the new stage, or `None` when the
    /// project is already at the terminal stage.
    pub fn advance_stage(&mut self) -> Option<Stage> {
        let previous = self.current_stage;
        let next = previous.next()?;
        self.current_stage = next;
        self.active_coach = next.default_coach();
        self.set_status(previous, StageStatus::Completed);
        self.mark_started(next);
        self.touch();
        Some(next)
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
        self.touch();
    }

    // ---------------------------------------------------------------------------
    // Chat
    // ---------------------------------------------------------------------------

    pub fn push_message(&mut self, message: ChatMessage) {
        self.chat_history.push(message);
        self.touch();
    }

    pub fn last_user_message(&self) -> Option<&ChatMessage> {
        self.chat_history.iter().rev().find(|m| m.role == Role::User)
    }

    // ---------------------------------------------------------------------------
    // Artifacts
    // ---------------------------------------------------------------------------

    /// Number of recorded artifacts of `kind`, inactive ones included.
    pub fn count(&self, kind: ArtifactKind) -> usize {
        match kind {
            ArtifactKind::Observation => self.observations.len(),
            ArtifactKind::Pov => self.pov_statements.len(),
            ArtifactKind::Idea => self.ideas.len(),
            ArtifactKind::Prototype => self.prototypes.len(),
            ArtifactKind::Survey => self.surveys.len(),
            ArtifactKind::SurveyResponse => self.surveys.iter().map(|s| s.responses.len()).sum(),
        }
    }

    pub fn contains_artifact(&self, kind: ArtifactKind, id: &str) -> bool {
        match kind {
            ArtifactKind::Observation => self.observations.iter().any(|a| a.id == id),
            ArtifactKind::Pov => self.pov_statements.iter().any(|a| a.id == id),
            ArtifactKind::Idea => self.ideas.iter().any(|a| a.id == id),
            ArtifactKind::Prototype => self.prototypes.iter().any(|a| a.id == id),
            ArtifactKind::Survey => self.surveys.iter().any(|a| a.id == id),
            ArtifactKind::SurveyResponse => self.survey_response(id).is_some(),
        }
    }

    /// Soft delete or restore. Records are never removed.
    pub fn set_artifact_active(&mut self, kind: ArtifactKind, id: &str, active: bool) -> Result<()> {
        let flag = match kind {
            ArtifactKind::Observation => self
                .observations
                .iter_mut()
                .find(|a| a.id == id)
                .map(|a| &mut a.is_active),
            ArtifactKind::Pov => self
                .pov_statements
                .iter_mut()
                .find(|a| a.id == id)
                .map(|a| &mut a.is_active),
            ArtifactKind::Idea => self
                .ideas
                .iter_mut()
                .find(|a| a.id == id)
                .map(|a| &mut a.is_active),
            ArtifactKind::Prototype => self
                .prototypes
                .iter_mut()
                .find(|a| a.id == id)
                .map(|a| &mut a.is_active),
            ArtifactKind::Survey => self
                .surveys
                .iter_mut()
                .find(|a| a.id == id)
                .map(|a| &mut a.is_active),
            ArtifactKind::SurveyResponse => self
                .surveys
                .iter_mut()
                .flat_map(|s| s.responses.iter_mut())
                .find(|r| r.id == id)
                .map(|r| &mut r.is_active),
        };
        let flag = flag.ok_or_else(|| DtError::ArtifactNotFound {
            kind: kind.to_string(),
            id: id.to_string(),
        })?;
        *flag = active;
        self.touch();
        Ok(())
    }

    pub fn is_artifact_active(&self, kind: ArtifactKind, id: &str) -> Option<bool> {
        match kind {
            ArtifactKind::Observation => self.observations.iter().find(|a| a.id == id).map(|a| a.is_active),
            ArtifactKind::Pov => self.pov_statements.iter().find(|a| a.id == id).map(|a| a.is_active),
            ArtifactKind::Idea => self.ideas.iter().find(|a| a.id == id).map(|a| a.is_active),
            ArtifactKind::Prototype => self.prototypes.iter().find(|a| a.id == id).map(|a| a.is_active),
            ArtifactKind::Survey => self.surveys.iter().find(|a| a.id == id).map(|a| a.is_active),
            ArtifactKind::SurveyResponse => self.survey_response(id).map(|r| r.is_active),
        }
    }

    fn survey_response(&self, id: &str) -> Option<&SurveyResponse> {
        self.surveys
            .iter()
            .flat_map(|s| s.responses.iter())
            .find(|r| r.id == id)
    }

    /// Append feedback to a prototype. Returns false when the prototype is
    /// unknown or already holds a feedback with the same id.
    pub fn push_feedback(&mut self, prototype_id: &str, feedback: PrototypeFeedback) -> bool {
        let Some(prototype) = self.prototypes.iter_mut().find(|p| p.id == prototype_id) else {
            return false;
        };
        if prototype.feedbacks.iter().any(|f| f.id == feedback.id) {
            return false;
        }
        prototype.updated_at = feedback.created_at;
        prototype.feedbacks.push(feedback);
        self.mark_started(Stage::Test);
        self.touch();
        true
    }

    /// Record an answer to one of the project's surveys.
    ///
    /// Returns `Ok(false)` when a response with the same id is already held.
    pub fn add_survey_response(&mut self, response: SurveyResponse) -> Result<bool> {
        let survey = self
            .surveys
            .iter_mut()
            .find(|s| s.id == response.survey_id)
            .ok_or_else(|| DtError::ArtifactNotFound {
                kind: ArtifactKind::Survey.to_string(),
                id: response.survey_id.clone(),
            })?;
        if survey.responses.iter().any(|r| r.id == response.id) {
            return Ok(false);
        }
        survey.responses.push(response);
        self.touch();
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
