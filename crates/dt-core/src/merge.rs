//! Folding remote change notifications into a local project state.
//!
//! Collections merge by append with dedup on id, so an echo of a record this
//! session already holds is harmless. Scalar project fields are
//! last-writer-wins.

use crate::project::{
    ChatMessage, Idea, Observation, PovStatement, ProjectState, Prototype, PrototypeFeedback,
    Survey, SurveyResponse,
};
use crate::types::{ArtifactKind, Coach, Stage, StageStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_coach: Option<Coach>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProjectPatch {
    /// Stage and coach after an advance into `stage`.
    pub fn enter_stage(stage: Stage) -> Self {
        Self {
            current_stage: Some(stage),
            active_coach: Some(stage.default_coach()),
            updated_at: Some(Utc::now()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "record", rename_all = "snake_case")]
pub enum ChangeEvent {
    ObservationInserted(Observation),
    PovInserted(PovStatement),
    IdeaInserted(Idea),
    PrototypeInserted(Prototype),
    FeedbackInserted {
        prototype_id: String,
        feedback: PrototypeFeedback,
    },
    SurveyInserted(Survey),
    SurveyResponseInserted(SurveyResponse),
    MessageInserted(ChatMessage),
    ArtifactActiveChanged {
        kind: ArtifactKind,
        id: String,
        is_active: bool,
    },
    ProjectUpdated(ProjectPatch),
    StageProgressUpdated {
        stage: Stage,
        status: StageStatus,
    },
}

impl ChangeEvent {
    pub fn label(&self) -> &'static str {
        match self {
            ChangeEvent::ObservationInserted(_) => "observation_inserted",
            ChangeEvent::PovInserted(_) => "pov_inserted",
            ChangeEvent::IdeaInserted(_) => "idea_inserted",
            ChangeEvent::PrototypeInserted(_) => "prototype_inserted",
            ChangeEvent::FeedbackInserted { .. } => "feedback_inserted",
            ChangeEvent::SurveyInserted(_) => "survey_inserted",
            ChangeEvent::SurveyResponseInserted(_) => "survey_response_inserted",
            ChangeEvent::MessageInserted(_) => "message_inserted",
            ChangeEvent::ArtifactActiveChanged { .. } => "artifact_active_changed",
            ChangeEvent::ProjectUpdated(_) => "project_updated",
            ChangeEvent::StageProgressUpdated { .. } => "stage_progress_updated",
        }
    }
}

fn push_unique<T: Clone>(items: &mut Vec<T>, item: &T, id: impl Fn(&T) -> &str) -> bool {
    if items.iter().any(|x| id(x) == id(item)) {
        return false;
    }
    items.push(item.clone());
    true
}

/// Fold one change into `state`, returning the merged copy.
pub fn apply_change(state: &ProjectState, event: &ChangeEvent) -> ProjectState {
    let mut next = state.clone();
    match event {
        ChangeEvent::ObservationInserted(o) => {
            if push_unique(&mut next.observations, o, |x| x.id.as_str()) {
                next.mark_started(ArtifactKind::Observation.stage());
            }
        }
        ChangeEvent::PovInserted(p) => {
            if push_unique(&mut next.pov_statements, p, |x| x.id.as_str()) {
                next.mark_started(ArtifactKind::Pov.stage());
            }
        }
        ChangeEvent::IdeaInserted(i) => {
            if push_unique(&mut next.ideas, i, |x| x.id.as_str()) {
                next.mark_started(ArtifactKind::Idea.stage());
            }
        }
        ChangeEvent::PrototypeInserted(p) => {
            if push_unique(&mut next.prototypes, p, |x| x.id.as_str()) {
                next.mark_started(ArtifactKind::Prototype.stage());
            }
        }
        ChangeEvent::FeedbackInserted {
            prototype_id,
            feedback,
        } => {
            if !next.push_feedback(prototype_id, feedback.clone()) {
                tracing::debug!(prototype = %prototype_id, "feedback already held or prototype unknown");
            }
        }
        ChangeEvent::SurveyInserted(s) => {
            if push_unique(&mut next.surveys, s, |x| x.id.as_str()) {
                next.mark_started(ArtifactKind::Survey.stage());
            }
        }
        ChangeEvent::SurveyResponseInserted(r) => {
            if let Err(e) = next.add_survey_response(r.clone()) {
                tracing::debug!(error = %e, "response for a survey not held locally");
            }
        }
        ChangeEvent::MessageInserted(m) => {
            push_unique(&mut next.chat_history, m, |x| x.id.as_str());
        }
        ChangeEvent::ArtifactActiveChanged { kind, id, is_active } => {
            if let Err(e) = next.set_artifact_active(*kind, id, *is_active) {
                tracing::debug!(error = %e, "active flag change for a record not held locally");
            }
        }
        ChangeEvent::ProjectUpdated(patch) => {
            if let Some(name) = &patch.name {
                next.name = name.clone();
            }
            if let Some(description) = &patch.description {
                next.description = description.clone();
            }
            if let Some(stage) = patch.current_stage {
                next.current_stage = stage;
            }
            if let Some(coach) = patch.active_coach {
                next.active_coach = coach;
            }
            next.updated_at = patch.updated_at.unwrap_or_else(Utc::now);
        }
        ChangeEvent::StageProgressUpdated { stage, status } => {
            next.set_status(*stage, *status);
        }
    }
    next
}

pub fn apply_changes(state: &ProjectState, events: &[ChangeEvent]) -> ProjectState {
    events
        .iter()
        .fold(state.clone(), |acc, e| apply_change(&acc, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Attribution;
    use crate::types::ObservationCategory;

    fn observation(id: &str) -> Observation {
        Observation {
            id: id.into(),
            content: "Riders screenshot timetables".into(),
            category: ObservationCategory::Behavior,
            created_at: Utc::now(),
            source: None,
            is_active: true,
            attribution: Attribution::new("c2", "Grace", "#10B981"),
        }
    }

    #[test]
    fn insert_is_deduplicated_by_id() {
        let state = ProjectState::new("p", "");
        let event = ChangeEvent::ObservationInserted(observation("o1"));
        let merged = apply_changes(&state, &[event.clone(), event]);
        assert_eq!(merged.observations.len(), 1);
        assert_eq!(merged.status_of(Stage::Empathize), StageStatus::InProgress);
    }

    #[test]
    fn project_update_is_last_writer_wins() {
        let state = ProjectState::new("p", "");
        let merged = apply_changes(
            &state,
            &[
                ChangeEvent::ProjectUpdated(ProjectPatch::enter_stage(Stage::Define)),
                ChangeEvent::ProjectUpdated(ProjectPatch {
                    name: Some("Renamed".into()),
                    ..Default::default()
                }),
            ],
        );
        assert_eq!(merged.current_stage, Stage::Define);
        assert_eq!(merged.active_coach, Coach::Define);
        assert_eq!(merged.name, "Renamed");
    }

    #[test]
    fn duplicate_advance_writes_converge() {
        let state = ProjectState::new("p", "");
        let write = ChangeEvent::ProjectUpdated(ProjectPatch::enter_stage(Stage::Define));
        let merged = apply_changes(&state, &[write.clone(), write]);
        assert_eq!(merged.current_stage, Stage::Define);
    }

    #[test]
    fn active_change_for_unknown_record_is_ignored() {
        let state = ProjectState::new("p", "");
        let merged = apply_change(
            &state,
            &ChangeEvent::ArtifactActiveChanged {
                kind: ArtifactKind::Idea,
                id: "nope".into(),
                is_active: false,
            },
        );
        assert_eq!(merged, state);
    }

    fn prototype(id: &str) -> Prototype {
        let now = Utc::now();
        Prototype {
            id: id.into(),
            name: "Paper timetable".into(),
            description: String::new(),
            fidelity: crate::types::Fidelity::LowFidelity,
            features: vec![],
            feedbacks: vec![],
            whiteboard_id: None,
            created_at: now,
            updated_at: now,
            is_active: true,
            attribution: Attribution::default(),
        }
    }

    fn feedback(id: &str, content: &str) -> ChangeEvent {
        ChangeEvent::FeedbackInserted {
            prototype_id: "p1".into(),
            feedback: PrototypeFeedback {
                id: id.into(),
                content: content.into(),
                kind: crate::types::FeedbackKind::Positive,
                source: String::new(),
                created_at: Utc::now(),
            },
        }
    }

    #[test]
    fn feedback_from_two_peers_is_kept() {
        let state = apply_change(
            &ProjectState::new("p", ""),
            &ChangeEvent::PrototypeInserted(prototype("p1")),
        );
        let created = state.prototypes[0].updated_at;
        let a = feedback("f1", "from A");
        let b = feedback("f2", "from B");
        // Each peer merges its own write, then the other's echo.
        let merged = apply_changes(&state, &[a.clone(), b.clone(), a, b]);

        let held = &merged.prototypes[0];
        let contents: Vec<_> = held.feedbacks.iter().map(|f| f.content.as_str()).collect();
        assert_eq!(contents, ["from A", "from B"]);
        assert!(held.updated_at >= created);
        assert_eq!(merged.status_of(Stage::Test), StageStatus::InProgress);
    }

    #[test]
    fn feedback_for_unknown_prototype_is_ignored() {
        let state = ProjectState::new("p", "");
        let merged = apply_change(&state, &feedback("f1", "lost"));
        assert_eq!(merged, state);
    }

    #[test]
    fn survey_response_is_deduplicated() {
        let survey = Survey {
            id: "s1".into(),
            question: "How long do you wait?".into(),
            kind: crate::types::SurveyKind::Rating,
            options: None,
            responses: vec![],
            created_at: Utc::now(),
            is_active: true,
            attribution: Attribution::default(),
        };
        let state = apply_change(&ProjectState::new("p", ""), &ChangeEvent::SurveyInserted(survey));
        let response = SurveyResponse::new("s1", "Lin", crate::project::SurveyAnswer::Number(4.0));
        let event = ChangeEvent::SurveyResponseInserted(response);
        let merged = apply_changes(&state, &[event.clone(), event]);
        assert_eq!(merged.surveys[0].responses.len(), 1);
        assert_eq!(merged.count(ArtifactKind::SurveyResponse), 1);
    }

    #[test]
    fn event_json_is_tagged() {
        let json = serde_json::to_value(ChangeEvent::StageProgressUpdated {
            stage: Stage::Ideate,
            status: StageStatus::Completed,
        })
        .unwrap();
        assert_eq!(json["event"], "stage_progress_updated");
        assert_eq!(json["record"]["status"], "completed");
    }
}
