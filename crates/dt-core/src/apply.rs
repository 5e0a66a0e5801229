use crate::directive::{
    parse_directives, AdvanceData, Directive, FeedbackData, IdeaData, ObservationData, PovData,
    PrototypeData, SurveyData,
};
use crate::project::{
    new_id, Attribution, ChatMessage, Idea, Observation, PovStatement, ProjectState, Prototype,
    PrototypeFeedback, Survey,
};
use crate::sanitize::strip_directives;
use crate::types::{
    ArtifactKind, Coach, FeedbackKind, Fidelity, IdeaStatus, ObservationCategory, Stage,
    SurveyKind,
};
use chrono::{DateTime, Utc};

fn blank(s: &str) -> bool {
    s.trim().is_empty()
}

// ---------------------------------------------------------------------------
// Record builders
// ---------------------------------------------------------------------------
//
// Shared with the collaborative layer, which persists the record before
// merging it into local state.

pub fn build_observation(data: &ObservationData, now: DateTime<Utc>) -> Option<Observation> {
    if blank(&data.content) {
        return None;
    }
    Some(Observation {
        id: new_id(),
        content: data.content.clone(),
        category: ObservationCategory::lenient(data.category.as_deref()),
        created_at: now,
        source: data.source.clone(),
        is_active: true,
        attribution: Attribution::default(),
    })
}

pub fn build_pov(data: &PovData, now: DateTime<Utc>) -> Option<PovStatement> {
    if blank(&data.statement) {
        return None;
    }
    Some(PovStatement {
        id: new_id(),
        user: data.user.clone(),
        need: data.need.clone(),
        insight: data.insight.clone(),
        statement: data.statement.clone(),
        created_at: now,
        is_active: true,
        attribution: Attribution::default(),
    })
}

pub fn build_idea(data: &IdeaData, now: DateTime<Utc>) -> Option<Idea> {
    if blank(&data.title) {
        return None;
    }
    Some(Idea {
        id: new_id(),
        title: data.title.clone(),
        description: data.description.clone(),
        votes: 0,
        status: IdeaStatus::Raw,
        created_at: now,
        tags: data.tags.clone(),
        is_active: true,
        attribution: Attribution::default(),
    })
}

pub fn build_prototype(data: &PrototypeData, now: DateTime<Utc>) -> Option<Prototype> {
    if blank(&data.name) {
        return None;
    }
    Some(Prototype {
        id: new_id(),
        name: data.name.clone(),
        description: data.description.clone(),
        fidelity: Fidelity::lenient(data.fidelity.as_deref()),
        features: data.features.clone(),
        feedbacks: Vec::new(),
        whiteboard_id: None,
        created_at: now,
        updated_at: now,
        is_active: true,
        attribution: Attribution::default(),
    })
}

pub fn build_survey(data: &SurveyData, now: DateTime<Utc>) -> Option<Survey> {
    if blank(&data.question) {
        return None;
    }
    Some(Survey {
        id: new_id(),
        question: data.question.clone(),
        kind: SurveyKind::lenient(data.kind.as_deref()),
        options: data.options.clone(),
        responses: Vec::new(),
        created_at: now,
        is_active: true,
        attribution: Attribution::default(),
    })
}

/// The feedback record plus the id of the prototype it belongs to.
pub fn build_feedback(
    state: &ProjectState,
    data: &FeedbackData,
    now: DateTime<Utc>,
) -> Option<(String, PrototypeFeedback)> {
    if blank(&data.content) {
        return None;
    }
    let target = match data.prototype_id.as_deref() {
        Some(id) => state.prototypes.iter().find(|p| p.id == id)?,
        None => state.prototypes.last()?,
    };
    Some((
        target.id.clone(),
        PrototypeFeedback {
            id: new_id(),
            content: data.content.clone(),
            kind: FeedbackKind::lenient(data.kind.as_deref()),
            source: data.source.clone().unwrap_or_default(),
            created_at: now,
        },
    ))
}

/// The stage an advance directive would move to, or `None` if it is a no-op.
pub fn advance_target(state: &ProjectState, data: &AdvanceData) -> Option<Stage> {
    if let Some(from) = data.from {
        if from != state.current_stage {
            return None;
        }
    }
    state.current_stage.next()
}

// ---------------------------------------------------------------------------
// apply
// ---------------------------------------------------------------------------

/// Apply one directive. The input state is never modified; a no-op returns
/// an unchanged copy.
pub fn apply(state: &ProjectState, directive: &Directive) -> ProjectState {
    let mut next = state.clone();
    let now = Utc::now();
    let changed = match directive {
        Directive::RecordObservation(data) => build_observation(data, now)
            .map(|o| {
                next.observations.push(o);
                next.mark_started(ArtifactKind::Observation.stage());
            })
            .is_some(),
        Directive::RecordPov(data) => build_pov(data, now)
            .map(|p| {
                next.pov_statements.push(p);
                next.mark_started(ArtifactKind::Pov.stage());
            })
            .is_some(),
        Directive::RecordIdea(data) => build_idea(data, now)
            .map(|i| {
                next.ideas.push(i);
                next.mark_started(ArtifactKind::Idea.stage());
            })
            .is_some(),
        Directive::RecordPrototype(data) => build_prototype(data, now)
            .map(|p| {
                next.prototypes.push(p);
                next.mark_started(ArtifactKind::Prototype.stage());
            })
            .is_some(),
        Directive::RecordSurvey(data) => build_survey(data, now)
            .map(|s| {
                next.surveys.push(s);
                next.mark_started(ArtifactKind::Survey.stage());
            })
            .is_some(),
        Directive::RecordFeedback(data) => build_feedback(state, data, now)
            .is_some_and(|(prototype_id, feedback)| next.push_feedback(&prototype_id, feedback)),
        Directive::AdvanceStage(data) => match advance_target(state, data) {
            Some(_) => next.advance_stage().is_some(),
            None => false,
        },
        Directive::Unknown { kind } => {
            tracing::debug!(kind = %kind, "ignoring unknown directive");
            false
        }
    };

    if changed {
        next.updated_at = now;
    } else {
        tracing::debug!(kind = directive.kind(), "directive had no effect");
    }
    next
}

/// Left fold of [`apply`] over `directives`.
pub fn apply_all(state: &ProjectState, directives: &[Directive]) -> ProjectState {
    directives
        .iter()
        .fold(state.clone(), |acc, d| apply(&acc, d))
}

// ---------------------------------------------------------------------------
// reconcile
// ---------------------------------------------------------------------------

/// Fold a raw coach reply into `state`: append the visible text as an
/// assistant message tagged with `coach`, then apply every directive.
///
/// `coach` is the persona that produced the reply, which may differ from the
/// one active after an advance directive runs.
pub fn reconcile(state: &ProjectState, raw: &str, coach: Coach) -> (ProjectState, Vec<Directive>) {
    let directives = parse_directives(raw);
    let visible = strip_directives(raw);
    let mut next = state.clone();
    next.push_message(ChatMessage::assistant(visible, coach));
    let next = apply_all(&next, &directives);
    (next, directives)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
