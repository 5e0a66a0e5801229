use crate::project::ProjectState;
use crate::types::{ArtifactKind, Stage};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// StageTarget
// ---------------------------------------------------------------------------

/// What a stage needs before the coach may move past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageTarget {
    /// At least `n` artifacts of `kind`; completion scales linearly.
    Count { kind: ArtifactKind, n: usize },
    /// At least one artifact of `kind`; completion is 0 or 100.
    Presence { kind: ArtifactKind },
    /// Never met automatically.
    Manual,
}

pub const OBSERVATION_TARGET: usize = 3;
pub const IDEA_TARGET: usize = 15;

pub fn target(stage: Stage) -> StageTarget {
    match stage {
        Stage::Empathize => StageTarget::Count {
            kind: ArtifactKind::Observation,
            n: OBSERVATION_TARGET,
        },
        Stage::Define => StageTarget::Presence {
            kind: ArtifactKind::Pov,
        },
        Stage::Ideate => StageTarget::Count {
            kind: ArtifactKind::Idea,
            n: IDEA_TARGET,
        },
        Stage::Prototype => StageTarget::Presence {
            kind: ArtifactKind::Prototype,
        },
        Stage::Test => StageTarget::Manual,
    }
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// Percentage complete per stage, each in `0.0..=100.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub empathize: f64,
    pub define: f64,
    pub ideate: f64,
    pub prototype: f64,
    pub test: f64,
}

impl Completion {
    pub fn for_stage(&self, stage: Stage) -> f64 {
        match stage {
            Stage::Empathize => self.empathize,
            Stage::Define => self.define,
            Stage::Ideate => self.ideate,
            Stage::Prototype => self.prototype,
            Stage::Test => self.test,
        }
    }
}

/// Counts include soft-deleted artifacts.
pub fn stage_completion(state: &ProjectState, stage: Stage) -> f64 {
    match target(stage) {
        StageTarget::Count { kind, n } => {
            (state.count(kind) as f64 / n as f64 * 100.0).min(100.0)
        }
        StageTarget::Presence { kind } => {
            if state.count(kind) > 0 {
                100.0
            } else {
                0.0
            }
        }
        StageTarget::Manual => 0.0,
    }
}

pub fn completion(state: &ProjectState) -> Completion {
    Completion {
        empathize: stage_completion(state, Stage::Empathize),
        define: stage_completion(state, Stage::Define),
        ideate: stage_completion(state, Stage::Ideate),
        prototype: stage_completion(state, Stage::Prototype),
        test: stage_completion(state, Stage::Test),
    }
}

/// Whether the current stage's target is met. Always false at `test`.
pub fn can_advance(state: &ProjectState) -> bool {
    remaining(state) == Some(0)
}

/// Artifacts still missing for the current stage, `None` when the stage has
/// no automatic target.
pub fn remaining(state: &ProjectState) -> Option<usize> {
    match target(state.current_stage) {
        StageTarget::Count { kind, n } => Some(n.saturating_sub(state.count(kind))),
        StageTarget::Presence { kind } => Some(if state.count(kind) > 0 { 0 } else { 1 }),
        StageTarget::Manual => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
