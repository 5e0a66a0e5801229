use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Empathize,
    Define,
    Ideate,
    Prototype,
    Test,
}

impl Stage {
    pub fn all() -> &'static [Stage] {
        &[
            Stage::Empathize,
            Stage::Define,
            Stage::Ideate,
            Stage::Prototype,
            Stage::Test,
        ]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Option<Stage> {
        Stage::all().get(self.index() + 1).copied()
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }

    /// The persona a stage hands the conversation to when it is entered.
    pub fn default_coach(self) -> Coach {
        match self {
            Stage::Empathize => Coach::Empathy,
            Stage::Define => Coach::Define,
            Stage::Ideate => Coach::Ideate,
            Stage::Prototype => Coach::Prototype,
            Stage::Test => Coach::Test,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Empathize => "empathize",
            Stage::Define => "define",
            Stage::Ideate => "ideate",
            Stage::Prototype => "prototype",
            Stage::Test => "test",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = crate::error::DtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "empathize" => Ok(Stage::Empathize),
            "define" => Ok(Stage::Define),
            "ideate" => Ok(Stage::Ideate),
            "prototype" => Ok(Stage::Prototype),
            "test" => Ok(Stage::Test),
            _ => Err(crate::error::DtError::InvalidStage(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Coach
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coach {
    Empathy,
    Define,
    Survey,
    Ideate,
    Prototype,
    Test,
    Orchestrator,
}

impl Coach {
    pub fn all() -> &'static [Coach] {
        &[
            Coach::Empathy,
            Coach::Define,
            Coach::Survey,
            Coach::Ideate,
            Coach::Prototype,
            Coach::Test,
            Coach::Orchestrator,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Coach::Empathy => "empathy",
            Coach::Define => "define",
            Coach::Survey => "survey",
            Coach::Ideate => "ideate",
            Coach::Prototype => "prototype",
            Coach::Test => "test",
            Coach::Orchestrator => "orchestrator",
        }
    }

    /// Coaches whose turns produce artifacts and can therefore be re-asked
    /// for a missing directive.
    pub fn records_artifacts(self) -> bool {
        matches!(
            self,
            Coach::Empathy | Coach::Define | Coach::Ideate | Coach::Prototype
        )
    }
}

impl fmt::Display for Coach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Coach {
    type Err = crate::error::DtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Coach::all()
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| crate::error::DtError::InvalidCoach(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// StageStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StageStatus::NotStarted => "not_started",
            StageStatus::InProgress => "in_progress",
            StageStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Artifact enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationCategory {
    PainPoint,
    Behavior,
    Need,
    #[default]
    Insight,
}

impl ObservationCategory {
    /// Unknown or missing categories fall back to `insight`.
    pub fn lenient(s: Option<&str>) -> Self {
        match s {
            Some("pain_point") => ObservationCategory::PainPoint,
            Some("behavior") => ObservationCategory::Behavior,
            Some("need") => ObservationCategory::Need,
            _ => ObservationCategory::Insight,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ObservationCategory::PainPoint => "pain_point",
            ObservationCategory::Behavior => "behavior",
            ObservationCategory::Need => "need",
            ObservationCategory::Insight => "insight",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdeaStatus {
    #[default]
    Raw,
    Refined,
    Selected,
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fidelity {
    #[default]
    LowFidelity,
    MediumFidelity,
    HighFidelity,
}

impl Fidelity {
    pub fn lenient(s: Option<&str>) -> Self {
        match s {
            Some("medium_fidelity") => Fidelity::MediumFidelity,
            Some("high_fidelity") => Fidelity::HighFidelity,
            _ => Fidelity::LowFidelity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Positive,
    Negative,
    #[default]
    Suggestion,
}

impl FeedbackKind {
    pub fn lenient(s: Option<&str>) -> Self {
        match s {
            Some("positive") => FeedbackKind::Positive,
            Some("negative") => FeedbackKind::Negative,
            _ => FeedbackKind::Suggestion,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurveyKind {
    Text,
    MultipleChoice,
    Rating,
    #[default]
    OpenEnded,
}

impl SurveyKind {
    pub fn lenient(s: Option<&str>) -> Self {
        match s {
            Some("text") => SurveyKind::Text,
            Some("multiple_choice") => SurveyKind::MultipleChoice,
            Some("rating") => SurveyKind::Rating,
            _ => SurveyKind::OpenEnded,
        }
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ArtifactKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Observation,
    Pov,
    Idea,
    Prototype,
    Survey,
    SurveyResponse,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Observation => "observation",
            ArtifactKind::Pov => "pov",
            ArtifactKind::Idea => "idea",
            ArtifactKind::Prototype => "prototype",
            ArtifactKind::Survey => "survey",
            ArtifactKind::SurveyResponse => "survey_response",
        }
    }

    /// Stage whose progress record moves to in-progress when this kind is
    /// first recorded.
    pub fn stage(self) -> Stage {
        match self {
            ArtifactKind::Observation | ArtifactKind::Survey | ArtifactKind::SurveyResponse => {
                Stage::Empathize
            }
            ArtifactKind::Pov => Stage::Define,
            ArtifactKind::Idea => Stage::Ideate,
            ArtifactKind::Prototype => Stage::Prototype,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ArtifactKind {
    type Err = crate::error::DtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "observation" | "observations" => Ok(ArtifactKind::Observation),
            "pov" | "povs" => Ok(ArtifactKind::Pov),
            "idea" | "ideas" => Ok(ArtifactKind::Idea),
            "prototype" | "prototypes" => Ok(ArtifactKind::Prototype),
            "survey" | "surveys" => Ok(ArtifactKind::Survey),
            "survey_response" | "survey_responses" | "response" | "responses" => {
                Ok(ArtifactKind::SurveyResponse)
            }
            _ => Err(crate::error::DtError::InvalidArtifactKind(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn stage_ordering() {
        assert!(Stage::Empathize < Stage::Define);
        assert!(Stage::Define < Stage::Ideate);
        assert!(Stage::Test > Stage::Prototype);
    }

    #[test]
    fn stage_next() {
        assert_eq!(Stage::Empathize.next(), Some(Stage::Define));
        assert_eq!(Stage::Prototype.next(), Some(Stage::Test));
        assert_eq!(Stage::Test.next(), None);
        assert!(Stage::Test.is_terminal());
    }

    #[test]
    fn stage_from_str_rejects_unknown() {
        assert_eq!(Stage::from_str("ideate").unwrap(), Stage::Ideate);
        assert!(Stage::from_str("launch").is_err());
    }

    #[test]
    fn every_stage_has_a_default_coach() {
        for stage in Stage::all() {
            let coach = stage.default_coach();
            assert_ne!(coach, Coach::Orchestrator);
            assert_ne!(coach, Coach::Survey);
        }
        assert_eq!(Stage::Empathize.default_coach(), Coach::Empathy);
    }

    #[test]
    fn seven_coaches_four_record() {
        assert_eq!(Coach::all().len(), 7);
        let recording: Vec<_> = Coach::all()
            .iter()
            .filter(|c| c.records_artifacts())
            .collect();
        assert_eq!(recording.len(), 4);
        assert!(!Coach::Orchestrator.records_artifacts());
        assert!(!Coach::Survey.records_artifacts());
    }

    #[test]
    fn lenient_category_falls_back_to_insight() {
        assert_eq!(
            ObservationCategory::lenient(Some("pain_point")),
            ObservationCategory::PainPoint
        );
        assert_eq!(
            ObservationCategory::lenient(Some("surprise")),
            ObservationCategory::Insight
        );
        assert_eq!(ObservationCategory::lenient(None), ObservationCategory::Insight);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&StageStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }

    #[test]
    fn artifact_kind_accepts_plurals() {
        assert_eq!(ArtifactKind::from_str("ideas").unwrap(), ArtifactKind::Idea);
        assert!(ArtifactKind::from_str("whiteboard").is_err());
    }
}
