//! Extraction of machine-actionable directives from a coach reply.
//!
//! A coach embeds directives in fenced blocks tagged `json:action`:
//!
//! ````text
//! ```json:action
//! {"type": "RECORD_OBSERVATION", "data": {"content": "...", "category": "need"}}
//! ```
//! ````
//!
//! A bare `{"action": "ADVANCE_STAGE"}` object outside any fence is also
//! understood. Blocks that fail to decode are skipped with a warning so one
//! bad block never costs the rest of the reply.

use crate::types::Stage;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::ops::Range;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservationData {
    pub content: String,
    pub category: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PovData {
    pub user: String,
    pub need: String,
    pub insight: String,
    pub statement: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdeaData {
    pub title: String,
    pub description: String,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrototypeData {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub fidelity: Option<String>,
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeedbackData {
    pub prototype_id: Option<String>,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurveyData {
    pub question: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub options: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvanceData {
    /// Stage the coach believed it was advancing from.
    pub from: Option<Stage>,
}

// ---------------------------------------------------------------------------
// Directive
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Directive {
    RecordObservation(ObservationData),
    RecordPov(PovData),
    RecordIdea(IdeaData),
    RecordPrototype(PrototypeData),
    RecordFeedback(FeedbackData),
    RecordSurvey(SurveyData),
    AdvanceStage(AdvanceData),
    Unknown { kind: String },
}

impl Directive {
    pub fn kind(&self) -> &str {
        match self {
            Directive::RecordObservation(_) => "RECORD_OBSERVATION",
            Directive::RecordPov(_) => "RECORD_POV",
            Directive::RecordIdea(_) => "RECORD_IDEA",
            Directive::RecordPrototype(_) => "RECORD_PROTOTYPE",
            Directive::RecordFeedback(_) => "RECORD_FEEDBACK",
            Directive::RecordSurvey(_) => "RECORD_SURVEY",
            Directive::AdvanceStage(_) => "ADVANCE_STAGE",
            Directive::Unknown { kind } => kind,
        }
    }

    pub fn advance() -> Self {
        Directive::AdvanceStage(AdvanceData::default())
    }

    fn decode(kind: &str, data: Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            "RECORD_OBSERVATION" | "ADD_OBSERVATION" => {
                Directive::RecordObservation(serde_json::from_value(data)?)
            }
            "RECORD_POV" | "ADD_POV" => Directive::RecordPov(serde_json::from_value(data)?),
            "RECORD_IDEA" | "ADD_IDEA" => Directive::RecordIdea(serde_json::from_value(data)?),
            "RECORD_PROTOTYPE" | "ADD_PROTOTYPE" => {
                Directive::RecordPrototype(serde_json::from_value(data)?)
            }
            "RECORD_FEEDBACK" | "ADD_FEEDBACK" => {
                Directive::RecordFeedback(serde_json::from_value(data)?)
            }
            "RECORD_SURVEY" => Directive::RecordSurvey(serde_json::from_value(data)?),
            "ADVANCE_STAGE" | "NEXT_STAGE" => {
                Directive::AdvanceStage(serde_json::from_value(data)?)
            }
            other => Directive::Unknown {
                kind: other.to_string(),
            },
        })
    }
}

#[derive(Deserialize)]
struct RawBlock {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

static FENCED_RE: OnceLock<Regex> = OnceLock::new();
static BARE_ADVANCE_RE: OnceLock<Regex> = OnceLock::new();

pub(crate) fn fenced_re() -> &'static Regex {
    FENCED_RE.get_or_init(|| Regex::new(r"(?s)```json:action\s*(.*?)```").unwrap())
}

pub(crate) fn bare_advance_re() -> &'static Regex {
    BARE_ADVANCE_RE.get_or_init(|| {
        Regex::new(r#"\{\s*"action"\s*:\s*"(?:ADVANCE_STAGE|NEXT_STAGE)"\s*\}"#).unwrap()
    })
}

// ---------------------------------------------------------------------------
// parse_directives
// ---------------------------------------------------------------------------

/// Extract every directive in `raw`, in source order.
pub fn parse_directives(raw: &str) -> Vec<Directive> {
    let mut found: Vec<(usize, Directive)> = Vec::new();
    let mut fenced: Vec<Range<usize>> = Vec::new();

    for caps in fenced_re().captures_iter(raw) {
        let Some(whole) = caps.get(0) else { continue };
        fenced.push(whole.range());
        let body = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
        if let Some(directive) = decode_block(body, whole.start()) {
            found.push((whole.start(), directive));
        }
    }

    let bare = bare_advance_re()
        .find_iter(raw)
        .find(|m| !fenced.iter().any(|r| r.contains(&m.start())));
    if let Some(m) = bare {
        found.push((m.start(), Directive::advance()));
    }

    found.sort_by_key(|(offset, _)| *offset);
    found.into_iter().map(|(_, d)| d).collect()
}

fn decode_block(body: &str, offset: usize) -> Option<Directive> {
    let raw: RawBlock = match serde_json::from_str(body) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(offset, error = %e, "dropping malformed directive block");
            return None;
        }
    };
    let kind = match raw.kind.as_deref().map(str::trim) {
        Some(k) if !k.is_empty() => k.to_string(),
        _ => {
            tracing::warn!(offset, "dropping directive block without a type");
            return None;
        }
    };
    let data = raw
        .data
        .filter(|v| !v.is_null())
        .unwrap_or_else(|| Value::Object(Default::default()));
    match Directive::decode(&kind, data) {
        Ok(Directive::Unknown { kind }) => {
            tracing::debug!(offset, kind = %kind, "unrecognised directive kind");
            Some(Directive::Unknown { kind })
        }
        Ok(directive) => Some(directive),
        Err(e) => {
            tracing::warn!(offset, kind = %kind, error = %e, "dropping directive with invalid data");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
