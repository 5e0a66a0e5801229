use crate::project::ProjectState;
use crate::types::{Coach, Stage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const PREVIEW_CHARS: usize = 30;

// ---------------------------------------------------------------------------
// ProjectSummary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub current_stage: Stage,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub observations_count: usize,
    pub pov_count: usize,
    pub ideas_count: usize,
    pub prototypes_count: usize,
    pub surveys_count: usize,
    pub messages_count: usize,
}

impl From<&ProjectState> for ProjectSummary {
    fn from(p: &ProjectState) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            description: p.description.clone(),
            current_stage: p.current_stage,
            created_at: p.created_at,
            updated_at: p.updated_at,
            observations_count: p.observations.len(),
            pov_count: p.pov_statements.len(),
            ideas_count: p.ideas.len(),
            prototypes_count: p.prototypes.len(),
            surveys_count: p.surveys.len(),
            messages_count: p.chat_history.len(),
        }
    }
}

// ---------------------------------------------------------------------------
// ActivityRecord
// ---------------------------------------------------------------------------

/// The most recent save, shown as a "welcome back" line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub timestamp: DateTime<Utc>,
    pub project_id: String,
    pub project_name: String,
    pub stage: Stage,
    pub coach_type: Coach,
    pub description: String,
}

impl ActivityRecord {
    pub fn of(state: &ProjectState, now: DateTime<Utc>) -> Self {
        Self {
            timestamp: now,
            project_id: state.id.clone(),
            project_name: state.name.clone(),
            stage: state.current_stage,
            coach_type: state.active_coach,
            description: activity_description(state),
        }
    }
}

/// e.g. `In progress: ideate stage | 3 observations | 1 POV | last message: "what if..."`
pub fn activity_description(state: &ProjectState) -> String {
    let mut parts = vec![format!("In progress: {} stage", state.current_stage)];

    let counts = [
        (state.observations.len(), "observation", "observations"),
        (state.pov_statements.len(), "POV", "POVs"),
        (state.ideas.len(), "idea", "ideas"),
        (state.prototypes.len(), "prototype", "prototypes"),
    ];
    for (n, one, many) in counts {
        if n > 0 {
            parts.push(format!("{n} {}", if n == 1 { one } else { many }));
        }
    }

    if let Some(msg) = state.last_user_message() {
        let preview: String = msg.content.chars().take(PREVIEW_CHARS).collect();
        let ellipsis = if msg.content.chars().count() > PREVIEW_CHARS {
            "..."
        } else {
            ""
        };
        parts.push(format!("last message: \"{preview}{ellipsis}\""));
    }

    parts.join(" | ")
}

// ---------------------------------------------------------------------------
// time_ago
// ---------------------------------------------------------------------------

pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(then);
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        plural(minutes, "minute")
    } else if hours < 24 {
        plural(hours, "hour")
    } else if days < 7 {
        plural(days, "day")
    } else {
        then.format("%Y-%m-%d").to_string()
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::ChatMessage;
    use chrono::Duration;

    #[test]
    fn description_lists_nonzero_counts_and_preview() {
        let mut state = ProjectState::new("Commute", "");
        state.switch_stage(Stage::Ideate);
        state.push_message(ChatMessage::user(
            "What if the bus stop told you exactly when the next bus comes?",
        ));
        let d = activity_description(&state);
        assert!(d.starts_with("In progress: ideate stage"));
        assert!(!d.contains("observation"));
        assert!(d.contains("last message: \"What if the bus stop told you ...\""));
    }

    #[test]
    fn short_preview_has_no_ellipsis() {
        let mut state = ProjectState::new("p", "");
        state.push_message(ChatMessage::user("hello"));
        assert!(activity_description(&state).ends_with("\"hello\""));
    }

    #[test]
    fn preview_counts_characters_not_bytes() {
        let mut state = ProjectState::new("p", "");
        state.push_message(ChatMessage::user("通勤".repeat(20)));
        let d = activity_description(&state);
        assert!(d.contains(&format!("\"{}...\"", "通勤".repeat(15))));
    }

    #[test]
    fn time_ago_buckets() {
        let now = Utc::now();
        assert_eq!(time_ago(now - Duration::seconds(20), now), "just now");
        assert_eq!(time_ago(now - Duration::minutes(1), now), "1 minute ago");
        assert_eq!(time_ago(now - Duration::minutes(5), now), "5 minutes ago");
        assert_eq!(time_ago(now - Duration::hours(3), now), "3 hours ago");
        assert_eq!(time_ago(now - Duration::days(2), now), "2 days ago");
        let old = now - Duration::days(30);
        assert_eq!(time_ago(old, now), old.format("%Y-%m-%d").to_string());
    }

    #[test]
    fn summary_counts_collections() {
        let mut state = ProjectState::new("p", "d");
        state.push_message(ChatMessage::user("hi"));
        let s = ProjectSummary::from(&state);
        assert_eq!(s.messages_count, 1);
        assert_eq!(s.observations_count, 0);
        assert_eq!(s.description, "d");
    }
}
