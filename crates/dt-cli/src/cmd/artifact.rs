use crate::output::{print_json, print_table, truncate};
use anyhow::Context;
use clap::Subcommand;
use dt_core::project::{SurveyAnswer, SurveyResponse};
use dt_core::types::ArtifactKind;
use dt_core::ProjectState;
use serde::Serialize;
use std::path::Path;
use std::str::FromStr;

#[derive(Subcommand)]
pub enum ArtifactSubcommand {
    /// List artifacts of a kind (observation, pov, idea, prototype, survey, survey_response)
    List {
        kind: String,
        /// Include soft-deleted artifacts
        #[arg(long)]
        all: bool,
    },
    /// Soft delete an active artifact, or restore a deleted one
    Toggle {
        kind: String,
        /// Artifact id or unique id prefix
        id: String,
    },
    /// Record an answer to a survey
    Respond {
        /// Survey id or unique id prefix
        survey: String,
        respondent: String,
        /// Free text, or a number for rating surveys
        answer: String,
    },
}

pub fn run(root: &Path, subcmd: ArtifactSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ArtifactSubcommand::List { kind, all } => list(root, &kind, all, json),
        ArtifactSubcommand::Toggle { kind, id } => toggle(root, &kind, &id, json),
        ArtifactSubcommand::Respond {
            survey,
            respondent,
            answer,
        } => respond(root, &survey, &respondent, &answer, json),
    }
}

#[derive(Serialize)]
struct Row {
    id: String,
    is_active: bool,
    summary: String,
}

fn rows(state: &ProjectState, kind: ArtifactKind) -> Vec<Row> {
    fn row(id: &str, is_active: bool, summary: String) -> Row {
        Row {
            id: id.to_string(),
            is_active,
            summary,
        }
    }
    match kind {
        ArtifactKind::Observation => state
            .observations
            .iter()
            .map(|o| row(&o.id, o.is_active, format!("[{}] {}", o.category.as_str(), o.content)))
            .collect(),
        ArtifactKind::Pov => state
            .pov_statements
            .iter()
            .map(|p| row(&p.id, p.is_active, p.statement.clone()))
            .collect(),
        ArtifactKind::Idea => state
            .ideas
            .iter()
            .map(|i| row(&i.id, i.is_active, format!("{}: {}", i.title, i.description)))
            .collect(),
        ArtifactKind::Prototype => state
            .prototypes
            .iter()
            .map(|p| {
                let feedback = p.feedbacks.len();
                row(
                    &p.id,
                    p.is_active,
                    format!("{} ({feedback} feedback): {}", p.name, p.description),
                )
            })
            .collect(),
        ArtifactKind::Survey => state
            .surveys
            .iter()
            .map(|s| row(&s.id, s.is_active, s.question.clone()))
            .collect(),
        ArtifactKind::SurveyResponse => state
            .surveys
            .iter()
            .flat_map(|s| s.responses.iter())
            .map(|r| {
                let answer = match &r.response {
                    SurveyAnswer::Number(n) => n.to_string(),
                    SurveyAnswer::Text(t) => t.clone(),
                };
                row(&r.id, r.is_active, format!("{}: {answer}", r.respondent_name))
            })
            .collect(),
    }
}

fn list(root: &Path, kind: &str, all: bool, json: bool) -> anyhow::Result<()> {
    let kind = ArtifactKind::from_str(kind).with_context(|| format!("unknown artifact kind: {kind}"))?;
    let (_, store) = super::open_store(root)?;
    let state = super::current_project(&store)?;
    let rows: Vec<Row> = rows(&state, kind)
        .into_iter()
        .filter(|r| all || r.is_active)
        .collect();

    if json {
        print_json(&rows)?;
        return Ok(());
    }
    if rows.is_empty() {
        println!("No {kind} artifacts.");
        return Ok(());
    }
    let table = rows
        .iter()
        .map(|r| {
            vec![
                r.id.chars().take(8).collect(),
                if r.is_active { "active" } else { "deleted" }.to_string(),
                truncate(&r.summary, 72),
            ]
        })
        .collect();
    print_table(&["ID", "STATE", "CONTENT"], table);
    Ok(())
}

/// Find the row with `id`, or the only row whose id starts with it.
fn resolve<'a>(candidates: &'a [Row], kind: ArtifactKind, id: &str) -> anyhow::Result<&'a Row> {
    let matched: Vec<&Row> = match candidates.iter().find(|r| r.id == id) {
        Some(exact) => vec![exact],
        None => candidates.iter().filter(|r| r.id.starts_with(id)).collect(),
    };
    match matched.as_slice() {
        [one] => Ok(*one),
        [] => anyhow::bail!("no {kind} with id '{id}'"),
        _ => anyhow::bail!("id prefix '{id}' matches {} {kind} artifacts", matched.len()),
    }
}

fn toggle(root: &Path, kind: &str, id: &str, json: bool) -> anyhow::Result<()> {
    let kind = ArtifactKind::from_str(kind).with_context(|| format!("unknown artifact kind: {kind}"))?;
    let (_, store) = super::open_store(root)?;
    let mut state = super::current_project(&store)?;

    let candidates = rows(&state, kind);
    let target = resolve(&candidates, kind, id)?;

    let now_active = !target.is_active;
    let full_id = target.id.clone();
    state
        .set_artifact_active(kind, &full_id, now_active)
        .with_context(|| format!("failed to update {kind} {full_id}"))?;
    store.save(&state).context("failed to save project")?;

    if json {
        print_json(&serde_json::json!({
            "kind": kind,
            "id": full_id,
            "is_active": now_active,
        }))?;
    } else if now_active {
        println!("Restored {kind}: {full_id}");
    } else {
        println!("Deleted {kind}: {full_id}");
    }
    Ok(())
}

fn respond(
    root: &Path,
    survey: &str,
    respondent: &str,
    answer: &str,
    json: bool,
) -> anyhow::Result<()> {
    let answer = answer.trim();
    if answer.is_empty() {
        anyhow::bail!("answer is empty");
    }
    let (_, store) = super::open_store(root)?;
    let mut state = super::current_project(&store)?;

    let candidates = rows(&state, ArtifactKind::Survey);
    let survey_id = resolve(&candidates, ArtifactKind::Survey, survey)?.id.clone();
    let answer = match answer.parse::<f64>() {
        Ok(n) => SurveyAnswer::Number(n),
        Err(_) => SurveyAnswer::Text(answer.to_string()),
    };
    let response = SurveyResponse::new(&survey_id, respondent.trim(), answer);
    let id = response.id.clone();
    state
        .add_survey_response(response)
        .with_context(|| format!("failed to record response to {survey_id}"))?;
    store.save(&state).context("failed to save project")?;

    if json {
        print_json(&serde_json::json!({ "survey": survey_id, "id": id }))?;
    } else {
        println!("Recorded response {id} to survey {survey_id}");
    }
    Ok(())
}
