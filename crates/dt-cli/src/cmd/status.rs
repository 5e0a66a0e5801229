use crate::output::{print_json, print_table};
use chrono::Utc;
use dt_core::gate;
use dt_core::summary::time_ago;
use dt_core::types::{ArtifactKind, Stage};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let (_, store) = super::open_store(root)?;
    let state = super::current_project(&store)?;
    let completion = gate::completion(&state);
    let remaining = gate::remaining(&state);
    let can_advance = gate::can_advance(&state);
    let activity = store.last_activity()?;

    if json {
        print_json(&serde_json::json!({
            "id": state.id,
            "name": state.name,
            "current_stage": state.current_stage,
            "active_coach": state.active_coach,
            "stage_progress": state.stage_progress,
            "completion": completion,
            "remaining": remaining,
            "can_advance": can_advance,
            "last_activity": activity,
        }))?;
        return Ok(());
    }

    println!("Project: {}   ({})", state.name, state.id);
    if !state.description.is_empty() {
        println!("  {}", state.description);
    }
    println!(
        "Stage:   {}   Coach: {}",
        state.current_stage, state.active_coach
    );
    println!();

    let rows = Stage::all()
        .iter()
        .map(|&stage| {
            let marker = if stage == state.current_stage { ">" } else { "" };
            vec![
                marker.to_string(),
                stage.to_string(),
                state.status_of(stage).to_string(),
                format!("{:.0}%", completion.for_stage(stage)),
            ]
        })
        .collect();
    print_table(&["", "STAGE", "STATUS", "DONE"], rows);
    println!();

    println!(
        "ARTIFACTS  observations: {} | povs: {} | ideas: {} | prototypes: {} | surveys: {}",
        state.count(ArtifactKind::Observation),
        state.count(ArtifactKind::Pov),
        state.count(ArtifactKind::Idea),
        state.count(ArtifactKind::Prototype),
        state.count(ArtifactKind::Survey),
    );
    match remaining {
        Some(0) => println!("GATE       ready to advance"),
        Some(n) => println!("GATE       {n} more needed before advancing"),
        None => println!("GATE       final stage"),
    }

    if let Some(a) = activity {
        println!();
        println!(
            "Last activity {}: {}",
            time_ago(a.timestamp, Utc::now()),
            a.description
        );
    }
    Ok(())
}
