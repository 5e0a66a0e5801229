use crate::output::print_json;
use anyhow::Context;
use dt_core::apply::reconcile;
use std::path::Path;

/// Reconcile a raw coach reply saved on disk, as if the active coach had
/// just sent it.
pub fn run(root: &Path, file: &Path, json: bool) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let (_, store) = super::open_store(root)?;
    let state = super::current_project(&store)?;

    let (next, directives) = reconcile(&state, &raw, state.active_coach);
    let next = store.save(&next).context("failed to save project")?;

    if json {
        print_json(&serde_json::json!({
            "directives": directives,
            "current_stage": next.current_stage,
            "active_coach": next.active_coach,
            "message": next.chat_history.last(),
        }))?;
        return Ok(());
    }
    if directives.is_empty() {
        println!("No directives found.");
    } else {
        for d in &directives {
            println!("  applied: {}", d.kind());
        }
    }
    if next.current_stage != state.current_stage {
        println!("Stage: {} -> {}", state.current_stage, next.current_stage);
    }
    Ok(())
}
