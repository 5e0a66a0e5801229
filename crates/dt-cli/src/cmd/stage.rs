use crate::output::print_json;
use anyhow::Context;
use dt_core::apply::apply;
use dt_core::directive::Directive;
use dt_core::gate;
use dt_core::types::{Coach, Stage};
use std::path::Path;
use std::str::FromStr;

pub fn advance(root: &Path, force: bool, json: bool) -> anyhow::Result<()> {
    let (_, store) = super::open_store(root)?;
    let state = super::current_project(&store)?;
    let from = state.current_stage;

    if from.is_terminal() {
        anyhow::bail!("already at the final stage ({from})");
    }
    if !force && !gate::can_advance(&state) {
        let missing = gate::remaining(&state).unwrap_or(0);
        anyhow::bail!(
            "{from} stage target not met ({missing} more needed); use --force to advance anyway"
        );
    }

    let next = apply(&state, &Directive::advance());
    let next = store.save(&next).context("failed to save project")?;

    if json {
        print_json(&serde_json::json!({
            "from": from,
            "to": next.current_stage,
            "active_coach": next.active_coach,
        }))?;
    } else {
        println!(
            "Advanced: {from} -> {} (coach: {})",
            next.current_stage, next.active_coach
        );
    }
    Ok(())
}

pub fn switch_stage(root: &Path, stage: &str, json: bool) -> anyhow::Result<()> {
    let stage = Stage::from_str(stage).with_context(|| format!("unknown stage: {stage}"))?;
    let (_, store) = super::open_store(root)?;
    let mut state = super::current_project(&store)?;
    state.switch_stage(stage);
    let state = store.save(&state).context("failed to save project")?;

    if json {
        print_json(&serde_json::json!({
            "current_stage": state.current_stage,
            "active_coach": state.active_coach,
        }))?;
    } else {
        println!("Stage: {} (coach: {})", state.current_stage, state.active_coach);
    }
    Ok(())
}

pub fn switch_coach(root: &Path, coach: &str, json: bool) -> anyhow::Result<()> {
    let coach = Coach::from_str(coach).with_context(|| format!("unknown coach: {coach}"))?;
    let (_, store) = super::open_store(root)?;
    let mut state = super::current_project(&store)?;
    state.switch_coach(coach);
    let state = store.save(&state).context("failed to save project")?;

    if json {
        print_json(&serde_json::json!({ "active_coach": state.active_coach }))?;
    } else {
        println!("Coach: {}", state.active_coach);
    }
    Ok(())
}
