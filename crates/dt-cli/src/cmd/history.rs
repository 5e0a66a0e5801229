use crate::output::print_json;
use dt_core::types::Role;
use std::path::Path;

pub fn run(root: &Path, limit: usize, json: bool) -> anyhow::Result<()> {
    let (_, store) = super::open_store(root)?;
    let state = super::current_project(&store)?;
    let skip = state.chat_history.len().saturating_sub(limit);
    let recent = &state.chat_history[skip..];

    if json {
        print_json(&recent)?;
        return Ok(());
    }
    if recent.is_empty() {
        println!("No messages yet.");
        return Ok(());
    }
    for msg in recent {
        let who = match (msg.role, msg.coach_type) {
            (Role::User, _) => msg
                .attribution
                .collaborator_nickname
                .clone()
                .unwrap_or_else(|| "you".to_string()),
            (Role::Assistant, Some(coach)) => format!("{coach} coach"),
            (Role::Assistant, None) => "coach".to_string(),
            (Role::System, _) => "system".to_string(),
        };
        println!("[{}] {who}:", msg.timestamp.format("%Y-%m-%d %H:%M"));
        for line in msg.content.lines() {
            println!("  {line}");
        }
        println!();
    }
    Ok(())
}
