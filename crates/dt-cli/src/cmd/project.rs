use crate::output::{print_json, print_table, truncate};
use anyhow::Context;
use chrono::Utc;
use clap::Subcommand;
use dt_core::summary::time_ago;
use std::path::Path;

#[derive(Subcommand)]
pub enum ProjectSubcommand {
    /// Create a project and make it current
    New {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List stored projects, newest first
    List,
    /// Make another project current (id or unique id prefix)
    Switch { id: String },
    /// Remove a project
    Delete { id: String },
    /// Rename the current project
    Rename {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
}

pub fn run(root: &Path, subcmd: ProjectSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ProjectSubcommand::New { name, description } => new(root, &name, &description, json),
        ProjectSubcommand::List => list(root, json),
        ProjectSubcommand::Switch { id } => switch(root, &id, json),
        ProjectSubcommand::Delete { id } => delete(root, &id, json),
        ProjectSubcommand::Rename { name, description } => {
            rename(root, &name, description.as_deref(), json)
        }
    }
}

fn new(root: &Path, name: &str, description: &str, json: bool) -> anyhow::Result<()> {
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("project name must not be empty");
    }
    let (_, store) = super::open_store(root)?;
    let state = store
        .create(name, description)
        .context("failed to create project")?;
    if json {
        print_json(&dt_core::summary::ProjectSummary::from(&state))?;
    } else {
        println!("Created project: {} ({})", state.name, state.id);
    }
    Ok(())
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let (_, store) = super::open_store(root)?;
    let projects = store.list().context("failed to list projects")?;
    let current = store.current_id()?;

    if json {
        print_json(&serde_json::json!({
            "current": current,
            "projects": projects,
        }))?;
        return Ok(());
    }

    if projects.is_empty() {
        println!("No projects. Create one with `dt project new <name>`.");
        return Ok(());
    }
    let now = Utc::now();
    let rows = projects
        .iter()
        .map(|p| {
            let marker = if current.as_deref() == Some(p.id.as_str()) {
                "*"
            } else {
                ""
            };
            vec![
                marker.to_string(),
                p.id.chars().take(8).collect(),
                truncate(&p.name, 32),
                p.current_stage.to_string(),
                format!(
                    "{}/{}/{}/{}",
                    p.observations_count, p.pov_count, p.ideas_count, p.prototypes_count
                ),
                p.messages_count.to_string(),
                time_ago(p.updated_at, now),
            ]
        })
        .collect();
    print_table(
        &["", "ID", "NAME", "STAGE", "OBS/POV/IDEA/PROTO", "MSGS", "UPDATED"],
        rows,
    );
    Ok(())
}

fn switch(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let (_, store) = super::open_store(root)?;
    let state = store
        .load(id)
        .with_context(|| format!("failed to switch to project '{id}'"))?;
    if json {
        print_json(&dt_core::summary::ProjectSummary::from(&state))?;
    } else {
        println!(
            "Switched to: {} ({}), {} stage",
            state.name, state.id, state.current_stage
        );
    }
    Ok(())
}

fn delete(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let (_, store) = super::open_store(root)?;
    let removed = store
        .delete(id)
        .with_context(|| format!("failed to delete project '{id}'"))?;
    if json {
        print_json(&serde_json::json!({ "deleted": removed }))?;
    } else {
        println!("Deleted project: {removed}");
    }
    Ok(())
}

fn rename(root: &Path, name: &str, description: Option<&str>, json: bool) -> anyhow::Result<()> {
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("project name must not be empty");
    }
    let (_, store) = super::open_store(root)?;
    let mut state = super::current_project(&store)?;
    state.rename(name);
    if let Some(d) = description {
        state.set_description(d);
    }
    let state = store.save(&state).context("failed to save project")?;
    if json {
        print_json(&dt_core::summary::ProjectSummary::from(&state))?;
    } else {
        println!("Renamed project to: {}", state.name);
    }
    Ok(())
}
