use crate::output::print_json;
use anyhow::Context;
use dt_core::{config::Config, paths, store::LocalStore};
use std::path::Path;

pub fn run(root: &Path, name: Option<&str>, json: bool) -> anyhow::Result<()> {
    if !json {
        println!("Initializing dt in: {}", root.display());
    }

    let dir = paths::dt_dir(root);
    std::fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let responses = root.join(paths::RESPONSES_DIR);
    std::fs::create_dir_all(&responses)
        .with_context(|| format!("failed to create {}", responses.display()))?;

    let config_created = !paths::is_initialized(root);
    if config_created {
        Config::default()
            .save(root)
            .context("failed to write config.yaml")?;
    }
    let config = Config::load(root).context("failed to load config")?;

    let project = match name {
        Some(name) => {
            let store = LocalStore::open(root, &config);
            Some(
                store
                    .create(name, "")
                    .context("failed to create project")?,
            )
        }
        None => None,
    };

    if json {
        print_json(&serde_json::json!({
            "root": root.display().to_string(),
            "config_created": config_created,
            "project": project.as_ref().map(|p| &p.id),
        }))?;
        return Ok(());
    }

    if config_created {
        println!("  created: .dt/config.yaml");
    } else {
        println!("  exists:  .dt/config.yaml");
    }
    if let Some(p) = project {
        println!("  project: {} ({})", p.name, p.id);
    }
    Ok(())
}
