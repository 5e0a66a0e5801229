mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{artifact::ArtifactSubcommand, config::ConfigSubcommand, project::ProjectSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "dt",
    about = "Design Thinking coach: chat with stage personas and track the artifacts they record",
    version,
    propagate_version = true
)]
struct Cli {
    /// Workspace root (default: auto-detect from .dt/)
    #[arg(long, global = true, env = "DT_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a dt workspace in the current directory
    Init {
        /// Also create a first project with this name
        #[arg(long)]
        name: Option<String>,
    },

    /// Show the current project's stage, coach and completion
    Status,

    /// Create, list, switch and remove projects
    Project {
        #[command(subcommand)]
        subcommand: ProjectSubcommand,
    },

    /// Send a message to the active coach (no message starts an interactive session)
    Chat {
        message: Option<String>,

        /// Coach endpoint (overrides config)
        #[arg(long, env = "DT_COACH_ENDPOINT")]
        endpoint: Option<String>,
    },

    /// Ask the active coach to record an artifact it forgot
    Retry {
        /// The content that should have been recorded
        text: String,

        /// Coach endpoint (overrides config)
        #[arg(long, env = "DT_COACH_ENDPOINT")]
        endpoint: Option<String>,
    },

    /// Apply a saved raw coach reply to the current project
    Ingest {
        file: PathBuf,
    },

    /// Move the current project to the next stage
    Advance {
        /// Advance even if the stage target is not met
        #[arg(long)]
        force: bool,
    },

    /// Jump to a stage and its default coach
    Stage { stage: String },

    /// Switch the active coach without changing stage
    Coach { coach: String },

    /// List artifacts and soft delete or restore them
    Artifact {
        #[command(subcommand)]
        subcommand: ArtifactSubcommand,
    },

    /// Show recent chat messages
    History {
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Inspect and validate .dt/config.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Chat { message: None, .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init { name } => cmd::init::run(&root, name.as_deref(), cli.json),
        Commands::Status => cmd::status::run(&root, cli.json),
        Commands::Project { subcommand } => cmd::project::run(&root, subcommand, cli.json),
        Commands::Chat { message, endpoint } => {
            cmd::chat::run(&root, message.as_deref(), endpoint.as_deref(), cli.json)
        }
        Commands::Retry { text, endpoint } => {
            cmd::chat::retry(&root, &text, endpoint.as_deref(), cli.json)
        }
        Commands::Ingest { file } => cmd::ingest::run(&root, &file, cli.json),
        Commands::Advance { force } => cmd::stage::advance(&root, force, cli.json),
        Commands::Stage { stage } => cmd::stage::switch_stage(&root, &stage, cli.json),
        Commands::Coach { coach } => cmd::stage::switch_coach(&root, &coach, cli.json),
        Commands::Artifact { subcommand } => cmd::artifact::run(&root, subcommand, cli.json),
        Commands::History { limit } => cmd::history::run(&root, limit, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
