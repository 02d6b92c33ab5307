mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    agent::AgentSubcommand, artifact::ArtifactSubcommand, preset::PresetSubcommand,
    run::RunExit,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "relay",
    about = "Run persona agent pipelines that hand off markdown artifacts through .shared/",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .shared/ or .git/)
    #[arg(long, global = true, env = "RELAY_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .shared/ with a default config.yaml
    Init {
        /// Project directory
        project: Option<PathBuf>,
    },

    /// Run a preset until every stage is produced or an agent fails
    Run {
        /// Preset name (see `relay preset list`)
        preset: String,
        /// Project directory
        project: Option<PathBuf>,
        /// Delete existing artifacts and regenerate every stage
        #[arg(long)]
        clean: bool,
        /// Print the phase plan and ready set without invoking any agent
        #[arg(long)]
        dry_run: bool,
    },

    /// Continue the last recorded run, skipping artifacts already present
    Resume {
        /// Project directory
        project: Option<PathBuf>,
    },

    /// Show the last run and which stages exist
    Status {
        /// Project directory
        project: Option<PathBuf>,
    },

    /// Show the agents a preset would dispatch next
    Next {
        preset: String,
    },

    /// Inspect agent definitions
    Agent {
        #[command(subcommand)]
        subcommand: AgentSubcommand,
    },

    /// Inspect and validate workflow presets
    Preset {
        #[command(subcommand)]
        subcommand: PresetSubcommand,
    },

    /// Read and write stage artifacts directly
    Artifact {
        #[command(subcommand)]
        subcommand: ArtifactSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run { dry_run: false, .. } | Commands::Resume { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root_for = |project: Option<PathBuf>| {
        root::resolve_root(project.or_else(|| cli.root.clone()).as_deref())
    };

    let result = match cli.command {
        Commands::Init { project } => cmd::init::run(&root_for(project), cli.json),
        Commands::Run {
            preset,
            project,
            clean,
            dry_run,
        } => cmd::run::run(&root_for(project), &preset, clean, dry_run, cli.json),
        Commands::Resume { project } => cmd::run::resume(&root_for(project), cli.json),
        Commands::Status { project } => cmd::status::run(&root_for(project), cli.json),
        Commands::Next { preset } => cmd::next::run(&root_for(None), &preset, cli.json),
        Commands::Agent { subcommand } => cmd::agent::run(&root_for(None), subcommand, cli.json),
        Commands::Preset { subcommand } => cmd::preset::run(&root_for(None), subcommand, cli.json),
        Commands::Artifact { subcommand } => {
            cmd::artifact::run(&root_for(None), subcommand, cli.json)
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        let code = e.downcast_ref::<RunExit>().map_or(1, RunExit::exit_code);
        std::process::exit(code);
    }
}
