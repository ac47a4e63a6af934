mod cmd;
mod executor;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, run::RunArgs, task::TaskSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "phasegate",
    about = "Run a phased task list through claude, one gated task at a time",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .phasegate/ or .git/)
    #[arg(long, global = true, env = "PHASEGATE_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .phasegate/ with a default config and an empty task list
    Init {
        /// Project name (default: the root directory's name)
        #[arg(long)]
        project: Option<String>,
    },

    /// Manage tasks
    Task {
        #[command(subcommand)]
        subcommand: TaskSubcommand,
    },

    /// Show tasks in execution order
    Order,

    /// Show which tasks may start and what blocks the rest
    Gate,

    /// Show the task the next session would start with
    Next,

    /// Execute eligible tasks with claude until the session halts
    Run(RunArgs),

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run(_) => tracing::Level::INFO,
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
        Commands::Init { project } => cmd::init::run(&root, project.as_deref(), cli.json),
        Commands::Task { subcommand } => cmd::task::run(&root, subcommand, cli.json),
        Commands::Order => cmd::order::run(&root, cli.json),
        Commands::Gate => cmd::gate::run(&root, cli.json),
        Commands::Next => cmd::next::run(&root, cli.json),
        Commands::Run(args) => cmd::run::run(&root, args, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
