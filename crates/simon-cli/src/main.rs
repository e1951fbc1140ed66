mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, session::SessionSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "simon",
    about = "Minutes to requirements: turn meeting transcripts into plans, workflows, use cases, and permission matrices",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .simon/ or .git/)
    #[arg(long, global = true, env = "SIMON_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .simon/config.yaml and the sessions directory
    Init {
        /// Project name (default: root directory name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Launch the web UI
    Ui {
        /// Port to listen on (default: server.port from config, 0 = OS-assigned)
        #[arg(long)]
        port: Option<u16>,

        /// Don't open browser automatically
        #[arg(long)]
        no_open: bool,
    },

    /// Print the text extracted from a transcript file
    Transcript {
        /// .docx or plain text file
        file: PathBuf,
    },

    /// Manage sessions
    Session {
        #[command(subcommand)]
        subcommand: SessionSubcommand,
    },

    /// Run one step of the chain for a session and print its artifact
    Step {
        /// Session id
        id: String,
        /// Step key, e.g. plan, data_objects, use-case-table
        kind: String,
    },

    /// Load a transcript into a new session and run every step
    Run {
        /// .docx or plain text file
        file: PathBuf,

        /// Also write one markdown file per artifact into this directory
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Render a session as one markdown document
    Export {
        /// Session id
        id: String,

        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Show or validate the project configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Ui { .. } | Commands::Run { .. } => tracing::Level::INFO,
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
        Commands::Init { name } => cmd::init::run(&root, name.as_deref()),
        Commands::Ui { port, no_open } => cmd::ui::run(&root, port, no_open),
        Commands::Transcript { file } => cmd::transcript::run(&file, cli.json),
        Commands::Session { subcommand } => cmd::session::run(&root, subcommand, cli.json),
        Commands::Step { id, kind } => cmd::step::run(&root, &id, &kind, cli.json),
        Commands::Run { file, out } => cmd::run::run(&root, &file, out.as_deref(), cli.json),
        Commands::Export { id, out } => cmd::export::run(&root, &id, out.as_deref()),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
