//! # codeforge-cli
//!
//! Command-line interface for Codeforge.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use codeforge_core::error::format_error_with_suggestion;
use codeforge_core::Config;

mod commands;
mod output;

/// Application context containing shared state.
pub struct AppContext {
    pub config: Config,
}

/// Codeforge - generate applications from requirement documents
#[derive(Parser)]
#[command(name = "codeforge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an application from requirement documents
    Generate(GenerateArgs),
    /// Feed a saved model transcript through the extraction engine
    Replay(ReplayArgs),
    /// Project management
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show version information
    Version,
}

#[derive(Args)]
struct GenerateArgs {
    /// Requirement documents to send
    #[arg(value_name = "FILE", required = true)]
    documents: Vec<PathBuf>,

    /// Generate into an existing project
    #[arg(short, long, value_name = "PROJECT_ID")]
    project: Option<String>,

    /// Name for a new project (defaults to the first document's name)
    #[arg(short, long)]
    name: Option<String>,

    /// JSON file with analysis, answers and preferences
    #[arg(short, long, value_name = "FILE")]
    context: Option<PathBuf>,

    /// Model to use
    #[arg(short, long)]
    model: Option<String>,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct ReplayArgs {
    /// Saved model output
    #[arg(value_name = "TRANSCRIPT")]
    transcript: PathBuf,

    /// Bytes per replayed chunk
    #[arg(long, default_value = "64")]
    chunk_size: usize,

    /// Commit into an existing project
    #[arg(short, long, value_name = "PROJECT_ID")]
    project: Option<String>,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args, Clone, Copy)]
struct OutputArgs {
    /// Print events as server-sent-event frames instead of progress output
    #[arg(long)]
    sse: bool,
}

#[derive(Subcommand)]
enum ProjectAction {
    /// Create a project
    Create {
        /// Project name
        name: String,
        /// Optional description
        #[arg(short, long)]
        description: Option<String>,
    },
    /// List projects
    List {
        /// Maximum projects to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Show project details
    Show {
        /// Project ID
        id: String,
    },
    /// List a project's generated files
    Files {
        /// Project ID
        id: String,
        /// Print file contents
        #[arg(long)]
        content: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Check the configuration for problems
    Validate,
    /// Show configuration and data locations
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so SSE frames on stdout stay clean
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = match cli.command {
        // Show problems instead of refusing to start
        Commands::Config { .. } => Config::load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Config::default()
        }),
        _ => match Config::load_validated() {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}", format_error_with_suggestion(&e));
                std::process::exit(2);
            }
        },
    };

    let ctx = AppContext { config };

    let result = match cli.command {
        Commands::Generate(args) => commands::generate::run(args, &ctx).await,
        Commands::Replay(args) => commands::generate::replay(args, &ctx).await,
        Commands::Project { action } => commands::project::handle(action, &ctx).await,
        Commands::Config { action } => commands::config::handle(action, &ctx).await,
        Commands::Version => {
            println!("codeforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    };

    if let Err(e) = result {
        match e.downcast_ref::<codeforge_core::Error>() {
            Some(core) => eprintln!("Error: {}", format_error_with_suggestion(core)),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }

    Ok(())
}
