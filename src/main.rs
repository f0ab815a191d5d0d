use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "malsieve")]
#[command(about = "Content-hash dedup and orchestration for malware-analysis backends")]
#[command(version)]
struct Cli {
    /// Path to the config file (defaults to .malsieve/config.toml here)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the content identity of a file
    Identify {
        /// File to hash
        file: PathBuf,
    },

    /// Show which engines a declared type routes to
    Select {
        /// Declared type (extension), e.g. "exe" or "apk"
        declared_type: String,
    },

    /// Submit a file to all applicable engines and wait for the outcome
    Analyze {
        /// File to analyze
        file: PathBuf,

        /// Declared type override (defaults to the file extension)
        #[arg(long)]
        declared_type: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let config = match &cli.config {
        Some(path) => malsieve::config::Config::from_file(path)?,
        None => malsieve::config::Config::from_dir(&PathBuf::from("."))?,
    };

    match cli.command {
        Commands::Identify { file } => cli::identify_command(&file),
        Commands::Select { declared_type } => cli::select_command(&config, &declared_type),
        Commands::Analyze {
            file,
            declared_type,
        } => cli::analyze_command(&config, &file, declared_type.as_deref()).await,
    }
}
