//! gapfill CLI — the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;
mod render;

#[derive(Parser)]
#[command(name = "gapfill", version, about = "Gap-fill and word-bank exercise trainer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that dataset files normalize cleanly
    Validate {
        /// Dataset file, directory of .json files, URL, or configured name
        #[arg(long)]
        dataset: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Work through a dataset interactively (commands are read from stdin)
    Play {
        /// Dataset file, URL, or configured name
        #[arg(long)]
        dataset: String,

        /// Exercise set to open first (1-based)
        #[arg(long, default_value = "1")]
        set: usize,

        /// View mode: classic or guided
        #[arg(long)]
        mode: Option<String>,

        /// Seed for word-bank shuffling
        #[arg(long)]
        seed: Option<u64>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show stored first-attempt scores
    Progress {
        /// Dataset file, URL, or configured name (omit to list all datasets)
        #[arg(long)]
        dataset: Option<String>,

        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Read a completed exercise set aloud
    Narrate {
        /// Dataset file, URL, or configured name
        #[arg(long)]
        dataset: String,

        /// Exercise set to narrate (1-based)
        #[arg(long, default_value = "1")]
        set: usize,

        /// Narrate even if the set has not been submitted yet
        #[arg(long)]
        force: bool,

        /// Print without pacing to speaking speed
        #[arg(long)]
        fast: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create starter config and example dataset
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gapfill=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { dataset, config } => {
            commands::validate::execute(dataset, config).await
        }
        Commands::Play {
            dataset,
            set,
            mode,
            seed,
            config,
        } => commands::play::execute(dataset, set, mode, seed, config).await,
        Commands::Progress {
            dataset,
            format,
            config,
        } => commands::progress::execute(dataset, format, config).await,
        Commands::Narrate {
            dataset,
            set,
            force,
            fast,
            config,
        } => commands::narrate::execute(dataset, set, force, fast, config).await,
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
