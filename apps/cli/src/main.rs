//! Triply CLI - streams itinerary generation from the command line.
//!
//! Provides a `triply-cli` binary that starts a generation or modification
//! session, renders its progress and prints the finished trip. `replay`
//! reconstructs a trip from a recorded event stream without a server.

mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Triply CLI - streamed trip generation
#[derive(Parser, Debug)]
#[command(name = "triply-cli", author, version, about = "Triply - streamed trip generation")]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    /// API base URL (overrides config files and TRIPLY_API_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Extra configuration file, applied over the discovered ones
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new trip
    ///
    /// Starts a generation session and follows its event stream until the
    /// trip is complete.
    Generate {
        /// What the trip should be about, e.g. "3 days in Lisbon"
        query: String,

        #[command(flatten)]
        output: commands::OutputArgs,
    },

    /// Modify an existing trip
    ///
    /// Seeds the session from a trip JSON file and applies the streamed
    /// modification on top of it.
    Modify {
        /// Trip JSON file, as written by `generate --json`
        trip_file: PathBuf,

        /// The requested change, e.g. "add a museum on day 2"
        query: String,

        #[command(flatten)]
        output: commands::OutputArgs,
    },

    /// Rebuild a trip from a recorded event stream
    Replay {
        /// File containing raw `text/event-stream` output
        file: PathBuf,

        /// Print the trip as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Generate { query, output } => {
            let config = config::load_config(args.config.as_deref(), args.base_url)?;
            commands::generate::execute(&config, query, &output).await
        }
        Command::Modify { trip_file, query, output } => {
            let config = config::load_config(args.config.as_deref(), args.base_url)?;
            commands::modify::execute(&config, &trip_file, query, &output).await
        }
        Command::Replay { file, json } => commands::replay::execute(&file, json),
    }
}
