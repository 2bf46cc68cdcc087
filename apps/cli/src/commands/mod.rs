//! Command implementations for the Triply CLI.

pub mod generate;
pub mod modify;
pub mod replay;
mod session;
mod summary;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;
use triply_core::TripRecord;

/// Output options shared by the streaming commands.
#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// JSON file with conversation context sent along with the query
    #[arg(long)]
    pub context: Option<PathBuf>,

    /// Print the trip as JSON instead of a summary
    #[arg(long)]
    pub json: bool,

    /// Also write the trip JSON to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl OutputArgs {
    pub fn load_context(&self) -> Result<Option<Value>> {
        self.context.as_deref().map(read_json).transpose()
    }
}

pub(crate) fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Prints or saves a finished trip according to the output options.
pub(crate) fn emit_trip(trip: &TripRecord, json: bool, output: Option<&Path>) -> Result<()> {
    let rendered = serde_json::to_string_pretty(trip).context("Failed to serialize trip")?;

    if let Some(path) = output {
        std::fs::write(path, &rendered)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    if json {
        println!("{}", rendered);
    } else {
        summary::print_trip(trip);
        if let Some(path) = output {
            summary::print_saved(path);
        }
    }

    Ok(())
}
