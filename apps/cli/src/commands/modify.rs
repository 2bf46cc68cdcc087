//! `modify` command.

use std::path::Path;

use anyhow::{Context, Result};
use triply_client::{ClientConfig, StartRequest};
use triply_core::TripRecord;

use super::OutputArgs;
use super::session::{controller, follow};

/// Applies a streamed modification to a saved trip.
pub async fn execute(
    config: &ClientConfig,
    trip_file: &Path,
    query: String,
    output: &OutputArgs,
) -> Result<()> {
    let trip = TripRecord::from_value(super::read_json(trip_file)?)
        .with_context(|| format!("{} is not a trip document", trip_file.display()))?;
    if trip.id.is_none() {
        anyhow::bail!("{} has no trip id to modify", trip_file.display());
    }

    let mut request = StartRequest::new(query);
    if let Some(context) = output.load_context()? {
        request = request.with_context(context);
    }

    let controller = controller(config)?;
    let started = controller.start_modification(&trip, request);
    let updated = follow(&controller, started, output.json).await?;
    super::emit_trip(&updated, output.json, output.output.as_deref())
}
