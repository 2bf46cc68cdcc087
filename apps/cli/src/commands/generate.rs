//! `generate` command.

use anyhow::Result;
use triply_client::{ClientConfig, StartRequest};

use super::OutputArgs;
use super::session::{controller, follow};

/// Streams a new trip and prints it.
pub async fn execute(config: &ClientConfig, query: String, output: &OutputArgs) -> Result<()> {
    let mut request = StartRequest::new(query);
    if let Some(context) = output.load_context()? {
        request = request.with_context(context);
    }

    let controller = controller(config)?;
    let trip = follow(&controller, controller.start(request), output.json).await?;
    super::emit_trip(&trip, output.json, output.output.as_deref())
}
