//! Follows a running session in the terminal.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use indicatif::{ProgressBar, ProgressStyle};
use triply_client::{
    ClientConfig, HttpBackend, SessionController, SessionSettings, SessionStatus, StreamHandle,
};
use triply_core::{TripAccumulator, TripRecord, progress_label};

pub fn controller(config: &ClientConfig) -> Result<SessionController> {
    let backend = HttpBackend::new(config).context("Failed to create HTTP client")?;
    Ok(SessionController::new(Arc::new(backend), SessionSettings::from(config)))
}

fn progress_bar(hidden: bool) -> Result<ProgressBar> {
    if hidden {
        return Ok(ProgressBar::hidden());
    }
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos:>3}% {msg}")?
            .progress_chars("=> "),
    );
    Ok(bar)
}

fn describe(progress: f64, acc: &TripAccumulator) -> String {
    let places = acc.days.place_count();
    if places == 0 {
        progress_label(progress).to_string()
    } else {
        format!("{} {} places", progress_label(progress), places)
    }
}

/// Drives `start` to a terminal status, rendering progress, and returns the trip.
///
/// Ctrl-C cancels the session.
pub async fn follow<F>(controller: &SessionController, start: F, hidden: bool) -> Result<TripRecord>
where
    F: Future<Output = triply_client::Result<StreamHandle>>,
{
    let bar = progress_bar(hidden)?;
    bar.set_message("Connecting...");
    bar.enable_steady_tick(std::time::Duration::from_millis(120));

    let mut progress = controller.subscribe_progress();
    let mut snapshots = controller.subscribe_snapshots();

    let handle = tokio::select! {
        result = start => result,
        _ = tokio::signal::ctrl_c() => {
            controller.cancel().await;
            Err(triply_client::ClientError::Cancelled)
        }
    };
    let handle = match handle {
        Ok(handle) => handle,
        Err(e) => {
            bar.finish_and_clear();
            return Err(e).context("Failed to start generation");
        }
    };
    tracing::info!(trip_id = %handle.trip_id, "Following generation");

    let status = loop {
        tokio::select! {
            status = controller.wait() => break status,
            Ok(()) = progress.changed() => {
                let value = *progress.borrow_and_update();
                bar.set_position((value * 100.0).round() as u64);
                bar.set_message(describe(value, &controller.snapshot()));
            }
            Ok(()) = snapshots.changed() => {
                let snapshot = snapshots.borrow_and_update().clone();
                bar.set_message(describe(controller.progress(), &snapshot));
            }
            _ = tokio::signal::ctrl_c() => controller.cancel().await,
        }
    };
    bar.finish_and_clear();

    let snapshot = controller.snapshot();
    match status {
        SessionStatus::Completed => {
            snapshot.final_trip.clone().ok_or_else(|| anyhow!("Session completed without a trip"))
        }
        SessionStatus::Errored | SessionStatus::Cancelled => {
            bail!(snapshot.error.clone().unwrap_or_else(|| "Generation failed".to_string()))
        }
        other => bail!("Session ended in unexpected state: {}", other),
    }
}
