//! `replay` command.
//!
//! Feeds a recorded `text/event-stream` transcript through the same parser
//! and reducer a live session uses.

use std::path::Path;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use tracing::warn;
use triply_core::{Transition, TripAccumulator, reduce};
use triply_protocol::{SseDecoder, parse_frame};

/// Tally of what happened to each frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    pub applied: usize,
    pub ignored: usize,
    pub dropped: usize,
}

/// Rebuilds the accumulator from a transcript.
pub fn replay_bytes(bytes: &[u8]) -> (TripAccumulator, ReplayStats) {
    let mut decoder = SseDecoder::new();
    let mut frames = decoder.push(bytes);
    frames.extend(decoder.finish());

    let mut acc = TripAccumulator::new();
    let mut stats = ReplayStats::default();
    for frame in &frames {
        let envelope = match parse_frame(frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(event = ?frame.event, error = %e, "Dropping frame");
                stats.dropped += 1;
                continue;
            }
        };
        match reduce(&mut acc, envelope) {
            Transition::Ignored => stats.ignored += 1,
            _ => stats.applied += 1,
        }
    }

    (acc, stats)
}

pub fn execute(file: &Path, json: bool) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let (acc, stats) = replay_bytes(&bytes);

    if let Some(ref error) = acc.error {
        bail!("Stream reported an error: {}", error);
    }
    let Some(ref trip) = acc.final_trip else {
        bail!(
            "Transcript ended before the trip was complete ({} envelopes applied)",
            stats.applied
        );
    };

    super::emit_trip(trip, json, None)?;
    if !json {
        let summary = format!(
            "{} applied, {} ignored, {} dropped",
            stats.applied, stats.ignored, stats.dropped
        );
        println!("  {}", summary.dimmed());
    }
    Ok(())
}
