//! Smoothed, UI-facing progress.
//!
//! Authoritative progress from the backend moves in bursts and can sit still
//! for tens of seconds while a phase runs. The estimator creeps forward while
//! it stalls, bounded by a per-phase ceiling and a maximum lead over the
//! authoritative value.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Extrapolation never reaches 100%; only completion does.
const EXTRAPOLATION_CAP: f64 = 0.99;

/// Tuning for [`ProgressEstimator`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressSettings {
    /// Tick interval in milliseconds.
    pub tick_ms: u64,
    /// How long authoritative progress must be unchanged before extrapolating.
    pub stall_ms: u64,
    /// Step added per tick while stalled.
    pub increment: f64,
    /// Maximum lead over authoritative progress.
    pub max_lead: f64,
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self { tick_ms: 1000, stall_ms: 2000, increment: 0.005, max_lead: 0.15 }
    }
}

impl ProgressSettings {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn stall(&self) -> Duration {
        Duration::from_millis(self.stall_ms)
    }
}

/// Ceiling for extrapolation during long-running phases.
pub fn phase_ceiling(phase: &str) -> Option<f64> {
    match phase {
        "skeleton" | "generating_skeleton" => Some(0.45),
        "days" | "places" | "assigning_places" => Some(0.75),
        "images" | "loading_images" => Some(0.95),
        _ => None,
    }
}

/// Human-readable label for a progress value.
pub fn progress_label(progress: f64) -> &'static str {
    match progress {
        p if p < 0.15 => "Analyzing request...",
        p if p < 0.30 => "Creating structure...",
        p if p < 0.50 => "Planning activities...",
        p if p < 0.75 => "Finding places...",
        p if p < 0.90 => "Loading images...",
        p if p < 1.0 => "Finalizing...",
        _ => "Complete",
    }
}

/// Extrapolating progress estimator.
///
/// Driven with explicit instants so it can be stepped deterministically.
/// The displayed value never decreases.
#[derive(Debug, Clone)]
pub struct ProgressEstimator {
    settings: ProgressSettings,
    authoritative: f64,
    display: f64,
    phase: String,
    complete: bool,
    last_change: Instant,
}

impl ProgressEstimator {
    pub fn new(settings: ProgressSettings, now: Instant) -> Self {
        Self {
            settings,
            authoritative: 0.0,
            display: 0.0,
            phase: String::new(),
            complete: false,
            last_change: now,
        }
    }

    /// Current display value.
    pub fn value(&self) -> f64 {
        self.display
    }

    /// Records the latest authoritative state and returns the display value.
    pub fn observe(
        &mut self,
        authoritative: f64,
        phase: &str,
        complete: bool,
        now: Instant,
    ) -> f64 {
        if (authoritative - self.authoritative).abs() > f64::EPSILON {
            self.authoritative = authoritative;
            self.last_change = now;
        }
        self.display = self.display.max(self.authoritative);
        if self.phase != phase {
            self.phase = phase.to_string();
        }
        self.complete = complete;
        self.display
    }

    /// Advances extrapolation by one tick. Returns the new value if it moved.
    pub fn tick(&mut self, now: Instant) -> Option<f64> {
        let stalled_for = now.saturating_duration_since(self.last_change);
        if self.complete || stalled_for <= self.settings.stall() {
            return None;
        }

        let mut ceiling = (self.authoritative + self.settings.max_lead).min(EXTRAPOLATION_CAP);
        if let Some(phase_cap) = phase_ceiling(&self.phase) {
            ceiling = ceiling.min(phase_cap);
        }

        let next = (self.display + self.settings.increment).min(ceiling);
        if next > self.display {
            self.display = next;
            Some(next)
        } else {
            None
        }
    }

    /// Starts over for a new session.
    pub fn reset(&mut self, now: Instant) {
        *self = Self::new(self.settings, now);
    }
}
