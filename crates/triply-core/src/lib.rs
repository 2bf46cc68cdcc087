//! Trip reconstruction from a stream of generation envelopes.
//!
//! - [`TripAccumulator`] holds everything learned so far in one session.
//! - [`reduce`] folds one [`Envelope`](triply_protocol::Envelope) into it.
//! - [`materialize`] turns it into an ordered [`TripRecord`] on completion.
//! - [`ProgressEstimator`] smooths the authoritative progress for display.
//!
//! A modification session starts from [`TripAccumulator::from_trip`] instead
//! of an empty accumulator.

mod accumulator;
mod bootstrap;
mod materializer;
mod progress;
mod reducer;
mod trip;

pub use accumulator::{
    DEFAULT_CURRENCY, DayInfo, DaySlot, DayTable, EstimatedBudget, ModificationSets, Prices,
    Skeleton, SlotList, TripAccumulator,
};
pub use materializer::{currency_symbol, format_price, materialize};
pub use progress::{ProgressEstimator, ProgressSettings, phase_ceiling, progress_label};
pub use reducer::{Transition, reduce};
pub use trip::{ItineraryDay, ItineraryPlace, TripRecord};
