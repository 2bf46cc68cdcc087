//! The per-session aggregate of everything learned from the stream.
//!
//! Days, places and restaurants live in a [`DayTable`]: one [`DaySlot`] per
//! day number, each holding slot-indexed lists. Every write is an upsert, so
//! replaying an envelope leaves the table unchanged.

use std::collections::{BTreeSet, HashMap};

use serde_json::Value;
use triply_protocol::{PlaceRecord, SlotKey};

use crate::trip::TripRecord;

/// Currency assumed when neither the prices nor the budget name one.
pub const DEFAULT_CURRENCY: &str = "EUR";

/// Per-day summary from a `day` or `day_add` envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayInfo {
    pub title: String,
    pub description: String,
    pub slots_count: u32,
    pub restaurants_count: u32,
}

/// Slot-indexed records of one kind for one day. Vacant slots are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotList {
    slots: Vec<Option<PlaceRecord>>,
}

impl SlotList {
    pub fn get(&self, slot: u32) -> Option<&PlaceRecord> {
        self.slots.get(slot as usize).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, slot: u32) -> Option<&mut PlaceRecord> {
        self.slots.get_mut(slot as usize).and_then(Option::as_mut)
    }

    /// Stores `record` at `slot`, returning whatever was there.
    pub fn upsert(&mut self, slot: u32, record: PlaceRecord) -> Option<PlaceRecord> {
        let index = slot as usize;
        if self.slots.len() <= index {
            self.slots.resize(index + 1, None);
        }
        self.slots[index].replace(record)
    }

    pub fn remove(&mut self, slot: u32) -> Option<PlaceRecord> {
        let removed = self.slots.get_mut(slot as usize).and_then(Option::take);
        self.trim();
        removed
    }

    /// Removes the first record carrying `id`, returning its slot.
    pub fn remove_by_id(&mut self, id: &str) -> Option<(u32, PlaceRecord)> {
        let (slot, _) = self.iter().find(|(_, record)| record.has_id(id))?;
        self.remove(slot).map(|record| (slot, record))
    }

    /// Occupied slots in ascending slot order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &PlaceRecord)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, record)| record.as_ref().map(|r| (index as u32, r)))
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    fn trim(&mut self) {
        while matches!(self.slots.last(), Some(None)) {
            self.slots.pop();
        }
    }
}

/// Everything known about one day number.
///
/// A slot with places but no `info` is retained and not materialized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DaySlot {
    pub info: Option<DayInfo>,
    pub places: SlotList,
    pub restaurants: SlotList,
}

impl DaySlot {
    pub fn is_vacant(&self) -> bool {
        self.info.is_none() && self.places.is_empty() && self.restaurants.is_empty()
    }

    fn clear(&mut self) {
        self.info = None;
        self.places.clear();
        self.restaurants.clear();
    }
}

/// Day slots indexed by `day - 1`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayTable {
    days: Vec<DaySlot>,
}

impl DayTable {
    /// Grows the table to hold at least `days` day numbers.
    pub fn reserve_days(&mut self, days: u32) {
        let len = days as usize;
        if self.days.len() < len {
            self.days.resize_with(len, DaySlot::default);
        }
    }

    /// Number of day numbers the table has room for.
    pub fn capacity(&self) -> usize {
        self.days.len()
    }

    pub fn get(&self, day: u32) -> Option<&DaySlot> {
        let index = day.checked_sub(1)?;
        self.days.get(index as usize)
    }

    pub fn get_mut(&mut self, day: u32) -> Option<&mut DaySlot> {
        let index = day.checked_sub(1)?;
        self.days.get_mut(index as usize)
    }

    /// Returns the slot for `day`, growing the table if needed.
    ///
    /// Day numbers are 1-based; `0` is treated as `1`.
    pub fn entry(&mut self, day: u32) -> &mut DaySlot {
        let day = day.max(1);
        self.reserve_days(day);
        &mut self.days[day as usize - 1]
    }

    pub fn info(&self, day: u32) -> Option<&DayInfo> {
        self.get(day).and_then(|slot| slot.info.as_ref())
    }

    pub fn place(&self, key: SlotKey) -> Option<&PlaceRecord> {
        self.get(key.day).and_then(|slot| slot.places.get(key.slot))
    }

    pub fn restaurant(&self, key: SlotKey) -> Option<&PlaceRecord> {
        self.get(key.day).and_then(|slot| slot.restaurants.get(key.slot))
    }

    /// Clears everything stored under `day`. Returns true if anything was there.
    pub fn clear_day(&mut self, day: u32) -> bool {
        match self.get_mut(day) {
            Some(slot) if !slot.is_vacant() => {
                slot.clear();
                true
            }
            _ => false,
        }
    }

    /// Day numbers with an info entry.
    pub fn known_days(&self) -> usize {
        self.days.iter().filter(|slot| slot.info.is_some()).count()
    }

    /// Place records across all days, materialized or not.
    pub fn place_count(&self) -> usize {
        self.days.iter().map(|slot| slot.places.len()).sum()
    }

    pub fn restaurant_count(&self) -> usize {
        self.days.iter().map(|slot| slot.restaurants.len()).sum()
    }

    /// `(day number, slot)` pairs in ascending day order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &DaySlot)> {
        self.days.iter().enumerate().map(|(index, slot)| (index as u32 + 1, slot))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EstimatedBudget {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub currency: String,
}

impl Default for EstimatedBudget {
    fn default() -> Self {
        Self { min: None, max: None, currency: DEFAULT_CURRENCY.to_string() }
    }
}

/// Early summary fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Skeleton {
    pub title: Option<String>,
    pub description: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub duration: Option<String>,
    /// Once set, bounds materialization.
    pub duration_days: Option<u32>,
    pub theme: Option<String>,
    pub thematic_keywords: Vec<String>,
    pub vibe: Vec<String>,
    pub estimated_budget: EstimatedBudget,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prices {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub currency: Option<String>,
    pub breakdown: Option<Value>,
}

/// Entities currently being added or removed by a modification session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModificationSets {
    pub adding_places: BTreeSet<String>,
    pub removing_places: BTreeSet<String>,
    pub adding_restaurants: BTreeSet<String>,
    pub removing_restaurants: BTreeSet<String>,
    pub adding_days: BTreeSet<u32>,
    pub removing_days: BTreeSet<u32>,
}

impl ModificationSets {
    pub fn is_empty(&self) -> bool {
        self.adding_places.is_empty()
            && self.removing_places.is_empty()
            && self.adding_restaurants.is_empty()
            && self.removing_restaurants.is_empty()
            && self.adding_days.is_empty()
            && self.removing_days.is_empty()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Mutable state of one streaming session.
///
/// Only [`reduce`](crate::reduce) writes to it during a session.
#[derive(Debug, Clone, PartialEq)]
pub struct TripAccumulator {
    pub is_connected: bool,
    pub is_complete: bool,
    pub error: Option<String>,

    /// Authoritative progress in `[0, 1]`. Never decreases.
    pub progress: f64,
    pub phase: String,

    pub trip_id: Option<String>,

    pub is_modification: bool,
    pub modification_type: Option<String>,
    pub modification_description: Option<String>,
    pub modifications: ModificationSets,

    pub skeleton: Skeleton,
    pub days: DayTable,

    pub hero_image_url: Option<String>,
    /// Late-arriving image URLs keyed by place identifier, in arrival order.
    pub place_images: HashMap<String, Vec<String>>,

    pub prices: Option<Prices>,

    /// Set only on completion.
    pub final_trip: Option<TripRecord>,
}

impl Default for TripAccumulator {
    fn default() -> Self {
        Self {
            is_connected: false,
            is_complete: false,
            error: None,
            progress: 0.0,
            phase: "init".to_string(),
            trip_id: None,
            is_modification: false,
            modification_type: None,
            modification_description: None,
            modifications: ModificationSets::default(),
            skeleton: Skeleton::default(),
            days: DayTable::default(),
            hero_image_url: None,
            place_images: HashMap::new(),
            prices: None,
            final_trip: None,
        }
    }
}

impl TripAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the session ended without an error.
    pub fn is_success(&self) -> bool {
        self.is_complete && self.error.is_none()
    }

    /// Number of days materialization will walk.
    pub fn day_count(&self) -> u32 {
        self.skeleton.duration_days.unwrap_or_else(|| self.days.known_days() as u32)
    }

    /// Applies an authoritative progress update. A zero or absent value
    /// falls back to `fallback`; the stored value never decreases.
    pub(crate) fn advance(&mut self, progress: Option<f64>, fallback: Option<f64>) {
        if let Some(candidate) = progress.filter(|p| *p > 0.0).or(fallback) {
            self.progress = self.progress.max(candidate.clamp(0.0, 1.0));
        }
    }

    pub(crate) fn set_phase(&mut self, phase: Option<String>, default: &str) {
        self.phase = phase.unwrap_or_else(|| default.to_string());
    }

    /// Marks the session terminal with an error.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.is_complete = true;
    }
}
