//! Per-envelope transition function.
//!
//! `reduce` is the only writer of a [`TripAccumulator`] during a session.
//! It never fails: envelopes that do not apply are ignored and reported as
//! [`Transition::Ignored`].

use tracing::{debug, info, warn};
use triply_protocol::{
    DayPayload, Envelope, EnvelopeKind, ImageTarget, Payload, PlaceRecord, RemovalPayload,
    SlotPayload,
};

use crate::accumulator::{DayInfo, EstimatedBudget, Prices, Skeleton, TripAccumulator};
use crate::materializer::materialize;
use crate::trip::TripRecord;

/// What applying an envelope did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// State changed (or was re-written with identical data).
    Applied,
    /// Nothing changed.
    Ignored,
    /// The session finished successfully; `final_trip` is set.
    Completed,
    /// The session finished with an error.
    Failed,
}

/// Applies one envelope to the accumulator.
pub fn reduce(acc: &mut TripAccumulator, envelope: Envelope) -> Transition {
    if acc.is_complete {
        debug!(kind = %envelope.kind, "Ignoring envelope after terminal state");
        return Transition::Ignored;
    }

    let Envelope { kind, phase, progress, payload, message, error } = envelope;

    match (kind, payload) {
        (EnvelopeKind::Init, _) => {
            acc.is_connected = true;
            acc.advance(progress, Some(0.05));
            acc.set_phase(phase, "init");
            Transition::Applied
        }

        (EnvelopeKind::Skeleton, Payload::Skeleton(skeleton)) => {
            if let Some(days) = skeleton.duration_days {
                acc.days.reserve_days(days);
            }
            let budget = skeleton.estimated_budget.unwrap_or_default();
            acc.skeleton = Skeleton {
                title: skeleton.title,
                description: skeleton.description,
                city: skeleton.city,
                country: skeleton.country,
                duration: skeleton.duration,
                duration_days: skeleton.duration_days,
                theme: skeleton.theme,
                thematic_keywords: skeleton.thematic_keywords,
                vibe: skeleton.vibe,
                estimated_budget: EstimatedBudget {
                    min: budget.min,
                    max: budget.max,
                    currency: budget
                        .currency
                        .unwrap_or_else(|| EstimatedBudget::default().currency),
                },
            };
            acc.advance(progress, Some(0.15));
            acc.set_phase(phase, "skeleton");
            debug!(
                title = ?acc.skeleton.title,
                days = ?acc.skeleton.duration_days,
                "Skeleton received"
            );
            Transition::Applied
        }

        (EnvelopeKind::Day, Payload::Day(day)) => {
            upsert_day(acc, day);
            let known = acc.days.known_days() as f64;
            acc.advance(progress, Some((0.25 + known * 0.05).min(0.5)));
            acc.set_phase(phase, "days");
            Transition::Applied
        }

        (EnvelopeKind::Place, Payload::Slot(slot)) => {
            upsert_place(acc, slot);
            let known = acc.days.place_count() as f64;
            acc.advance(progress, Some((0.5 + known * 0.02).min(0.75)));
            acc.set_phase(phase, "places");
            Transition::Applied
        }

        (EnvelopeKind::Restaurant, Payload::Slot(slot)) => {
            upsert_restaurant(acc, slot);
            let known = acc.days.restaurant_count() as f64;
            acc.advance(progress, Some((0.75 + known * 0.02).min(0.9)));
            acc.set_phase(phase, "restaurants");
            Transition::Applied
        }

        (EnvelopeKind::Image, Payload::Image(image)) => match image.target {
            ImageTarget::Hero => {
                acc.hero_image_url = Some(image.url);
                acc.advance(progress, Some(0.8));
                acc.set_phase(phase, "images");
                Transition::Applied
            }
            ImageTarget::Place(place_id) => {
                acc.place_images.entry(place_id).or_default().push(image.url);
                acc.advance(progress, Some(0.85));
                acc.set_phase(phase, "images");
                Transition::Applied
            }
            ImageTarget::Unattached => Transition::Ignored,
        },

        (EnvelopeKind::Prices, Payload::Prices(prices)) => {
            acc.prices = Some(Prices {
                min: prices.min,
                max: prices.max,
                currency: prices.currency,
                breakdown: prices.breakdown,
            });
            acc.advance(progress, Some(0.95));
            acc.set_phase(phase, "prices");
            Transition::Applied
        }

        (EnvelopeKind::PriceUpdate, Payload::PriceUpdate(update)) => {
            let slot = acc.days.get_mut(update.key.day);
            let Some(place) = slot.and_then(|d| d.places.get_mut(update.key.slot)) else {
                debug!(key = %update.key, "Price update for unknown slot");
                return Transition::Ignored;
            };
            // Unparseable text ("Varies") keeps the last known amount.
            place.price_value = update
                .price_value
                .or_else(|| leading_number(&update.price))
                .or(place.price_value);
            place.price = Some(update.price);
            acc.phase = "price_update".to_string();
            Transition::Applied
        }

        (EnvelopeKind::PricesComplete, _) => {
            acc.set_phase(phase, "prices_complete");
            Transition::Applied
        }

        (EnvelopeKind::Complete, Payload::Complete(complete)) => {
            if complete.trip_id.is_some() {
                acc.trip_id = complete.trip_id;
            }
            let trip = materialize(acc);
            info!(
                trip_id = ?acc.trip_id,
                days = trip.itinerary.len(),
                places = trip.place_count(),
                "Trip generation complete"
            );
            finish(acc, trip, "complete");
            Transition::Completed
        }

        (EnvelopeKind::Error, _) => {
            let message = error.or(message).unwrap_or_else(|| "Unknown error".to_string());
            warn!(error = %message, "Generation failed");
            acc.fail(message);
            Transition::Failed
        }

        (EnvelopeKind::ModificationStart, Payload::ModificationStart(start)) => {
            acc.is_connected = true;
            acc.is_modification = true;
            acc.modification_type = start.modification_type;
            acc.modification_description = start.description;
            acc.advance(progress, Some(0.1));
            acc.phase = "modification_start".to_string();
            Transition::Applied
        }

        (kind @ (EnvelopeKind::PlaceAdd | EnvelopeKind::RestaurantAdd), Payload::Slot(slot)) => {
            if !modification_active(acc, &kind) {
                return Transition::Ignored;
            }
            let id = slot.record.entity_id().map_or_else(|| slot.key.to_string(), str::to_string);
            let sets = &mut acc.modifications;
            if kind == EnvelopeKind::PlaceAdd {
                sets.removing_places.remove(&id);
                sets.adding_places.insert(id);
                upsert_place(acc, slot);
            } else {
                sets.removing_restaurants.remove(&id);
                sets.adding_restaurants.insert(id);
                upsert_restaurant(acc, slot);
            }
            acc.advance(progress, None);
            acc.phase = kind.to_string();
            Transition::Applied
        }

        (
            kind @ (EnvelopeKind::PlaceRemove | EnvelopeKind::RestaurantRemove),
            Payload::Removal(removal),
        ) => {
            if !modification_active(acc, &kind) {
                return Transition::Ignored;
            }
            let restaurants = kind == EnvelopeKind::RestaurantRemove;
            let removed = remove_entity(acc, &removal, restaurants);
            let id = removal
                .entity_id
                .or_else(|| removed.as_ref().and_then(|r| r.entity_id().map(str::to_string)))
                .or_else(|| removal.slot.map(|slot| format!("{}-{slot}", removal.day)));
            if let Some(id) = id {
                let sets = &mut acc.modifications;
                if restaurants {
                    sets.adding_restaurants.remove(&id);
                    sets.removing_restaurants.insert(id);
                } else {
                    sets.adding_places.remove(&id);
                    sets.removing_places.insert(id);
                }
            }
            if removed.is_none() {
                debug!(kind = %kind, day = removal.day, "Removal matched no entry");
            }
            acc.advance(progress, None);
            acc.phase = kind.to_string();
            Transition::Applied
        }

        (EnvelopeKind::DayAdd, Payload::Day(day)) => {
            if !modification_active(acc, &EnvelopeKind::DayAdd) {
                return Transition::Ignored;
            }
            let number = day.day;
            upsert_day(acc, day);
            acc.modifications.removing_days.remove(&number);
            acc.modifications.adding_days.insert(number);
            acc.advance(progress, None);
            acc.phase = "day_add".to_string();
            Transition::Applied
        }

        (EnvelopeKind::DayRemove, Payload::DayRemoval(removal)) => {
            if !modification_active(acc, &EnvelopeKind::DayRemove) {
                return Transition::Ignored;
            }
            if !acc.days.clear_day(removal.day) {
                debug!(day = removal.day, "Removed day was not present");
            }
            acc.modifications.adding_days.remove(&removal.day);
            acc.modifications.removing_days.insert(removal.day);
            acc.advance(progress, None);
            acc.phase = "day_remove".to_string();
            Transition::Applied
        }

        // Terminal like `complete`, even if no `modification_start` was seen.
        (EnvelopeKind::ModificationComplete, Payload::ModificationComplete(complete)) => {
            if complete.trip_id.is_some() {
                acc.trip_id = complete.trip_id;
            }
            let trip = match complete.trip.map(TripRecord::from_value) {
                Some(Ok(trip)) => trip,
                Some(Err(e)) => {
                    warn!(error = %e, "Server trip did not decode, using streamed state");
                    materialize(acc)
                }
                None => materialize(acc),
            };
            info!(trip_id = ?acc.trip_id, "Trip modification complete");
            acc.modifications.clear();
            finish(acc, trip, "modification_complete");
            Transition::Completed
        }

        (EnvelopeKind::Unknown(tag), _) => {
            debug!(tag = %tag, "Ignoring unrecognized envelope");
            Transition::Ignored
        }

        (kind, _) => {
            // The parser pairs every kind with its payload; this is a bug upstream.
            warn!(kind = %kind, "Envelope payload does not match its kind");
            Transition::Ignored
        }
    }
}

fn finish(acc: &mut TripAccumulator, trip: TripRecord, phase: &str) {
    acc.final_trip = Some(trip);
    acc.is_complete = true;
    acc.progress = 1.0;
    acc.phase = phase.to_string();
}

fn modification_active(acc: &TripAccumulator, kind: &EnvelopeKind) -> bool {
    if !acc.is_modification {
        debug!(kind = %kind, "Ignoring modification envelope outside a modification session");
    }
    acc.is_modification
}

fn upsert_day(acc: &mut TripAccumulator, day: DayPayload) {
    let number = day.day;
    acc.days.entry(number).info = Some(DayInfo {
        title: day.title.unwrap_or_else(|| format!("Day {number}")),
        description: day.description.unwrap_or_default(),
        slots_count: day.slots_count,
        restaurants_count: day.restaurants_count,
    });
}

fn upsert_place(acc: &mut TripAccumulator, slot: SlotPayload) {
    debug!(key = %slot.key, name = %slot.record.name, "Place");
    acc.days.entry(slot.key.day).places.upsert(slot.key.slot, slot.record);
}

fn upsert_restaurant(acc: &mut TripAccumulator, slot: SlotPayload) {
    debug!(key = %slot.key, name = %slot.record.name, "Restaurant");
    acc.days.entry(slot.key.day).restaurants.upsert(slot.key.slot, slot.record);
}

fn remove_entity(
    acc: &mut TripAccumulator,
    removal: &RemovalPayload,
    restaurants: bool,
) -> Option<PlaceRecord> {
    let day = acc.days.get_mut(removal.day)?;
    let list = if restaurants { &mut day.restaurants } else { &mut day.places };
    match (removal.slot, removal.entity_id.as_deref()) {
        (Some(slot), Some(id)) if list.get(slot).is_none_or(|r| !r.has_id(id)) => {
            // Slot and id disagree; trust the id.
            list.remove_by_id(id).map(|(_, record)| record)
        }
        (Some(slot), _) => list.remove(slot),
        (None, Some(id)) => list.remove_by_id(id).map(|(_, record)| record),
        (None, None) => None,
    }
}

/// First number in a display price: "€25" → 25, "12,50 €" → 12.5, "Free" → 0.
///
/// A separator followed by more than two digits groups thousands
/// ("€1,200" → 1200), as does any separator that appears twice.
fn leading_number(price: &str) -> Option<f64> {
    let start = price.find(|c: char| c.is_ascii_digit());
    let Some(start) = start else {
        return price.to_ascii_lowercase().contains("free").then_some(0.0);
    };
    let run: String = price[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    let run = run.trim_end_matches(['.', ',']);

    let (whole, fraction) = match run.rfind(['.', ',']) {
        Some(i) => {
            let sep = &run[i..=i];
            let fraction = &run[i + 1..];
            let grouped = run[..i].contains(sep);
            if !grouped && (sep == "." || fraction.len() <= 2) {
                (&run[..i], Some(fraction))
            } else {
                (run, None)
            }
        }
        None => (run, None),
    };

    let mut number: String = whole.chars().filter(char::is_ascii_digit).collect();
    if let Some(fraction) = fraction {
        number.push('.');
        number.push_str(fraction);
    }
    number.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use triply_protocol::{
        CompletePayload, ImagePayload, ModificationCompletePayload, ModificationStartPayload,
        PriceUpdatePayload, SkeletonPayload, SlotKey,
    };

    fn envelope(kind: EnvelopeKind, payload: Payload) -> Envelope {
        Envelope { kind, phase: None, progress: None, payload, message: None, error: None }
    }

    fn day(n: u32) -> Envelope {
        let day = DayPayload {
            day: n,
            title: None,
            description: None,
            slots_count: 0,
            restaurants_count: 0,
        };
        envelope(EnvelopeKind::Day, Payload::Day(day))
    }

    fn place(kind: EnvelopeKind, day: u32, slot: u32, record: PlaceRecord) -> Envelope {
        envelope(kind, Payload::Slot(SlotPayload { key: SlotKey::new(day, slot), record }))
    }

    fn modification_session() -> TripAccumulator {
        let mut acc = TripAccumulator::new();
        let start = Payload::ModificationStart(ModificationStartPayload::default());
        reduce(&mut acc, envelope(EnvelopeKind::ModificationStart, start));
        acc
    }

    #[test]
    fn test_init_marks_connected() {
        let mut acc = TripAccumulator::new();
        let t = reduce(&mut acc, envelope(EnvelopeKind::Init, Payload::None));
        assert_eq!(t, Transition::Applied);
        assert!(acc.is_connected);
        assert!((acc.progress - 0.05).abs() < f64::EPSILON);
        assert_eq!(acc.phase, "init");
    }

    #[test]
    fn test_skeleton_defaults_budget_currency() {
        let mut acc = TripAccumulator::new();
        let skeleton = SkeletonPayload {
            title: Some("Paris".into()),
            duration_days: Some(3),
            ..SkeletonPayload::default()
        };
        reduce(&mut acc, envelope(EnvelopeKind::Skeleton, Payload::Skeleton(skeleton)));
        assert_eq!(acc.skeleton.estimated_budget.currency, "EUR");
        assert_eq!(acc.days.capacity(), 3);
        assert!((acc.progress - 0.15).abs() < f64::EPSILON);
    }

    #[test]
    fn test_day_progress_fallback_counts_known_days() {
        let mut acc = TripAccumulator::new();
        reduce(&mut acc, day(1));
        assert!((acc.progress - 0.30).abs() < 1e-9);
        reduce(&mut acc, day(2));
        assert!((acc.progress - 0.35).abs() < 1e-9);
        assert_eq!(acc.days.info(2).map(|d| d.title.as_str()), Some("Day 2"));
        assert_eq!(acc.phase, "days");
    }

    #[test]
    fn test_explicit_progress_wins_and_never_decreases() {
        let mut acc = TripAccumulator::new();
        let mut e = day(1);
        e.progress = Some(0.6);
        reduce(&mut acc, e);
        reduce(&mut acc, day(2));
        assert!((acc.progress - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn test_images() {
        let mut acc = TripAccumulator::new();
        let image = |target, url: &str| {
            envelope(EnvelopeKind::Image, Payload::Image(ImagePayload { target, url: url.into() }))
        };
        reduce(&mut acc, image(ImageTarget::Hero, "hero.jpg"));
        for url in ["a.jpg", "b.jpg"] {
            reduce(&mut acc, image(ImageTarget::Place("p1".into()), url));
        }
        let unattached = reduce(&mut acc, image(ImageTarget::Unattached, "d.jpg"));
        assert_eq!(acc.hero_image_url.as_deref(), Some("hero.jpg"));
        assert_eq!(acc.place_images["p1"], vec!["a.jpg".to_string(), "b.jpg".to_string()]);
        assert_eq!(unattached, Transition::Ignored);
    }

    #[test]
    fn test_price_update_for_missing_slot_is_ignored() {
        let mut acc = TripAccumulator::new();
        let update = PriceUpdatePayload {
            key: SlotKey::new(1, 0),
            price: "€25".into(),
            price_value: None,
        };
        let t = reduce(&mut acc, envelope(EnvelopeKind::PriceUpdate, Payload::PriceUpdate(update)));
        assert_eq!(t, Transition::Ignored);
    }

    #[test]
    fn test_leading_number() {
        assert_eq!(leading_number("€25"), Some(25.0));
        assert_eq!(leading_number("12,50 €"), Some(12.5));
        assert_eq!(leading_number("$1.5k"), Some(1.5));
        assert_eq!(leading_number("Free"), Some(0.0));
        assert_eq!(leading_number("€€"), None);
    }

    #[test]
    fn test_leading_number_thousands_separators() {
        assert_eq!(leading_number("€1,200"), Some(1200.0));
        assert_eq!(leading_number("1.200,50 €"), Some(1200.5));
        assert_eq!(leading_number("$1,200.50"), Some(1200.5));
        assert_eq!(leading_number("1,234,567"), Some(1_234_567.0));
        assert_eq!(leading_number("1.200.000"), Some(1_200_000.0));
        assert_eq!(leading_number("€25."), Some(25.0));
    }

    #[test]
    fn test_price_update_uses_grouped_amount() {
        let mut acc = TripAccumulator::new();
        let record = PlaceRecord {
            price_value: Some(1200.0),
            ..PlaceRecord::named("Cooking class")
        };
        reduce(&mut acc, place(EnvelopeKind::Place, 1, 0, record));
        let update = PriceUpdatePayload {
            key: SlotKey::new(1, 0),
            price: "€1,200".into(),
            price_value: None,
        };
        reduce(&mut acc, envelope(EnvelopeKind::PriceUpdate, Payload::PriceUpdate(update)));
        let stored = acc.days.place(SlotKey::new(1, 0)).unwrap();
        assert_eq!(stored.price_value, Some(1200.0));
        assert_eq!(stored.price.as_deref(), Some("€1,200"));
    }

    #[test]
    fn test_price_update_without_amount_keeps_previous_value() {
        let mut acc = TripAccumulator::new();
        let record = PlaceRecord { price_value: Some(18.0), ..PlaceRecord::named("Louvre") };
        reduce(&mut acc, place(EnvelopeKind::Place, 1, 0, record));
        let update = PriceUpdatePayload {
            key: SlotKey::new(1, 0),
            price: "Varies".into(),
            price_value: None,
        };
        reduce(&mut acc, envelope(EnvelopeKind::PriceUpdate, Payload::PriceUpdate(update)));
        let stored = acc.days.place(SlotKey::new(1, 0)).unwrap();
        assert_eq!(stored.price_value, Some(18.0));
        assert_eq!(stored.price.as_deref(), Some("Varies"));
    }

    #[test]
    fn test_error_is_terminal_even_in_modification_mode() {
        let mut acc = modification_session();
        let mut e = envelope(EnvelopeKind::Error, Payload::None);
        e.error = Some("Pipeline failed".into());
        assert_eq!(reduce(&mut acc, e), Transition::Failed);
        assert_eq!(acc.error.as_deref(), Some("Pipeline failed"));
        assert!(acc.is_complete);
        assert_eq!(reduce(&mut acc, day(1)), Transition::Ignored);
    }

    #[test]
    fn test_complete_materializes_and_blocks_further_envelopes() {
        let mut acc = TripAccumulator::new();
        reduce(&mut acc, day(1));
        reduce(&mut acc, place(EnvelopeKind::Place, 1, 0, PlaceRecord::named("Eiffel Tower")));
        let complete = CompletePayload { trip_id: Some("t-9".into()), message: None };
        let t = reduce(&mut acc, envelope(EnvelopeKind::Complete, Payload::Complete(complete)));
        assert_eq!(t, Transition::Completed);
        assert_eq!(acc.trip_id.as_deref(), Some("t-9"));
        assert!((acc.progress - 1.0).abs() < f64::EPSILON);
        let trip = acc.final_trip.clone().unwrap();
        assert_eq!(trip.id.as_deref(), Some("t-9"));

        let before = acc.clone();
        let late = place(EnvelopeKind::Place, 1, 1, PlaceRecord::named("Late"));
        assert_eq!(reduce(&mut acc, late), Transition::Ignored);
        assert_eq!(acc, before);
    }

    #[test]
    fn test_modification_kinds_ignored_outside_modification_session() {
        let mut acc = TripAccumulator::new();
        let t = reduce(&mut acc, place(EnvelopeKind::PlaceAdd, 1, 0, PlaceRecord::named("X")));
        assert_eq!(t, Transition::Ignored);
        assert_eq!(acc.days.place_count(), 0);
    }

    #[test]
    fn test_place_add_then_remove() {
        let mut acc = modification_session();
        assert!(acc.is_modification);
        let record = PlaceRecord { poi_id: Some("poi-1".into()), ..PlaceRecord::named("Orsay") };
        reduce(&mut acc, place(EnvelopeKind::PlaceAdd, 1, 3, record));
        assert!(acc.modifications.adding_places.contains("poi-1"));
        assert_eq!(acc.phase, "place_add");

        let removal = RemovalPayload { day: 1, entity_id: Some("poi-1".into()), slot: None };
        reduce(&mut acc, envelope(EnvelopeKind::PlaceRemove, Payload::Removal(removal)));
        assert!(acc.days.place(SlotKey::new(1, 3)).is_none());
        assert!(!acc.modifications.adding_places.contains("poi-1"));
        assert!(acc.modifications.removing_places.contains("poi-1"));
    }

    #[test]
    fn test_restaurant_add_without_id_uses_slot_key() {
        let mut acc = modification_session();
        reduce(&mut acc, place(EnvelopeKind::RestaurantAdd, 2, 1, PlaceRecord::named("Bistro")));
        assert!(acc.modifications.adding_restaurants.contains("2-1"));
        assert!(acc.days.restaurant(SlotKey::new(2, 1)).is_some());
    }

    #[test]
    fn test_day_add_and_remove() {
        let mut acc = modification_session();
        let add = DayPayload {
            day: 4,
            title: Some("Extra".into()),
            description: None,
            slots_count: 2,
            restaurants_count: 1,
        };
        reduce(&mut acc, envelope(EnvelopeKind::DayAdd, Payload::Day(add)));
        assert_eq!(acc.days.info(4).map(|d| d.slots_count), Some(2));
        assert!(acc.modifications.adding_days.contains(&4));

        let removal = Payload::DayRemoval(triply_protocol::DayRemovalPayload { day: 4 });
        reduce(&mut acc, envelope(EnvelopeKind::DayRemove, removal));
        assert!(acc.days.info(4).is_none());
        assert!(acc.modifications.removing_days.contains(&4));
        assert!(!acc.modifications.adding_days.contains(&4));
    }

    #[test]
    fn test_modification_complete_prefers_server_trip() {
        let mut acc = modification_session();
        reduce(&mut acc, place(EnvelopeKind::PlaceAdd, 1, 0, PlaceRecord::named("Streamed")));
        let payload = ModificationCompletePayload {
            trip_id: Some("t-1".into()),
            message: Some("Updated".into()),
            trip: Some(serde_json::json!({"id": "t-1", "title": "From server", "itinerary": []})),
        };
        let complete = Payload::ModificationComplete(payload);
        let t = reduce(&mut acc, envelope(EnvelopeKind::ModificationComplete, complete));
        assert_eq!(t, Transition::Completed);
        assert_eq!(acc.final_trip.as_ref().map(|t| t.title.as_str()), Some("From server"));
        assert!(acc.modifications.is_empty());
        assert_eq!(acc.phase, "modification_complete");
    }

    #[test]
    fn test_modification_complete_without_trip_materializes() {
        let mut acc = modification_session();
        let add = DayPayload {
            day: 1,
            title: Some("One".into()),
            description: None,
            slots_count: 1,
            restaurants_count: 0,
        };
        reduce(&mut acc, envelope(EnvelopeKind::DayAdd, Payload::Day(add)));
        let complete = Payload::ModificationComplete(ModificationCompletePayload::default());
        reduce(&mut acc, envelope(EnvelopeKind::ModificationComplete, complete));
        let trip = acc.final_trip.unwrap();
        assert_eq!(trip.itinerary.len(), 1);
        assert_eq!(trip.itinerary[0].title, "One");
    }

    #[test]
    fn test_modification_complete_without_start_is_terminal() {
        let mut acc = TripAccumulator::new();
        reduce(&mut acc, envelope(EnvelopeKind::Init, Payload::None));
        let payload = ModificationCompletePayload {
            trip_id: None,
            message: None,
            trip: Some(serde_json::json!({"title": "Rome", "itinerary": []})),
        };
        let complete = Payload::ModificationComplete(payload);
        let t = reduce(&mut acc, envelope(EnvelopeKind::ModificationComplete, complete));
        assert_eq!(t, Transition::Completed);
        assert!(acc.is_success());
        assert_eq!(acc.final_trip.as_ref().map(|t| t.title.as_str()), Some("Rome"));
    }

    #[test]
    fn test_place_remove_by_slot_only() {
        let mut acc = modification_session();
        reduce(&mut acc, place(EnvelopeKind::PlaceAdd, 1, 2, PlaceRecord::named("Orsay")));
        let removal = RemovalPayload { day: 1, entity_id: None, slot: Some(2) };
        reduce(&mut acc, envelope(EnvelopeKind::PlaceRemove, Payload::Removal(removal)));
        assert!(acc.days.place(SlotKey::new(1, 2)).is_none());
        assert!(acc.modifications.removing_places.contains("1-2"));
        assert!(!acc.modifications.adding_places.contains("1-2"));
    }

    #[test]
    fn test_restaurant_remove_by_slot_only() {
        let mut acc = modification_session();
        let record = PlaceRecord { poi_id: Some("r-9".into()), ..PlaceRecord::named("Bistro") };
        reduce(&mut acc, place(EnvelopeKind::RestaurantAdd, 2, 0, record));
        let removal = RemovalPayload { day: 2, entity_id: None, slot: Some(0) };
        reduce(&mut acc, envelope(EnvelopeKind::RestaurantRemove, Payload::Removal(removal)));
        assert!(acc.days.restaurant(SlotKey::new(2, 0)).is_none());
        // The removed record supplies the id.
        assert!(acc.modifications.removing_restaurants.contains("r-9"));
        assert!(!acc.modifications.adding_restaurants.contains("r-9"));
    }

    #[test]
    fn test_unknown_kind_is_ignored() {
        let mut acc = TripAccumulator::new();
        let unknown = envelope(EnvelopeKind::Unknown("connected".into()), Payload::None);
        let t = reduce(&mut acc, unknown);
        assert_eq!(t, Transition::Ignored);
        assert_eq!(acc, TripAccumulator::new());
    }
}
