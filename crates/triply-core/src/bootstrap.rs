//! Seeding a modification session from an existing trip.

use tracing::debug;
use triply_protocol::MAX_DAYS;

use crate::accumulator::{DayInfo, EstimatedBudget, Skeleton, TripAccumulator};
use crate::trip::TripRecord;

impl TripAccumulator {
    /// Hydrates an accumulator from a materialized trip.
    ///
    /// Itinerary days become day entries and places and restaurants take
    /// their array position as slot index, so materializing the result
    /// reproduces the trip's itinerary. The accumulator starts in
    /// modification mode.
    pub fn from_trip(trip: &TripRecord) -> Self {
        let mut acc = Self::new();

        let duration_days = Some(trip.duration_days).filter(|d| (1..=MAX_DAYS).contains(d));
        let currency = Some(trip.currency.clone())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| EstimatedBudget::default().currency);

        acc.skeleton = Skeleton {
            title: non_empty(&trip.title),
            description: non_empty(&trip.description),
            city: non_empty(&trip.city),
            country: non_empty(&trip.country),
            duration: non_empty(&trip.duration),
            duration_days,
            theme: trip.activity_type.clone(),
            thematic_keywords: trip.highlights.clone(),
            vibe: Vec::new(),
            estimated_budget: EstimatedBudget {
                min: Some(trip.estimated_cost_min).filter(|v| *v > 0.0),
                max: Some(trip.estimated_cost_max).filter(|v| *v > 0.0),
                currency,
            },
        };
        if let Some(days) = duration_days {
            acc.days.reserve_days(days);
        }

        for day in &trip.itinerary {
            if day.day == 0 || day.day > MAX_DAYS {
                debug!(day = day.day, "Skipping itinerary day outside the day table");
                continue;
            }
            let slot = acc.days.entry(day.day);
            slot.info = Some(DayInfo {
                title: day.title.clone(),
                description: day.description.clone(),
                slots_count: day.places.len() as u32,
                restaurants_count: day.restaurants.len() as u32,
            });
            for (index, place) in day.places.iter().enumerate() {
                slot.places.upsert(index as u32, place.to_record());
            }
            for (index, restaurant) in day.restaurants.iter().enumerate() {
                slot.restaurants.upsert(index as u32, restaurant.to_record());
            }
        }

        acc.trip_id = trip.id.clone();
        acc.hero_image_url = trip.hero_image_url.clone().or_else(|| trip.images.first().cloned());
        acc.is_connected = true;
        acc.is_modification = true;
        acc.phase = "modification_start".to_string();
        acc.progress = 0.1;
        acc
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}
