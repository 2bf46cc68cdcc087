//! Folds an accumulator into the final ordered itinerary.

use triply_protocol::{ImageRef, PlaceRecord};

use crate::accumulator::{DEFAULT_CURRENCY, TripAccumulator};
use crate::trip::{ItineraryDay, ItineraryPlace, TripRecord};

/// Source tag attached to images back-filled from `image` envelopes.
const BACKFILL_IMAGE_SOURCE: &str = "google_places";

/// Builds the final trip from the accumulator as it stands.
///
/// Walks day numbers `1..=day_count()`. Days without a day entry are
/// skipped even if places were streamed for them.
pub fn materialize(acc: &TripAccumulator) -> TripRecord {
    let day_count = acc.day_count();
    let mut itinerary = Vec::new();

    for day in 1..=day_count {
        let Some(slot) = acc.days.get(day) else { continue };
        let Some(info) = &slot.info else { continue };

        let places = slot
            .places
            .iter()
            .map(|(_, record)| ItineraryPlace::from_record(with_images(acc, record), "attraction"))
            .collect();
        let restaurants = slot
            .restaurants
            .iter()
            .map(|(_, record)| ItineraryPlace::from_record(with_images(acc, record), "restaurant"))
            .collect();

        let title = if info.title.is_empty() { format!("Day {day}") } else { info.title.clone() };
        itinerary.push(ItineraryDay {
            day,
            title,
            description: info.description.clone(),
            places,
            restaurants,
            images: Vec::new(),
        });
    }

    let total: f64 = itinerary
        .iter()
        .flat_map(|day| &day.places)
        .filter_map(|place| place.price_value)
        .filter(|value| value.is_finite())
        .sum();

    let currency = trip_currency(acc);
    let skeleton = &acc.skeleton;

    TripRecord {
        id: acc.trip_id.clone(),
        title: skeleton.title.clone().unwrap_or_else(|| "Trip".to_string()),
        description: skeleton.description.clone().unwrap_or_default(),
        city: skeleton.city.clone().unwrap_or_default(),
        country: skeleton.country.clone().unwrap_or_default(),
        duration: skeleton.duration.clone().unwrap_or_else(|| format!("{day_count} days")),
        duration_days: day_count,
        price: format_price(total, &currency),
        currency,
        hero_image_url: acc.hero_image_url.clone(),
        highlights: skeleton.thematic_keywords.clone(),
        itinerary,
        images: acc.hero_image_url.iter().cloned().collect(),
        estimated_cost_min: total,
        estimated_cost_max: total,
        activity_type: skeleton.theme.clone(),
        ..TripRecord::default()
    }
}

fn with_images(acc: &TripAccumulator, record: &PlaceRecord) -> PlaceRecord {
    let mut record = record.clone();
    let urls = record.image_key().and_then(|key| acc.place_images.get(key));
    if let Some(urls) = urls.filter(|urls| !urls.is_empty()) {
        if record.image_url.is_none() {
            record.image_url = urls.first().cloned();
        }
        if record.images.is_empty() {
            record.images = urls
                .iter()
                .map(|url| ImageRef {
                    url: url.clone(),
                    source: Some(BACKFILL_IMAGE_SOURCE.to_string()),
                })
                .collect();
        }
    }
    record
}

fn trip_currency(acc: &TripAccumulator) -> String {
    acc.prices
        .as_ref()
        .and_then(|prices| prices.currency.clone())
        .filter(|c| !c.is_empty())
        .or_else(|| Some(acc.skeleton.estimated_budget.currency.clone()).filter(|c| !c.is_empty()))
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string())
}

/// Display symbol for a currency code. Unknown codes are shown as-is.
pub fn currency_symbol(code: &str) -> &str {
    match code {
        "EUR" => "€",
        "USD" => "$",
        other => other,
    }
}

/// Formats a total with its currency symbol. Zero renders as an empty string.
pub fn format_price(total: f64, currency: &str) -> String {
    if !total.is_finite() || total <= 0.0 {
        return String::new();
    }
    let symbol = currency_symbol(currency);
    if total.fract() == 0.0 {
        format!("{symbol}{total:.0}")
    } else {
        format!("{symbol}{total:.2}")
    }
}
