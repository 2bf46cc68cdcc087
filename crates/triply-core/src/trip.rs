//! Materialized trip shape.
//!
//! Field names follow the persisted trip document, so a `TripRecord` can be
//! handed to storage as-is and read back from a previous session.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use triply_protocol::lenient;
use triply_protocol::{ImageRef, PlaceRecord};

/// A place or restaurant in the final itinerary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "PlaceRecord")]
pub struct ItineraryPlace {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poi_id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opening_hours: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transportation: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cuisine: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cuisine_types: Vec<String>,
}

impl ItineraryPlace {
    /// Builds the output shape from a stream record, using `default_kind`
    /// when the record has neither a type nor a category.
    pub fn from_record(record: PlaceRecord, default_kind: &str) -> Self {
        let poi_id = record.poi_id.or(record.place_id).or(record.id);
        let kind = record
            .kind
            .or_else(|| record.category.clone())
            .unwrap_or_else(|| default_kind.to_string());
        Self {
            poi_id,
            name: record.name,
            kind,
            category: record.category,
            description: record.description,
            duration_minutes: record.duration_minutes,
            price: record.price,
            price_value: record.price_value,
            rating: record.rating,
            address: record.address,
            latitude: record.latitude,
            longitude: record.longitude,
            image_url: record.image_url,
            images: record.images,
            opening_hours: record.opening_hours,
            best_time: record.best_time,
            transportation: record.transportation,
            cuisine: record.cuisine,
            cuisine_types: record.cuisine_types,
        }
    }

    /// Inverse of [`ItineraryPlace::from_record`].
    pub fn to_record(&self) -> PlaceRecord {
        PlaceRecord {
            poi_id: self.poi_id.clone(),
            name: self.name.clone(),
            kind: Some(self.kind.clone()).filter(|k| !k.is_empty()),
            category: self.category.clone(),
            description: self.description.clone(),
            duration_minutes: self.duration_minutes,
            price: self.price.clone(),
            price_value: self.price_value,
            rating: self.rating,
            address: self.address.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            best_time: self.best_time.clone(),
            opening_hours: self.opening_hours.clone(),
            image_url: self.image_url.clone(),
            images: self.images.clone(),
            transportation: self.transportation.clone(),
            cuisine: self.cuisine.clone(),
            cuisine_types: self.cuisine_types.clone(),
            ..PlaceRecord::default()
        }
    }
}

impl From<PlaceRecord> for ItineraryPlace {
    fn from(record: PlaceRecord) -> Self {
        // Persisted entries always carry a type; keep it empty when absent.
        Self::from_record(record.normalize(), "")
    }
}

/// One day of the final itinerary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItineraryDay {
    #[serde(default, deserialize_with = "day_number")]
    pub day: u32,
    #[serde(default, deserialize_with = "lenient::string_or_default")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::string_or_default")]
    pub description: String,
    #[serde(default)]
    pub places: Vec<ItineraryPlace>,
    #[serde(default)]
    pub restaurants: Vec<ItineraryPlace>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub images: Vec<String>,
}

fn day_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    lenient::opt_u32(deserializer).map(Option::unwrap_or_default)
}

/// A finished trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub id: Option<String>,
    #[serde(rename = "type", default = "trip_kind")]
    pub kind: String,
    #[serde(default, deserialize_with = "lenient::string_or_default")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::string_or_default")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient::string_or_default")]
    pub city: String,
    #[serde(default, deserialize_with = "lenient::string_or_default")]
    pub country: String,
    #[serde(default, deserialize_with = "lenient::string_or_default")]
    pub duration: String,
    #[serde(default, deserialize_with = "day_number")]
    pub duration_days: u32,
    /// Formatted total, e.g. "€25". Empty when nothing is priced.
    #[serde(default, deserialize_with = "lenient::string_or_default")]
    pub price: String,
    #[serde(default, deserialize_with = "lenient::string_or_default")]
    pub currency: String,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub hero_image_url: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub includes: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub itinerary: Vec<ItineraryDay>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub images: Vec<String>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub rating: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_u32",
        skip_serializing_if = "Option::is_none"
    )]
    pub reviews: Option<u32>,
    #[serde(default, deserialize_with = "cost")]
    pub estimated_cost_min: f64,
    #[serde(default, deserialize_with = "cost")]
    pub estimated_cost_max: f64,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub activity_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub best_season: Vec<String>,
}

fn trip_kind() -> String {
    "trip".to_string()
}

fn cost<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    lenient::opt_f64(deserializer).map(Option::unwrap_or_default)
}

impl Default for TripRecord {
    fn default() -> Self {
        Self {
            id: None,
            kind: trip_kind(),
            title: String::new(),
            description: String::new(),
            city: String::new(),
            country: String::new(),
            duration: String::new(),
            duration_days: 0,
            price: String::new(),
            currency: String::new(),
            hero_image_url: None,
            includes: Vec::new(),
            highlights: Vec::new(),
            itinerary: Vec::new(),
            images: Vec::new(),
            rating: None,
            reviews: None,
            estimated_cost_min: 0.0,
            estimated_cost_max: 0.0,
            activity_type: None,
            best_season: Vec::new(),
        }
    }
}

impl TripRecord {
    /// Decodes a trip document, tolerating missing and loosely typed fields.
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// Number of places across all days.
    pub fn place_count(&self) -> usize {
        self.itinerary.iter().map(|day| day.places.len()).sum()
    }

    pub fn restaurant_count(&self) -> usize {
        self.itinerary.iter().map(|day| day.restaurants.len()).sum()
    }
}
