//! Place and restaurant records as they arrive on the stream.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::lenient;

/// One image attached to a place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    /// Image URL.
    pub url: String,
    /// Where the image was resolved from (e.g. "google_places").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// A place or restaurant occupying one slot of a day.
///
/// Restaurants use the same record; their `price_range` wire field is folded
/// into `price` by [`PlaceRecord::normalize`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceRecord {
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(
        default,
        rename = "placeId",
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub place_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub poi_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_or_default")]
    pub name: String,
    /// Wire field `type`.
    #[serde(
        default,
        rename = "type",
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub category: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_u32",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration_minutes: Option<u32>,
    /// Display price, e.g. "€25" or "Free".
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub price: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing)]
    pub price_range: Option<String>,
    /// Numeric price used for the trip total.
    #[serde(
        default,
        deserialize_with = "lenient::opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub price_value: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub rating: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub address: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub latitude: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub longitude: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub best_time: Option<String>,
    /// Kept opaque: backends send an object, a string, or a list of strings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opening_hours: Option<Value>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub image_url: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::image_refs",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub images: Vec<ImageRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transportation: Option<Value>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub cuisine: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::string_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub cuisine_types: Vec<String>,
}

impl PlaceRecord {
    /// Creates a record with only a name set.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Folds wire aliases into their canonical fields.
    #[must_use]
    pub fn normalize(mut self) -> Self {
        if self.price.is_none() {
            self.price = self.price_range.take();
        }
        if matches!(self.opening_hours, Some(Value::Null)) {
            self.opening_hours = None;
        }
        self
    }

    /// Identifier used to look up late-arriving images.
    pub fn image_key(&self) -> Option<&str> {
        self.place_id.as_deref().or(self.id.as_deref()).or(self.poi_id.as_deref())
    }

    /// Identifier used for add/remove bookkeeping.
    pub fn entity_id(&self) -> Option<&str> {
        self.poi_id.as_deref().or(self.id.as_deref()).or(self.place_id.as_deref())
    }

    /// Returns true if the record matches the given entity identifier.
    pub fn has_id(&self, id: &str) -> bool {
        [&self.id, &self.place_id, &self.poi_id]
            .into_iter()
            .any(|field| field.as_deref() == Some(id))
    }

    /// Returns true if the record has any image at all.
    pub fn has_image(&self) -> bool {
        self.image_url.is_some() || !self.images.is_empty()
    }
}
