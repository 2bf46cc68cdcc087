//! Canonical envelope shapes.
//!
//! Everything in this module is the post-parse view of a frame: field
//! aliases have been resolved and indices validated, so the rest of the
//! pipeline never looks at raw JSON again (except for opaque blobs such as
//! opening hours or a server-supplied final trip).

use std::fmt;

use serde_json::Value;

use crate::place::PlaceRecord;

/// Upper bound for day numbers accepted from the wire.
pub const MAX_DAYS: u32 = 366;

/// Upper bound (exclusive) for slot indices accepted from the wire.
pub const MAX_SLOTS: u32 = 256;

/// The kind tag of an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    Init,
    Skeleton,
    Day,
    Place,
    Restaurant,
    Image,
    Prices,
    PriceUpdate,
    PricesComplete,
    Complete,
    Error,
    ModificationStart,
    PlaceAdd,
    PlaceRemove,
    RestaurantAdd,
    RestaurantRemove,
    DayAdd,
    DayRemove,
    ModificationComplete,
    /// Any tag outside the vocabulary, including the server's `connected` greeting.
    Unknown(String),
}

impl EnvelopeKind {
    /// Maps a wire tag to a kind. Never fails.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "init" => Self::Init,
            "skeleton" => Self::Skeleton,
            "day" => Self::Day,
            "place" => Self::Place,
            "restaurant" => Self::Restaurant,
            "image" => Self::Image,
            "prices" => Self::Prices,
            "price_update" => Self::PriceUpdate,
            "prices_complete" => Self::PricesComplete,
            "complete" => Self::Complete,
            "error" => Self::Error,
            "modification_start" => Self::ModificationStart,
            "place_add" => Self::PlaceAdd,
            "place_remove" => Self::PlaceRemove,
            "restaurant_add" => Self::RestaurantAdd,
            "restaurant_remove" => Self::RestaurantRemove,
            "day_add" => Self::DayAdd,
            "day_remove" => Self::DayRemove,
            "modification_complete" => Self::ModificationComplete,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Wire spelling of the kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Init => "init",
            Self::Skeleton => "skeleton",
            Self::Day => "day",
            Self::Place => "place",
            Self::Restaurant => "restaurant",
            Self::Image => "image",
            Self::Prices => "prices",
            Self::PriceUpdate => "price_update",
            Self::PricesComplete => "prices_complete",
            Self::Complete => "complete",
            Self::Error => "error",
            Self::ModificationStart => "modification_start",
            Self::PlaceAdd => "place_add",
            Self::PlaceRemove => "place_remove",
            Self::RestaurantAdd => "restaurant_add",
            Self::RestaurantRemove => "restaurant_remove",
            Self::DayAdd => "day_add",
            Self::DayRemove => "day_remove",
            Self::ModificationComplete => "modification_complete",
            Self::Unknown(tag) => tag,
        }
    }
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of a place or restaurant: 1-based day, 0-based slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey {
    pub day: u32,
    pub slot: u32,
}

impl SlotKey {
    #[must_use]
    pub const fn new(day: u32, slot: u32) -> Self {
        Self { day, slot }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.day, self.slot)
    }
}

/// A parsed stream envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub kind: EnvelopeKind,
    pub phase: Option<String>,
    /// Authoritative progress in `[0, 1]`.
    pub progress: Option<f64>,
    pub payload: Payload,
    pub message: Option<String>,
    /// Error text, resolved from `error`, `message` or `data.message`.
    pub error: Option<String>,
}

/// Kind-specific payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Kinds that carry nothing the reducer reads.
    None,
    Skeleton(SkeletonPayload),
    /// `day` and `day_add`.
    Day(DayPayload),
    /// `place`, `restaurant`, `place_add`, `restaurant_add`.
    Slot(SlotPayload),
    Image(ImagePayload),
    Prices(PricesPayload),
    PriceUpdate(PriceUpdatePayload),
    Complete(CompletePayload),
    ModificationStart(ModificationStartPayload),
    /// `place_remove` and `restaurant_remove`.
    Removal(RemovalPayload),
    DayRemoval(DayRemovalPayload),
    ModificationComplete(ModificationCompletePayload),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Budget {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkeletonPayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub duration: Option<String>,
    pub duration_days: Option<u32>,
    pub theme: Option<String>,
    pub thematic_keywords: Vec<String>,
    pub vibe: Vec<String>,
    pub estimated_budget: Option<Budget>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayPayload {
    pub day: u32,
    pub title: Option<String>,
    pub description: Option<String>,
    pub slots_count: u32,
    pub restaurants_count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotPayload {
    pub key: SlotKey,
    pub record: PlaceRecord,
}

/// What an image is attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageTarget {
    Hero,
    Place(String),
    /// Day images and place images without an id; accepted and ignored.
    Unattached,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImagePayload {
    pub target: ImageTarget,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PricesPayload {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub currency: Option<String>,
    /// Per-category breakdown; the backends disagree on its shape.
    pub breakdown: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceUpdatePayload {
    pub key: SlotKey,
    pub price: String,
    pub price_value: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletePayload {
    pub trip_id: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModificationStartPayload {
    pub modification_type: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemovalPayload {
    pub day: u32,
    pub entity_id: Option<String>,
    pub slot: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayRemovalPayload {
    pub day: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModificationCompletePayload {
    pub trip_id: Option<String>,
    pub message: Option<String>,
    /// Full trip as persisted by the server, left for the consumer to decode.
    pub trip: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags_round_trip() {
        let tags = [
            "init",
            "skeleton",
            "day",
            "place",
            "restaurant",
            "image",
            "prices",
            "price_update",
            "prices_complete",
            "complete",
            "error",
            "modification_start",
            "place_add",
            "place_remove",
            "restaurant_add",
            "restaurant_remove",
            "day_add",
            "day_remove",
            "modification_complete",
        ];
        for tag in tags {
            let kind = EnvelopeKind::from_tag(tag);
            assert!(!matches!(kind, EnvelopeKind::Unknown(_)), "{tag} should be known");
            assert_eq!(kind.as_str(), tag);
        }
    }

    #[test]
    fn test_unknown_tag_is_preserved() {
        let kind = EnvelopeKind::from_tag("connected");
        assert_eq!(kind, EnvelopeKind::Unknown("connected".to_string()));
        assert_eq!(kind.to_string(), "connected");
    }

    #[test]
    fn test_slot_key_display() {
        assert_eq!(SlotKey::new(2, 0).to_string(), "2-0");
    }
}
