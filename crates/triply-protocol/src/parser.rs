//! Frame → envelope parsing.
//!
//! This is the only place that knows about wire-format variance: the two
//! spellings of day and slot fields, `type` vs `imageType` on images,
//! `totalMin`/`totalMax` on prices, and the three places an error message
//! can hide in.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::envelope::{
    Budget, CompletePayload, DayPayload, DayRemovalPayload, Envelope, EnvelopeKind, ImagePayload,
    ImageTarget, MAX_DAYS, MAX_SLOTS, ModificationCompletePayload, ModificationStartPayload,
    Payload, PriceUpdatePayload, PricesPayload, RemovalPayload, SkeletonPayload, SlotKey,
    SlotPayload,
};
use crate::error::{ProtocolError, Result};
use crate::frame::RawFrame;
use crate::lenient;
use crate::place::PlaceRecord;

/// Parses one transport frame.
///
/// The explicit frame tag wins over a `type` field inside the JSON; a frame
/// with neither becomes [`EnvelopeKind::Unknown`].
pub fn parse_frame(frame: &RawFrame) -> Result<Envelope> {
    decode_envelope(frame.event.as_deref(), frame.data.as_deref())
}

/// Parses a frame, logging and dropping anything unusable.
///
/// Parse failures are never fatal to a session.
pub fn parse_frame_or_drop(frame: &RawFrame) -> Option<Envelope> {
    match parse_frame(frame) {
        Ok(envelope) => Some(envelope),
        Err(ProtocolError::EmptyFrame) => {
            debug!(event = ?frame.event, "Skipping frame with no data");
            None
        }
        Err(e) => {
            warn!(event = ?frame.event, data = ?frame.data, error = %e, "Failed to parse frame");
            None
        }
    }
}

/// Parses a tag and raw data segment.
pub fn decode_envelope(tag: Option<&str>, data: Option<&str>) -> Result<Envelope> {
    let data = data
        .map(str::trim)
        .filter(|d| !d.is_empty() && *d != "undefined")
        .ok_or(ProtocolError::EmptyFrame)?;
    let value: Value =
        serde_json::from_str(data).map_err(|e| ProtocolError::MalformedJson(e.to_string()))?;
    decode_value(tag, value)
}

/// Parses an already-decoded JSON object.
pub fn decode_value(tag: Option<&str>, value: Value) -> Result<Envelope> {
    let Value::Object(mut object) = value else {
        return Err(ProtocolError::NotAnObject);
    };

    // "message" is the SSE default event name, not a kind.
    let tag = tag.map(str::trim).filter(|t| !t.is_empty() && *t != "message");
    let inner_tag = object.get("type").and_then(lenient::text);
    let kind = EnvelopeKind::from_tag(tag.or(inner_tag.as_deref()).unwrap_or("unknown"));

    let data = object.remove("data").filter(|d| !d.is_null());
    let phase = object.get("phase").and_then(lenient::text);
    let progress = object.get("progress").and_then(lenient::number).map(|p| p.clamp(0.0, 1.0));
    let message = object.get("message").and_then(lenient::text);

    let mut error = object.get("error").and_then(error_text);
    if kind == EnvelopeKind::Error && error.is_none() {
        error = message
            .clone()
            .or_else(|| data.as_ref().and_then(|d| d.get("message")).and_then(lenient::text));
    }

    let payload = decode_payload(&kind, data)?;

    Ok(Envelope { kind, phase, progress, payload, message, error })
}

fn error_text(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => map.get("message").and_then(lenient::text),
        other => lenient::text(other),
    }
}

fn decode_payload(kind: &EnvelopeKind, data: Option<Value>) -> Result<Payload> {
    let payload = match kind {
        EnvelopeKind::Init
        | EnvelopeKind::PricesComplete
        | EnvelopeKind::Error
        | EnvelopeKind::Unknown(_) => Payload::None,

        EnvelopeKind::Skeleton => Payload::Skeleton(decode_skeleton(kind, require(kind, data)?)?),

        EnvelopeKind::Day | EnvelopeKind::DayAdd => {
            let data = require(kind, data)?;
            let fields = Fields::new(kind, &data)?;
            Payload::Day(DayPayload {
                day: fields.day()?,
                title: fields.text(&["title"]),
                description: fields.text(&["description"]),
                slots_count: fields.index(&["slotsCount", "placesCount"]).unwrap_or(0),
                restaurants_count: fields.index(&["restaurantsCount"]).unwrap_or(0),
            })
        }

        EnvelopeKind::Place | EnvelopeKind::PlaceAdd => {
            Payload::Slot(decode_slot(kind, require(kind, data)?, "place", "restaurant")?)
        }

        EnvelopeKind::Restaurant | EnvelopeKind::RestaurantAdd => {
            Payload::Slot(decode_slot(kind, require(kind, data)?, "restaurant", "place")?)
        }

        EnvelopeKind::Image => {
            let data = require(kind, data)?;
            let fields = Fields::new(kind, &data)?;
            let url = fields.text(&["url"]).ok_or_else(|| missing(kind, "url"))?;
            let target = match fields.text(&["type", "imageType"]).as_deref() {
                Some("hero") => ImageTarget::Hero,
                _ => fields.text(&["placeId"]).map_or(ImageTarget::Unattached, ImageTarget::Place),
            };
            Payload::Image(ImagePayload { target, url })
        }

        EnvelopeKind::Prices => {
            let data = require(kind, data)?;
            let fields = Fields::new(kind, &data)?;
            Payload::Prices(PricesPayload {
                min: fields.number(&["min", "totalMin"]),
                max: fields.number(&["max", "totalMax"]),
                currency: fields.text(&["currency"]),
                breakdown: fields.map.get("breakdown").filter(|b| !b.is_null()).cloned(),
            })
        }

        EnvelopeKind::PriceUpdate => {
            let data = require(kind, data)?;
            let fields = Fields::new(kind, &data)?;
            let key = fields.slot_key()?;
            Payload::PriceUpdate(PriceUpdatePayload {
                key,
                price: fields.text(&["price"]).ok_or_else(|| missing(kind, "price"))?,
                price_value: fields.number(&["price_value", "priceValue"]),
            })
        }

        EnvelopeKind::Complete => {
            let payload = match data {
                Some(data) => {
                    let fields = Fields::new(kind, &data)?;
                    CompletePayload {
                        trip_id: fields.text(&["tripId"]),
                        message: fields.text(&["message"]),
                    }
                }
                None => CompletePayload::default(),
            };
            Payload::Complete(payload)
        }

        EnvelopeKind::ModificationStart => {
            let payload = match data {
                Some(data) => {
                    let fields = Fields::new(kind, &data)?;
                    ModificationStartPayload {
                        modification_type: fields.text(&["modificationType"]),
                        description: fields.text(&["description"]),
                    }
                }
                None => ModificationStartPayload::default(),
            };
            Payload::ModificationStart(payload)
        }

        EnvelopeKind::PlaceRemove | EnvelopeKind::RestaurantRemove => {
            let data = require(kind, data)?;
            let fields = Fields::new(kind, &data)?;
            let id_fields: &[&str] = if *kind == EnvelopeKind::PlaceRemove {
                &["placeId", "poi_id", "id"]
            } else {
                &["restaurantId", "poi_id", "id"]
            };
            let entity_id = fields.text(id_fields);
            let slot = fields.slot()?;
            if entity_id.is_none() && slot.is_none() {
                return Err(missing(kind, id_fields[0]));
            }
            Payload::Removal(RemovalPayload { day: fields.day()?, entity_id, slot })
        }

        EnvelopeKind::DayRemove => {
            let data = require(kind, data)?;
            let fields = Fields::new(kind, &data)?;
            Payload::DayRemoval(DayRemovalPayload { day: fields.day()? })
        }

        EnvelopeKind::ModificationComplete => {
            let payload = match data {
                Some(data) => {
                    let fields = Fields::new(kind, &data)?;
                    ModificationCompletePayload {
                        trip_id: fields.text(&["tripId"]),
                        message: fields.text(&["message"]),
                        trip: fields.map.get("trip").filter(|t| t.is_object()).cloned(),
                    }
                }
                None => ModificationCompletePayload::default(),
            };
            Payload::ModificationComplete(payload)
        }
    };
    Ok(payload)
}

fn require(kind: &EnvelopeKind, data: Option<Value>) -> Result<Value> {
    data.ok_or_else(|| ProtocolError::MissingPayload { kind: kind.to_string() })
}

fn missing(kind: &EnvelopeKind, field: &'static str) -> ProtocolError {
    ProtocolError::MissingField { kind: kind.to_string(), field }
}

fn invalid(kind: &EnvelopeKind, field: &'static str, reason: impl Into<String>) -> ProtocolError {
    ProtocolError::InvalidField { kind: kind.to_string(), field, reason: reason.into() }
}

/// Alias-aware accessors over a payload object.
struct Fields<'a> {
    kind: &'a EnvelopeKind,
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    fn new(kind: &'a EnvelopeKind, data: &'a Value) -> Result<Self> {
        let map = data
            .as_object()
            .ok_or_else(|| invalid(kind, "data", "payload is not an object"))?;
        Ok(Self { kind, map })
    }

    /// First alias that yields a usable value wins.
    fn index(&self, names: &[&str]) -> Option<u32> {
        names.iter().find_map(|name| self.map.get(*name).and_then(lenient::index))
    }

    fn text(&self, names: &[&str]) -> Option<String> {
        names.iter().find_map(|name| self.map.get(*name).and_then(lenient::text))
    }

    fn number(&self, names: &[&str]) -> Option<f64> {
        names.iter().find_map(|name| self.map.get(*name).and_then(lenient::number))
    }

    fn day(&self) -> Result<u32> {
        // A zero day number falls through to the alias, as the backends
        // treat 0 as unset.
        let day = ["dayNumber", "day"]
            .iter()
            .find_map(|name| self.map.get(*name).and_then(lenient::index).filter(|d| *d > 0))
            .ok_or_else(|| missing(self.kind, "dayNumber"))?;
        if day > MAX_DAYS {
            return Err(invalid(self.kind, "dayNumber", format!("{day} exceeds {MAX_DAYS}")));
        }
        Ok(day)
    }

    fn slot(&self) -> Result<Option<u32>> {
        let Some(slot) = self.index(&["slotIndex", "index", "slot"]) else {
            return Ok(None);
        };
        if slot >= MAX_SLOTS {
            let reason = format!("{slot} exceeds {}", MAX_SLOTS - 1);
            return Err(invalid(self.kind, "slotIndex", reason));
        }
        Ok(Some(slot))
    }

    /// Day and slot, both required.
    fn slot_key(&self) -> Result<SlotKey> {
        let day = self.day()?;
        let slot = self.slot()?.ok_or_else(|| missing(self.kind, "slotIndex"))?;
        Ok(SlotKey::new(day, slot))
    }
}

fn decode_slot(
    kind: &EnvelopeKind,
    data: Value,
    record_field: &'static str,
    fallback_field: &str,
) -> Result<SlotPayload> {
    let fields = Fields::new(kind, &data)?;
    let key = fields.slot_key()?;
    let raw = fields
        .map
        .get(record_field)
        .or_else(|| fields.map.get(fallback_field))
        .filter(|r| r.is_object())
        .cloned()
        .ok_or_else(|| missing(kind, record_field))?;
    let record: PlaceRecord = serde_json::from_value(raw)
        .map_err(|e| invalid(kind, record_field, e.to_string()))?;
    Ok(SlotPayload { key, record: record.normalize() })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSkeleton {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    title: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    description: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    city: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    country: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    duration: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_u32")]
    duration_days: Option<u32>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    theme: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    thematic_keywords: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    vibe: Vec<String>,
    #[serde(default)]
    estimated_budget: Option<WireBudget>,
}

#[derive(Deserialize)]
struct WireBudget {
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    min: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    max: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    currency: Option<String>,
}

fn decode_skeleton(kind: &EnvelopeKind, data: Value) -> Result<SkeletonPayload> {
    let wire: WireSkeleton =
        serde_json::from_value(data).map_err(|e| invalid(kind, "data", e.to_string()))?;
    let duration_days = wire.duration_days.filter(|d| *d > 0);
    if let Some(days) = duration_days.filter(|d| *d > MAX_DAYS) {
        return Err(invalid(kind, "durationDays", format!("{days} exceeds {MAX_DAYS}")));
    }
    Ok(SkeletonPayload {
        title: wire.title,
        description: wire.description,
        city: wire.city,
        country: wire.country,
        duration: wire.duration,
        duration_days,
        theme: wire.theme,
        thematic_keywords: wire.thematic_keywords,
        vibe: wire.vibe,
        estimated_budget: wire
            .estimated_budget
            .map(|b| Budget { min: b.min, max: b.max, currency: b.currency }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(tag: &str, value: Value) -> Result<Envelope> {
        decode_value(Some(tag), value)
    }

    #[test]
    fn test_empty_and_undefined_frames_are_dropped() {
        assert_eq!(decode_envelope(Some("day"), None), Err(ProtocolError::EmptyFrame));
        assert_eq!(decode_envelope(Some("day"), Some("")), Err(ProtocolError::EmptyFrame));
        assert_eq!(decode_envelope(Some("day"), Some("undefined")), Err(ProtocolError::EmptyFrame));
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let result = decode_envelope(Some("day"), Some("{not json"));
        assert!(matches!(result, Err(ProtocolError::MalformedJson(_))));
        assert_eq!(decode_envelope(Some("day"), Some("[1,2]")), Err(ProtocolError::NotAnObject));
    }

    #[test]
    fn test_explicit_tag_wins_over_inner_type() {
        let data = r#"{"type":"skeleton","progress":0.05}"#;
        let envelope = decode_envelope(Some("init"), Some(data)).unwrap();
        assert_eq!(envelope.kind, EnvelopeKind::Init);
    }

    #[test]
    fn test_inner_type_used_without_tag() {
        let envelope = decode_envelope(None, Some(r#"{"type":"prices_complete"}"#)).unwrap();
        assert_eq!(envelope.kind, EnvelopeKind::PricesComplete);

        let envelope = decode_envelope(Some("message"), Some(r#"{"type":"init"}"#)).unwrap();
        assert_eq!(envelope.kind, EnvelopeKind::Init);
    }

    #[test]
    fn test_missing_kind_defaults_to_unknown() {
        let envelope = decode_envelope(None, Some(r#"{"progress":0.3}"#)).unwrap();
        assert_eq!(envelope.kind, EnvelopeKind::Unknown("unknown".to_string()));
        assert_eq!(envelope.payload, Payload::None);
    }

    #[test]
    fn test_progress_is_clamped() {
        let envelope = decode("init", json!({"progress": 1.7})).unwrap();
        assert_eq!(envelope.progress, Some(1.0));
        let envelope = decode("init", json!({"progress": "nope"})).unwrap();
        assert_eq!(envelope.progress, None);
    }

    #[test]
    fn test_day_accepts_both_field_names() {
        let a = decode("day", json!({"data": {"dayNumber": 2, "title": "Montmartre"}})).unwrap();
        let b = decode("day", json!({"data": {"day": 2, "title": "Montmartre"}})).unwrap();
        assert_eq!(a.payload, b.payload);
        let Payload::Day(day) = a.payload else { panic!("expected day payload") };
        assert_eq!(day.day, 2);
        assert_eq!(day.title.as_deref(), Some("Montmartre"));
    }

    #[test]
    fn test_day_add_reads_places_count() {
        let data = json!({"data": {"dayNumber": 4, "placesCount": 3, "restaurantsCount": 2}});
        let envelope = decode("day_add", data).unwrap();
        let Payload::Day(day) = envelope.payload else { panic!("expected day payload") };
        assert_eq!(day.slots_count, 3);
        assert_eq!(day.restaurants_count, 2);
    }

    #[test]
    fn test_day_without_number_is_rejected() {
        let result = decode("day", json!({"data": {"title": "Lost"}}));
        assert!(matches!(result, Err(ProtocolError::MissingField { field: "dayNumber", .. })));
    }

    #[test]
    fn test_day_out_of_range_is_rejected() {
        let result = decode("day", json!({"data": {"dayNumber": 9000}}));
        assert!(matches!(result, Err(ProtocolError::InvalidField { field: "dayNumber", .. })));
    }

    #[test]
    fn test_place_accepts_both_aliasing_schemes() {
        let a = decode(
            "place",
            json!({"data": {"dayNumber": 1, "slotIndex": 2, "place": {"name": "Eiffel Tower"}}}),
        )
        .unwrap();
        let b = decode(
            "place",
            json!({"data": {"day": 1, "index": 2, "place": {"name": "Eiffel Tower"}}}),
        )
        .unwrap();
        let (Payload::Slot(a), Payload::Slot(b)) = (a.payload, b.payload) else {
            panic!("expected slot payloads");
        };
        assert_eq!(a.key, SlotKey::new(1, 2));
        assert_eq!(a.key, b.key);
        assert_eq!(a.record.name, "Eiffel Tower");
    }

    #[test]
    fn test_slot_index_zero_is_kept() {
        let envelope = decode(
            "place",
            json!({"data": {"dayNumber": 1, "slotIndex": 0, "index": 5, "place": {"name": "A"}}}),
        )
        .unwrap();
        let Payload::Slot(slot) = envelope.payload else { panic!("expected slot payload") };
        assert_eq!(slot.key.slot, 0);
    }

    #[test]
    fn test_restaurant_reads_restaurant_field_and_price_range() {
        let envelope = decode(
            "restaurant",
            json!({"data": {"dayNumber": 1, "slotIndex": 0,
                "restaurant": {"name": "Le Comptoir", "price_range": "€€", "cuisine": "French"}}}),
        )
        .unwrap();
        let Payload::Slot(slot) = envelope.payload else { panic!("expected slot payload") };
        assert_eq!(slot.record.name, "Le Comptoir");
        assert_eq!(slot.record.price.as_deref(), Some("€€"));
    }

    #[test]
    fn test_place_without_record_is_rejected() {
        let result = decode("place", json!({"data": {"dayNumber": 1, "slotIndex": 0}}));
        assert!(matches!(result, Err(ProtocolError::MissingField { field: "place", .. })));
    }

    #[test]
    fn test_image_variants() {
        let data = json!({"data": {"type": "hero", "url": "https://img/hero.jpg"}});
        let hero = decode("image", data).unwrap();
        assert_eq!(
            hero.payload,
            Payload::Image(ImagePayload {
                target: ImageTarget::Hero,
                url: "https://img/hero.jpg".to_string()
            })
        );

        let place = decode(
            "image",
            json!({"data": {"imageType": "place", "placeId": "p1", "url": "https://img/p1.jpg"}}),
        )
        .unwrap();
        assert_eq!(
            place.payload,
            Payload::Image(ImagePayload {
                target: ImageTarget::Place("p1".to_string()),
                url: "https://img/p1.jpg".to_string()
            })
        );

        let day =
            decode("image", json!({"data": {"imageType": "day", "day": 1, "url": "u"}})).unwrap();
        let Payload::Image(image) = day.payload else { panic!("expected image payload") };
        assert_eq!(image.target, ImageTarget::Unattached);
    }

    #[test]
    fn test_prices_accepts_total_aliases() {
        let envelope = decode(
            "prices",
            json!({"data": {
                "totalMin": 300,
                "totalMax": 450,
                "currency": "USD",
                "breakdown": {"food": 120}
            }}),
        )
        .unwrap();
        let Payload::Prices(prices) = envelope.payload else { panic!("expected prices payload") };
        assert_eq!(prices.min, Some(300.0));
        assert_eq!(prices.max, Some(450.0));
        assert_eq!(prices.currency.as_deref(), Some("USD"));
        assert!(prices.breakdown.is_some());
    }

    #[test]
    fn test_price_update() {
        let data = json!({"data": {"dayNumber": 1, "slotIndex": 0, "price": "€25"}});
        let envelope = decode("price_update", data).unwrap();
        assert_eq!(
            envelope.payload,
            Payload::PriceUpdate(PriceUpdatePayload {
                key: SlotKey::new(1, 0),
                price: "€25".to_string(),
                price_value: None,
            })
        );
    }

    #[test]
    fn test_error_text_resolution_order() {
        let a = decode("error", json!({"error": "boom", "message": "other"})).unwrap();
        assert_eq!(a.error.as_deref(), Some("boom"));

        let b = decode("error", json!({"message": "from message"})).unwrap();
        assert_eq!(b.error.as_deref(), Some("from message"));

        let data = json!({"data": {"code": "PIPELINE_FAILED", "message": "from data"}});
        let c = decode("error", data).unwrap();
        assert_eq!(c.error.as_deref(), Some("from data"));

        let d = decode("error", json!({"error": {"message": "nested"}})).unwrap();
        assert_eq!(d.error.as_deref(), Some("nested"));
    }

    #[test]
    fn test_complete_payload_is_optional() {
        let bare = decode("complete", json!({"progress": 1.0})).unwrap();
        assert_eq!(bare.payload, Payload::Complete(CompletePayload::default()));

        let full =
            decode("complete", json!({"data": {"tripId": "t-1", "message": "Done"}})).unwrap();
        let Payload::Complete(done) = full.payload else { panic!("expected complete payload") };
        assert_eq!(done.trip_id.as_deref(), Some("t-1"));
        assert_eq!(done.message.as_deref(), Some("Done"));
    }

    #[test]
    fn test_removals() {
        let data = json!({"data": {"dayNumber": 2, "restaurantId": "r-7"}});
        let envelope = decode("restaurant_remove", data).unwrap();
        assert_eq!(
            envelope.payload,
            Payload::Removal(RemovalPayload {
                day: 2,
                entity_id: Some("r-7".to_string()),
                slot: None
            })
        );

        let data = json!({"data": {"dayNumber": 1, "slotIndex": 3}});
        let envelope = decode("place_remove", data).unwrap();
        assert_eq!(
            envelope.payload,
            Payload::Removal(RemovalPayload { day: 1, entity_id: None, slot: Some(3) })
        );

        let result = decode("place_remove", json!({"data": {"dayNumber": 2}}));
        assert!(matches!(result, Err(ProtocolError::MissingField { field: "placeId", .. })));
    }

    #[test]
    fn test_skeleton_zero_duration_counts_as_unset() {
        let data = json!({"data": {"title": "Paris", "durationDays": 0}});
        let envelope = decode("skeleton", data).unwrap();
        let Payload::Skeleton(skeleton) = envelope.payload else {
            panic!("expected skeleton payload")
        };
        assert_eq!(skeleton.duration_days, None);
        assert!(skeleton.estimated_budget.is_none());
    }

    #[test]
    fn test_unknown_tag_parses_without_payload() {
        let envelope = decode("connected", json!({"tripId": "t-1", "timestamp": 1})).unwrap();
        assert_eq!(envelope.kind, EnvelopeKind::Unknown("connected".to_string()));
    }
}
