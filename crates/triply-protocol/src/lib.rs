//! Wire protocol for streamed itinerary generation.
//!
//! A generation backend answers a start request with a stream of tagged
//! JSON envelopes. This crate decodes that stream:
//!
//! - [`SseDecoder`] splits a byte stream into [`RawFrame`]s.
//! - [`parse_frame`] turns a frame into a canonical [`Envelope`], resolving
//!   field aliases and validating indices.
//!
//! Nothing here holds session state; see `triply-core` for that.

mod envelope;
mod error;
mod frame;
pub mod lenient;
mod parser;
mod place;

pub use envelope::{
    Budget, CompletePayload, DayPayload, DayRemovalPayload, Envelope, EnvelopeKind, ImagePayload,
    ImageTarget, MAX_DAYS, MAX_SLOTS, ModificationCompletePayload, ModificationStartPayload,
    Payload, PriceUpdatePayload, PricesPayload, RemovalPayload, SkeletonPayload, SlotKey,
    SlotPayload,
};
pub use error::{ProtocolError, Result};
pub use frame::{RawFrame, SseDecoder};
pub use parser::{decode_envelope, decode_value, parse_frame, parse_frame_or_drop};
pub use place::{ImageRef, PlaceRecord};
