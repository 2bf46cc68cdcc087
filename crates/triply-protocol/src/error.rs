// Error types for envelope decoding

use thiserror::Error;

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Reasons a transport frame could not be turned into an envelope.
///
/// None of these are fatal to a session: the pipeline logs them and drops
/// the frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The frame carried no data, an empty string, or the literal "undefined".
    #[error("Frame has no data")]
    EmptyFrame,

    /// The data segment is not valid JSON.
    #[error("Malformed JSON: {0}")]
    MalformedJson(String),

    /// The data segment is valid JSON but not an object.
    #[error("Frame data is not a JSON object")]
    NotAnObject,

    /// A kind that needs a payload arrived without one.
    #[error("Missing payload for '{kind}' envelope")]
    MissingPayload {
        /// Envelope kind
        kind: String,
    },

    /// A required payload field is absent.
    #[error("Missing field '{field}' in '{kind}' payload")]
    MissingField {
        /// Envelope kind
        kind: String,
        /// Canonical field name
        field: &'static str,
    },

    /// A payload field is present but unusable.
    #[error("Invalid field '{field}' in '{kind}' payload: {reason}")]
    InvalidField {
        /// Envelope kind
        kind: String,
        /// Canonical field name
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },
}
