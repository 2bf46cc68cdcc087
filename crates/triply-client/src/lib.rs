//! Client side of streamed trip generation.
//!
//! - [`HttpBackend`] performs the start handshake and opens the event stream.
//! - [`SessionController`] drives one session: it folds envelopes into a
//!   [`TripAccumulator`](triply_core::TripAccumulator), smooths progress and
//!   publishes snapshots to observers.
//!
//! Backends are pluggable through [`GenerationBackend`], which is how the
//! tests script a server.

pub mod backend;
pub mod config;
pub mod error;
pub mod session;

pub use backend::{
    FrameStream, GenerationBackend, HttpBackend, SseFrameStream, StartRequest, StreamHandle,
};
pub use config::{API_URL_ENV, ClientConfig, ConfigError, ConfigResult, ProgressConfig};
pub use error::{ClientError, Result};
pub use session::{
    CANCELLED, CONNECTION_LOST, SessionController, SessionEvent, SessionSettings, SessionStatus,
};
