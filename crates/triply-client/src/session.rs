//! Session controller.
//!
//! Owns the lifecycle of one generation stream: handshake, the driver task
//! that folds envelopes into the accumulator, and the progress ticker.
//!
//! State lives in a single [`SessionCore`] behind one async mutex. Every
//! mutation is committed by publishing an immutable snapshot, so observers
//! never see a half-applied envelope and completion handling always reads
//! the locked source of truth.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use triply_core::{
    ProgressEstimator, ProgressSettings, Transition, TripAccumulator, TripRecord, reduce,
};
use triply_protocol::{Envelope, Payload, parse_frame_or_drop};

use crate::backend::{FrameStream, GenerationBackend, StartRequest, StreamHandle};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

/// Error text for a stream that ends before completion.
pub const CONNECTION_LOST: &str = "Connection lost. Please try again.";

/// Error text for a cancelled session.
pub const CANCELLED: &str = "Generation cancelled";

const DEFAULT_COMPLETE_MESSAGE: &str = "Trip generated successfully!";
const EVENT_CAPACITY: usize = 16;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    Idle,
    Handshaking,
    Streaming,
    Completed,
    Errored,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Errored | Self::Cancelled)
    }

    /// Checks if a transition from this status to `next` is valid.
    pub fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            // reset is always allowed
            (_, Self::Idle) => true,
            (Self::Idle, Self::Handshaking) => true,
            (Self::Handshaking, Self::Streaming) => true,
            (
                Self::Handshaking | Self::Streaming,
                Self::Completed | Self::Errored | Self::Cancelled,
            ) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Handshaking => "handshaking",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Errored => "errored",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Terminal notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Completed { trip: Box<TripRecord>, message: String },
    Failed { message: String },
    Cancelled,
}

/// Timing knobs for a controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    pub progress: ProgressSettings,
    /// How long the stream stays open after a terminal envelope.
    pub close_grace: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self { progress: ProgressSettings::default(), close_grace: Duration::from_millis(500) }
    }
}

impl From<&ClientConfig> for SessionSettings {
    fn from(config: &ClientConfig) -> Self {
        Self { progress: config.progress_settings(), close_grace: config.close_grace() }
    }
}

struct SessionCore {
    acc: TripAccumulator,
    estimator: ProgressEstimator,
    status: SessionStatus,
    /// Set when a completion envelope is routed; later transport errors are teardown noise.
    has_completed: bool,
    /// Bumped on every start and reset so stale tasks cannot write.
    generation: u64,
    ticker: Option<CancellationToken>,
}

impl SessionCore {
    fn new(settings: ProgressSettings) -> Self {
        Self {
            acc: TripAccumulator::new(),
            estimator: ProgressEstimator::new(settings, Instant::now()),
            status: SessionStatus::Idle,
            has_completed: false,
            generation: 0,
            ticker: None,
        }
    }

    fn set_status(&mut self, next: SessionStatus) {
        if self.status.can_transition_to(next) {
            debug!(from = %self.status, to = %next, "Session transition");
            self.status = next;
        } else {
            warn!(from = %self.status, to = %next, "Rejected session transition");
        }
    }

    fn observe(&mut self) {
        let acc = &self.acc;
        self.estimator.observe(acc.progress, &acc.phase, acc.is_complete, Instant::now());
    }

    fn disarm_ticker(&mut self) {
        if let Some(token) = self.ticker.take() {
            token.cancel();
        }
    }
}

struct Shared {
    core: Mutex<SessionCore>,
    snapshot_tx: watch::Sender<Arc<TripAccumulator>>,
    progress_tx: watch::Sender<f64>,
    status_tx: watch::Sender<SessionStatus>,
    events_tx: broadcast::Sender<SessionEvent>,
}

impl Shared {
    /// Publishes the committed state. Called with the core lock held.
    fn commit(&self, core: &SessionCore) {
        self.snapshot_tx.send_replace(Arc::new(core.acc.clone()));
        self.progress_tx.send_replace(core.estimator.value());
        self.status_tx.send_replace(core.status);
    }

    fn notify(&self, event: SessionEvent) {
        // No receivers is fine.
        let _ = self.events_tx.send(event);
    }

    fn fail_locked(&self, core: &mut SessionCore, message: &str) {
        core.acc.fail(message);
        core.set_status(SessionStatus::Errored);
        core.disarm_ticker();
        core.observe();
        self.commit(core);
        self.notify(SessionEvent::Failed { message: message.to_string() });
    }

    /// Routes one envelope. Returns true once the session is terminal.
    async fn apply(&self, generation: u64, envelope: Envelope) -> bool {
        let mut core = self.core.lock().await;
        if core.generation != generation {
            return true;
        }

        let message = completion_message(&envelope);
        match reduce(&mut core.acc, envelope) {
            Transition::Ignored => false,
            Transition::Applied => {
                core.observe();
                self.commit(&core);
                false
            }
            Transition::Completed => {
                core.has_completed = true;
                core.set_status(SessionStatus::Completed);
                core.disarm_ticker();
                core.observe();
                self.commit(&core);
                if let Some(trip) = core.acc.final_trip.clone() {
                    self.notify(SessionEvent::Completed { trip: Box::new(trip), message });
                }
                true
            }
            Transition::Failed => {
                core.set_status(SessionStatus::Errored);
                core.disarm_ticker();
                core.observe();
                self.commit(&core);
                let message = core.acc.error.clone().unwrap_or_default();
                self.notify(SessionEvent::Failed { message });
                true
            }
        }
    }

    async fn connection_lost(&self, generation: u64, reason: &str) {
        let mut core = self.core.lock().await;
        if core.generation != generation || core.status.is_terminal() {
            return;
        }
        if core.has_completed || core.acc.is_complete {
            debug!(reason = %reason, "Transport closed after completion");
            return;
        }
        warn!(reason = %reason, "Connection lost before completion");
        self.fail_locked(&mut core, CONNECTION_LOST);
    }
}

fn completion_message(envelope: &Envelope) -> String {
    let from_payload = match &envelope.payload {
        Payload::Complete(complete) => complete.message.clone(),
        Payload::ModificationComplete(complete) => complete.message.clone(),
        _ => None,
    };
    from_payload
        .or_else(|| envelope.message.clone())
        .unwrap_or_else(|| DEFAULT_COMPLETE_MESSAGE.to_string())
}

struct ActiveSession {
    generation: u64,
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ActiveSession {
    async fn stop(self) {
        self.token.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                debug!(error = %e, "Session task ended abnormally");
            }
        }
    }
}

/// Drives one generation stream at a time.
///
/// Starting a new session tears down the previous one. Dropping the
/// controller cancels whatever is running.
pub struct SessionController {
    backend: Arc<dyn GenerationBackend>,
    settings: SessionSettings,
    shared: Arc<Shared>,
    active: Mutex<Option<ActiveSession>>,
    root: CancellationToken,
}

impl SessionController {
    pub fn new(backend: Arc<dyn GenerationBackend>, settings: SessionSettings) -> Self {
        let core = SessionCore::new(settings.progress);
        let (snapshot_tx, _) = watch::channel(Arc::new(core.acc.clone()));
        let (progress_tx, _) = watch::channel(0.0);
        let (status_tx, _) = watch::channel(SessionStatus::Idle);
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            backend,
            settings,
            shared: Arc::new(Shared {
                core: Mutex::new(core),
                snapshot_tx,
                progress_tx,
                status_tx,
                events_tx,
            }),
            active: Mutex::new(None),
            root: CancellationToken::new(),
        }
    }

    /// Starts a fresh generation session.
    pub async fn start(&self, request: StartRequest) -> Result<StreamHandle> {
        self.launch(request, TripAccumulator::new()).await
    }

    /// Starts a modification session on top of an existing trip.
    ///
    /// The request carries the trip's id unless one is already set.
    pub async fn start_modification(
        &self,
        trip: &TripRecord,
        mut request: StartRequest,
    ) -> Result<StreamHandle> {
        if request.trip_id.is_none() {
            request.trip_id.clone_from(&trip.id);
        }
        self.launch(request, TripAccumulator::from_trip(trip)).await
    }

    async fn launch(&self, request: StartRequest, seed: TripAccumulator) -> Result<StreamHandle> {
        self.teardown().await;

        let token = self.root.child_token();
        // Registered before `Handshaking` is published so `cancel` always finds it.
        let generation = {
            let mut active = self.active.lock().await;
            let mut core = self.shared.core.lock().await;
            core.generation += 1;
            core.acc = seed;
            core.estimator.reset(Instant::now());
            core.has_completed = false;
            core.status = SessionStatus::Idle;
            let generation = core.generation;
            *active = Some(ActiveSession { generation, token: token.clone(), tasks: Vec::new() });
            core.set_status(SessionStatus::Handshaking);
            core.observe();
            self.shared.commit(&core);
            generation
        };

        let (handle, frames) = match self.handshake(&request, &token).await {
            Ok(opened) => opened,
            Err(e) => {
                let mut core = self.shared.core.lock().await;
                if core.generation == generation && !core.status.is_terminal() {
                    self.shared.fail_locked(&mut core, &e.to_string());
                }
                return Err(e);
            }
        };

        let ticker_token = token.child_token();
        {
            let mut core = self.shared.core.lock().await;
            if core.generation != generation || token.is_cancelled() {
                return Err(ClientError::Cancelled);
            }
            if core.acc.trip_id.is_none() {
                core.acc.trip_id = Some(handle.trip_id.clone());
            }
            core.set_status(SessionStatus::Streaming);
            core.ticker = Some(ticker_token.clone());
            self.shared.commit(&core);
        }
        info!(trip_id = %handle.trip_id, "Streaming generation");

        let driver = tokio::spawn(drive(
            Arc::clone(&self.shared),
            frames,
            token.clone(),
            generation,
            self.settings.close_grace,
        ));
        let ticker = tokio::spawn(tick(
            Arc::clone(&self.shared),
            ticker_token,
            generation,
            self.settings.progress.tick(),
        ));

        let mut active = self.active.lock().await;
        match active.as_mut() {
            Some(session) if session.generation == generation => {
                session.tasks.extend([driver, ticker]);
            }
            // Cancelled while spawning; the token stops both tasks.
            _ => token.cancel(),
        }

        Ok(handle)
    }

    async fn handshake(
        &self,
        request: &StartRequest,
        token: &CancellationToken,
    ) -> Result<(StreamHandle, FrameStream)> {
        let handle = tokio::select! {
            () = token.cancelled() => return Err(ClientError::Cancelled),
            handle = self.backend.start(request) => handle?,
        };
        let frames = tokio::select! {
            () = token.cancelled() => return Err(ClientError::Cancelled),
            frames = self.backend.open_stream(&handle) => frames?,
        };
        Ok((handle, frames))
    }

    async fn teardown(&self) {
        let active = self.active.lock().await.take();
        if let Some(active) = active {
            active.stop().await;
        }
    }

    /// Cancels the running session, if any.
    ///
    /// A session that already finished keeps its outcome.
    pub async fn cancel(&self) {
        let active = self.active.lock().await.take();
        let Some(active) = active else { return };
        active.token.cancel();
        {
            let mut core = self.shared.core.lock().await;
            if !core.status.is_terminal() && !core.acc.is_complete {
                info!("Generation cancelled");
                core.acc.fail(CANCELLED);
                core.set_status(SessionStatus::Cancelled);
                core.disarm_ticker();
                core.observe();
                self.shared.commit(&core);
                self.shared.notify(SessionEvent::Cancelled);
            }
        }
        active.stop().await;
    }

    /// Stops any session and returns to `Idle` with an empty accumulator.
    pub async fn reset(&self) {
        self.teardown().await;
        let mut core = self.shared.core.lock().await;
        core.generation += 1;
        core.disarm_ticker();
        core.acc = TripAccumulator::new();
        core.estimator.reset(Instant::now());
        core.has_completed = false;
        core.set_status(SessionStatus::Idle);
        self.shared.commit(&core);
    }

    /// Waits until the current session reaches a terminal status.
    ///
    /// Returns immediately when idle.
    pub async fn wait(&self) -> SessionStatus {
        let mut rx = self.shared.status_tx.subscribe();
        let settled =
            |status: &SessionStatus| status.is_terminal() || *status == SessionStatus::Idle;
        match rx.wait_for(settled).await {
            Ok(status) => *status,
            Err(_) => self.status(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        *self.shared.status_tx.borrow()
    }

    /// Latest committed accumulator.
    pub fn snapshot(&self) -> Arc<TripAccumulator> {
        self.shared.snapshot_tx.borrow().clone()
    }

    /// Latest display progress.
    pub fn progress(&self) -> f64 {
        *self.shared.progress_tx.borrow()
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<Arc<TripAccumulator>> {
        self.shared.snapshot_tx.subscribe()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<f64> {
        self.shared.progress_tx.subscribe()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.shared.status_tx.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events_tx.subscribe()
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

async fn drive(
    shared: Arc<Shared>,
    mut frames: FrameStream,
    token: CancellationToken,
    generation: u64,
    close_grace: Duration,
) {
    loop {
        let next = tokio::select! {
            biased;
            () = token.cancelled() => {
                debug!("Driver cancelled");
                return;
            }
            next = frames.next() => next,
        };

        match next {
            Some(Ok(frame)) => {
                let Some(envelope) = parse_frame_or_drop(&frame) else { continue };
                if shared.apply(generation, envelope).await {
                    break;
                }
            }
            Some(Err(e)) => {
                shared.connection_lost(generation, &e.to_string()).await;
                return;
            }
            None => {
                shared.connection_lost(generation, "stream ended").await;
                return;
            }
        }
    }

    // Drain until the grace period ends so the server sees an orderly close.
    let grace = tokio::time::sleep(close_grace);
    tokio::pin!(grace);
    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            () = &mut grace => break,
            next = frames.next() => match next {
                Some(Ok(frame)) => {
                    debug!(event = ?frame.event, "Discarding frame after completion");
                }
                Some(Err(e)) => {
                    debug!(error = %e, "Transport error after completion");
                    break;
                }
                None => break,
            },
        }
    }
    debug!("Closing event stream");
}

async fn tick(shared: Arc<Shared>, token: CancellationToken, generation: u64, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        tokio::select! {
            () = token.cancelled() => break,
            _ = interval.tick() => {
                let mut core = shared.core.lock().await;
                if core.generation != generation || core.acc.is_complete {
                    break;
                }
                if let Some(value) = core.estimator.tick(Instant::now()) {
                    shared.progress_tx.send_replace(value);
                }
            }
        }
    }
}
