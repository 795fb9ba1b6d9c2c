//! Synchronization cycle orchestration
//!
//! [`SyncCoordinator`] walks an ordered list of time sources, resolving them
//! one at a time until one answers, and reports the outcome on its
//! [`EventSink`]: one `UPDATE_TIME_SYNC_OFFSET` followed by one
//! `TIME_SYNCHRONIZATION_COMPLETED` per cycle.
//!
//! # States
//!
//! ```text
//! Idle ──attempt_sync──> Resolving(0) ──fail──> Resolving(1) ── ... ──> Failed ──┐
//!   ↑                         │                      │                          │
//!   │                         └──────success─────────┴──────> Succeeded ────────┤
//!   └───────────────────────────── notifications dispatched ────────────────────┘
//! ```
//!
//! `reset()` forces `Idle` from anywhere without notifying.
//!
//! Every cycle gets a fresh identifier. The task driving a cycle checks it
//! against the active identifier, under the state lock, before changing state
//! or queueing its notifications; a superseded or reset cycle therefore never
//! publishes. The sink itself is called with no coordinator lock held.

use crate::clock::{Clock, SystemClock};
use crate::config::{FallbackOffset, TimeSyncSettings};
use crate::date_header::DateHeaderSource;
use crate::events::{EventSink, SyncOutcome, TimeSyncEvent};
use crate::http::HttpClient;
use crate::resolver::SourceResolver;
use crate::source::TimeSource;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

type CycleId = u64;

/// Observable coordinator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No cycle in flight
    Idle,
    /// Waiting on the source at `index`
    Resolving {
        /// Position in the cycle's source list
        index: usize,
    },
}

/// How a cycle ended, before the fallback offset is applied
enum CycleResult {
    Measured(SyncOutcome),
    Exhausted(FallbackOffset),
}

struct CoordinatorState {
    settings: TimeSyncSettings,
    /// Last identifier handed out; identifiers are never reused
    last_cycle: CycleId,
    active: Option<CycleId>,
    phase: SyncState,
    task: Option<JoinHandle<()>>,
    offset_ms: i64,
    last_measured_offset_ms: Option<i64>,
}

impl CoordinatorState {
    fn new(settings: TimeSyncSettings) -> Self {
        Self {
            settings,
            last_cycle: 0,
            active: None,
            phase: SyncState::Idle,
            task: None,
            offset_ms: 0,
            last_measured_offset_ms: None,
        }
    }

    /// Supersede whatever is in flight and open a new cycle
    fn begin_cycle(&mut self) -> CycleId {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(previous) = self.active {
            debug!(cycle = previous, "Superseding in-flight time synchronization");
        }
        self.last_cycle += 1;
        self.active = Some(self.last_cycle);
        self.phase = SyncState::Idle;
        self.last_cycle
    }

    /// Drop any in-flight cycle without notifying
    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(cycle) = self.active.take() {
            debug!(cycle, "Cancelled in-flight time synchronization");
        }
        self.phase = SyncState::Idle;
    }

    fn fallback_offset_ms(&self, policy: FallbackOffset) -> i64 {
        match policy {
            FallbackOffset::Zero => 0,
            FallbackOffset::LastKnown => self.last_measured_offset_ms.unwrap_or(0),
        }
    }

    /// Close `cycle` and queue its notifications on `outbox`
    ///
    /// Returns false, without touching state or the outbox, when `cycle` is
    /// no longer the active one. Nothing is delivered here; the caller
    /// flushes the outbox once the state lock is released.
    fn complete(&mut self, outbox: &Outbox, cycle: CycleId, result: CycleResult) -> bool {
        if self.active != Some(cycle) {
            trace!(cycle, "Discarding result of superseded time synchronization");
            return false;
        }

        let outcome = match result {
            CycleResult::Measured(outcome) => outcome,
            CycleResult::Exhausted(policy) => SyncOutcome::failed(self.fallback_offset_ms(policy)),
        };

        self.active = None;
        self.phase = SyncState::Idle;
        // Detaches the handle; the task is finishing on its own
        self.task = None;
        self.offset_ms = outcome.offset_ms;
        if outcome.is_success() {
            self.last_measured_offset_ms = Some(outcome.offset_ms);
            info!(cycle, offset_ms = outcome.offset_ms, "Time synchronization completed");
        } else {
            warn!(cycle, offset_ms = outcome.offset_ms, "Time synchronization failed");
        }

        outbox.push(cycle, outcome.into_events());
        true
    }
}

#[derive(Default)]
struct OutboxState {
    pending: VecDeque<(CycleId, TimeSyncEvent)>,
    delivering: bool,
}

/// Notifications waiting for delivery, in completion order
///
/// Cycles queue their pair while holding the coordinator state lock and the
/// sink is called with no coordinator lock held, so a sink may call back
/// into the coordinator. Only one caller delivers at a time; events queued
/// from inside `emit` are delivered after the current ones.
#[derive(Default)]
struct Outbox {
    state: Mutex<OutboxState>,
}

impl Outbox {
    fn push(&self, cycle: CycleId, events: [TimeSyncEvent; 2]) {
        self.state
            .lock()
            .pending
            .extend(events.into_iter().map(|event| (cycle, event)));
    }

    fn flush(&self, sink: &dyn EventSink) {
        {
            let mut state = self.state.lock();
            if state.delivering {
                return;
            }
            state.delivering = true;
        }

        loop {
            let (cycle, event) = {
                let mut state = self.state.lock();
                match state.pending.pop_front() {
                    Some(next) => next,
                    None => {
                        state.delivering = false;
                        return;
                    }
                }
            };

            let event_type = event.event_type();
            if let Err(e) = sink.emit(event) {
                debug!(cycle, event_type, error = %e, "Time sync event not delivered");
            }
        }
    }
}

/// Drives the time source fallback chain
///
/// Cycles run on the Tokio runtime current when the coordinator was built,
/// or the one given to [`SyncCoordinator::with_runtime`]. Without either,
/// [`SyncCoordinator::attempt_sync`] falls back to the runtime it is called
/// from; with none at all a cycle that needs to wait fails immediately.
pub struct SyncCoordinator {
    http: Arc<dyn HttpClient>,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    date_header: Option<Arc<dyn DateHeaderSource>>,
    runtime: Option<Handle>,
    state: Arc<Mutex<CoordinatorState>>,
    outbox: Arc<Outbox>,
}

impl SyncCoordinator {
    /// Create a coordinator
    ///
    /// # Arguments
    ///
    /// * `http` - Transport used for network-backed sources
    /// * `sink` - Where the cycle notifications are published
    /// * `settings` - Initial settings, replaceable with [`SyncCoordinator::set_config`]
    pub fn new(http: Arc<dyn HttpClient>, sink: Arc<dyn EventSink>, settings: TimeSyncSettings) -> Self {
        Self {
            http,
            sink,
            clock: Arc::new(SystemClock),
            date_header: None,
            runtime: Handle::try_current().ok(),
            state: Arc::new(Mutex::new(CoordinatorState::new(settings))),
            outbox: Arc::new(Outbox::default()),
        }
    }

    /// Measure offsets against a different local clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Supply the manifest `Date` header used when no source is given
    pub fn with_date_header_source(mut self, source: Arc<dyn DateHeaderSource>) -> Self {
        self.date_header = Some(source);
        self
    }

    /// Run cycles on `runtime`
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Return to the initial idle state
    pub fn initialize(&self) {
        self.reset();
        info!("Time sync coordinator initialized");
    }

    /// Replace the settings used by subsequent cycles
    ///
    /// A cycle already in flight keeps the settings it started with.
    pub fn set_config(&self, settings: TimeSyncSettings) {
        self.state.lock().settings = settings;
    }

    /// Current settings
    pub fn settings(&self) -> TimeSyncSettings {
        self.state.lock().settings.clone()
    }

    /// Start a synchronization cycle over `sources`, in order
    ///
    /// Returns immediately and never panics; the outcome arrives on the event
    /// sink. Any cycle still in flight is superseded and will not notify.
    pub fn attempt_sync(&self, sources: Vec<TimeSource>) {
        self.start_cycle(sources);
        self.outbox.flush(self.sink.as_ref());
    }

    fn start_cycle(&self, sources: Vec<TimeSource>) {
        let mut state = self.state.lock();
        let cycle = state.begin_cycle();
        let settings = state.settings.clone();
        info!(cycle, sources = sources.len(), "Starting time synchronization");

        if sources.is_empty() {
            let result = self.resolve_without_sources(cycle, &settings);
            state.complete(&self.outbox, cycle, result);
            return;
        }

        let Some(runtime) = self.runtime.clone().or_else(|| Handle::try_current().ok()) else {
            warn!(cycle, "No Tokio runtime available to run time synchronization");
            state.complete(&self.outbox, cycle, CycleResult::Exhausted(settings.fallback_offset()));
            return;
        };

        state.phase = SyncState::Resolving { index: 0 };
        let run = CycleRun {
            cycle,
            sources,
            resolver: SourceResolver::new(self.http.clone()).with_timeout(settings.request_timeout()),
            fallback: settings.fallback_offset(),
            sink: self.sink.clone(),
            clock: self.clock.clone(),
            state: self.state.clone(),
            outbox: self.outbox.clone(),
        };
        state.task = Some(runtime.spawn(run.run()));
    }

    /// Abandon any in-flight cycle and return to the initial idle state
    ///
    /// Safe to call at any time, any number of times. Results of the
    /// abandoned cycle are discarded.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.cancel();
        state.offset_ms = 0;
        state.last_measured_offset_ms = None;
    }

    /// Offset reported by the most recent cycle, in milliseconds
    pub fn offset_ms(&self) -> i64 {
        self.state.lock().offset_ms
    }

    /// Current position in the fallback chain
    pub fn state(&self) -> SyncState {
        self.state.lock().phase
    }

    /// Whether a cycle is waiting on a source
    pub fn is_synchronizing(&self) -> bool {
        matches!(self.state(), SyncState::Resolving { .. })
    }

    fn resolve_without_sources(&self, cycle: CycleId, settings: &TimeSyncSettings) -> CycleResult {
        if !settings.use_manifest_date_header() {
            warn!(cycle, "No time source provided and manifest Date header disabled");
            return CycleResult::Exhausted(settings.fallback_offset());
        }

        match self
            .date_header
            .as_ref()
            .and_then(|source| source.latest_date_header_time())
        {
            Some(time) => {
                debug!(cycle, %time, "Using manifest Date header as time source");
                CycleResult::Measured(SyncOutcome::measured(time, self.clock.now()))
            }
            None => {
                warn!(cycle, "No time source provided and no manifest Date header available");
                CycleResult::Exhausted(settings.fallback_offset())
            }
        }
    }
}

impl Drop for SyncCoordinator {
    fn drop(&mut self) {
        self.state.lock().cancel();
    }
}

/// Everything the task driving one cycle needs
struct CycleRun {
    cycle: CycleId,
    sources: Vec<TimeSource>,
    resolver: SourceResolver,
    fallback: FallbackOffset,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    state: Arc<Mutex<CoordinatorState>>,
    outbox: Arc<Outbox>,
}

impl CycleRun {
    async fn run(self) {
        for (index, source) in self.sources.iter().enumerate() {
            if !self.enter(index) {
                return;
            }
            debug!(
                cycle = self.cycle,
                index,
                scheme = %source.scheme(),
                value = %source.value,
                "Resolving time source"
            );

            match self.resolver.resolve(source).await {
                Ok(resolved) => {
                    let outcome = SyncOutcome::measured(resolved.time, self.clock.now());
                    self.complete(CycleResult::Measured(outcome));
                    return;
                }
                Err(e) => {
                    warn!(
                        cycle = self.cycle,
                        index,
                        source = %source,
                        error = %e,
                        "Time source failed"
                    );
                }
            }
        }

        warn!(
            cycle = self.cycle,
            attempts = self.sources.len(),
            "All time sources failed"
        );
        self.complete(CycleResult::Exhausted(self.fallback));
    }

    /// Record that `index` is in flight; false if this cycle is stale
    fn enter(&self, index: usize) -> bool {
        let mut state = self.state.lock();
        if state.active != Some(self.cycle) {
            trace!(cycle = self.cycle, "Abandoning superseded time synchronization");
            return false;
        }
        state.phase = SyncState::Resolving { index };
        true
    }

    fn complete(&self, result: CycleResult) {
        let completed = self.state.lock().complete(&self.outbox, self.cycle, result);
        if completed {
            self.outbox.flush(self.sink.as_ref());
        }
    }
}
