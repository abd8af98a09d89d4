//! Session worker that owns the device client and executes commands one at a time.
//!
//! Producers hand [`Command`]s to [`CommandQueue::enqueue`]. Every time the worker wakes up it
//! drains the whole queue, discards everything except the most recent command and executes that
//! one. Commands that pile up while a request is in flight therefore collapse into the freshest
//! intent instead of replaying stale ones.

use std::{
    collections::VecDeque,
    mem,
    sync::{
        Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use ptz_device::{AxisRanges, DeviceClient, DeviceError, DeviceInfo, Profile};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, info_span, warn};

use crate::error::QueueError;
use commands::{Command, DeviceContext};

pub mod command_sender;
pub mod commands;
pub mod runner;
pub mod stats;

pub use stats::RequestStats;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// What the worker does when a command fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Any failure ends the session.
    #[default]
    Fatal,
    /// Timeouts and I/O errors are logged and the session goes on. Device faults still end it.
    TolerateTransient,
}

impl FailurePolicy {
    fn tolerates(&self, err: &DeviceError) -> bool {
        matches!(self, FailurePolicy::TolerateTransient) && err.is_retryable()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    NotStarted,
    Initializing,
    IdleWaiting,
    Draining,
    Executing,
    Stopped,
}

struct QueueState {
    pending: VecDeque<Command>,
    phase: WorkerPhase,
}

struct Shared {
    state: Mutex<QueueState>,
    data_available: Condvar,
    space_freed: Condvar,
    connected: AtomicBool,
    error: AtomicBool,
    exit: AtomicBool,
    ranges: OnceLock<AxisRanges>,
    device: OnceLock<DeviceInfo>,
    profile: OnceLock<Profile>,
    last_error: Mutex<Option<String>>,
    stats: Mutex<RequestStats>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: WorkerPhase) {
        self.lock().phase = phase;
    }

    fn record_request(&self, request: &str, elapsed: Duration) {
        debug!(request, "Request took {} ms", elapsed.as_millis());
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(elapsed);
    }

    fn fail(&self, reason: String) {
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(reason);
        let _state = self.lock();
        self.connected.store(false, Ordering::SeqCst);
        self.error.store(true, Ordering::SeqCst);
    }
}

/// Single-flight command queue bound to one device session.
pub struct CommandQueue {
    shared: Arc<Shared>,
    policy: FailurePolicy,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::with_policy(FailurePolicy::default())
    }

    pub fn with_policy(policy: FailurePolicy) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState {
                    pending: VecDeque::new(),
                    phase: WorkerPhase::NotStarted,
                }),
                data_available: Condvar::new(),
                space_freed: Condvar::new(),
                connected: AtomicBool::new(false),
                error: AtomicBool::new(false),
                exit: AtomicBool::new(false),
                ranges: OnceLock::new(),
                device: OnceLock::new(),
                profile: OnceLock::new(),
                last_error: Mutex::new(None),
                stats: Mutex::new(RequestStats::default()),
            }),
            policy,
            worker: Mutex::new(None),
        }
    }

    /// Starts the worker thread, which initializes `client` and then serves the queue.
    ///
    /// Returns once the thread is spawned. Poll [`connected`](Self::connected) and
    /// [`error`](Self::error) to learn how initialization went.
    pub fn run<C: DeviceClient + 'static>(&self, client: C) -> Result<(), QueueError> {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        {
            let mut state = self.shared.lock();
            if state.phase != WorkerPhase::NotStarted {
                return Err(QueueError::AlreadyStarted);
            }
            state.phase = WorkerPhase::Initializing;
        }

        let shared = Arc::clone(&self.shared);
        let policy = self.policy;
        let spawned = thread::Builder::new()
            .name("ptz-session".to_string())
            .spawn(move || {
                let mut session = Session { shared, client };
                session.serve(policy);
            });

        match spawned {
            Ok(join) => {
                *worker = Some(join);
                Ok(())
            }
            Err(err) => {
                self.shared.set_phase(WorkerPhase::NotStarted);
                Err(QueueError::Spawn(err))
            }
        }
    }

    /// Hands a command to the worker.
    ///
    /// Blocks while the worker is idle and still has an unclaimed batch, so producers stay at
    /// most one batch ahead of it. A command that cannot be queued is discarded before the
    /// error is returned.
    pub fn enqueue(&self, command: Command) -> Result<(), QueueError> {
        let shared = &*self.shared;
        let state = shared.lock();
        let mut state = shared
            .space_freed
            .wait_while(state, |s| {
                !shared.exit.load(Ordering::SeqCst)
                    && s.phase == WorkerPhase::IdleWaiting
                    && !s.pending.is_empty()
            })
            .unwrap_or_else(PoisonError::into_inner);

        let rejected = if shared.exit.load(Ordering::SeqCst) {
            Some(QueueError::ExitRequested)
        } else if state.phase == WorkerPhase::Stopped {
            Some(QueueError::WorkerStopped)
        } else {
            None
        };

        if let Some(err) = rejected {
            drop(state);
            debug!(command = %command.kind(), %err, "Command rejected");
            command.discard();
            return Err(err);
        }

        state.pending.push_back(command);
        drop(state);
        shared.data_available.notify_one();
        Ok(())
    }

    /// Asks the worker to stop and wakes every thread waiting on the queue.
    pub fn must_exit(&self) {
        {
            let _state = self.shared.lock();
            self.shared.exit.store(true, Ordering::SeqCst);
        }
        self.shared.data_available.notify_all();
        self.shared.space_freed.notify_all();
    }

    /// Waits for the worker thread to finish. Does nothing when called from the worker itself.
    pub fn join(&self) -> Result<(), QueueError> {
        let join = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match join {
            Some(join) if join.thread().id() != thread::current().id() => {
                join.join().map_err(|_| QueueError::WorkerPanicked)
            }
            _ => Ok(()),
        }
    }

    pub fn connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    pub fn error(&self) -> bool {
        self.shared.error.load(Ordering::SeqCst)
    }

    pub fn exit_requested(&self) -> bool {
        self.shared.exit.load(Ordering::SeqCst)
    }

    pub fn phase(&self) -> WorkerPhase {
        self.shared.lock().phase
    }

    pub fn pending(&self) -> usize {
        self.shared.lock().pending.len()
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn axis_ranges(&self) -> Option<AxisRanges> {
        self.shared.ranges.get().copied()
    }

    pub fn device_info(&self) -> Option<DeviceInfo> {
        self.shared.device.get().cloned()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.shared.profile.get().cloned()
    }

    /// Reason the session ended with an error, if it did.
    pub fn last_error(&self) -> Option<String> {
        self.shared
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_stats(&self) -> RequestStats {
        self.shared
            .stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for CommandQueue {
    fn drop(&mut self) {
        self.must_exit();
        if self.join().is_err() {
            warn!("Session worker panicked");
        }
        let pending = mem::take(&mut self.shared.lock().pending);
        for command in pending {
            command.discard();
        }
    }
}

/// Worker-side state. Dropping it closes the session, including when a hook panics.
struct Session<C: DeviceClient> {
    shared: Arc<Shared>,
    client: C,
}

impl<C: DeviceClient> Session<C> {
    fn serve(&mut self, policy: FailurePolicy) {
        let ranges = match self.initialize() {
            Ok(ranges) => ranges,
            Err(err) => {
                error!(%err, "Failed to initialize device session");
                self.shared.fail(format!("initialization failed: {err}"));
                return;
            }
        };

        {
            let _state = self.shared.lock();
            self.shared.connected.store(true, Ordering::SeqCst);
        }
        info!("Device session ready");

        while let Some(command) = self.next_command() {
            let span = info_span!("command", kind = command.kind().name());
            let _enter = span.enter();

            let request = command.kind().to_string();
            let started = Instant::now();
            let result = command.process(&mut DeviceContext {
                client: &mut self.client,
                ranges: &ranges,
            });
            self.shared.record_request(&request, started.elapsed());

            if let Err(err) = result {
                if policy.tolerates(&err) {
                    warn!(%err, request = %request, "Transient device error, continuing");
                    continue;
                }
                error!(%err, request = %request, "Command failed, closing session");
                self.shared.fail(format!("{request} failed: {err}"));
                break;
            }
        }
    }

    fn initialize(&mut self) -> Result<AxisRanges, DeviceError> {
        let started = Instant::now();

        let device = self.client.handshake()?;
        info!(%device, "Connected to device");

        let capabilities = self.client.get_capabilities()?;
        if capabilities.ptz_endpoint.is_none() {
            return Err(DeviceError::MissingCapability("PTZ"));
        }
        if capabilities.imaging_endpoint.is_none() {
            return Err(DeviceError::MissingCapability("imaging"));
        }
        let ranges = capabilities.ranges;
        for (axis, range) in [
            ("pan", ranges.pan),
            ("tilt", ranges.tilt),
            ("zoom", ranges.zoom),
        ] {
            if range.is_degenerate() {
                return Err(DeviceError::fault(
                    "InvalidRange",
                    format!("{axis} range [{}, {}] is empty", range.min, range.max),
                ));
            }
        }

        let profile = self.client.get_profile()?;
        debug!(
            profile = %profile.token,
            video_source = %profile.video_source_token,
            media = capabilities.media_endpoint.as_deref().unwrap_or("-"),
            "Using media profile"
        );

        self.shared.record_request("initialize", started.elapsed());
        let _ = self.shared.device.set(device);
        let _ = self.shared.profile.set(profile);
        let _ = self.shared.ranges.set(ranges);
        Ok(ranges)
    }

    /// Waits for work and returns the most recent pending command, discarding the rest.
    fn next_command(&self) -> Option<Command> {
        let shared = &*self.shared;
        let (latest, superseded) = {
            let mut state = shared.lock();
            state.phase = WorkerPhase::IdleWaiting;
            let mut state = shared
                .data_available
                .wait_while(state, |s| {
                    s.pending.is_empty() && !shared.exit.load(Ordering::SeqCst)
                })
                .unwrap_or_else(PoisonError::into_inner);
            if shared.exit.load(Ordering::SeqCst) {
                return None;
            }

            state.phase = WorkerPhase::Draining;
            let mut superseded = Vec::new();
            let mut latest = None;
            while let Some(command) = state.pending.pop_front() {
                if let Some(previous) = latest.replace(command) {
                    superseded.push(previous);
                }
            }
            state.phase = WorkerPhase::Executing;
            (latest, superseded)
        };
        shared.space_freed.notify_all();

        for command in superseded {
            debug!(command = %command.kind(), "Discarding superseded command");
            command.discard();
        }
        latest
    }
}

impl<C: DeviceClient> Drop for Session<C> {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("Session worker panicked");
            self.shared.fail("session worker panicked".to_string());
        }

        self.client.release();

        let pending = {
            let mut state = self.shared.lock();
            state.phase = WorkerPhase::Stopped;
            self.shared.connected.store(false, Ordering::SeqCst);
            mem::take(&mut state.pending)
        };
        self.shared.data_available.notify_all();
        self.shared.space_freed.notify_all();

        if !pending.is_empty() {
            debug!(count = pending.len(), "Dropping pending commands");
        }
        for command in pending {
            command.discard();
        }
        info!("Device session closed");
    }
}
