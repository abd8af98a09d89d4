//! Single-consumer channel that folds every payload queued between two wake-ups into one value.
//!
//! Producers call [`ChannelHandle::push`] and never block on the consumer. The worker thread
//! swaps the whole pending queue out under the lock, folds it with the reducer and calls the
//! handler without holding the lock, so the handler may push again or take as long as it needs.

use std::{
    collections::VecDeque,
    io,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread::{self, JoinHandle},
};

use tracing::{debug, trace, warn};

struct State<P> {
    pending: VecDeque<P>,
    paused: bool,
    closed: bool,
}

struct Shared<P> {
    state: Mutex<State<P>>,
    wake: Condvar,
}

impl<P> Shared<P> {
    fn lock(&self) -> MutexGuard<'_, State<P>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cloneable producer side of a [`CoalescingChannel`].
pub struct ChannelHandle<P> {
    shared: Arc<Shared<P>>,
}

impl<P> Clone for ChannelHandle<P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P> ChannelHandle<P> {
    pub fn push(&self, payload: P) {
        {
            let mut state = self.shared.lock();
            if state.closed {
                trace!("Dropping payload pushed after shutdown");
                return;
            }
            state.pending.push_back(payload);
        }
        self.shared.wake.notify_all();
    }

    /// Holds back the next delivery. A delivery already in progress is not affected.
    pub fn pause(&self) {
        self.shared.lock().paused = true;
    }

    pub fn resume(&self) {
        self.shared.lock().paused = false;
        self.shared.wake.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        self.shared.lock().paused
    }

    pub fn pending(&self) -> usize {
        self.shared.lock().pending.len()
    }

    fn close(&self) {
        self.shared.lock().closed = true;
        self.shared.wake.notify_all();
    }
}

pub struct CoalescingChannel<P> {
    name: String,
    handle: ChannelHandle<P>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<P: Send + 'static> CoalescingChannel<P> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handle: ChannelHandle {
                shared: Arc::new(Shared {
                    state: Mutex::new(State {
                        pending: VecDeque::new(),
                        paused: false,
                        closed: false,
                    }),
                    wake: Condvar::new(),
                }),
            },
            worker: Mutex::new(None),
        }
    }

    pub fn handle(&self) -> ChannelHandle<P> {
        self.handle.clone()
    }

    pub fn push(&self, payload: P) {
        self.handle.push(payload);
    }

    pub fn pause(&self) {
        self.handle.pause();
    }

    pub fn resume(&self) {
        self.handle.resume();
    }

    pub fn is_paused(&self) -> bool {
        self.handle.is_paused()
    }

    /// Starts the worker thread.
    ///
    /// Each batch is folded starting from `M::default()`: `reducer(acc, payload)` is applied
    /// to every payload in arrival order and `handler` receives the result. Payloads pushed
    /// before `run` form the first batch.
    pub fn run<M, R, H>(&self, reducer: R, mut handler: H) -> io::Result<()>
    where
        M: Default,
        R: Fn(M, P) -> M + Send + 'static,
        H: FnMut(M) + Send + 'static,
    {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("channel '{}' is already running", self.name),
            ));
        }

        let shared = Arc::clone(&self.handle.shared);
        let name = self.name.clone();
        let join = thread::Builder::new()
            .name(format!("coalesce-{}", self.name))
            .spawn(move || {
                debug!(channel = %name, "Coalescing worker started");
                loop {
                    let batch = {
                        let state = shared.lock();
                        let mut state = shared
                            .wake
                            .wait_while(state, |s| {
                                !s.closed && (s.pending.is_empty() || s.paused)
                            })
                            .unwrap_or_else(PoisonError::into_inner);
                        if state.closed {
                            if !state.pending.is_empty() {
                                warn!(
                                    channel = %name,
                                    dropped = state.pending.len(),
                                    "Dropping pending payloads on shutdown"
                                );
                            }
                            break;
                        }
                        std::mem::take(&mut state.pending)
                    };

                    trace!(channel = %name, batch = batch.len(), "Processing batch");
                    let merged = batch.into_iter().fold(M::default(), &reducer);
                    handler(merged);
                }
                debug!(channel = %name, "Coalescing worker stopped");
            })?;

        *worker = Some(join);
        Ok(())
    }

    /// Stops the worker and waits for it unless called from the worker itself.
    pub fn shutdown(&self) {
        self.handle.close();
        let join = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(join) = join {
            if join.thread().id() == thread::current().id() {
                return;
            }
            if join.join().is_err() {
                warn!(channel = %self.name, "Coalescing worker panicked");
            }
        }
    }
}

impl<P> Drop for CoalescingChannel<P> {
    fn drop(&mut self) {
        self.handle.close();
        let join = self
            .worker
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(join) = join {
            if join.thread().id() != thread::current().id() {
                let _ = join.join();
            }
        }
    }
}
