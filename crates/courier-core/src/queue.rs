//! Serial task queue.
//!
//! A [`SerialQueue`] runs a dynamically growing list of actions strictly one
//! at a time, in FIFO order. Each action receives a [`Continuation`] and must
//! resolve it to make progress:
//!
//! - [`Continuation::advance`] finishes the current action and starts the next one
//! - [`Continuation::halt`] stops the whole queue, discarding what is still pending
//!
//! The queue has no notion of wall-clock time. An action that never resolves
//! its continuation stalls the queue until someone calls [`SerialQueue::stop`]
//! (the dispatcher arms a watchdog for exactly this).
//!
//! ```text
//!   add(A) add(B) add(C)
//!     │
//!     ▼
//! ┌───────┐ advance ┌───────┐ advance ┌───────┐ halt ┌─────────┐
//! │   A   │────────▶│   B   │────────▶│   C   │─────▶│ stopped │──▶ finalizers
//! └───────┘         └───────┘         └───────┘      └─────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use courier_core::queue::{SerialQueue, StopReason};
//!
//! let queue = SerialQueue::new();
//! queue.on_finalize(|reason| assert_eq!(reason, StopReason::Halted));
//!
//! queue.add(|next| next.advance());
//! queue.add(|next| next.halt());
//!
//! assert!(queue.is_stopped());
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace};

/// A deferred unit of work held by a [`SerialQueue`].
pub type Action = Box<dyn FnOnce(Continuation) + Send + 'static>;

/// A callback invoked once when the queue stops.
pub type Finalizer = Box<dyn FnOnce(StopReason) + Send + 'static>;

/// Why a queue stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// Every action advanced and the final sentinel stopped the queue.
    Completed,
    /// An action halted the queue through its continuation.
    Halted,
    /// A watchdog stopped the queue because an action did not resolve in time.
    TimedOut,
    /// The queue was stopped from outside.
    Stopped,
}

impl StopReason {
    /// Returns the reason as a lowercase tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Halted => "halted",
            Self::TimedOut => "timed_out",
            Self::Stopped => "stopped",
        }
    }

    /// Returns `true` if the queue was stopped by a watchdog.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome an action reports back to its queue.
///
/// This is the tagged form of the two continuation calls:
/// `Continue` maps to [`Continuation::advance`], `Stop` to [`Continuation::halt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flow {
    /// Run the next action.
    #[default]
    Continue,
    /// Stop the queue; remaining actions never run.
    Stop,
}

// ============================================================================
// Queue state
// ============================================================================

struct QueueState {
    /// Actions that have not started yet.
    items: VecDeque<Action>,
    /// True from the first `run` until the queue drains or stops.
    running: bool,
    /// Set once; never cleared.
    stopped: Option<StopReason>,
    /// Ticket of the action currently executing, if any.
    in_flight: Option<u64>,
    /// True while a stack frame is inside the pump loop.
    pumping: bool,
    next_ticket: u64,
    finalizers: Vec<Finalizer>,
}

impl QueueState {
    fn new() -> Self {
        Self {
            items: VecDeque::new(),
            running: false,
            stopped: None,
            in_flight: None,
            pumping: false,
            next_ticket: 0,
            finalizers: Vec::new(),
        }
    }
}

// ============================================================================
// SerialQueue
// ============================================================================

/// A FIFO, single-flight queue of cooperative actions.
///
/// `SerialQueue` is a cheap handle around shared state; clones refer to the
/// same queue. The internal lock is never held while user code runs, so
/// actions and finalizers may freely call back into the queue.
#[derive(Clone)]
pub struct SerialQueue {
    state: Arc<Mutex<QueueState>>,
    label: Arc<str>,
}

impl Default for SerialQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::with_label("queue")
    }

    /// Creates an empty queue with a label used in log output.
    pub fn with_label(label: impl Into<Arc<str>>) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::new())),
            label: label.into(),
        }
    }

    /// Returns the label of this queue.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Appends an action and starts advancing if the queue is idle.
    pub fn add<F>(&self, action: F)
    where
        F: FnOnce(Continuation) + Send + 'static,
    {
        self.add_with(action, true);
    }

    /// Appends an action; advancement only begins if `auto_start` is set.
    ///
    /// Does nothing once the queue is stopped.
    pub fn add_with<F>(&self, action: F, auto_start: bool)
    where
        F: FnOnce(Continuation) + Send + 'static,
    {
        {
            let mut state = self.state.lock();
            if state.stopped.is_some() {
                trace!(queue = %self.label, "Ignoring action added to stopped queue");
                return;
            }
            state.items.push_back(Box::new(action));
        }

        if auto_start {
            self.run();
        }
    }

    /// Begins advancing if the queue is idle, not stopped and has pending work.
    pub fn run(&self) {
        {
            let mut state = self.state.lock();
            if state.stopped.is_some() || state.running || state.items.is_empty() {
                return;
            }
            state.running = true;
        }

        trace!(queue = %self.label, "Queue started");
        self.pump();
    }

    /// Stops the queue from outside with [`StopReason::Stopped`].
    pub fn stop(&self) {
        self.stop_with(StopReason::Stopped);
    }

    /// Stops the queue, discarding pending actions and running finalizers.
    ///
    /// Only the first call has any effect; the reason it carries is the one
    /// every finalizer observes.
    pub fn stop_with(&self, reason: StopReason) {
        let (discarded, finalizers) = {
            let mut state = self.state.lock();
            if state.stopped.is_some() {
                return;
            }
            state.stopped = Some(reason);
            state.running = false;
            state.in_flight = None;
            (
                std::mem::take(&mut state.items),
                std::mem::take(&mut state.finalizers),
            )
        };

        debug!(
            queue = %self.label,
            reason = %reason,
            discarded = discarded.len(),
            "Queue stopped"
        );

        // Dropped outside the lock: captured values may run arbitrary drop code.
        drop(discarded);

        for finalizer in finalizers {
            finalizer(reason);
        }
    }

    /// Registers a callback to run when the queue stops.
    ///
    /// If the queue has already stopped, the callback runs immediately with
    /// the recorded reason.
    pub fn on_finalize<F>(&self, finalizer: F)
    where
        F: FnOnce(StopReason) + Send + 'static,
    {
        let reason = {
            let mut state = self.state.lock();
            match state.stopped {
                Some(reason) => reason,
                None => {
                    state.finalizers.push(Box::new(finalizer));
                    return;
                }
            }
        };

        finalizer(reason);
    }

    /// Returns a future that resolves with the stop reason.
    ///
    /// If every handle to the queue is dropped without it ever stopping, the
    /// future resolves with [`StopReason::Stopped`].
    pub fn finished(&self) -> impl Future<Output = StopReason> + Send + 'static {
        let (tx, rx) = oneshot::channel();
        self.on_finalize(move |reason| {
            let _ = tx.send(reason);
        });
        async move { rx.await.unwrap_or(StopReason::Stopped) }
    }

    /// Returns `true` once the queue has stopped.
    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped.is_some()
    }

    /// Returns the stop reason, if the queue has stopped.
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.state.lock().stopped
    }

    /// Returns `true` while the queue is advancing.
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Returns the number of actions that have not started yet.
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Returns `true` if no actions are waiting to start.
    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Resolves the in-flight action identified by `ticket` and moves on.
    fn advance(&self, ticket: u64) {
        let should_pump = {
            let mut state = self.state.lock();
            if state.stopped.is_some() || state.in_flight != Some(ticket) {
                return;
            }
            state.in_flight = None;
            // A frame already inside the pump loop picks up the next item.
            !state.pumping
        };

        if should_pump {
            self.pump();
        }
    }

    /// Runs actions until one is left in flight, the queue drains, or it stops.
    ///
    /// Actions that advance synchronously are handled by this loop rather than
    /// by recursion, so long chains do not grow the stack.
    fn pump(&self) {
        loop {
            let (action, ticket) = {
                let mut state = self.state.lock();
                if state.stopped.is_some() || state.in_flight.is_some() {
                    state.pumping = false;
                    return;
                }
                let Some(action) = state.items.pop_front() else {
                    state.running = false;
                    state.pumping = false;
                    trace!(queue = %self.label, "Queue drained");
                    return;
                };
                let ticket = state.next_ticket;
                state.next_ticket += 1;
                state.in_flight = Some(ticket);
                state.pumping = true;
                (action, ticket)
            };

            trace!(queue = %self.label, ticket, "Running action");
            action(Continuation::new(self.clone(), ticket));
        }
    }
}

impl fmt::Debug for SerialQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SerialQueue")
            .field("label", &self.label)
            .field("pending", &state.items.len())
            .field("running", &state.running)
            .field("stopped", &state.stopped)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Continuation
// ============================================================================

/// The control handle passed to each action.
///
/// Both methods consume the handle, so an action resolves at most once.
/// Dropping a continuation without resolving it leaves the queue stalled
/// until it is stopped externally.
#[must_use = "an unresolved continuation stalls its queue"]
pub struct Continuation {
    queue: SerialQueue,
    ticket: u64,
    resolved: bool,
}

impl Continuation {
    fn new(queue: SerialQueue, ticket: u64) -> Self {
        Self {
            queue,
            ticket,
            resolved: false,
        }
    }

    /// Finishes the current action and starts the next one.
    pub fn advance(mut self) {
        self.resolved = true;
        self.queue.advance(self.ticket);
    }

    /// Stops the queue with [`StopReason::Halted`].
    pub fn halt(mut self) {
        self.resolved = true;
        self.queue.stop_with(StopReason::Halted);
    }

    /// Advances or halts according to `flow`.
    pub fn resolve(self, flow: Flow) {
        match flow {
            Flow::Continue => self.advance(),
            Flow::Stop => self.halt(),
        }
    }

    /// Returns `true` if the owning queue has already stopped.
    pub fn is_stopped(&self) -> bool {
        self.queue.is_stopped()
    }
}

impl Drop for Continuation {
    fn drop(&mut self) {
        if !self.resolved && !self.queue.is_stopped() {
            debug!(
                queue = %self.queue.label,
                ticket = self.ticket,
                "Continuation dropped without resolving, queue stalls until stopped"
            );
        }
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("queue", &self.queue.label)
            .field("ticket", &self.ticket)
            .finish()
    }
}
