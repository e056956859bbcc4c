//! Event loop implementation
//!
//! Single-threaded cooperative loop built around a FIFO immediate queue.
//! Each turn runs the immediates that were queued before the turn began;
//! anything scheduled while the turn runs waits for the next turn. That is
//! the "next tick" the iterators in this crate rely on.

use crate::config::{IterConfig, LoopConfig};
use crate::error::{Fault, LoopError, LoopResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{error, trace, warn};

/// Boxed task queued for a later turn
pub type Task = Box<dyn FnOnce() + Send>;

/// Hook receiving faults that had no completion callback
pub type UnhandledFaultHandler = Arc<dyn Fn(Fault) + Send + Sync>;

/// What an iteration needs from its host.
pub trait Scheduler: Send + Sync + 'static {
    /// Run `task` on a later turn, after the current call stack has unwound.
    fn schedule(&self, task: Task);

    /// Surface a fault nobody is waiting for.
    fn report_unhandled(&self, fault: Fault);

    /// Default settings for iterations started against this scheduler.
    fn iter_config(&self) -> IterConfig {
        IterConfig::default()
    }
}

/// Immediate identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImmediateId(pub u64);

struct Immediate {
    id: ImmediateId,
    callback: Option<Task>,
    cancelled: AtomicBool,
}

/// Event loop for cooperative, turn-based execution
pub struct EventLoop {
    /// Immediate queue (FIFO)
    immediates: Mutex<VecDeque<Immediate>>,
    /// Next immediate ID
    next_immediate_id: AtomicU64,
    /// Is running
    running: AtomicBool,
    /// Turns run since creation
    turn: AtomicU64,
    /// Faults reported without a handler, returned by the run loop
    unhandled: Mutex<VecDeque<Fault>>,
    unhandled_handler: Mutex<Option<UnhandledFaultHandler>>,
    config: LoopConfig,
}

impl EventLoop {
    /// Create a new event loop
    pub fn new() -> Arc<Self> {
        Self::with_config(LoopConfig::default())
    }

    /// Create a new event loop with explicit settings
    pub fn with_config(config: LoopConfig) -> Arc<Self> {
        Arc::new(Self {
            immediates: Mutex::new(VecDeque::new()),
            next_immediate_id: AtomicU64::new(1),
            running: AtomicBool::new(false),
            turn: AtomicU64::new(0),
            unhandled: Mutex::new(VecDeque::new()),
            unhandled_handler: Mutex::new(None),
            config,
        })
    }

    /// Loop settings
    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Schedule an immediate callback (setImmediate)
    pub fn schedule_immediate<F>(&self, callback: F) -> ImmediateId
    where
        F: FnOnce() + Send + 'static,
    {
        self.push_immediate(Box::new(callback))
    }

    fn push_immediate(&self, callback: Task) -> ImmediateId {
        let id = ImmediateId(self.next_immediate_id.fetch_add(1, Ordering::Relaxed));
        self.immediates.lock().push_back(Immediate {
            id,
            callback: Some(callback),
            cancelled: AtomicBool::new(false),
        });
        id
    }

    /// Cancel an immediate by ID. Works for immediates due in the running turn.
    pub fn clear_immediate(&self, id: ImmediateId) -> bool {
        let immediates = self.immediates.lock();
        if let Some(imm) = immediates.iter().find(|i| i.id == id) {
            return !imm.cancelled.swap(true, Ordering::SeqCst);
        }
        false
    }

    /// Install a handler for faults that have no completion callback.
    ///
    /// Without a handler the run loop stops and returns the fault as
    /// [`LoopError::Unhandled`].
    pub fn set_unhandled_fault_handler<F>(&self, handler: F)
    where
        F: Fn(Fault) + Send + Sync + 'static,
    {
        *self.unhandled_handler.lock() = Some(Arc::new(handler));
    }

    /// Remove the unhandled-fault handler
    pub fn clear_unhandled_fault_handler(&self) {
        *self.unhandled_handler.lock() = None;
    }

    /// Take faults reported while no handler was installed
    pub fn take_unhandled_faults(&self) -> Vec<Fault> {
        self.unhandled.lock().drain(..).collect()
    }

    /// Number of queued, non-cancelled immediates
    pub fn pending_immediates(&self) -> usize {
        self.immediates
            .lock()
            .iter()
            .filter(|i| !i.cancelled.load(Ordering::Relaxed))
            .count()
    }

    /// Check if there are pending tasks that keep the loop alive
    pub fn has_pending_tasks(&self) -> bool {
        self.immediates
            .lock()
            .iter()
            .any(|i| !i.cancelled.load(Ordering::Relaxed))
    }

    /// Turns run since the loop was created
    pub fn current_turn(&self) -> u64 {
        self.turn.load(Ordering::Relaxed)
    }

    /// Whether a run loop is active
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one turn: every immediate queued before the turn began, in FIFO order.
    ///
    /// Returns the number of callbacks run.
    pub fn run_turn(&self) -> usize {
        let turn = self.turn.fetch_add(1, Ordering::Relaxed) + 1;
        let due = self.immediates.lock().len();
        let mut ran = 0;

        for _ in 0..due {
            // Lock is released before the callback runs so it can schedule more work
            let Some(mut immediate) = self.immediates.lock().pop_front() else {
                break;
            };
            if immediate.cancelled.load(Ordering::SeqCst) {
                continue;
            }
            if let Some(cb) = immediate.callback.take() {
                cb();
                ran += 1;
            }
        }

        trace!(turn, due, ran, "event loop turn");
        ran
    }

    /// Stop the event loop after the current turn
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Decide whether another turn should run.
    fn should_continue(&self, turns: u64) -> Option<LoopResult<u64>> {
        if !self.running.load(Ordering::Acquire) || !self.has_pending_tasks() {
            return Some(Ok(turns));
        }
        if let Some(max) = self.config.max_turns
            && turns >= max
        {
            warn!(max, pending = self.pending_immediates(), "event loop turn limit reached");
            return Some(Err(LoopError::TurnLimit(max)));
        }
        None
    }

    fn pop_unhandled(&self) -> Option<LoopError> {
        self.unhandled.lock().pop_front().map(LoopError::Unhandled)
    }

    /// Run turns until no tasks remain.
    ///
    /// Returns the number of turns run.
    pub fn run_until_idle(&self) -> LoopResult<u64> {
        let _running = RunningGuard::enter(&self.running);
        let mut turns = 0;

        let result = loop {
            if let Some(done) = self.should_continue(turns) {
                break done;
            }
            self.run_turn();
            turns += 1;
            if let Some(err) = self.pop_unhandled() {
                break Err(err);
            }
        };

        result
    }

    /// Run the event loop asynchronously with tokio
    ///
    /// Yields to tokio between turns so futures awaiting completions, and other
    /// tasks on the same runtime, make progress.
    pub async fn run_until_complete_async(&self) -> LoopResult<u64> {
        let _running = RunningGuard::enter(&self.running);
        let mut turns = 0;

        let result = loop {
            if let Some(done) = self.should_continue(turns) {
                break done;
            }
            self.run_turn();
            turns += 1;
            if let Some(err) = self.pop_unhandled() {
                break Err(err);
            }
            tokio::task::yield_now().await;
        };

        result
    }
}

/// Marks the loop as running; cleared on drop, including when a task unwinds.
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Scheduler for EventLoop {
    fn schedule(&self, task: Task) {
        self.push_immediate(task);
    }

    fn report_unhandled(&self, fault: Fault) {
        error!(%fault, turn = self.current_turn(), "unhandled iteration fault");
        let handler = self.unhandled_handler.lock().clone();
        match handler {
            Some(handler) => handler(fault),
            None => self.unhandled.lock().push_back(fault),
        }
    }

    fn iter_config(&self) -> IterConfig {
        self.config.iteration
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("pending_immediates", &self.pending_immediates())
            .field("turn", &self.current_turn())
            .field("running", &self.is_running())
            .field("config", &self.config)
            .finish()
    }
}
