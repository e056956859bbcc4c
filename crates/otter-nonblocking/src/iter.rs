//! Yielding iterator
//!
//! Drives an index from `start` to `limit`, one scheduler tick per step.
//! Every tick is queued through [`Scheduler::schedule`], the first one
//! included, so nothing runs inside the caller's turn. A callback can end
//! the iteration early by returning [`STOP`]; a fault it raises is trapped
//! and delivered to the completion callback on the following tick.
//!
//! ```text
//! Pending ─▶ Running ─┬─▶ StoppedEarly ─┐
//!                     ├─▶ Exhausted ────┼─▶ Done (completion runs)
//!                     └─▶ Faulted ──────┘
//! ```

use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::IterConfig;
use crate::error::Fault;
use crate::event_loop::Scheduler;
use crate::trap::{FaultSlot, trap};

/// What a per-index callback asks the iterator to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flow {
    /// Keep going
    Continue,
    /// Halt without a fault
    Stop,
}

/// Early-termination sentinel.
pub const STOP: Flow = Flow::Stop;

/// Values a per-index callback may return.
///
/// `()` and [`Flow`] never fault; `Result` turns its error into a [`Fault`].
pub trait TickOutput {
    /// Convert into the iterator's view of one step
    fn into_tick(self) -> Result<Flow, Fault>;
}

impl TickOutput for () {
    #[inline]
    fn into_tick(self) -> Result<Flow, Fault> {
        Ok(Flow::Continue)
    }
}

impl TickOutput for Flow {
    #[inline]
    fn into_tick(self) -> Result<Flow, Fault> {
        Ok(self)
    }
}

impl<T, E> TickOutput for Result<T, E>
where
    T: TickOutput,
    E: Into<Fault>,
{
    #[inline]
    fn into_tick(self) -> Result<Flow, Fault> {
        self.map_err(Into::into).and_then(TickOutput::into_tick)
    }
}

/// Lifecycle of one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterState {
    /// Created, first tick not run yet
    Pending,
    /// Cursor advancing
    Running,
    /// A callback returned [`STOP`]
    StoppedEarly,
    /// Index reached the limit
    Exhausted,
    /// A callback raised a fault
    Faulted,
    /// Completion delivered
    Done,
}

/// Boxed completion receiving the fault, if any, and the final state value.
pub type OnComplete<A> = Box<dyn FnOnce(Option<Fault>, A) + Send>;

/// Iteration cursor, moved from tick to tick.
struct Cursor<A, F> {
    start: usize,
    index: usize,
    limit: usize,
    state: IterState,
    slot: FaultSlot,
    value: A,
    per_index: F,
    on_complete: Option<OnComplete<A>>,
    config: IterConfig,
}

/// Iterate `start..limit`, one index per tick, reporting completion once.
///
/// `per_index` receives the index; returning [`STOP`] ends the iteration
/// early. `on_complete` runs on a later tick with the fault, if one was
/// raised.
pub fn iterate<S, F, R, C>(
    scheduler: &Arc<S>,
    start: usize,
    limit: usize,
    mut per_index: F,
    on_complete: C,
) where
    S: Scheduler + ?Sized,
    F: FnMut(usize) -> R + Send + 'static,
    R: TickOutput,
    C: FnOnce(Option<Fault>) + Send + 'static,
{
    let config = scheduler.iter_config();
    let on_complete: OnComplete<()> = Box::new(move |fault: Option<Fault>, ()| on_complete(fault));
    spawn(
        scheduler,
        &config,
        start,
        limit,
        (),
        move |_: &mut (), index| per_index(index),
        Some(on_complete),
    );
}

/// Like [`iterate`] without a completion callback.
///
/// A fault is handed to [`Scheduler::report_unhandled`] on a fresh tick
/// instead of being dropped.
pub fn iterate_detached<S, F, R>(scheduler: &Arc<S>, start: usize, limit: usize, mut per_index: F)
where
    S: Scheduler + ?Sized,
    F: FnMut(usize) -> R + Send + 'static,
    R: TickOutput,
{
    let config = scheduler.iter_config();
    spawn(
        scheduler,
        &config,
        start,
        limit,
        (),
        move |_: &mut (), index| per_index(index),
        None,
    );
}

/// Iterate with an owned state value threaded through every tick.
///
/// `per_index` gets `&mut state`; the state is moved into `on_complete`
/// exactly once. On a fault it holds whatever was accumulated so far.
#[allow(clippy::too_many_arguments)]
pub fn iterate_with_state<S, A, F, R, C>(
    scheduler: &Arc<S>,
    config: &IterConfig,
    start: usize,
    limit: usize,
    state: A,
    per_index: F,
    on_complete: C,
) where
    S: Scheduler + ?Sized,
    A: Send + 'static,
    F: FnMut(&mut A, usize) -> R + Send + 'static,
    R: TickOutput,
    C: FnOnce(Option<Fault>, A) + Send + 'static,
{
    let on_complete: OnComplete<A> = Box::new(on_complete);
    spawn(
        scheduler,
        config,
        start,
        limit,
        state,
        per_index,
        Some(on_complete),
    );
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn spawn<S, A, F, R>(
    scheduler: &Arc<S>,
    config: &IterConfig,
    start: usize,
    limit: usize,
    value: A,
    per_index: F,
    on_complete: Option<OnComplete<A>>,
) where
    S: Scheduler + ?Sized,
    A: Send + 'static,
    F: FnMut(&mut A, usize) -> R + Send + 'static,
    R: TickOutput,
{
    debug!(
        start,
        limit,
        batch_size = config.effective_batch(),
        detached = on_complete.is_none(),
        "starting iteration"
    );

    let cursor = Cursor {
        start,
        index: start,
        limit,
        state: IterState::Pending,
        slot: FaultSlot::new(),
        value,
        per_index,
        on_complete,
        config: *config,
    };
    schedule_tick(Arc::clone(scheduler), cursor);
}

fn schedule_tick<S, A, F, R>(scheduler: Arc<S>, cursor: Cursor<A, F>)
where
    S: Scheduler + ?Sized,
    A: Send + 'static,
    F: FnMut(&mut A, usize) -> R + Send + 'static,
    R: TickOutput,
{
    let next = Arc::clone(&scheduler);
    scheduler.schedule(Box::new(move || tick(next, cursor)));
}

fn tick<S, A, F, R>(scheduler: Arc<S>, mut cursor: Cursor<A, F>)
where
    S: Scheduler + ?Sized,
    A: Send + 'static,
    F: FnMut(&mut A, usize) -> R + Send + 'static,
    R: TickOutput,
{
    match cursor.state {
        IterState::StoppedEarly | IterState::Faulted | IterState::Exhausted => {
            return finish(scheduler.as_ref(), cursor);
        }
        IterState::Done => return,
        IterState::Pending | IterState::Running => {}
    }

    if cursor.index >= cursor.limit {
        cursor.state = IterState::Exhausted;
        return finish(scheduler.as_ref(), cursor);
    }

    cursor.state = IterState::Running;
    let first = cursor.index;

    for _ in 0..cursor.config.effective_batch() {
        let index = cursor.index;
        cursor.index += 1;

        let value = &mut cursor.value;
        let per_index = &mut cursor.per_index;
        let flow = trap(
            |i| per_index(value, i),
            index,
            &mut cursor.slot,
            cursor.config.catch_panics,
        );

        if cursor.slot.is_faulted() {
            cursor.state = IterState::Faulted;
            break;
        }
        if flow == Flow::Stop {
            cursor.state = IterState::StoppedEarly;
            break;
        }
        if cursor.index >= cursor.limit {
            break;
        }
    }

    trace!(first, next = cursor.index, limit = cursor.limit, state = ?cursor.state, "iteration tick");

    // Termination is only decided here; completion always runs on a later tick.
    schedule_tick(scheduler, cursor);
}

fn finish<S, A, F>(scheduler: &S, mut cursor: Cursor<A, F>)
where
    S: Scheduler + ?Sized,
{
    let outcome = std::mem::replace(&mut cursor.state, IterState::Done);
    let fault = cursor.slot.take();

    debug!(
        start = cursor.start,
        limit = cursor.limit,
        visited = cursor.index - cursor.start,
        outcome = ?outcome,
        "iteration complete"
    );

    match cursor.on_complete {
        Some(on_complete) => on_complete(fault, cursor.value),
        None => {
            if let Some(fault) = fault {
                scheduler.report_unhandled(fault);
            }
        }
    }
}
