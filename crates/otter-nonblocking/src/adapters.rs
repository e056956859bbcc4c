//! Collection adapters: `for_each`, `map`, `filter`, `some`, `every`.
//!
//! Each adapter snapshots the collection's indices or keys when called,
//! builds a per-index step over that domain and hands it to the yielding
//! iterator with `start = 0`. Elements removed before their turn are skipped;
//! `map` leaves `None` at their position so its output stays aligned with the
//! domain.
//! Faults are never handled here; the iterator traps and delivers them.

use std::sync::Arc;

use crate::collection::{Collection, Key, SharedCollection};
use crate::config::IterConfig;
use crate::error::Fault;
use crate::event_loop::Scheduler;
use crate::iter::{Flow, OnComplete, STOP, TickOutput, spawn};

/// Predicate results: a plain `bool`, or a `Result` that may fault.
pub trait Verdict {
    /// Convert into a decision or a fault
    fn into_verdict(self) -> Result<bool, Fault>;
}

impl Verdict for bool {
    #[inline]
    fn into_verdict(self) -> Result<bool, Fault> {
        Ok(self)
    }
}

impl<E: Into<Fault>> Verdict for Result<bool, E> {
    #[inline]
    fn into_verdict(self) -> Result<bool, Fault> {
        self.map_err(Into::into)
    }
}

/// Call `callback(value, key)` for every element still present when reached.
pub fn for_each<S, T, F, R, C>(
    scheduler: &Arc<S>,
    collection: &SharedCollection<T>,
    callback: F,
    on_complete: C,
) where
    S: Scheduler + ?Sized,
    T: Clone + Send + 'static,
    F: FnMut(T, Key) -> R + Send + 'static,
    R: TickOutput,
    C: FnOnce(Option<Fault>) + Send + 'static,
{
    let config = scheduler.iter_config();
    let on_complete: OnComplete<()> = Box::new(move |fault: Option<Fault>, ()| on_complete(fault));
    for_each_with(scheduler, &config, collection, callback, Some(on_complete));
}

/// [`for_each`] without a completion callback; faults are reported unhandled.
pub fn for_each_detached<S, T, F, R>(
    scheduler: &Arc<S>,
    collection: &SharedCollection<T>,
    callback: F,
) where
    S: Scheduler + ?Sized,
    T: Clone + Send + 'static,
    F: FnMut(T, Key) -> R + Send + 'static,
    R: TickOutput,
{
    let config = scheduler.iter_config();
    for_each_with(scheduler, &config, collection, callback, None);
}

/// Transform every present element.
///
/// The result has one slot per position of the domain taken at call time:
/// `out[i]` is `Some(transform(value))` for the element at position `i`, or
/// `None` if it was removed before its turn (or not reached before a fault).
pub fn map<S, T, U, F, C>(
    scheduler: &Arc<S>,
    collection: &SharedCollection<T>,
    transform: F,
    on_complete: C,
) where
    S: Scheduler + ?Sized,
    T: Clone + Send + 'static,
    U: Send + 'static,
    F: FnMut(T) -> U + Send + 'static,
    C: FnOnce(Option<Fault>, Vec<Option<U>>) + Send + 'static,
{
    let config = scheduler.iter_config();
    map_with(scheduler, &config, collection, transform, Box::new(on_complete));
}

/// [`map`] with a transform that may fail.
pub fn try_map<S, T, U, E, F, C>(
    scheduler: &Arc<S>,
    collection: &SharedCollection<T>,
    transform: F,
    on_complete: C,
) where
    S: Scheduler + ?Sized,
    T: Clone + Send + 'static,
    U: Send + 'static,
    E: Into<Fault>,
    F: FnMut(T) -> Result<U, E> + Send + 'static,
    C: FnOnce(Option<Fault>, Vec<Option<U>>) + Send + 'static,
{
    let config = scheduler.iter_config();
    try_map_with(scheduler, &config, collection, transform, Box::new(on_complete));
}

/// Keep the elements `predicate` accepts.
///
/// The result has the same kind as the input: a sequence of kept values, or
/// a mapping holding kept entries under their original keys.
pub fn filter<S, T, P, V, C>(
    scheduler: &Arc<S>,
    collection: &SharedCollection<T>,
    predicate: P,
    on_complete: C,
) where
    S: Scheduler + ?Sized,
    T: Clone + Send + 'static,
    P: FnMut(&T, &Key) -> V + Send + 'static,
    V: Verdict,
    C: FnOnce(Option<Fault>, Collection<T>) + Send + 'static,
{
    let config = scheduler.iter_config();
    filter_with(scheduler, &config, collection, predicate, Box::new(on_complete));
}

/// Whether any element satisfies `predicate`. Stops at the first match.
pub fn some<S, T, P, V, C>(
    scheduler: &Arc<S>,
    collection: &SharedCollection<T>,
    predicate: P,
    on_complete: C,
) where
    S: Scheduler + ?Sized,
    T: Clone + Send + 'static,
    P: FnMut(&T) -> V + Send + 'static,
    V: Verdict,
    C: FnOnce(Option<Fault>, bool) + Send + 'static,
{
    let config = scheduler.iter_config();
    some_with(scheduler, &config, collection, predicate, Box::new(on_complete));
}

/// Whether every element satisfies `predicate`. Stops at the first miss.
pub fn every<S, T, P, V, C>(
    scheduler: &Arc<S>,
    collection: &SharedCollection<T>,
    predicate: P,
    on_complete: C,
) where
    S: Scheduler + ?Sized,
    T: Clone + Send + 'static,
    P: FnMut(&T) -> V + Send + 'static,
    V: Verdict,
    C: FnOnce(Option<Fault>, bool) + Send + 'static,
{
    let config = scheduler.iter_config();
    every_with(scheduler, &config, collection, predicate, Box::new(on_complete));
}

pub(crate) fn for_each_with<S, T, F, R>(
    scheduler: &Arc<S>,
    config: &IterConfig,
    collection: &SharedCollection<T>,
    mut callback: F,
    on_complete: Option<OnComplete<()>>,
) where
    S: Scheduler + ?Sized,
    T: Clone + Send + 'static,
    F: FnMut(T, Key) -> R + Send + 'static,
    R: TickOutput,
{
    let collection = collection.clone();
    let domain = collection.domain();
    let limit = domain.len();

    spawn(
        scheduler,
        config,
        0,
        limit,
        (),
        move |_: &mut (), position| match collection.fetch(&domain, position) {
            Some((key, value)) => callback(value, key).into_tick(),
            None => Ok(Flow::Continue),
        },
        on_complete,
    );
}

pub(crate) fn map_with<S, T, U, F>(
    scheduler: &Arc<S>,
    config: &IterConfig,
    collection: &SharedCollection<T>,
    mut transform: F,
    on_complete: OnComplete<Vec<Option<U>>>,
) where
    S: Scheduler + ?Sized,
    T: Clone + Send + 'static,
    U: Send + 'static,
    F: FnMut(T) -> U + Send + 'static,
{
    let collection = collection.clone();
    let domain = collection.domain();
    let limit = domain.len();

    spawn(
        scheduler,
        config,
        0,
        limit,
        empty_slots(limit),
        move |out: &mut Vec<Option<U>>, position| {
            if let Some((_, value)) = collection.fetch(&domain, position) {
                out[position] = Some(transform(value));
            }
        },
        Some(on_complete),
    );
}

pub(crate) fn try_map_with<S, T, U, E, F>(
    scheduler: &Arc<S>,
    config: &IterConfig,
    collection: &SharedCollection<T>,
    mut transform: F,
    on_complete: OnComplete<Vec<Option<U>>>,
) where
    S: Scheduler + ?Sized,
    T: Clone + Send + 'static,
    U: Send + 'static,
    E: Into<Fault>,
    F: FnMut(T) -> Result<U, E> + Send + 'static,
{
    let collection = collection.clone();
    let domain = collection.domain();
    let limit = domain.len();

    spawn(
        scheduler,
        config,
        0,
        limit,
        empty_slots(limit),
        move |out: &mut Vec<Option<U>>, position| -> Result<(), Fault> {
            if let Some((_, value)) = collection.fetch(&domain, position) {
                out[position] = Some(transform(value).map_err(Into::into)?);
            }
            Ok(())
        },
        Some(on_complete),
    );
}

/// One `None` per domain position; no `Clone` bound on `U`.
fn empty_slots<U>(len: usize) -> Vec<Option<U>> {
    std::iter::repeat_with(|| None).take(len).collect()
}

pub(crate) fn filter_with<S, T, P, V>(
    scheduler: &Arc<S>,
    config: &IterConfig,
    collection: &SharedCollection<T>,
    mut predicate: P,
    on_complete: OnComplete<Collection<T>>,
) where
    S: Scheduler + ?Sized,
    T: Clone + Send + 'static,
    P: FnMut(&T, &Key) -> V + Send + 'static,
    V: Verdict,
{
    let collection = collection.clone();
    let domain = collection.domain();
    let limit = domain.len();
    let out = collection.empty_like();

    spawn(
        scheduler,
        config,
        0,
        limit,
        out,
        move |out: &mut Collection<T>, position| -> Result<(), Fault> {
            if let Some((key, value)) = collection.fetch(&domain, position)
                && predicate(&value, &key).into_verdict()?
            {
                out.insert(key, value);
            }
            Ok(())
        },
        Some(on_complete),
    );
}

pub(crate) fn some_with<S, T, P, V>(
    scheduler: &Arc<S>,
    config: &IterConfig,
    collection: &SharedCollection<T>,
    mut predicate: P,
    on_complete: OnComplete<bool>,
) where
    S: Scheduler + ?Sized,
    T: Clone + Send + 'static,
    P: FnMut(&T) -> V + Send + 'static,
    V: Verdict,
{
    let collection = collection.clone();
    let domain = collection.domain();
    let limit = domain.len();

    spawn(
        scheduler,
        config,
        0,
        limit,
        false,
        move |found: &mut bool, position| -> Result<Flow, Fault> {
            if let Some((_, value)) = collection.fetch(&domain, position)
                && predicate(&value).into_verdict()?
            {
                *found = true;
                return Ok(STOP);
            }
            Ok(Flow::Continue)
        },
        Some(on_complete),
    );
}

pub(crate) fn every_with<S, T, P, V>(
    scheduler: &Arc<S>,
    config: &IterConfig,
    collection: &SharedCollection<T>,
    mut predicate: P,
    on_complete: OnComplete<bool>,
) where
    S: Scheduler + ?Sized,
    T: Clone + Send + 'static,
    P: FnMut(&T) -> V + Send + 'static,
    V: Verdict,
{
    let collection = collection.clone();
    let domain = collection.domain();
    let limit = domain.len();

    spawn(
        scheduler,
        config,
        0,
        limit,
        true,
        move |all: &mut bool, position| -> Result<Flow, Fault> {
            if let Some((_, value)) = collection.fetch(&domain, position)
                && !predicate(&value).into_verdict()?
            {
                *all = false;
                return Ok(STOP);
            }
            Ok(Flow::Continue)
        },
        Some(on_complete),
    );
}
