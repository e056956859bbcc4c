//! Collection binder.
//!
//! [`bind`] pairs a scheduler with a collection so the adapters can be called
//! with just a callback and a completion.

use std::sync::Arc;

use crate::adapters::{
    Verdict, every_with, filter_with, for_each_with, map_with, some_with, try_map_with,
};
use crate::collection::{Collection, Key, SharedCollection};
use crate::config::IterConfig;
use crate::error::Fault;
use crate::event_loop::{EventLoop, Scheduler};
use crate::iter::{OnComplete, TickOutput};

/// Adapters pre-bound to one collection and one scheduler.
pub struct Nonblocking<T, S: ?Sized = EventLoop> {
    scheduler: Arc<S>,
    collection: SharedCollection<T>,
    config: Option<IterConfig>,
}

/// Bind `collection` to `scheduler`.
///
/// ```
/// use otter_nonblocking::{EventLoop, bind};
///
/// let event_loop = EventLoop::new();
/// let numbers = bind(&event_loop, vec![1, 2, 3]);
/// numbers.map(|x| x * 2, |fault, doubled| {
///     assert!(fault.is_none());
///     assert_eq!(doubled, vec![Some(2), Some(4), Some(6)]);
/// });
/// event_loop.run_until_idle().unwrap();
/// ```
pub fn bind<S, T>(scheduler: &Arc<S>, collection: impl Into<SharedCollection<T>>) -> Nonblocking<T, S>
where
    S: Scheduler + ?Sized,
{
    Nonblocking {
        scheduler: Arc::clone(scheduler),
        collection: collection.into(),
        config: None,
    }
}

impl<T, S> Nonblocking<T, S>
where
    S: Scheduler + ?Sized,
    T: Clone + Send + 'static,
{
    /// Use `config` instead of the scheduler's default for iterations started here.
    pub fn with_config(mut self, config: IterConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// The bound collection; mutations are seen by in-flight iterations.
    pub fn collection(&self) -> &SharedCollection<T> {
        &self.collection
    }

    /// The bound scheduler
    pub fn scheduler(&self) -> &Arc<S> {
        &self.scheduler
    }

    fn config(&self) -> IterConfig {
        self.config
            .unwrap_or_else(|| self.scheduler.iter_config())
    }

    /// See [`for_each`](crate::for_each)
    pub fn for_each<F, R, C>(&self, callback: F, on_complete: C)
    where
        F: FnMut(T, Key) -> R + Send + 'static,
        R: TickOutput,
        C: FnOnce(Option<Fault>) + Send + 'static,
    {
        let on_complete: OnComplete<()> =
            Box::new(move |fault: Option<Fault>, ()| on_complete(fault));
        for_each_with(
            &self.scheduler,
            &self.config(),
            &self.collection,
            callback,
            Some(on_complete),
        );
    }

    /// See [`for_each_detached`](crate::for_each_detached)
    pub fn for_each_detached<F, R>(&self, callback: F)
    where
        F: FnMut(T, Key) -> R + Send + 'static,
        R: TickOutput,
    {
        for_each_with(&self.scheduler, &self.config(), &self.collection, callback, None);
    }

    /// See [`map`](crate::map)
    pub fn map<U, F, C>(&self, transform: F, on_complete: C)
    where
        U: Send + 'static,
        F: FnMut(T) -> U + Send + 'static,
        C: FnOnce(Option<Fault>, Vec<Option<U>>) + Send + 'static,
    {
        map_with(
            &self.scheduler,
            &self.config(),
            &self.collection,
            transform,
            Box::new(on_complete),
        );
    }

    /// See [`try_map`](crate::try_map)
    pub fn try_map<U, E, F, C>(&self, transform: F, on_complete: C)
    where
        U: Send + 'static,
        E: Into<Fault>,
        F: FnMut(T) -> Result<U, E> + Send + 'static,
        C: FnOnce(Option<Fault>, Vec<Option<U>>) + Send + 'static,
    {
        try_map_with(
            &self.scheduler,
            &self.config(),
            &self.collection,
            transform,
            Box::new(on_complete),
        );
    }

    /// See [`filter`](crate::filter)
    pub fn filter<P, V, C>(&self, predicate: P, on_complete: C)
    where
        P: FnMut(&T, &Key) -> V + Send + 'static,
        V: Verdict,
        C: FnOnce(Option<Fault>, Collection<T>) + Send + 'static,
    {
        filter_with(
            &self.scheduler,
            &self.config(),
            &self.collection,
            predicate,
            Box::new(on_complete),
        );
    }

    /// See [`some`](crate::some)
    pub fn some<P, V, C>(&self, predicate: P, on_complete: C)
    where
        P: FnMut(&T) -> V + Send + 'static,
        V: Verdict,
        C: FnOnce(Option<Fault>, bool) + Send + 'static,
    {
        some_with(
            &self.scheduler,
            &self.config(),
            &self.collection,
            predicate,
            Box::new(on_complete),
        );
    }

    /// See [`every`](crate::every)
    pub fn every<P, V, C>(&self, predicate: P, on_complete: C)
    where
        P: FnMut(&T) -> V + Send + 'static,
        V: Verdict,
        C: FnOnce(Option<Fault>, bool) + Send + 'static,
    {
        every_with(
            &self.scheduler,
            &self.config(),
            &self.collection,
            predicate,
            Box::new(on_complete),
        );
    }
}

impl<T, S: ?Sized> Clone for Nonblocking<T, S> {
    fn clone(&self) -> Self {
        Self {
            scheduler: Arc::clone(&self.scheduler),
            collection: self.collection.clone(),
            config: self.config,
        }
    }
}

impl<T: std::fmt::Debug, S: ?Sized> std::fmt::Debug for Nonblocking<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Nonblocking")
            .field("collection", &self.collection)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
