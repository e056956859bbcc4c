//! # Otter Nonblocking
//!
//! Cooperative iteration over collections for the Otter event loop:
//! - `for_each`, `map`, `filter`, `some`, `every` that visit one element per
//!   event loop turn instead of running to completion synchronously
//! - A yielding iterator (`iterate`) with early stop via [`STOP`]
//! - Fault trapping: a failing or panicking callback ends the iteration and
//!   the fault is delivered to the completion callback on the next turn
//! - A binder ([`bind`]) exposing the adapters for one collection
//!
//! # Example
//!
//! ```
//! use otter_nonblocking::{EventLoop, STOP, iterate};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let event_loop = EventLoop::new();
//! let visited = Arc::new(AtomicUsize::new(0));
//!
//! let counter = visited.clone();
//! iterate(&event_loop, 0, 100, move |i| {
//!     counter.fetch_add(1, Ordering::Relaxed);
//!     if i == 9 { STOP } else { otter_nonblocking::Flow::Continue }
//! }, |fault| assert!(fault.is_none()));
//!
//! // Nothing runs until the loop turns
//! assert_eq!(visited.load(Ordering::Relaxed), 0);
//! event_loop.run_until_idle().unwrap();
//! assert_eq!(visited.load(Ordering::Relaxed), 10);
//! ```

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod adapters;
pub mod bind;
pub mod collection;
pub mod completion;
pub mod config;
pub mod error;
pub mod event_loop;
pub mod iter;
pub mod trap;

pub use adapters::{Verdict, every, filter, for_each, for_each_detached, map, some, try_map};
pub use bind::{Nonblocking, bind};
pub use collection::{Collection, Key, SharedCollection};
pub use completion::{Completion, completion, unit_completion};
pub use config::{IterConfig, LoopConfig};
pub use error::{Fault, LoopError, LoopResult};
pub use event_loop::{EventLoop, ImmediateId, Scheduler, Task, UnhandledFaultHandler};
pub use iter::{
    Flow, IterState, OnComplete, STOP, TickOutput, iterate, iterate_detached, iterate_with_state,
};
pub use trap::{FaultSlot, trap};

// Re-exported so callers can build mappings without naming the crate
pub use indexmap::IndexMap;
