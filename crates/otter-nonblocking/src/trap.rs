//! Fault trap for per-index callbacks.
//!
//! A fault raised by a user callback must never cross the scheduler
//! boundary as an unwinding panic or an ignored `Err`. [`trap`] runs the
//! callback and parks whatever it raised in a [`FaultSlot`] so the iterator
//! can decide what to do on its own terms.

use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::error::Fault;
use crate::iter::{Flow, TickOutput};

/// Out-of-band holder for a fault raised during one invocation.
#[derive(Debug, Default)]
pub struct FaultSlot {
    fault: Option<Fault>,
}

impl FaultSlot {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a fault is held
    pub fn is_faulted(&self) -> bool {
        self.fault.is_some()
    }

    /// Borrow the held fault
    pub fn fault(&self) -> Option<&Fault> {
        self.fault.as_ref()
    }

    /// Take the held fault, leaving the slot empty
    pub fn take(&mut self) -> Option<Fault> {
        self.fault.take()
    }

    fn clear(&mut self) {
        self.fault = None;
    }
}

/// Invoke `f(arg)`, capturing any fault into `slot`.
///
/// The slot is cleared first. A returned error, or a panic when
/// `catch_panics` is set, is stored in the slot and reported as
/// [`Flow::Continue`]; the caller checks the slot before looking at the flow.
pub fn trap<A, R, F>(f: F, arg: A, slot: &mut FaultSlot, catch_panics: bool) -> Flow
where
    F: FnOnce(A) -> R,
    R: TickOutput,
{
    slot.clear();

    let outcome = if catch_panics {
        match catch_unwind(AssertUnwindSafe(|| f(arg).into_tick())) {
            Ok(outcome) => outcome,
            Err(payload) => Err(Fault::from_panic(payload)),
        }
    } else {
        f(arg).into_tick()
    };

    match outcome {
        Ok(flow) => flow,
        Err(fault) => {
            slot.fault = Some(fault);
            Flow::Continue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iter::STOP;

    #[test]
    fn test_passes_flow_through() {
        let mut slot = FaultSlot::new();
        assert_eq!(trap(|_: usize| STOP, 0, &mut slot, true), Flow::Stop);
        assert!(!slot.is_faulted());

        assert_eq!(trap(|_: usize| (), 0, &mut slot, true), Flow::Continue);
        assert!(!slot.is_faulted());
    }

    #[test]
    fn test_passes_argument() {
        let mut slot = FaultSlot::new();
        let mut seen = None;
        trap(|i: usize| seen = Some(i), 7, &mut slot, true);
        assert_eq!(seen, Some(7));
    }

    #[test]
    fn test_captures_error() {
        let mut slot = FaultSlot::new();
        let flow = trap(
            |_: usize| -> anyhow::Result<Flow> { Err(anyhow::anyhow!("oops")) },
            0,
            &mut slot,
            true,
        );
        assert_eq!(flow, Flow::Continue);
        assert_eq!(slot.fault().map(ToString::to_string).as_deref(), Some("oops"));
    }

    #[test]
    fn test_captures_panic() {
        let mut slot = FaultSlot::new();
        let flow = trap(|_: usize| -> Flow { panic!("boom") }, 0, &mut slot, true);
        assert_eq!(flow, Flow::Continue);
        assert!(slot.fault().is_some_and(Fault::is_panic));
    }

    #[test]
    fn test_clears_previous_fault() {
        let mut slot = FaultSlot::new();
        trap(|_: usize| Err::<(), _>(Fault::msg("first")), 0, &mut slot, true);
        assert!(slot.is_faulted());

        trap(|_: usize| (), 1, &mut slot, true);
        assert!(!slot.is_faulted());
        assert!(slot.take().is_none());
    }

    #[test]
    #[should_panic(expected = "boom")]
    fn test_panics_propagate_when_not_caught() {
        let mut slot = FaultSlot::new();
        trap(|_: usize| -> Flow { panic!("boom") }, 0, &mut slot, false);
    }
}
