//! Tests for the yielding iterator
//!
//! Covers ordering, early stop, fault delivery and the guarantee that no
//! callback runs inside the caller's turn.

use otter_nonblocking::{
    EventLoop, Fault, Flow, IterConfig, LoopConfig, LoopError, STOP, iterate, iterate_detached,
};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing_subscriber::filter::EnvFilter;

type Done = Arc<Mutex<Vec<Option<String>>>>;

/// Route crate logs to the test output; `RUST_LOG=otter_nonblocking=trace` shows every tick.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn recorder() -> (Done, impl FnOnce(Option<Fault>) + Send + 'static) {
    let done: Done = Arc::new(Mutex::new(Vec::new()));
    let done_clone = done.clone();
    let callback = move |fault: Option<Fault>| {
        done_clone.lock().push(fault.map(|f| f.to_string()));
    };
    (done, callback)
}

#[test]
fn test_can_stop_early() {
    let event_loop = EventLoop::new();
    let max = Arc::new(AtomicUsize::new(0));
    let (done, on_complete) = recorder();

    let max_clone = max.clone();
    iterate(
        &event_loop,
        1,
        100,
        move |i| {
            max_clone.store(i, Ordering::Relaxed);
            if i == 3 { STOP } else { Flow::Continue }
        },
        on_complete,
    );

    event_loop.run_until_idle().unwrap();
    assert_eq!(max.load(Ordering::Relaxed), 3);
    assert_eq!(*done.lock(), vec![None]);
}

#[test]
fn test_traps_errors() {
    init_tracing();
    let event_loop = EventLoop::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let (done, on_complete) = recorder();

    let calls_clone = calls.clone();
    iterate(
        &event_loop,
        1,
        100,
        move |_| -> anyhow::Result<()> {
            calls_clone.fetch_add(1, Ordering::Relaxed);
            anyhow::bail!("oops")
        },
        on_complete,
    );

    event_loop.run_until_idle().unwrap();
    assert_eq!(calls.load(Ordering::Relaxed), 1);
    assert_eq!(*done.lock(), vec![Some("oops".to_string())]);
}

#[test]
fn test_traps_panics() {
    init_tracing();
    let event_loop = EventLoop::new();
    let (done, on_complete) = recorder();

    iterate(
        &event_loop,
        0,
        10,
        |i| {
            if i == 4 {
                panic!("element {i} is broken");
            }
        },
        on_complete,
    );

    event_loop.run_until_idle().unwrap();
    assert_eq!(
        *done.lock(),
        vec![Some("callback panicked: element 4 is broken".to_string())]
    );
}

#[test]
fn test_fault_at_index_k() {
    for k in [1usize, 2, 50, 99] {
        let event_loop = EventLoop::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (done, on_complete) = recorder();

        let seen_clone = seen.clone();
        iterate(
            &event_loop,
            1,
            100,
            move |i| -> Result<(), Fault> {
                seen_clone.lock().push(i);
                if i == k {
                    return Err(Fault::msg("oops"));
                }
                Ok(())
            },
            on_complete,
        );

        event_loop.run_until_idle().unwrap();
        assert_eq!(*seen.lock(), (1..=k).collect::<Vec<_>>());
        assert_eq!(*done.lock(), vec![Some("oops".to_string())]);
    }
}

#[test]
fn test_does_not_call_fn_if_iterating_0_to_0() {
    let event_loop = EventLoop::new();
    let (done, on_complete) = recorder();

    iterate(
        &event_loop,
        0,
        0,
        |_| -> Result<(), Fault> { Err(Fault::msg("should not be called")) },
        on_complete,
    );

    assert_eq!(event_loop.run_until_idle().unwrap(), 1);
    assert_eq!(*done.lock(), vec![None]);
}

#[test]
fn test_no_callback_runs_in_caller_turn() {
    let event_loop = EventLoop::new();
    let initiated = Arc::new(AtomicBool::new(false));
    let observed = Arc::new(Mutex::new(Vec::new()));

    let flag = initiated.clone();
    let observed_tick = observed.clone();
    let flag_done = initiated.clone();
    let observed_done = observed.clone();
    iterate(
        &event_loop,
        0,
        2,
        move |_| observed_tick.lock().push(flag.load(Ordering::SeqCst)),
        move |_| observed_done.lock().push(flag_done.load(Ordering::SeqCst)),
    );
    initiated.store(true, Ordering::SeqCst);

    event_loop.run_until_idle().unwrap();
    assert_eq!(*observed.lock(), vec![true, true, true]);
}

#[test]
fn test_completion_after_stop_runs_on_later_turn() {
    let event_loop = EventLoop::new();
    let turns = Arc::new(Mutex::new(Vec::new()));

    let loop_tick = event_loop.clone();
    let turns_tick = turns.clone();
    let loop_done = event_loop.clone();
    let turns_done = turns.clone();
    iterate(
        &event_loop,
        0,
        10,
        move |_| {
            turns_tick.lock().push(("tick", loop_tick.current_turn()));
            STOP
        },
        move |_| turns_done.lock().push(("done", loop_done.current_turn())),
    );

    event_loop.run_until_idle().unwrap();
    assert_eq!(*turns.lock(), vec![("tick", 1), ("done", 2)]);
}

#[test]
fn test_completion_after_fault_runs_on_later_turn() {
    let event_loop = EventLoop::new();
    let turns = Arc::new(Mutex::new(Vec::new()));

    let loop_tick = event_loop.clone();
    let turns_tick = turns.clone();
    let loop_done = event_loop.clone();
    let turns_done = turns.clone();
    iterate(
        &event_loop,
        0,
        10,
        move |_| -> Result<(), Fault> {
            turns_tick.lock().push(("tick", loop_tick.current_turn()));
            Err(Fault::msg("oops"))
        },
        move |_| turns_done.lock().push(("done", loop_done.current_turn())),
    );

    event_loop.run_until_idle().unwrap();
    assert_eq!(*turns.lock(), vec![("tick", 1), ("done", 2)]);
}

#[test]
fn test_interleaves_with_other_iterations() {
    let event_loop = EventLoop::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    for name in ["a", "b"] {
        let order = order.clone();
        iterate(
            &event_loop,
            0,
            3,
            move |i| order.lock().push(format!("{name}{i}")),
            |_| {},
        );
    }

    event_loop.run_until_idle().unwrap();
    assert_eq!(*order.lock(), vec!["a0", "b0", "a1", "b1", "a2", "b2"]);
}

#[test]
fn test_detached_fault_is_reported_unhandled() {
    init_tracing();
    let event_loop = EventLoop::new();
    iterate_detached(&event_loop, 1, 100, |_| -> Result<(), Fault> {
        Err(Fault::msg("oops"))
    });

    let err = event_loop.run_until_idle().unwrap_err();
    assert!(matches!(err, LoopError::Unhandled(ref fault) if fault.to_string() == "oops"));
}

#[test]
fn test_detached_fault_reaches_handler() {
    init_tracing();
    let event_loop = EventLoop::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    event_loop.set_unhandled_fault_handler(move |fault| seen_clone.lock().push(fault.to_string()));

    iterate_detached(&event_loop, 0, 5, |i| -> Result<(), Fault> {
        if i == 2 {
            return Err(Fault::msg("oops"));
        }
        Ok(())
    });

    event_loop.run_until_idle().unwrap();
    assert_eq!(*seen.lock(), vec!["oops".to_string()]);
}

#[test]
fn test_detached_success_is_silent() {
    let event_loop = EventLoop::new();
    let count = Arc::new(AtomicUsize::new(0));
    let count_clone = count.clone();
    iterate_detached(&event_loop, 0, 5, move |_| {
        count_clone.fetch_add(1, Ordering::Relaxed);
    });

    event_loop.run_until_idle().unwrap();
    assert_eq!(count.load(Ordering::Relaxed), 5);
    assert!(event_loop.take_unhandled_faults().is_empty());
}

#[test]
fn test_loop_not_left_running_after_untrapped_panic() {
    let config = LoopConfig::new().iteration(IterConfig::new().catch_panics(false));
    let event_loop = EventLoop::with_config(config);
    iterate(&event_loop, 0, 3, |_| -> Flow { panic!("not trapped") }, |_| {});

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        event_loop.run_until_idle()
    }));
    assert!(outcome.is_err());
    assert!(!event_loop.is_running());
}

#[test]
#[should_panic(expected = "not trapped")]
fn test_untrapped_panic_unwinds_through_loop() {
    let config = LoopConfig::new().iteration(IterConfig::new().catch_panics(false));
    let event_loop = EventLoop::with_config(config);
    iterate(&event_loop, 0, 1, |_| -> Flow { panic!("not trapped") }, |_| {});
    let _ = event_loop.run_until_idle();
}

proptest! {
    #[test]
    fn prop_visits_every_index_once_in_order(limit in 0usize..200) {
        let event_loop = EventLoop::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (done, on_complete) = recorder();

        let seen_clone = seen.clone();
        iterate(&event_loop, 0, limit, move |i| seen_clone.lock().push(i), on_complete);

        let turns = event_loop.run_until_idle().unwrap();
        prop_assert_eq!(seen.lock().clone(), (0..limit).collect::<Vec<_>>());
        prop_assert_eq!(done.lock().clone(), vec![None]);
        // One turn per index plus the finalizing turn
        prop_assert_eq!(turns, limit as u64 + 1);
    }

    #[test]
    fn prop_stop_at_k_visits_k_plus_one(limit in 1usize..200, k_seed in any::<usize>()) {
        let k = k_seed % limit;
        let event_loop = EventLoop::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let (done, on_complete) = recorder();

        let calls_clone = calls.clone();
        iterate(
            &event_loop,
            0,
            limit,
            move |i| {
                calls_clone.fetch_add(1, Ordering::Relaxed);
                if i == k { STOP } else { Flow::Continue }
            },
            on_complete,
        );

        event_loop.run_until_idle().unwrap();
        prop_assert_eq!(calls.load(Ordering::Relaxed), k + 1);
        prop_assert_eq!(done.lock().clone(), vec![None]);
    }

    #[test]
    fn prop_batches_preserve_order(limit in 0usize..100, batch in 1usize..16) {
        let config = LoopConfig::new().iteration(IterConfig::batched(batch));
        let event_loop = EventLoop::with_config(config);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = seen.clone();
        iterate(&event_loop, 0, limit, move |i| seen_clone.lock().push(i), |_| {});

        let turns = event_loop.run_until_idle().unwrap();
        prop_assert_eq!(seen.lock().clone(), (0..limit).collect::<Vec<_>>());
        prop_assert_eq!(turns, limit.div_ceil(batch) as u64 + 1);
    }
}
