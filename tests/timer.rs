use gyre::Reactor;

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

#[test]
fn test_timers_fire_in_deadline_order() {
    let mut reactor = Reactor::new();
    let log = Rc::new(RefCell::new(Vec::new()));

    let first = log.clone();
    reactor.add_timer(Duration::from_millis(30), move |_, _| {
        first.borrow_mut().push(1);
    });

    let second = log.clone();
    reactor.add_timer(Duration::from_millis(80), move |_, _| {
        second.borrow_mut().push(2);
    });

    reactor.run().unwrap();

    assert_eq!(
        *log.borrow(),
        vec![1, 2],
        "The earlier deadline should dispatch first"
    );
}

#[test]
fn test_zero_interval_timer_fires_once() {
    let mut reactor = Reactor::new();
    let fired = Rc::new(Cell::new(0));

    let count = fired.clone();
    reactor.add_timer(Duration::ZERO, move |_, _| {
        count.set(count.get() + 1);
    });

    reactor.run().unwrap();

    assert_eq!(fired.get(), 1, "A zero-interval timer fires exactly once");
}

#[test]
fn test_oneshot_inactive_inside_its_own_callback() {
    let mut reactor = Reactor::new();
    let checked = Rc::new(Cell::new(false));

    let flag = checked.clone();
    let handle = reactor.add_timer(Duration::from_millis(10), move |sched, handle| {
        assert!(
            !sched.is_timer_active(handle),
            "A one-shot timer is inactive the instant it fires"
        );
        flag.set(true);
    });

    assert!(reactor.is_timer_active(handle));

    reactor.run().unwrap();

    assert!(checked.get(), "Timer callback should have run");
    assert!(!reactor.is_timer_active(handle));
}

#[test]
fn test_cancel_is_idempotent() {
    let mut reactor = Reactor::new();

    let handle = reactor.add_timer(Duration::from_millis(50), |_, _| {
        panic!("A canceled timer must never fire");
    });

    reactor.cancel_timer(handle);
    assert!(!reactor.is_timer_active(handle));

    // Canceling again is a no-op, not an error.
    reactor.cancel_timer(handle);

    reactor.run().unwrap();
}

#[test]
fn test_periodic_cancels_itself() {
    let mut reactor = Reactor::new();
    let fired = Rc::new(Cell::new(0));

    let count = fired.clone();
    reactor.add_periodic_timer(Duration::from_millis(10), move |sched, handle| {
        count.set(count.get() + 1);
        sched.cancel_timer(handle);
        assert!(!sched.is_timer_active(handle));
    });

    reactor.run().unwrap();

    assert_eq!(
        fired.get(),
        1,
        "Canceling a periodic timer from its own callback stops it after the in-flight firing"
    );
}

#[test]
fn test_oneshot_cancels_periodic() {
    let mut reactor = Reactor::new();
    let fired = Rc::new(Cell::new(0u32));

    let count = fired.clone();
    let periodic = reactor.add_periodic_timer(Duration::from_millis(20), move |_, _| {
        count.set(count.get() + 1);
    });

    reactor.add_timer(Duration::from_millis(210), move |sched, _| {
        sched.cancel_timer(periodic);
    });

    reactor.run().unwrap();

    let fired = fired.get();
    assert!(
        (3..=11).contains(&fired),
        "Periodic timer should have fired roughly ten times, got {}",
        fired
    );
    assert!(!reactor.is_timer_active(periodic));
}

#[test]
fn test_handles_are_never_reused() {
    let mut reactor = Reactor::new();

    let first = reactor.add_timer(Duration::from_secs(1), |_, _| {});
    reactor.cancel_timer(first);

    // The new timer may land in the freed storage slot, but its handle
    // must still be distinguishable from the canceled one.
    let second = reactor.add_timer(Duration::from_secs(1), |_, _| {});

    assert_ne!(first, second);
    assert!(!reactor.is_timer_active(first));
    assert!(reactor.is_timer_active(second));

    reactor.cancel_timer(second);
    reactor.run().unwrap();
}

#[test]
fn test_callback_can_schedule_more_timers() {
    let mut reactor = Reactor::new();
    let log = Rc::new(RefCell::new(Vec::new()));

    let outer = log.clone();
    reactor.add_timer(Duration::from_millis(10), move |sched, _| {
        outer.borrow_mut().push("outer");

        let inner = outer.clone();
        sched.add_timer(Duration::from_millis(10), move |_, _| {
            inner.borrow_mut().push("inner");
        });
    });

    reactor.run().unwrap();

    assert_eq!(*log.borrow(), vec!["outer", "inner"]);
}

#[test]
#[should_panic(expected = "periodic timer interval must be non-zero")]
fn test_zero_interval_periodic_rejected() {
    let mut reactor = Reactor::new();
    reactor.add_periodic_timer(Duration::ZERO, |_, _| {});
}
