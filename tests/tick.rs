use gyre::Reactor;

use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn test_ticks_run_in_fifo_order() {
    let mut reactor = Reactor::new();
    let log = Rc::new(RefCell::new(Vec::new()));

    for name in ["a", "b", "c"] {
        let log = log.clone();
        reactor.future_tick(move |_| {
            log.borrow_mut().push(name);
        });
    }

    reactor.run().unwrap();

    assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
}

#[test]
fn test_tick_enqueued_during_drain_waits_for_next_iteration() {
    let mut reactor = Reactor::new();
    let log = Rc::new(RefCell::new(Vec::new()));

    // Two ticks are queued before the loop starts. Each enqueues a
    // follow-up; the second also stops the loop. If the drain were
    // unbounded, the follow-ups would run in the same iteration and
    // survive the stop.
    let first = log.clone();
    reactor.future_tick(move |sched| {
        first.borrow_mut().push("a");

        let follow = first.clone();
        sched.future_tick(move |_| {
            follow.borrow_mut().push("a2");
        });
    });

    let second = log.clone();
    reactor.future_tick(move |sched| {
        second.borrow_mut().push("b");

        let follow = second.clone();
        sched.future_tick(move |_| {
            follow.borrow_mut().push("b2");
        });

        sched.stop();
    });

    reactor.run().unwrap();

    assert_eq!(
        *log.borrow(),
        vec!["a", "b"],
        "Ticks enqueued during a drain belong to the next iteration"
    );

    // The queue persists across runs; resuming dispatches the
    // follow-ups in the order they were enqueued.
    reactor.run().unwrap();

    assert_eq!(*log.borrow(), vec!["a", "b", "a2", "b2"]);
}

#[test]
fn test_tick_runs_before_zero_interval_timer() {
    let mut reactor = Reactor::new();
    let log = Rc::new(RefCell::new(Vec::new()));

    let timer = log.clone();
    reactor.add_timer(std::time::Duration::ZERO, move |_, _| {
        timer.borrow_mut().push("timer");
    });

    let tick = log.clone();
    reactor.future_tick(move |_| {
        tick.borrow_mut().push("tick");
    });

    reactor.run().unwrap();

    assert_eq!(
        *log.borrow(),
        vec!["tick", "timer"],
        "Ticks drain at the start of the iteration, timers fire after the poll"
    );
}

#[test]
fn test_tick_can_schedule_a_timer() {
    let mut reactor = Reactor::new();
    let log = Rc::new(RefCell::new(Vec::new()));

    let outer = log.clone();
    reactor.future_tick(move |sched| {
        outer.borrow_mut().push("tick");

        let inner = outer.clone();
        sched.add_timer(std::time::Duration::from_millis(10), move |_, _| {
            inner.borrow_mut().push("timer");
        });
    });

    reactor.run().unwrap();

    assert_eq!(*log.borrow(), vec!["tick", "timer"]);
}
