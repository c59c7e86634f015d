#![cfg(unix)]

use gyre::{OsFd, Reactor};

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

fn pipe() -> (OsFd, OsFd) {
    let mut fds = [0; 2];
    let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
    assert_eq!(rc, 0, "pipe(2) failed");
    (fds[0], fds[1])
}

fn write_bytes(fd: OsFd, bytes: &[u8]) {
    let n = unsafe { libc::write(fd, bytes.as_ptr() as *const _, bytes.len()) };
    assert_eq!(n, bytes.len() as isize, "short write on test pipe");
}

fn read_bytes(fd: OsFd, buffer: &mut [u8]) -> usize {
    let n = unsafe { libc::read(fd, buffer.as_mut_ptr() as *mut _, buffer.len()) };
    assert!(n >= 0, "read on test pipe failed");
    n as usize
}

fn close(fd: OsFd) {
    unsafe { libc::close(fd) };
}

#[test]
fn test_read_watcher_fires_once_per_iteration() {
    let (rd, wr) = pipe();
    let mut reactor = Reactor::new();
    let fired = Rc::new(Cell::new(0));

    write_bytes(wr, b"hello");

    let count = fired.clone();
    reactor.watch_read(rd, move |sched, fd| {
        count.set(count.get() + 1);

        let mut buffer = [0u8; 16];
        let n = read_bytes(fd, &mut buffer);
        assert_eq!(&buffer[..n], b"hello");

        sched.unwatch_all(fd);
    });

    reactor.run().unwrap();

    assert_eq!(
        fired.get(),
        1,
        "Readiness dispatches once per iteration, not once per byte"
    );

    close(rd);
    close(wr);
}

#[test]
fn test_write_watcher_fires_on_writable_pipe() {
    let (rd, wr) = pipe();
    let mut reactor = Reactor::new();
    let fired = Rc::new(Cell::new(0));

    let count = fired.clone();
    reactor.watch_write(wr, move |sched, fd| {
        count.set(count.get() + 1);
        sched.unwatch_write(fd);
    });

    reactor.run().unwrap();

    assert_eq!(fired.get(), 1, "An empty pipe is writable immediately");

    close(rd);
    close(wr);
}

#[test]
fn test_rewatch_replaces_the_previous_callback() {
    let (rd, wr) = pipe();
    let mut reactor = Reactor::new();
    let replaced = Rc::new(Cell::new(false));
    let fired = Rc::new(Cell::new(false));

    write_bytes(wr, b"x");

    let stale = replaced.clone();
    reactor.watch_read(rd, move |_, _| {
        stale.set(true);
    });

    // Watching the same direction again replaces, it does not stack.
    let live = fired.clone();
    reactor.watch_read(rd, move |sched, fd| {
        live.set(true);

        let mut buffer = [0u8; 4];
        read_bytes(fd, &mut buffer);
        sched.unwatch_all(fd);
    });

    reactor.run().unwrap();

    assert!(fired.get(), "The replacement callback should fire");
    assert!(!replaced.get(), "The replaced callback must never fire");

    close(rd);
    close(wr);
}

#[test]
fn test_callback_can_replace_itself() {
    let (rd, wr) = pipe();
    let mut reactor = Reactor::new();
    let first = Rc::new(Cell::new(0));
    let second = Rc::new(Cell::new(0));

    write_bytes(wr, b"x");

    let outer = first.clone();
    let inner = second.clone();
    reactor.watch_read(rd, move |sched, fd| {
        outer.set(outer.get() + 1);

        // Leave the pipe readable so the replacement fires on the
        // next iteration.
        let inner = inner.clone();
        sched.watch_read(fd, move |sched, fd| {
            inner.set(inner.get() + 1);

            let mut buffer = [0u8; 4];
            read_bytes(fd, &mut buffer);
            sched.unwatch_all(fd);
        });
    });

    reactor.run().unwrap();

    assert_eq!(first.get(), 1, "The original callback fires exactly once");
    assert_eq!(second.get(), 1, "The replacement fires on the next pass");

    close(rd);
    close(wr);
}

#[test]
fn test_removal_suppresses_later_dispatch_in_same_iteration() {
    let (rd_a, wr_a) = pipe();
    let (rd_b, wr_b) = pipe();
    let mut reactor = Reactor::new();
    let fired = Rc::new(Cell::new(0));

    write_bytes(wr_a, b"x");
    write_bytes(wr_b, b"x");

    // Both pipes are ready before the loop starts. Whichever callback
    // dispatches first unwatches both descriptors, so the sibling must
    // not fire in the same iteration.
    for fd in [rd_a, rd_b] {
        let count = fired.clone();
        reactor.watch_read(fd, move |sched, _| {
            count.set(count.get() + 1);
            sched.unwatch_all(rd_a);
            sched.unwatch_all(rd_b);
        });
    }

    reactor.run().unwrap();

    assert_eq!(
        fired.get(),
        1,
        "A watcher removed earlier in the iteration must not fire"
    );

    close(rd_a);
    close(wr_a);
    close(rd_b);
    close(wr_b);
}

#[test]
fn test_timer_wakes_a_blocked_read_watcher() {
    let (rd, wr) = pipe();
    let mut reactor = Reactor::new();
    let got = Rc::new(Cell::new(false));

    let received = got.clone();
    reactor.watch_read(rd, move |sched, fd| {
        let mut buffer = [0u8; 4];
        let n = read_bytes(fd, &mut buffer);
        assert_eq!(&buffer[..n], b"x");
        received.set(true);
        sched.unwatch_all(fd);
    });

    reactor.add_timer(Duration::from_millis(20), move |_, _| {
        write_bytes(wr, b"x");
    });

    reactor.run().unwrap();

    assert!(got.get(), "The watcher should observe the timer's write");

    close(rd);
    close(wr);
}

#[test]
fn test_unwatch_is_idempotent() {
    let (rd, wr) = pipe();
    let mut reactor = Reactor::new();

    reactor.watch_read(rd, |_, _| {});
    reactor.unwatch_read(rd);
    reactor.unwatch_read(rd);
    reactor.unwatch_write(rd);
    reactor.unwatch_all(rd);

    // Nothing is registered, so the loop exits immediately.
    reactor.run().unwrap();

    close(rd);
    close(wr);
}
