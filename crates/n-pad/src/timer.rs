//! Deferred timers for a single-threaded, cooperative host loop.
//!
//! Nothing in this crate sleeps. A timer is a deadline stored in [`Timers`];
//! the host's event loop asks for [`Timers::time_until_next`] to size its
//! wait (the same way a `recv_timeout` loop sizes its tick) and then collects
//! due handles with [`Timers::take_expired`].
//!
//! ```text
//!   schedule(delay) ──▶ TimerId ──▶ cancel(id)        (superseded)
//!                            └────▶ take_expired()    (fired, removed)
//! ```
//!
//! A handle leaves the queue exactly once: either it is cancelled or it is
//! returned by `take_expired`. Once taken it can no longer be cancelled, so
//! a firing callback always runs to completion.
//!
//! Time comes from a [`Clock`]. Production code uses [`SystemClock`]; tests
//! drive a [`ManualClock`] forward by hand.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Clocks
// ---------------------------------------------------------------------------

/// A monotonic time source.
pub trait Clock {
    /// The current instant.
    fn now(&self) -> Instant;
}

/// The real monotonic clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same time, so a test can keep one handle and give
/// another to the engine under test.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<Instant>>,
}

impl ManualClock {
    /// Create a clock frozen at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: Rc::new(Cell::new(Instant::now())),
        }
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now(&self) -> Instant {
        self.now.get()
    }
}

// ---------------------------------------------------------------------------
// Timers
// ---------------------------------------------------------------------------

/// Handle to a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// A queue of pending deadlines.
#[derive(Debug)]
pub struct Timers<C: Clock> {
    clock: C,
    next_id: u64,
    /// Pending timers in scheduling order. Kept tiny in practice (one per
    /// engine), so a `Vec` scan beats a heap.
    pending: Vec<(TimerId, Instant)>,
}

impl<C: Clock> Timers<C> {
    /// Create an empty queue driven by `clock`.
    #[must_use]
    pub const fn new(clock: C) -> Self {
        Self {
            clock,
            next_id: 0,
            pending: Vec::new(),
        }
    }

    /// The current instant according to the queue's clock.
    #[inline]
    #[must_use]
    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Schedule a timer to fire `delay` from now.
    pub fn schedule(&mut self, delay: Duration) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.pending.push((id, self.clock.now() + delay));
        id
    }

    /// Cancel a pending timer. Returns `false` if it already fired or was
    /// cancelled before.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|&(pending, _)| pending != id);
        self.pending.len() != before
    }

    /// True while `id` is scheduled and has not fired.
    #[must_use]
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.pending.iter().any(|&(pending, _)| pending == id)
    }

    /// The deadline of a pending timer.
    #[must_use]
    pub fn deadline(&self, id: TimerId) -> Option<Instant> {
        self.pending
            .iter()
            .find(|&&(pending, _)| pending == id)
            .map(|&(_, at)| at)
    }

    /// The earliest pending deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|&(_, at)| at).min()
    }

    /// How long the host may wait before the next timer is due. Zero when a
    /// timer is already overdue, `None` when nothing is pending.
    #[must_use]
    pub fn time_until_next(&self) -> Option<Duration> {
        self.next_deadline()
            .map(|at| at.saturating_duration_since(self.clock.now()))
    }

    /// Remove and return every timer whose deadline has passed, earliest
    /// first.
    pub fn take_expired(&mut self) -> Vec<TimerId> {
        let now = self.clock.now();
        let mut due: Vec<(TimerId, Instant)> = Vec::new();
        self.pending.retain(|&entry| {
            if entry.1 <= now {
                due.push(entry);
                false
            } else {
                true
            }
        });
        due.sort_by_key(|&(id, at)| (at, id));
        due.into_iter().map(|(id, _)| id).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
