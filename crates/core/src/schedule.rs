//! Delayed events on an explicit clock.
//!
//! Nothing here reads wall time: callers advance the clock themselves, so a
//! test can step through delays exactly and the terminal loop can feed it
//! its tick interval.

use std::time::Duration;

/// Handle used to cancel a scheduled event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

#[derive(Debug)]
struct Timer<E> {
    token: TimerToken,
    due: Duration,
    event: E,
}

/// Ordered queue of pending events.
#[derive(Debug)]
pub struct Scheduler<E> {
    now: Duration,
    next_id: u64,
    timers: Vec<Timer<E>>,
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 0,
            timers: Vec::new(),
        }
    }
}

impl<E> Scheduler<E> {
    /// Empty queue at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Elapsed virtual time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Number of events still waiting.
    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    /// Time until the earliest pending event.
    pub fn next_due(&self) -> Option<Duration> {
        self.timers
            .iter()
            .map(|timer| timer.due.saturating_sub(self.now))
            .min()
    }

    /// Deliver `event` once `delay` has elapsed.
    pub fn schedule(&mut self, delay: Duration, event: E) -> TimerToken {
        self.next_id += 1;
        let token = TimerToken(self.next_id);
        self.timers.push(Timer {
            token,
            due: self.now + delay,
            event,
        });
        token
    }

    /// Drop a pending event; `false` when it already fired or was cancelled.
    pub fn cancel(&mut self, token: TimerToken) -> bool {
        let before = self.timers.len();
        self.timers.retain(|timer| timer.token != token);
        self.timers.len() != before
    }

    /// Move the clock forward and return every event that came due, earliest
    /// first (ties in scheduling order).
    pub fn advance(&mut self, elapsed: Duration) -> Vec<E> {
        self.now += elapsed;
        let now = self.now;
        let (mut due, waiting): (Vec<Timer<E>>, Vec<Timer<E>>) =
            self.timers.drain(..).partition(|timer| timer.due <= now);
        self.timers = waiting;
        due.sort_by_key(|timer| (timer.due, timer.token.0));
        due.into_iter().map(|timer| timer.event).collect()
    }
}
