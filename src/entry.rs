//! Store entry: the value plus what is needed to expire exactly this insertion.

use std::time::{Duration, Instant};

use crate::scheduler::TimerHandle;

/// A single live entry.
///
/// Each insertion under a key gets a fresh generation. The entry's timer was
/// scheduled for that generation and is cancelled when the entry leaves the
/// map for any other reason.
#[derive(Debug)]
pub(crate) struct Entry<V> {
    value: V,
    generation: u64,
    // Already clamped by the caller; never computed here.
    deadline: Instant,
    timer: TimerHandle,
}

impl<V> Entry<V> {
    pub(crate) fn new(
        value: V,
        generation: u64,
        deadline: Instant,
        timer: TimerHandle,
    ) -> Self {
        Self {
            value,
            generation,
            deadline,
            timer,
        }
    }

    pub(crate) fn value(&self) -> &V {
        &self.value
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// When the entry's timer is due.
    pub(crate) fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Whether the lifetime has run out, whether or not the timer has fired yet.
    pub(crate) fn is_due_at(&self, now: Instant) -> bool {
        now >= self.deadline()
    }

    /// Time left before the timer is due, saturating at zero.
    pub(crate) fn remaining_at(&self, now: Instant) -> Duration {
        self.deadline().saturating_duration_since(now)
    }

    /// Disarm the timer and hand back the value.
    pub(crate) fn retire(self) -> V {
        self.timer.cancel();
        self.value
    }
}
