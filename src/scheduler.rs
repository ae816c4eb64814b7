//! Expiry timer scheduling.
//!
//! A [`Scheduler`] runs a one-shot callback after a delay and hands back a
//! [`TimerHandle`] that can disarm it. The store schedules one callback per
//! insertion; the callback re-enters the store and removes the entry if the
//! insertion it was scheduled for is still the live one.
//!
//! [`HeapScheduler`] is the default: a single named thread servicing a
//! min-heap of deadlines. `TokioScheduler` in the `runtime` module instead
//! runs one task per timer on a tokio runtime.

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

/// Work to run when a timer comes due.
pub type ExpiryCallback = Box<dyn FnOnce() + Send + 'static>;

/// Heap slots left behind by cancelled timers are purged once they outnumber
/// live timers and the heap is at least this long.
const COMPACT_THRESHOLD: usize = 64;

/// `now + delay`, clamped to the latest representable instant on overflow.
pub(crate) fn deadline_after(now: Instant, delay: Duration) -> Instant {
    let mut delay = delay;
    loop {
        if let Some(deadline) = now.checked_add(delay) {
            return deadline;
        }
        delay /= 2;
    }
}

/// Something that can run a callback once after a delay.
pub trait Scheduler: Send + Sync + fmt::Debug {
    /// Arrange for `callback` to run once `delay` has elapsed.
    ///
    /// A zero delay means "as soon as possible", never "inline": the callback
    /// must not run on the calling thread before `schedule` returns, because
    /// callers may be holding locks the callback needs. Delays too large to
    /// represent must be clamped, not rejected.
    fn schedule(&self, delay: Duration, callback: ExpiryCallback) -> TimerHandle;
}

/// Disarms a scheduled callback.
///
/// Cancelling is idempotent, and cancelling a timer that has already fired
/// does nothing.
#[derive(Debug)]
pub struct TimerHandle {
    kind: HandleKind,
}

#[derive(Debug)]
enum HandleKind {
    Flag(Arc<AtomicBool>),
    Task(AbortHandle),
    Heap { shared: Weak<Shared>, seq: u64 },
}

impl TimerHandle {
    /// A handle that cancels by raising a shared flag, for schedulers that
    /// check it before running the callback.
    pub fn from_flag(cancelled: Arc<AtomicBool>) -> Self {
        Self {
            kind: HandleKind::Flag(cancelled),
        }
    }

    /// A handle that cancels by aborting a tokio task.
    pub fn from_task(handle: AbortHandle) -> Self {
        Self {
            kind: HandleKind::Task(handle),
        }
    }

    pub fn cancel(&self) {
        match &self.kind {
            HandleKind::Flag(cancelled) => cancelled.store(true, Ordering::Release),
            HandleKind::Task(handle) => handle.abort(),
            HandleKind::Heap { shared, seq } => {
                if let Some(shared) = shared.upgrade() {
                    let callback = shared.queue.lock().cancel(*seq);
                    // Dropped outside the heap lock.
                    drop(callback);
                }
            }
        }
    }
}

#[derive(Default)]
struct Queue {
    // Deadline order; `seq` breaks ties in scheduling order.
    heap: BinaryHeap<Reverse<(Instant, u64)>>,
    // Callbacks of timers not yet fired or cancelled, by `seq`.
    callbacks: HashMap<u64, ExpiryCallback>,
    next_seq: u64,
    shutdown: bool,
}

impl Queue {
    fn cancel(&mut self, seq: u64) -> Option<ExpiryCallback> {
        let callback = self.callbacks.remove(&seq);
        if callback.is_some() {
            self.compact();
        }
        callback
    }

    /// Purge heap slots whose timers were cancelled, once they dominate.
    fn compact(&mut self) {
        let live = self.callbacks.len();
        if self.heap.len() < COMPACT_THRESHOLD || self.heap.len() <= 2 * live {
            return;
        }
        let callbacks = &self.callbacks;
        self.heap
            .retain(|Reverse((_, seq))| callbacks.contains_key(seq));
    }

    /// Pop every timer due at `now`, skipping cancelled slots.
    fn take_due(&mut self, now: Instant) -> Vec<(u64, ExpiryCallback)> {
        let mut due = Vec::new();
        while let Some(Reverse((deadline, seq))) = self.heap.peek().copied() {
            if deadline > now {
                break;
            }
            self.heap.pop();
            if let Some(callback) = self.callbacks.remove(&seq) {
                due.push((seq, callback));
            }
        }
        due
    }
}

#[derive(Default)]
struct Shared {
    queue: Mutex<Queue>,
    wakeup: Condvar,
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared").finish_non_exhaustive()
    }
}

/// Single-thread scheduler backed by a deadline min-heap.
///
/// The thread sleeps until the earliest deadline, or until a timer with an
/// earlier deadline is pushed. Cancelling a timer drops its callback at once;
/// the heap slot it leaves behind is skipped when reached and purged in bulk
/// when such slots outnumber live timers.
///
/// Callbacks run on the scheduler thread with the heap lock released.
/// Dropping the scheduler stops the thread; callbacks still pending are
/// dropped without running.
pub struct HeapScheduler {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl HeapScheduler {
    /// Start a scheduler thread.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to spawn the thread, like `std::thread::spawn`.
    /// Use [`HeapScheduler::try_new`] to handle that case.
    pub fn new() -> Self {
        Self::try_new().expect("failed to spawn expiry scheduler thread")
    }

    /// Start a scheduler thread, reporting spawn failure.
    pub fn try_new() -> io::Result<Self> {
        let shared = Arc::new(Shared::default());
        let worker = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name("expiring-store-timer".to_string())
            .spawn(move || run(worker))?;

        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    /// Number of timers armed and neither fired nor cancelled.
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().callbacks.len()
    }
}

impl Default for HeapScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HeapScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeapScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

impl Scheduler for HeapScheduler {
    fn schedule(&self, delay: Duration, callback: ExpiryCallback) -> TimerHandle {
        let deadline = deadline_after(Instant::now(), delay);

        let mut queue = self.shared.queue.lock();
        let seq = queue.next_seq;
        queue.next_seq += 1;

        // Only wake the thread if this timer is now the earliest one.
        let earliest = queue
            .heap
            .peek()
            .map_or(true, |Reverse((next, _))| deadline < *next);

        queue.heap.push(Reverse((deadline, seq)));
        queue.callbacks.insert(seq, callback);
        drop(queue);

        if earliest {
            self.shared.wakeup.notify_one();
        }

        TimerHandle {
            kind: HandleKind::Heap {
                shared: Arc::downgrade(&self.shared),
                seq,
            },
        }
    }
}

impl Drop for HeapScheduler {
    fn drop(&mut self) {
        self.shared.queue.lock().shutdown = true;
        self.shared.wakeup.notify_all();

        if let Some(thread) = self.thread.take() {
            // The last store handle can be released by a callback running on
            // the scheduler thread itself; that thread exits on its own.
            if thread.thread().id() != thread::current().id() && thread.join().is_err() {
                warn!("expiry scheduler thread panicked");
            }
        }
    }
}

fn run(shared: Arc<Shared>) {
    info!("expiry scheduler started");

    let mut queue = shared.queue.lock();
    loop {
        if queue.shutdown {
            break;
        }

        let now = Instant::now();
        match queue.heap.peek().copied() {
            None => shared.wakeup.wait(&mut queue),
            Some(Reverse((deadline, _))) if deadline > now => {
                shared.wakeup.wait_until(&mut queue, deadline);
            }
            Some(_) => {
                let due = queue.take_due(now);
                MutexGuard::unlocked(&mut queue, || fire(due));
            }
        }
    }

    info!(pending = queue.callbacks.len(), "expiry scheduler stopped");
}

fn fire(due: Vec<(u64, ExpiryCallback)>) {
    for (seq, callback) in due {
        if panic::catch_unwind(AssertUnwindSafe(callback)).is_err() {
            warn!(seq, "expiry callback panicked");
        } else {
            debug!(seq, "expiry callback ran");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;

    fn heap_len(scheduler: &HeapScheduler) -> usize {
        scheduler.shared.queue.lock().heap.len()
    }

    #[test]
    fn test_callback_runs_after_delay() {
        let scheduler = HeapScheduler::new();
        let (tx, rx) = mpsc::channel();

        let start = Instant::now();
        scheduler.schedule(
            Duration::from_millis(20),
            Box::new(move || {
                let _ = tx.send(Instant::now());
            }),
        );

        let fired_at = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(fired_at.duration_since(start) >= Duration::from_millis(20));
    }

    #[test]
    fn test_callbacks_fire_in_deadline_order() {
        let scheduler = HeapScheduler::new();
        let (tx, rx) = mpsc::channel();

        for (label, delay) in [("late", 60), ("early", 10), ("middle", 30)] {
            let tx = tx.clone();
            scheduler.schedule(
                Duration::from_millis(delay),
                Box::new(move || {
                    let _ = tx.send(label);
                }),
            );
        }

        let order: Vec<_> = (0..3)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        assert_eq!(order, vec!["early", "middle", "late"]);
    }

    #[test]
    fn test_cancelled_timer_does_not_fire() {
        let scheduler = HeapScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        let handle = scheduler.schedule(
            Duration::from_millis(10),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        handle.cancel();
        handle.cancel();
        assert_eq!(scheduler.pending(), 0);

        thread::sleep(Duration::from_millis(50));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(heap_len(&scheduler), 0);
    }

    #[test]
    fn test_cancel_drops_callback_immediately() {
        let scheduler = HeapScheduler::new();
        let captured = Arc::new(());

        let held = Arc::clone(&captured);
        let handle = scheduler.schedule(
            Duration::from_secs(3600),
            Box::new(move || drop(held)),
        );
        assert_eq!(Arc::strong_count(&captured), 2);

        handle.cancel();
        assert_eq!(Arc::strong_count(&captured), 1);
    }

    #[test]
    fn test_cancel_churn_keeps_heap_bounded() {
        let scheduler = HeapScheduler::new();

        for _ in 0..10_000 {
            let handle = scheduler.schedule(Duration::from_secs(3600), Box::new(|| {}));
            handle.cancel();
        }
        let survivor = scheduler.schedule(Duration::from_secs(3600), Box::new(|| {}));

        assert_eq!(scheduler.pending(), 1);
        assert!(heap_len(&scheduler) <= COMPACT_THRESHOLD + 1);
        survivor.cancel();
    }

    #[test]
    fn test_huge_delay_is_clamped() {
        let scheduler = HeapScheduler::new();
        let handle = scheduler.schedule(Duration::MAX, Box::new(|| {}));

        assert_eq!(scheduler.pending(), 1);
        handle.cancel();
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_deadline_after_saturates() {
        let now = Instant::now();
        assert_eq!(
            deadline_after(now, Duration::from_secs(5)),
            now + Duration::from_secs(5)
        );
        assert!(deadline_after(now, Duration::MAX) > now + Duration::from_secs(86_400 * 365));
    }

    #[test]
    fn test_zero_delay_fires() {
        let scheduler = HeapScheduler::new();
        let (tx, rx) = mpsc::channel();

        scheduler.schedule(
            Duration::ZERO,
            Box::new(move || {
                let _ = tx.send(());
            }),
        );

        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_panicking_callback_keeps_thread_alive() {
        let scheduler = HeapScheduler::new();
        let (tx, rx) = mpsc::channel();

        scheduler.schedule(Duration::ZERO, Box::new(|| panic!("boom")));
        scheduler.schedule(
            Duration::from_millis(10),
            Box::new(move || {
                let _ = tx.send(());
            }),
        );

        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_drop_discards_pending() {
        let fired = Arc::new(AtomicUsize::new(0));
        {
            let scheduler = HeapScheduler::new();
            let counter = Arc::clone(&fired);
            scheduler.schedule(
                Duration::from_secs(60),
                Box::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            );
            assert_eq!(scheduler.pending(), 1);
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancel_after_scheduler_dropped_is_noop() {
        let handle = {
            let scheduler = HeapScheduler::new();
            scheduler.schedule(Duration::from_secs(60), Box::new(|| {}))
        };
        handle.cancel();
    }
}
