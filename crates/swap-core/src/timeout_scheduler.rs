//! `TimeoutScheduler`: wakes the executor at deadline boundaries.
//!
//! Reference: spec §4.9. A priority queue keyed by absolute deadline,
//! firing each callback once; cancellable on session completion.
//! Grounded in the teacher's single-reactor pattern (spec §5 "a single
//! reactor drives EventMonitor and TimeoutScheduler") using a
//! `tokio::sync::mpsc` channel of fired deadlines rather than
//! per-callback closures, so the executor (which must itself be
//! `Send`) can `recv()` from a plain channel instead of boxing
//! futures.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use swap_types::SessionId;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tracing::debug;

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}

/// Which deadline within a session's lifecycle fired.
///
/// Reference: spec §4.9 "enqueues callbacks at `srcWithdrawal`,
/// `srcCancellation`, `dstWithdrawal`, `dstCancellation`."
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeadlineKind {
    /// `timelocks.srcWithdrawal` elapsed.
    SrcWithdrawal,
    /// `timelocks.srcCancellation` elapsed.
    SrcCancellation,
    /// `timelocks.dstWithdrawal` elapsed.
    DstWithdrawal,
    /// `timelocks.dstCancellation` elapsed.
    DstCancellation,
    /// The bounded both-locked wait (spec §4.8 step 4) elapsed.
    WaitForBothLocked,
}

/// A fired deadline delivered to the executor.
#[derive(Clone, Copy, Debug)]
pub struct FiredDeadline {
    /// Which session this deadline concerns.
    pub session_id: SessionId,
    /// Which deadline fired.
    pub kind: DeadlineKind,
    /// The absolute unix-second deadline that was scheduled.
    pub deadline: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Entry {
    deadline: u64,
    session_id: SessionId,
    kind: DeadlineKind,
    generation: u64,
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.deadline.cmp(&other.deadline)
    }
}
impl PartialEq for DeadlineKind {
    fn eq(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}
impl Eq for DeadlineKind {}

/// Priority-queue-backed scheduler. `run` must be spawned as a
/// background task; callers enqueue deadlines and receive fired ones
/// from the channel returned by [`TimeoutScheduler::subscribe`].
pub struct TimeoutScheduler {
    heap: Mutex<BinaryHeap<Reverse<Entry>>>,
    cancelled: Mutex<std::collections::HashSet<(SessionId, u64)>>,
    next_generation: Mutex<u64>,
    sender: mpsc::UnboundedSender<FiredDeadline>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<FiredDeadline>>>,
    poll_interval: Duration,
}

impl TimeoutScheduler {
    /// Construct a scheduler that checks for due deadlines every
    /// `poll_interval`.
    pub fn new(poll_interval: Duration) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            cancelled: Mutex::new(std::collections::HashSet::new()),
            next_generation: Mutex::new(0),
            sender,
            receiver: Mutex::new(Some(receiver)),
            poll_interval,
        }
    }

    /// Enqueue a callback at an absolute unix-second deadline.
    pub fn enqueue(&self, session_id: SessionId, kind: DeadlineKind, deadline: u64) {
        let generation = {
            let mut g = self.next_generation.lock();
            *g += 1;
            *g
        };
        self.heap.lock().push(Reverse(Entry { deadline, session_id, kind, generation }));
        debug!(%session_id, ?kind, deadline, "deadline scheduled");
    }

    /// Cancel every pending deadline for `session_id` (spec §4.9
    /// "cancellations on session completion are supported").
    pub fn cancel_session(&self, session_id: SessionId) {
        // Lazily filtered out of the heap as entries are popped;
        // record the cancellation so `run` can skip them cheaply
        // without rebuilding the heap.
        let mut cancelled = self.cancelled.lock();
        cancelled.retain(|(id, _)| *id != session_id);
        cancelled.insert((session_id, u64::MAX));
    }

    /// Take the receiver of fired deadlines. Call once; subsequent
    /// calls return `None`.
    pub fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<FiredDeadline>> {
        self.receiver.lock().take()
    }

    /// Run the polling loop until `shutdown` resolves. Intended to be
    /// spawned as the single reactor task (spec §5).
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = sleep(self.poll_interval) => {
                    self.fire_due();
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    fn fire_due(&self) {
        let now = now_unix();
        let mut heap = self.heap.lock();
        let cancelled = self.cancelled.lock();

        while let Some(Reverse(entry)) = heap.peek().cloned() {
            if entry.deadline > now {
                break;
            }
            heap.pop();
            if cancelled.contains(&(entry.session_id, u64::MAX)) {
                continue;
            }
            let fired = FiredDeadline { session_id: entry.session_id, kind: entry.kind, deadline: entry.deadline };
            debug!(session_id = %entry.session_id, kind = ?entry.kind, "deadline fired");
            let _ = self.sender.send(fired);
        }
    }

    /// Force-check for due deadlines immediately (used by tests and by
    /// the executor's own bounded waits).
    pub fn tick(&self) {
        self.fire_due();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_deadline_fires_on_tick() {
        let scheduler = TimeoutScheduler::new(Duration::from_millis(10));
        let mut rx = scheduler.subscribe().unwrap();
        let session_id = SessionId::new();

        scheduler.enqueue(session_id, DeadlineKind::SrcCancellation, 0);
        scheduler.tick();

        let fired = rx.try_recv().unwrap();
        assert_eq!(fired.session_id, session_id);
        assert_eq!(fired.kind, DeadlineKind::SrcCancellation);
    }

    #[test]
    fn future_deadline_does_not_fire() {
        let scheduler = TimeoutScheduler::new(Duration::from_millis(10));
        let mut rx = scheduler.subscribe().unwrap();
        scheduler.enqueue(SessionId::new(), DeadlineKind::DstWithdrawal, u64::MAX);
        scheduler.tick();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn cancelled_session_deadline_is_skipped() {
        let scheduler = TimeoutScheduler::new(Duration::from_millis(10));
        let mut rx = scheduler.subscribe().unwrap();
        let session_id = SessionId::new();

        scheduler.enqueue(session_id, DeadlineKind::SrcWithdrawal, 0);
        scheduler.cancel_session(session_id);
        scheduler.tick();

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn subscribe_only_returns_receiver_once() {
        let scheduler = TimeoutScheduler::new(Duration::from_millis(10));
        assert!(scheduler.subscribe().is_some());
        assert!(scheduler.subscribe().is_none());
    }
}
