//! A minimal first-class timer capability: `schedule(delay, fn) -> handle`,
//! `cancel(handle)`. Modeled closely on the teacher's wake-up queue: a
//! `BTreeSet` ordered by wake-up time backs a single background task that
//! either sleeps until the next entry or blocks on a channel waiting for a
//! new/cancelled entry, rather than spawning one `tokio::time::sleep` per
//! timer. The pure "what's due" bookkeeping is split out as `Queue` so it
//! is unit-testable without a real sleep.

use crate::time_source::TimeSource;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::Instant as TokioInstant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle(pub(crate) u64);

/// A scheduled wake-up, ordered by `(fire_at, handle)` so the `BTreeSet`
/// behaves as a min-heap on fire time with the handle only as a
/// tie-breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    fire_at: DateTime<Utc>,
    handle: TimerHandle,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.fire_at.cmp(&other.fire_at).then(self.handle.cmp(&other.handle))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// The pure scheduling core: which handle (if any) is due at a given
/// `now`, and bookkeeping for schedule/cancel. No I/O, no async — the
/// async wrapper below is the only thing that touches a runtime.
#[derive(Debug, Default)]
struct Queue {
    by_time: BTreeSet<Entry>,
    by_handle: BTreeMap<TimerHandle, DateTime<Utc>>,
}

impl Queue {
    fn insert(&mut self, handle: TimerHandle, fire_at: DateTime<Utc>) {
        if let Some(&old_fire_at) = self.by_handle.get(&handle) {
            self.by_time.remove(&Entry { fire_at: old_fire_at, handle });
        }
        self.by_handle.insert(handle, fire_at);
        self.by_time.insert(Entry { fire_at, handle });
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some(fire_at) = self.by_handle.remove(&handle) {
            self.by_time.remove(&Entry { fire_at, handle });
        }
    }

    fn next_fire_at(&self) -> Option<DateTime<Utc>> {
        self.by_time.iter().next().map(|e| e.fire_at)
    }

    /// Removes and returns every entry due at or before `now`.
    fn pop_due(&mut self, now: DateTime<Utc>) -> Vec<TimerHandle> {
        let mut due = Vec::new();
        while let Some(entry) = self.by_time.iter().next().cloned() {
            if entry.fire_at > now {
                break;
            }
            self.by_time.remove(&entry);
            self.by_handle.remove(&entry.handle);
            due.push(entry.handle);
        }
        due
    }
}

enum Command {
    Schedule { handle: TimerHandle, fire_at: DateTime<Utc>, callback: Callback },
    Cancel { handle: TimerHandle },
}

type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Handle to the background task. Cloning shares the same queue; dropping
/// every clone stops the task (the channel closes and `run` returns).
#[derive(Clone)]
pub struct Scheduler {
    next_id: Arc<AtomicU64>,
    sender: kanal::AsyncSender<Command>,
}

impl Scheduler {
    pub fn spawn(time_source: Arc<dyn TimeSource>) -> Scheduler {
        let (sender, receiver) = kanal::unbounded_async();
        tokio::spawn(run(receiver, time_source));
        Scheduler {
            next_id: Arc::new(AtomicU64::new(1)),
            sender,
        }
    }

    /// Schedules `callback` to run once, `delay` from now (per the
    /// injected `TimeSource`, not `Instant::now()`, so tests using a
    /// virtual clock can drive it deterministically alongside real sleep
    /// in production).
    pub fn schedule(&self, fire_at: DateTime<Utc>, callback: impl FnOnce() + Send + 'static) -> TimerHandle {
        let handle = TimerHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        let sender = self.sender.clone();
        let cmd = Command::Schedule { handle, fire_at, callback: Box::new(callback) };
        // The channel is unbounded and the task never exits while any
        // Scheduler clone is alive, so send failures only happen during
        // shutdown races; dropping the command silently is correct there.
        let _ = sender.as_sync().send(cmd);
        handle
    }

    pub fn cancel(&self, handle: TimerHandle) {
        let _ = self.sender.as_sync().send(Command::Cancel { handle });
    }
}

async fn run(receiver: kanal::AsyncReceiver<Command>, time_source: Arc<dyn TimeSource>) {
    let mut queue = Queue::default();
    let mut callbacks: BTreeMap<TimerHandle, Callback> = BTreeMap::new();

    loop {
        let sleep_until = queue.next_fire_at().map(|fire_at| to_tokio_instant(fire_at, time_source.now()));

        let cmd = match sleep_until {
            Some(instant) => {
                tokio::select! {
                    cmd = receiver.recv() => cmd,
                    _ = tokio::time::sleep_until(instant) => {
                        for handle in queue.pop_due(time_source.now()) {
                            if let Some(callback) = callbacks.remove(&handle) {
                                callback();
                            }
                        }
                        continue;
                    }
                }
            }
            None => receiver.recv().await,
        };

        match cmd {
            Ok(Command::Schedule { handle, fire_at, callback }) => {
                queue.insert(handle, fire_at);
                callbacks.insert(handle, callback);
            }
            Ok(Command::Cancel { handle }) => {
                queue.cancel(handle);
                callbacks.remove(&handle);
            }
            Err(_) => break,
        }
    }
}

/// Converts an absolute `fire_at` (measured against the injected
/// `TimeSource`) into a tokio `Instant` by translating through the delta
/// from `now`. Using the injected source here (not `Utc::now()`) keeps
/// this consistent with a `VirtualClock` in tests — a real wall-clock
/// baseline would silently desync from a test that's driving time by hand.
fn to_tokio_instant(fire_at: DateTime<Utc>, now: DateTime<Utc>) -> TokioInstant {
    let delta = fire_at - now;
    let std_delta = delta.to_std().unwrap_or(std::time::Duration::ZERO);
    TokioInstant::now() + std_delta
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    fn t(offset_secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(offset_secs)
    }

    #[test]
    fn queue_pops_entries_in_fire_order() {
        let mut queue = Queue::default();
        queue.insert(TimerHandle(1), t(10));
        queue.insert(TimerHandle(2), t(5));
        queue.insert(TimerHandle(3), t(20));

        assert_eq!(queue.next_fire_at(), Some(t(5)));
        let due = queue.pop_due(t(10));
        assert_eq!(due, vec![TimerHandle(2), TimerHandle(1)]);
        assert_eq!(queue.next_fire_at(), Some(t(20)));
    }

    #[test]
    fn rescheduling_the_same_handle_replaces_the_old_entry() {
        let mut queue = Queue::default();
        queue.insert(TimerHandle(1), t(10));
        queue.insert(TimerHandle(1), t(2));
        assert_eq!(queue.next_fire_at(), Some(t(2)));
        assert_eq!(queue.pop_due(t(100)), vec![TimerHandle(1)]);
        assert_eq!(queue.next_fire_at(), None);
    }

    #[test]
    fn cancel_removes_a_pending_entry() {
        let mut queue = Queue::default();
        queue.insert(TimerHandle(1), t(10));
        queue.cancel(TimerHandle(1));
        assert_eq!(queue.next_fire_at(), None);
        assert!(queue.pop_due(t(100)).is_empty());
    }
}
