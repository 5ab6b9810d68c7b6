use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Abstracts "what time is it" so `Clock` and `TimerEngine` math can be
/// unit tested without sleeping. Production code uses `SystemClock`;
/// tests use `VirtualClock` and advance it explicitly.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock tests can move forward by hand. Stored as millis-since-epoch
/// in an `AtomicI64` so it can be shared (`Arc<VirtualClock>`) across the
/// scheduler task and the test that's driving it.
#[derive(Debug)]
pub struct VirtualClock {
    millis: AtomicI64,
}

impl VirtualClock {
    pub fn new(start: DateTime<Utc>) -> Arc<VirtualClock> {
        Arc::new(VirtualClock {
            millis: AtomicI64::new(start.timestamp_millis()),
        })
    }

    pub fn advance(&self, delta: chrono::Duration) {
        self.millis
            .fetch_add(delta.num_milliseconds(), Ordering::SeqCst);
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.millis.store(at.timestamp_millis(), Ordering::SeqCst);
    }
}

impl TimeSource for VirtualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst))
            .expect("virtual clock millis always constructs a valid timestamp")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn virtual_clock_advances_by_exact_delta() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let vc = VirtualClock::new(start);
        vc.advance(chrono::Duration::seconds(5));
        assert_eq!(vc.now(), start + chrono::Duration::seconds(5));
    }
}
