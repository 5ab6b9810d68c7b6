use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Notified whenever the active-game count changes in a way invite
/// subscribers care about (§4.4: only on decrement — the invite manager
/// itself broadcasts on accept, so `increment` must not double-announce).
pub trait InviteBroadcaster: Send + Sync {
    fn broadcast_game_count(&self, active_games: usize);
}

pub struct GameCount {
    active_games: AtomicUsize,
    broadcaster: Arc<dyn InviteBroadcaster>,
}

impl GameCount {
    pub fn new(broadcaster: Arc<dyn InviteBroadcaster>) -> GameCount {
        GameCount { active_games: AtomicUsize::new(0), broadcaster }
    }

    pub fn current(&self) -> usize {
        self.active_games.load(Ordering::SeqCst)
    }

    /// No fan-out: the invite manager broadcasts on accept, before this
    /// is even called.
    pub fn increment(&self) {
        self.active_games.fetch_add(1, Ordering::SeqCst);
    }

    pub fn decrement(&self) {
        let previous = self.active_games.fetch_sub(1, Ordering::SeqCst);
        let now = previous.saturating_sub(1);
        self.broadcaster.broadcast_game_count(now);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Mutex;

    struct RecordingBroadcaster(Mutex<Vec<usize>>);

    impl InviteBroadcaster for RecordingBroadcaster {
        fn broadcast_game_count(&self, active_games: usize) {
            self.0.lock().unwrap().push(active_games);
        }
    }

    #[test]
    fn increment_does_not_broadcast_decrement_does() {
        let recorder = Arc::new(RecordingBroadcaster(Mutex::new(Vec::new())));
        let count = GameCount::new(recorder.clone());
        count.increment();
        count.increment();
        assert!(recorder.0.lock().unwrap().is_empty());
        count.decrement();
        assert_eq!(*recorder.0.lock().unwrap(), vec![1]);
    }
}
