use super::color::Color;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-game time accounting. Pure given a monotonic time source — every
/// method here takes `now` explicitly rather than reading a clock itself,
/// the same separation the teacher draws between `Timer` (pure) and the
/// caller that supplies `Utc::now()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clock {
    pub start_time_millis: i64,
    pub increment_millis: i64,
    current_time: HashMap<Color, i64>,
    time_at_turn_start: Option<DateTime<Utc>>,
    time_remain_at_turn_start: Option<i64>,
}

/// Snapshot handed to clients: remaining time per color, plus which color
/// (if any) is actively ticking down right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockValues {
    pub clocks: HashMap<Color, i64>,
    pub color_ticking: Option<Color>,
}

impl Clock {
    /// `first_to_move` is the color whose turn starts the game
    /// (`turnOrder[0]`); its deadline starts running from `now` so that
    /// the first "otherwise" branch of `push` at ply 3 has a
    /// `time_at_turn_start` to measure against.
    pub fn new(
        start_time_millis: i64,
        increment_millis: i64,
        colors: &[Color],
        first_to_move: Color,
        now: DateTime<Utc>,
    ) -> Clock {
        let mut current_time = HashMap::new();
        for &c in colors {
            current_time.insert(c, start_time_millis);
        }
        let _ = first_to_move; // turnOrder[0]; kept as a named parameter for call-site clarity
        Clock {
            start_time_millis,
            increment_millis,
            current_time,
            time_at_turn_start: Some(now),
            time_remain_at_turn_start: Some(start_time_millis),
        }
    }

    /// Called after a move has been appended. `prev` is the color that
    /// just moved; `next` is the color about to move; `ply_count_after`
    /// is `moves.len()` post-append. Returns `prev`'s updated remaining
    /// time (used as the move's `clockStamp`).
    pub fn push(&mut self, prev: Color, next: Color, ply_count_after: usize, now: DateTime<Utc>) -> i64 {
        if ply_count_after <= 2 {
            return *self.current_time.get(&prev).unwrap_or(&self.start_time_millis);
        }

        let started = self
            .time_at_turn_start
            .expect("resignable push requires an established turn-start time");
        let remained = self
            .time_remain_at_turn_start
            .expect("resignable push requires an established turn-start remainder");
        let spent = (now - started).num_milliseconds();
        let updated = remained - spent + self.increment_millis;
        self.current_time.insert(prev, updated);

        self.time_at_turn_start = Some(now);
        self.time_remain_at_turn_start = Some(*self.current_time.get(&next).unwrap_or(&updated));
        updated
    }

    /// Freezes the mover's clock when the game stops being resignable-live
    /// (conclusion, abort). No-op when the game was never resignable.
    pub fn stop(&mut self, resignable: bool, whos_turn: Option<Color>, now: DateTime<Utc>) {
        if resignable {
            if let (Some(color), Some(started), Some(remained)) =
                (whos_turn, self.time_at_turn_start, self.time_remain_at_turn_start)
            {
                let spent = (now - started).num_milliseconds();
                let updated = (remained - spent).max(0);
                self.current_time.insert(color, updated);
            }
        }
        self.time_at_turn_start = None;
        self.time_remain_at_turn_start = None;
    }

    pub fn snapshot(&self, resignable: bool, is_over: bool, whos_turn: Option<Color>, now: DateTime<Utc>) -> ClockValues {
        let mut clocks = self.current_time.clone();
        let color_ticking = if resignable && !is_over { whos_turn } else { None };

        if let (Some(color), Some(started), Some(remained)) =
            (color_ticking, self.time_at_turn_start, self.time_remain_at_turn_start)
        {
            let spent = (now - started).num_milliseconds();
            clocks.insert(color, (remained - spent).max(0));
        }

        ClockValues { clocks, color_ticking }
    }

    pub fn remaining(&self, color: Color) -> i64 {
        *self.current_time.get(&color).unwrap_or(&self.start_time_millis)
    }

    /// The deadline (remaining ms for the mover to move) used to schedule
    /// the resign-on-time timer after a move is pushed.
    pub fn time_remain_at_turn_start(&self) -> Option<i64> {
        self.time_remain_at_turn_start
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    fn t(offset_secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(offset_secs)
    }

    #[test]
    fn first_two_plies_do_not_touch_the_clock() {
        let mut clock = Clock::new(60_000, 1_000, &[Color::White, Color::Black], Color::White, t(0));
        let before = clock.remaining(Color::White);
        let returned = clock.push(Color::White, Color::Black, 1, t(5));
        assert_eq!(returned, before);
        let returned = clock.push(Color::Black, Color::White, 2, t(8));
        assert_eq!(returned, clock.remaining(Color::Black));
    }

    #[test]
    fn clock_conservation_from_ply_three_onward() {
        let mut clock = Clock::new(60_000, 1_000, &[Color::White, Color::Black], Color::White, t(0));
        clock.push(Color::White, Color::Black, 1, t(2));
        clock.push(Color::Black, Color::White, 2, t(5));
        // White's third ply (ply_count_after = 3): submitted 4s after the
        // turn-start recorded at ply 2 (t(5)).
        let before = clock.remaining(Color::White);
        let updated = clock.push(Color::White, Color::Black, 3, t(9));
        assert_eq!(updated, before - 4_000 + 1_000);
        assert_eq!(clock.remaining(Color::White), updated);
    }

    #[test]
    fn snapshot_applies_elapsed_time_without_mutating_state() {
        let mut clock = Clock::new(60_000, 1_000, &[Color::White, Color::Black], Color::White, t(0));
        clock.push(Color::White, Color::Black, 1, t(1));
        clock.push(Color::Black, Color::White, 2, t(2));
        clock.push(Color::White, Color::Black, 3, t(4));
        // Black to move, 3s elapse before we snapshot.
        let values = clock.snapshot(true, false, Some(Color::Black), t(7));
        assert_eq!(values.color_ticking, Some(Color::Black));
        assert_eq!(values.clocks[&Color::Black], clock.remaining(Color::Black) - 3_000);
    }

    #[test]
    fn stop_clamps_at_zero_and_clears_turn_state() {
        let mut clock = Clock::new(1_000, 0, &[Color::White, Color::Black], Color::White, t(0));
        clock.push(Color::White, Color::Black, 1, t(1));
        clock.push(Color::Black, Color::White, 2, t(2));
        clock.push(Color::White, Color::Black, 3, t(3));
        clock.stop(true, Some(Color::Black), t(100));
        assert_eq!(clock.remaining(Color::Black), 0);
        assert!(clock.time_remain_at_turn_start().is_none());
    }
}
