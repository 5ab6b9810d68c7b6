use super::clock::{Clock, ClockValues};
use super::color::{Color, Victor};
use super::mv::Move;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Termination reason. Matches the glossary's `condition` enumeration
/// exactly so wire messages and persisted records use the same vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Aborted,
    Checkmate,
    Stalemate,
    Repetition,
    MoveRule,
    InsuffMat,
    RoyalCapture,
    AllRoyalsCaptured,
    AllPiecesCaptured,
    Koth,
    Resignation,
    Agreement,
    Time,
    Disconnect,
}

impl Condition {
    /// Conditions a client is entitled to assert itself when submitting a
    /// move (§4.7 step 8). Everything else (resignation, agreement,
    /// aborted, time, disconnect) is only ever set by the server.
    pub fn is_client_claimable(self) -> bool {
        matches!(
            self,
            Condition::Checkmate
                | Condition::Stalemate
                | Condition::Repetition
                | Condition::MoveRule
                | Condition::InsuffMat
                | Condition::RoyalCapture
                | Condition::AllRoyalsCaptured
                | Condition::AllPiecesCaptured
                | Condition::Koth
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conclusion {
    pub victor: Option<Victor>,
    pub condition: Condition,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameRules {
    pub turn_order: Vec<Color>,
    pub move_rule: Option<String>,
}

/// The shared, variant-agnostic game state: moves, whose turn it is, the
/// conclusion (if any), and the optional clock. Deliberately ignorant of
/// anything match-level (players, draw offers, timers) — that lives in
/// `MatchInfo`, mirroring the teacher's split between pure game state and
/// match bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseGame {
    pub variant: String,
    pub metadata: HashMap<String, String>,
    pub game_rules: GameRules,
    pub moves: Vec<Move>,
    pub whos_turn: Option<Color>,
    pub conclusion: Option<Conclusion>,
    pub untimed: bool,
    pub clocks: Option<Clock>,
}

impl BaseGame {
    pub fn new_timed(
        variant: String,
        metadata: HashMap<String, String>,
        turn_order: Vec<Color>,
        start_time_millis: i64,
        increment_millis: i64,
        now: DateTime<Utc>,
    ) -> BaseGame {
        let first = turn_order[0];
        let clock = Clock::new(start_time_millis, increment_millis, &turn_order, first, now);
        BaseGame {
            variant,
            metadata,
            game_rules: GameRules { turn_order, move_rule: None },
            moves: Vec::new(),
            whos_turn: Some(first),
            conclusion: None,
            untimed: false,
            clocks: Some(clock),
        }
    }

    pub fn new_untimed(variant: String, metadata: HashMap<String, String>, turn_order: Vec<Color>) -> BaseGame {
        let first = turn_order[0];
        BaseGame {
            variant,
            metadata,
            game_rules: GameRules { turn_order, move_rule: None },
            moves: Vec::new(),
            whos_turn: Some(first),
            conclusion: None,
            untimed: true,
            clocks: None,
        }
    }

    pub fn is_game_over(&self) -> bool {
        self.conclusion.is_some()
    }

    /// Glossary: "Resignable game: move list length >= 2."
    pub fn is_resignable(&self) -> bool {
        self.moves.len() >= 2
    }

    /// Glossary: "Abortable game: move list length <= 1."
    pub fn is_abortable(&self) -> bool {
        self.moves.len() <= 1
    }

    /// Glossary: "Borderline resignable: move list length == 2."
    pub fn is_borderline_resignable(&self) -> bool {
        self.moves.len() == 2
    }

    pub fn expected_move_number(&self) -> usize {
        self.moves.len() + 1
    }

    fn color_at_ply(&self, ply_index: usize) -> Color {
        let n = self.game_rules.turn_order.len();
        self.game_rules.turn_order[ply_index % n]
    }

    /// Appends `mv`, advances `whos_turn`, and (for timed games) pushes
    /// the clock, returning the mover's updated remaining time so the
    /// caller can stamp it onto the move. §4.1 `Clock::push`.
    pub fn apply_move(&mut self, mv: Move, now: DateTime<Utc>) -> Option<i64> {
        let prev = self.color_at_ply(self.moves.len());
        self.moves.push(Move { clock_stamp: None, ..mv });
        let ply_count_after = self.moves.len();
        let next = self.color_at_ply(ply_count_after);
        self.whos_turn = Some(next);

        let stamp = self.clocks.as_mut().map(|clock| clock.push(prev, next, ply_count_after, now));
        if let Some(stamp) = stamp {
            self.moves.last_mut().expect("just pushed").clock_stamp = Some(stamp);
        }
        stamp
    }

    pub fn conclude(&mut self, conclusion: Conclusion, now: DateTime<Utc>) {
        self.conclusion = Some(conclusion);
        if let Some(clock) = self.clocks.as_mut() {
            clock.stop(self.is_resignable(), self.whos_turn, now);
        }
        self.whos_turn = None;
    }

    pub fn clock_snapshot(&self, now: DateTime<Utc>) -> Option<ClockValues> {
        self.clocks
            .as_ref()
            .map(|clock| clock.snapshot(self.is_resignable(), self.is_game_over(), self.whos_turn, now))
    }

    /// §4.7 step 7 distance cap: `digits <= floor(1 + 4.5 * elapsedSeconds)`.
    pub fn distance_cap(elapsed_seconds: f64) -> u32 {
        (1.0 + 4.5 * elapsed_seconds).floor() as u32
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::domain::mv::Coords;
    use chrono::TimeZone;

    fn t(offset_secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(offset_secs)
    }

    fn mv(x1: u32, y1: u32, x2: u32, y2: u32) -> Move {
        Move {
            compact: format!("{x1},{y1}>{x2},{y2}"),
            start: Coords { x: x1, y: y1 },
            end: Coords { x: x2, y: y2 },
            promotion: None,
            clock_stamp: None,
        }
    }

    #[test]
    fn turn_parity_holds_across_moves() {
        let mut game = BaseGame::new_untimed(
            "standard".into(),
            HashMap::new(),
            vec![Color::White, Color::Black],
        );
        assert_eq!(game.whos_turn, Some(Color::White));
        game.apply_move(mv(1, 2, 3, 4), t(0));
        assert_eq!(game.whos_turn, Some(Color::Black));
        game.apply_move(mv(3, 4, 5, 6), t(1));
        assert_eq!(game.whos_turn, Some(Color::White));
    }

    #[test]
    fn conclude_clears_whos_turn_and_stops_clock() {
        let mut game = BaseGame::new_timed(
            "standard".into(),
            HashMap::new(),
            vec![Color::White, Color::Black],
            60_000,
            0,
            t(0),
        );
        game.apply_move(mv(1, 2, 3, 4), t(1));
        game.apply_move(mv(3, 4, 5, 6), t(2));
        game.conclude(
            Conclusion { victor: Some(Victor::White), condition: Condition::Resignation },
            t(3),
        );
        assert_eq!(game.whos_turn, None);
        assert!(game.is_game_over());
    }

    #[test]
    fn distance_cap_matches_formula() {
        assert_eq!(BaseGame::distance_cap(0.0), 1);
        assert_eq!(BaseGame::distance_cap(10.0), 46);
    }
}
