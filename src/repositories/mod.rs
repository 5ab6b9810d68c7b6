//! The narrow persistence interfaces §1/§6 name: the core depends on
//! these traits, never on `sqlx` directly, mirroring the teacher's own
//! layering where `sync_match.rs` is persistence-agnostic and only
//! `db::game` touches `sqlx`. `db` supplies the concrete sqlite-backed
//! implementations.

use crate::domain::{BaseGame, Color, MatchInfo};
use crate::rating::glicko1::Rating;
use async_trait::async_trait;
use std::collections::HashMap;

/// The outcome of one logged game, as `deleteGame` hands it to the
/// persistence transaction (§4.6 step 2).
pub struct FinishedGame<'a> {
    pub game_id: i64,
    pub base_game: &'a BaseGame,
    pub info: &'a MatchInfo,
}

/// Per-color rating delta produced by a successful rated log, forwarded
/// to clients as `gameratingchange` (§4.6 step 3).
#[derive(Debug, Clone)]
pub struct RatingChange {
    pub new_rating: Rating,
    pub change: f64,
}

/// §1 "Persistence: the games/player_games/player_stats/leaderboards...
/// tables — called through narrow repository interfaces, with
/// transactional atomicity required." One method, one transaction,
/// covering all four tables named in §1.
#[async_trait]
pub trait GameRepository: Send + Sync {
    /// Mints a game id unique in the persistent id space (§4.6 step 1).
    async fn generate_unique_game_id(&self) -> Result<i64, sqlx::Error>;

    /// Writes `games`, `player_games`, `player_stats`, and (if rated)
    /// `leaderboards` as a single transaction. Returns the per-color
    /// rating change on a rated game, `None` for a casual one. Per §7.6,
    /// the *only* thrown-exception-as-rollback-signal boundary in this
    /// crate lives inside the implementation of this method.
    async fn log_game_atomically(
        &self,
        game: FinishedGame<'_>,
    ) -> Result<Option<HashMap<Color, RatingChange>>, sqlx::Error>;

    /// Fetches a terminal game's record for `resync`'s persistent-store
    /// fallback (§4.8) and the replay HTTP route (§B.8).
    async fn get_finished_game(&self, game_id: i64) -> Result<Option<StoredGame>, sqlx::Error>;

    /// The rating a player currently holds on one leaderboard, consulted
    /// when building a rated game's metadata (§4.6 step 2, `WhiteElo`).
    async fn elo_of_player(&self, user_id: i64, leaderboard_id: &str) -> Result<Option<Rating>, sqlx::Error>;
}

#[derive(Debug, Clone)]
pub struct StoredGame {
    pub game_id: i64,
    pub moves: Vec<crate::domain::Move>,
    pub conclusion: Option<crate::domain::base_game::Conclusion>,
}

/// §7.6: when `log_game_atomically` rolls back, the game text is still
/// recorded somewhere operators can recover it from.
pub trait UnloggedGameSink: Send + Sync {
    fn record(&self, game_id: i64, reason: &str, game_text: &str);
}

/// External "rating abuse monitor" callback §4.6 step 5 — fired after
/// `deleteGame`, outside the persistence transaction.
#[async_trait]
pub trait RatingAbuseMonitor: Send + Sync {
    async fn observe(&self, game_id: i64, info: &MatchInfo);
}
