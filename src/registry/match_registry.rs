use crate::domain::ServerGame;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Owns every live `ServerGame`, keyed by game id. Each entry is wrapped
/// in its own `tokio::sync::Mutex` so a handler locks exactly one game
/// for the duration of its critical section (§5 guarantee 1) — the
/// `DashMap` itself only serializes map-structure changes (insert/remove
/// of a whole entry), the same division of labor as the teacher's
/// `actors/room.rs` `ALL_ROOMS` map.
#[derive(Default)]
pub struct MatchRegistry {
    games: DashMap<i64, Arc<Mutex<ServerGame>>>,
}

impl MatchRegistry {
    pub fn new() -> MatchRegistry {
        MatchRegistry::default()
    }

    /// Inserts a freshly created game. Panics if `game_id` is already
    /// registered — `createGame` is responsible for minting an id that is
    /// unique in the live registry (§4.6 step 1) before calling this.
    pub fn insert(&self, game_id: i64, game: ServerGame) {
        let previous = self.games.insert(game_id, Arc::new(Mutex::new(game)));
        assert!(previous.is_none(), "game id {game_id} was already registered");
    }

    pub fn get(&self, game_id: i64) -> Option<Arc<Mutex<ServerGame>>> {
        self.games.get(&game_id).map(|entry| entry.clone())
    }

    /// Removes the entry first so no later async step can be re-entered
    /// for this id (§9 "remove from registry first, then await the
    /// transaction"). Returns the removed handle so the caller can still
    /// finish winding it down.
    pub fn remove(&self, game_id: i64) -> Option<Arc<Mutex<ServerGame>>> {
        self.games.remove(&game_id).map(|(_, game)| game)
    }

    pub fn contains(&self, game_id: i64) -> bool {
        self.games.contains_key(&game_id)
    }

    pub fn all_ids(&self) -> Vec<i64> {
        self.games.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::domain::base_game::BaseGame;
    use crate::domain::match_info::{MatchInfo, Publicity};
    use crate::domain::draw_offer::DrawOffer;
    use crate::domain::Color;
    use std::collections::HashMap;

    fn sample_game(id: i64) -> ServerGame {
        ServerGame {
            base_game: BaseGame::new_untimed("standard".into(), HashMap::new(), vec![Color::White, Color::Black]),
            info: MatchInfo {
                id,
                time_created: chrono::Utc::now(),
                time_ended: None,
                publicity: Publicity::Private,
                rated: false,
                player_data: HashMap::new(),
                auto_time_loss_timeout_id: None,
                auto_afk_resign_timeout_id: None,
                auto_afk_resign_time: None,
                draw_offer: DrawOffer::default(),
                delete_timeout_id: None,
                position_pasted: false,
            },
        }
    }

    #[test]
    fn remove_drops_entry_so_id_can_be_reinserted() {
        let registry = MatchRegistry::new();
        registry.insert(1, sample_game(1));
        assert!(registry.contains(1));
        registry.remove(1);
        assert!(!registry.contains(1));
        registry.insert(1, sample_game(1));
        assert!(registry.contains(1));
    }

    #[tokio::test]
    async fn get_returns_a_handle_that_locks_independently_of_the_map() {
        let registry = MatchRegistry::new();
        registry.insert(5, sample_game(5));
        let handle = registry.get(5).unwrap();
        let guard = handle.lock().await;
        assert_eq!(guard.id(), 5);
    }
}
