pub mod active_players_index;
pub mod game_count;
pub mod match_registry;

pub use active_players_index::ActivePlayersIndex;
pub use game_count::GameCount;
pub use match_registry::MatchRegistry;
