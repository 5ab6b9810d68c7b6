pub mod base_game;
pub mod clock;
pub mod color;
pub mod draw_offer;
pub mod identity;
pub mod match_info;
pub mod mv;

pub use base_game::{BaseGame, Condition, Conclusion};
pub use color::{Color, Victor};
pub use identity::PlayerIdentity;
pub use match_info::{MatchInfo, PlayerData, Publicity, ServerGame};
pub use mv::Move;
