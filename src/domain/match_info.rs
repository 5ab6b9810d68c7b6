use super::base_game::BaseGame;
use super::color::Color;
use super::draw_offer::DrawOffer;
use super::identity::PlayerIdentity;
use crate::scheduler::TimerHandle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Publicity {
    Public,
    Private,
}

/// The cushion timer, the auto-resign timer, its fire time, and why it
/// was started. Per §3: all four are jointly defined or jointly
/// undefined, besides `start_id` which tracks only the cushion leg.
#[derive(Debug, Clone, Default)]
pub struct Disconnect {
    pub start_id: Option<TimerHandle>,
    pub timeout_id: Option<TimerHandle>,
    pub time_to_auto_loss: Option<DateTime<Utc>>,
    pub was_by_choice: Option<bool>,
}

impl Disconnect {
    pub fn is_armed(&self) -> bool {
        self.timeout_id.is_some()
    }

    pub fn clear(&mut self) {
        *self = Disconnect::default();
    }
}

pub struct PlayerData {
    pub identifier: PlayerIdentity,
    pub socket: Option<crate::transport::socket::SocketId>,
    pub disconnect: Disconnect,
}

impl PlayerData {
    pub fn new(identifier: PlayerIdentity) -> PlayerData {
        PlayerData {
            identifier,
            socket: None,
            disconnect: Disconnect::default(),
        }
    }
}

pub struct MatchInfo {
    pub id: i64,
    pub time_created: DateTime<Utc>,
    pub time_ended: Option<DateTime<Utc>>,
    pub publicity: Publicity,
    pub rated: bool,
    pub player_data: HashMap<Color, PlayerData>,
    pub auto_time_loss_timeout_id: Option<TimerHandle>,
    pub auto_afk_resign_timeout_id: Option<TimerHandle>,
    pub auto_afk_resign_time: Option<DateTime<Utc>>,
    pub draw_offer: DrawOffer,
    pub delete_timeout_id: Option<TimerHandle>,
    pub position_pasted: bool,
}

impl MatchInfo {
    pub fn opponent_of(&self, color: Color) -> Color {
        color.invert()
    }

    pub fn player(&self, color: Color) -> &PlayerData {
        self.player_data
            .get(&color)
            .expect("every color in turn_order has a PlayerData entry")
    }

    pub fn player_mut(&mut self, color: Color) -> &mut PlayerData {
        self.player_data
            .get_mut(&color)
            .expect("every color in turn_order has a PlayerData entry")
    }

    pub fn color_of_socket(&self, socket: crate::transport::socket::SocketId) -> Option<Color> {
        self.player_data
            .iter()
            .find(|(_, data)| data.socket == Some(socket))
            .map(|(color, _)| *color)
    }
}

/// The unit the registry owns: the variant-agnostic game state plus all
/// match-level bookkeeping around it.
pub struct ServerGame {
    pub base_game: BaseGame,
    pub info: MatchInfo,
}

impl ServerGame {
    pub fn id(&self) -> i64 {
        self.info.id
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn disconnect_fields_clear_together() {
        let mut d = Disconnect {
            start_id: Some(TimerHandle(1)),
            timeout_id: Some(TimerHandle(2)),
            time_to_auto_loss: Some(Utc::now()),
            was_by_choice: Some(true),
        };
        d.clear();
        assert!(d.start_id.is_none());
        assert!(d.timeout_id.is_none());
        assert!(d.time_to_auto_loss.is_none());
        assert!(d.was_by_choice.is_none());
    }
}
