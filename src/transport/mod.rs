pub mod messages;
pub mod socket;

use crate::domain::{Color, MatchInfo};
use messages::{GeneralMessage, OutboundGameMessage};
use socket::{SocketId, Subscription};

/// Subscribes `socket` to `color`'s seat in `game`, wiring both halves of
/// the non-owning back-reference described in §9: the match gets the
/// strong handle, the socket gets only `{gameId, color}`.
pub fn subscribe(game: &mut MatchInfo, color: Color, socket: SocketId) {
    game.player_mut(color).socket = Some(socket);
    socket.set_subscription(Some(Subscription { game_id: game.id, color }));
}

/// Detaches `color`'s socket from `game`, clearing both halves. A no-op
/// if the color has no socket attached.
pub fn unsubscribe(game: &mut MatchInfo, color: Color) {
    if let Some(socket) = game.player_mut(color).socket.take() {
        socket.set_subscription(None);
    }
}

pub fn send(game: &MatchInfo, color: Color, message: &OutboundGameMessage) {
    if let Some(socket) = game.player(color).socket {
        socket.send_json(message);
    }
}

pub fn send_to_opponent(game: &MatchInfo, color: Color, message: &OutboundGameMessage) {
    send(game, game.opponent_of(color), message);
}

pub fn send_general(socket: SocketId, message: &GeneralMessage) {
    socket.send_json(message);
}

/// Test double for the transport boundary, modeled on the teacher's
/// `TestInstance`/mock-`Sender`: captures every message a handler would
/// have sent, keyed by recipient color, so router tests can assert on
/// "what would the opponent have seen" without a real socket.
#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct Inbox {
        pub sent: RefCell<HashMap<Color, Vec<OutboundGameMessage>>>,
    }

    impl Inbox {
        pub fn record(&self, color: Color, message: OutboundGameMessage) {
            self.sent.borrow_mut().entry(color).or_default().push(message);
        }

        pub fn last(&self, color: Color) -> Option<OutboundGameMessage> {
            self.sent.borrow().get(&color).and_then(|v| v.last().cloned())
        }
    }
}
