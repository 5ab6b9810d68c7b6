//! AFK/AFK-Return, resync, and joingame — §4.5/§4.8. New logic; grounded
//! on the same `Context`-queue shape as `lifecycle_actions`.

use super::RouterContext;
use crate::lifecycle::join_game_message;
use crate::transport;
use crate::transport::messages::OutboundGameMessage;
use crate::transport::socket::SocketId;
use crate::domain::Color;
use chrono::Utc;

/// §4.5 `onAFK`. Untimed-only: a timed game's clock already penalizes
/// idleness, so AFK auto-resign is gated on `untimed`.
pub async fn on_afk(ctx: &RouterContext, game_id: i64, color: Color) {
    let Some(handle) = ctx.registry.get(game_id) else { return };
    let mut game = handle.lock().await;

    let precondition = !game.base_game.is_game_over()
        && game.base_game.untimed
        && game.base_game.is_resignable()
        && game.base_game.whos_turn == Some(color)
        && !game.info.player(color).disconnect.is_armed();
    if !precondition {
        return;
    }

    let now = Utc::now();
    let lifecycle = ctx.lifecycle.clone();
    ctx.lifecycle.timers.on_afk(&mut game.info, color, now, move || {
        lifecycle.spawn_auto_loss(game_id, color.invert(), crate::domain::base_game::Condition::Disconnect);
    });
}

/// §4.5 `onAFKReturn`.
pub async fn on_afk_return(ctx: &RouterContext, game_id: i64, color: Color) {
    let Some(handle) = ctx.registry.get(game_id) else { return };
    let mut game = handle.lock().await;

    if game.info.auto_afk_resign_timeout_id.is_none() {
        return;
    }
    ctx.lifecycle.timers.on_afk_return(&mut game.info, color);
}

/// §4.8 `resync`. The sender may not currently be subscribed to `game_id`
/// (a fresh connection after a reload) — the socket's identity is what
/// ties it back to a seat.
pub async fn resync(ctx: &RouterContext, sender: SocketId, game_id: i64) {
    let Some(handle) = ctx.registry.get(game_id) else {
        return resync_from_store(ctx, sender, game_id).await;
    };
    let mut game = handle.lock().await;

    let Some(color) = matching_color(&game.info, sender) else {
        return sender.send_json(&OutboundGameMessage::NoGame);
    };

    transport::subscribe(&mut game.info, color, sender);
    ctx.lifecycle.timers.cancel_disconnect_timer(&mut game.info, color, false);

    let message = join_game_message(&game.base_game, &game.info, color, None);
    sender.send_json(&message);
}

async fn resync_from_store(ctx: &RouterContext, sender: SocketId, game_id: i64) {
    match ctx.lifecycle.repository.get_finished_game(game_id).await {
        Ok(Some(stored)) => sender.send_json(&OutboundGameMessage::LoggedGameInfo {
            game_conclusion: stored.conclusion,
            moves: stored.moves.iter().map(|m| crate::transport::messages::MoveEnvelope {
                compact: m.compact.clone(),
                clock_stamp: m.clock_stamp,
            }).collect(),
        }),
        Ok(None) => sender.send_json(&OutboundGameMessage::NoGame),
        Err(err) => {
            log::error!("resync: could not read finished game {game_id}: {err}");
            sender.send_json(&OutboundGameMessage::NoGame);
        }
    }
}

/// §4.8 `joingame`. Locates the player's current game via their identity
/// in `ActivePlayersIndex`, then re-subscribes and clears any presence
/// timers the way a fresh `createGame` subscription would have.
pub async fn join_game(ctx: &RouterContext, sender: SocketId) {
    let Some(identity) = sender.identity() else {
        return sender.send_json(&OutboundGameMessage::NoGame);
    };
    let Some(game_id) = ctx.lifecycle.active_players.game_id_of(&identity) else {
        return sender.send_json(&OutboundGameMessage::NoGame);
    };
    let Some(handle) = ctx.registry.get(game_id) else {
        return sender.send_json(&OutboundGameMessage::NoGame);
    };
    let mut game = handle.lock().await;
    let Some(color) = matching_color(&game.info, sender) else {
        return sender.send_json(&OutboundGameMessage::NoGame);
    };

    transport::subscribe(&mut game.info, color, sender);

    if game.base_game.whos_turn == Some(color) {
        ctx.lifecycle.timers.cancel_auto_afk_resign_timer(&mut game.info, true, color.invert());
    }
    ctx.lifecycle.timers.cancel_disconnect_timer(&mut game.info, color, false);

    let message = join_game_message(&game.base_game, &game.info, color, None);
    sender.send_json(&message);
}

/// Finds which seat in `info` belongs to the already-subscribed socket, or
/// failing that, to `sender`'s authenticated identity.
fn matching_color(info: &crate::domain::MatchInfo, sender: SocketId) -> Option<Color> {
    if let Some(color) = info.color_of_socket(sender) {
        return Some(color);
    }
    let identity = sender.identity()?;
    [Color::White, Color::Black]
        .into_iter()
        .find(|&color| info.player(color).identifier == identity)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::domain::mv::{Coords, Move};
    use crate::domain::{Publicity, PlayerIdentity};
    use crate::router::test_support::{context, request};
    use crate::transport::socket::register_test_socket;

    fn mv() -> Move {
        Move {
            compact: "1,2>3,4".into(),
            start: Coords { x: 1, y: 2 },
            end: Coords { x: 3, y: 4 },
            promotion: None,
            clock_stamp: None,
        }
    }

    async fn resignable_untimed_game(ctx: &RouterContext) -> i64 {
        let game_id = ctx.lifecycle.create_game(request(Publicity::Private, false), Utc::now()).await;
        let handle = ctx.registry.get(game_id).unwrap();
        let mut game = handle.lock().await;
        game.base_game.apply_move(mv(), Utc::now());
        game.base_game.apply_move(mv(), Utc::now());
        game_id
    }

    #[tokio::test(start_paused = true)]
    async fn afk_arms_a_timer_only_on_the_movers_turn() {
        let ctx = context();
        let game_id = resignable_untimed_game(&ctx).await;

        on_afk(&ctx, game_id, Color::Black).await; // not Black's turn
        assert!(ctx.registry.get(game_id).unwrap().lock().await.info.auto_afk_resign_timeout_id.is_none());

        on_afk(&ctx, game_id, Color::White).await; // White moves next
        assert!(ctx.registry.get(game_id).unwrap().lock().await.info.auto_afk_resign_timeout_id.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn afk_return_clears_the_timer() {
        let ctx = context();
        let game_id = resignable_untimed_game(&ctx).await;

        on_afk(&ctx, game_id, Color::White).await;
        on_afk_return(&ctx, game_id, Color::White).await;

        assert!(ctx.registry.get(game_id).unwrap().lock().await.info.auto_afk_resign_timeout_id.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn resync_resubscribes_a_matching_identity_and_cancels_disconnect() {
        let ctx = context();
        let game_id = ctx.lifecycle.create_game(request(Publicity::Private, false), Utc::now()).await;
        let socket = register_test_socket();
        socket.set_identity(Some(PlayerIdentity::Guest { browser_id: "w".into() }));

        resync(&ctx, socket, game_id).await;

        let game = ctx.registry.get(game_id).unwrap();
        let game = game.lock().await;
        assert_eq!(game.info.player(Color::White).socket, Some(socket));
    }

    #[tokio::test(start_paused = true)]
    async fn join_game_uses_the_active_players_index_to_find_the_seat() {
        let ctx = context();
        let game_id = ctx.lifecycle.create_game(request(Publicity::Private, false), Utc::now()).await;
        let socket = register_test_socket();
        socket.set_identity(Some(PlayerIdentity::Guest { browser_id: "b".into() }));

        join_game(&ctx, socket).await;

        let game = ctx.registry.get(game_id).unwrap();
        let game = game.lock().await;
        assert_eq!(game.info.player(Color::Black).socket, Some(socket));
    }

    #[tokio::test(start_paused = true)]
    async fn join_game_with_no_identity_is_a_harmless_noop() {
        let ctx = context();
        let socket = register_test_socket();
        join_game(&ctx, socket).await; // must not panic without an identity
    }
}
