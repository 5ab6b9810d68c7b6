//! Unexpected socket close — §4.5 step 1. New logic; grounded on the same
//! `Context`-queue shape as the other router submodules, and on the timer
//! re-entrancy rule every scheduler callback in this crate follows: a
//! continuation cannot hold `&mut MatchInfo` across the scheduler's sleep,
//! so it re-locks the game and re-checks `is_game_over` on wake.

use super::RouterContext;
use crate::domain::base_game::Condition;
use crate::transport;
use crate::transport::socket::SocketId;
use chrono::Utc;

/// Called from the transport layer's reader task once a connection ends,
/// whether by a clean close frame or a dropped connection — this crate
/// has no inbound "leave" action, so every reader-task end is treated as
/// unexpected (`notByChoice = true`) the way §4.5 step 1 describes.
pub async fn on_socket_closed(ctx: &RouterContext, sender: SocketId) {
    let Some(subscription) = sender.subscription() else { return };
    let Some(handle) = ctx.registry.get(subscription.game_id) else { return };
    let mut game = handle.lock().await;

    if game.base_game.is_game_over() {
        return;
    }
    let color = subscription.color;
    if game.info.player(color).socket != Some(sender) {
        return; // a newer socket already took this seat
    }

    transport::unsubscribe(&mut game.info, color);

    let now = Utc::now();
    let resignable = game.base_game.is_resignable();
    let whos_turn = game.base_game.whos_turn;
    let game_id = subscription.game_id;
    let lifecycle_arm = ctx.lifecycle.clone();
    let lifecycle_resign = ctx.lifecycle.clone();

    ctx.lifecycle.timers.on_unexpected_close(
        &mut game.info,
        color,
        true,
        resignable,
        whos_turn,
        now,
        move || arm_disconnect_timer(lifecycle_arm, game_id, color),
        move || lifecycle_resign.spawn_auto_loss(game_id, color.invert(), Condition::Disconnect),
    );
}

/// The cushion's continuation: re-acquires the game, and only then arms
/// the real auto-resign timer. A resync or rejoin during the cushion
/// already cleared `disconnect`, in which case this is a no-op.
fn arm_disconnect_timer(lifecycle: std::sync::Arc<crate::lifecycle::Lifecycle>, game_id: i64, color: crate::domain::Color) {
    tokio::spawn(async move {
        let Some(handle) = lifecycle.registry.get(game_id) else { return };
        let mut game = handle.lock().await;
        if game.base_game.is_game_over() || game.info.player(color).disconnect.is_armed() {
            return;
        }

        let now = Utc::now();
        let resignable = game.base_game.is_resignable();
        let whos_turn = game.base_game.whos_turn;
        let lifecycle_resign = lifecycle.clone();
        lifecycle.timers.start_disconnect_timer(&mut game.info, color, true, resignable, whos_turn, now, move || {
            lifecycle_resign.spawn_auto_loss(game_id, color.invert(), Condition::Disconnect);
        });
    });
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::domain::{Color, Publicity};
    use crate::router::test_support::{context, request};
    use crate::transport::socket::register_test_socket;
    use crate::transport::{self as transport_mod};

    #[tokio::test(start_paused = true)]
    async fn unexpected_close_unsubscribes_and_schedules_the_cushion() {
        let ctx = context();
        let game_id = ctx.lifecycle.create_game(request(Publicity::Private, false), Utc::now()).await;
        let socket = register_test_socket();
        {
            let handle = ctx.registry.get(game_id).unwrap();
            let mut game = handle.lock().await;
            transport_mod::subscribe(&mut game.info, Color::White, socket);
        }

        on_socket_closed(&ctx, socket).await;

        let handle = ctx.registry.get(game_id).unwrap();
        let game = handle.lock().await;
        assert!(game.info.player(Color::White).socket.is_none(), "unsubscribe must run immediately");
        assert!(
            game.info.player(Color::White).disconnect.start_id.is_some(),
            "the cushion must be scheduled right away"
        );
        assert!(
            !game.info.player(Color::White).disconnect.is_armed(),
            "the real auto-resign timer only arms once the cushion fires"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn a_stale_socket_that_already_lost_its_seat_is_a_noop() {
        let ctx = context();
        let game_id = ctx.lifecycle.create_game(request(Publicity::Private, false), Utc::now()).await;
        let stale = register_test_socket();
        let fresh = register_test_socket();
        {
            let handle = ctx.registry.get(game_id).unwrap();
            let mut game = handle.lock().await;
            transport_mod::subscribe(&mut game.info, Color::White, stale);
            transport_mod::subscribe(&mut game.info, Color::White, fresh);
        }

        on_socket_closed(&ctx, stale).await;

        let handle = ctx.registry.get(game_id).unwrap();
        let game = handle.lock().await;
        assert_eq!(game.info.player(Color::White).socket, Some(fresh), "the stale socket must not evict the current one");
    }
}
