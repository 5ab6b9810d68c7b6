//! `report`/`paste` — §4.8. New logic; grounded on the same
//! `Context`-queue shape as the other router submodules.

use super::RouterContext;
use crate::domain::base_game::{Condition, Conclusion};
use crate::domain::{Color, Publicity};
use crate::lifecycle::game_update_message;
use crate::transport;
use chrono::Utc;

/// §4.8 `report`. Only meaningful on public games, and only against the
/// opponent's own move — a self-report (flagging a move the reporter made
/// themselves) is rejected outright.
pub async fn handle(ctx: &RouterContext, game_id: i64, color: Color, reason: String, opponents_move_number: usize) {
    let Some(handle) = ctx.registry.get(game_id) else { return };
    let mut game = handle.lock().await;

    if game.info.publicity == Publicity::Private {
        return;
    }
    if game.base_game.is_game_over() {
        return;
    }

    let Some(ply_index) = opponents_move_number.checked_sub(1) else { return };
    let turn_order = &game.base_game.game_rules.turn_order;
    let Some(&mover) = turn_order.get(ply_index % turn_order.len()) else { return };
    if mover != color.invert() || game.base_game.moves.get(ply_index).is_none() {
        return; // self-report, or the move doesn't exist
    }

    let reported_move = game.base_game.moves.pop();
    log::warn!(
        "game {game_id}: {color:?} reported move {opponents_move_number} ({reason:?}), popped {reported_move:?}"
    );

    let conclusion = Conclusion { victor: None, condition: Condition::Aborted };
    ctx.lifecycle.set_game_conclusion(game_id, &mut game, conclusion, Utc::now()).await;

    let message = game_update_message(&game.base_game, &game.info, None);
    for c in [Color::White, Color::Black] {
        transport::send(&game.info, c, &message);
    }
}

/// §4.8 `paste`. One-way: once set there is no operation that clears it
/// (§9 Open Question resolution).
pub async fn paste(ctx: &RouterContext, game_id: i64, _color: Color) {
    let Some(handle) = ctx.registry.get(game_id) else { return };
    let mut game = handle.lock().await;

    if game.info.publicity != Publicity::Private || game.info.rated {
        return;
    }
    game.info.position_pasted = true;
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::domain::mv::{Coords, Move};
    use crate::router::test_support::{context, request};

    fn mv() -> Move {
        Move {
            compact: "1,2>3,4".into(),
            start: Coords { x: 1, y: 2 },
            end: Coords { x: 3, y: 4 },
            promotion: None,
            clock_stamp: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reporting_the_opponents_move_pops_it_and_aborts() {
        let ctx = context();
        let game_id = ctx.lifecycle.create_game(request(Publicity::Public, false), Utc::now()).await;
        {
            let game = ctx.registry.get(game_id).unwrap();
            game.lock().await.base_game.apply_move(mv(), Utc::now());
        }

        handle(&ctx, game_id, Color::Black, "tampered board".into(), 1).await;

        let game = ctx.registry.get(game_id).unwrap();
        let game = game.lock().await;
        assert!(game.base_game.moves.is_empty());
        assert_eq!(game.base_game.conclusion.as_ref().unwrap().condition, Condition::Aborted);
    }

    #[tokio::test(start_paused = true)]
    async fn reporting_ones_own_move_is_rejected() {
        let ctx = context();
        let game_id = ctx.lifecycle.create_game(request(Publicity::Public, false), Utc::now()).await;
        {
            let game = ctx.registry.get(game_id).unwrap();
            game.lock().await.base_game.apply_move(mv(), Utc::now());
        }

        handle(&ctx, game_id, Color::White, "self report".into(), 1).await;

        let game = ctx.registry.get(game_id).unwrap();
        let game = game.lock().await;
        assert_eq!(game.base_game.moves.len(), 1, "the move must survive a self-report");
        assert!(!game.base_game.is_game_over());
    }

    #[tokio::test(start_paused = true)]
    async fn reports_on_private_games_are_rejected() {
        let ctx = context();
        let game_id = ctx.lifecycle.create_game(request(Publicity::Private, false), Utc::now()).await;
        {
            let game = ctx.registry.get(game_id).unwrap();
            game.lock().await.base_game.apply_move(mv(), Utc::now());
        }

        handle(&ctx, game_id, Color::Black, "tampered board".into(), 1).await;

        let game = ctx.registry.get(game_id).unwrap();
        assert!(!game.lock().await.base_game.is_game_over());
    }

    #[tokio::test(start_paused = true)]
    async fn paste_sets_the_flag_only_on_a_private_casual_game() {
        let ctx = context();
        let private_casual = ctx.lifecycle.create_game(request(Publicity::Private, false), Utc::now()).await;
        let private_rated = ctx.lifecycle.create_game(request(Publicity::Private, true), Utc::now()).await;
        let public_casual = ctx.lifecycle.create_game(request(Publicity::Public, false), Utc::now()).await;

        paste(&ctx, private_casual, Color::White).await;
        paste(&ctx, private_rated, Color::White).await;
        paste(&ctx, public_casual, Color::White).await;

        assert!(ctx.registry.get(private_casual).unwrap().lock().await.info.position_pasted);
        assert!(!ctx.registry.get(private_rated).unwrap().lock().await.info.position_pasted);
        assert!(!ctx.registry.get(public_casual).unwrap().lock().await.info.position_pasted);
    }
}
