//! `abort`/`resign`/draw-offer family — §4.8. New logic grounded on the
//! same `Context`-queue shape as `move_submission`: validate the
//! precondition, mutate, notify.

use super::RouterContext;
use crate::domain::base_game::{Condition, Conclusion};
use crate::domain::{Color, Victor};
use crate::lifecycle::game_update_message;
use crate::transport;
use crate::transport::messages::{GeneralMessage, OutboundGameMessage};
use chrono::Utc;

/// §4.8 `abort`. Allowed while abortable (<=1 moves) or "borderline
/// resignable" (exactly 2 moves, logged leniently per the glossary).
pub async fn abort(ctx: &RouterContext, game_id: i64, color: Color) {
    let Some(handle) = ctx.registry.get(game_id) else { return };
    let mut game = handle.lock().await;
    if game.base_game.is_game_over() {
        return;
    }
    if !game.base_game.is_abortable() {
        if game.base_game.is_borderline_resignable() {
            log::info!("game {game_id}: lenient abort at exactly 2 plies by {color:?}");
        } else {
            return;
        }
    }

    let conclusion = Conclusion { victor: None, condition: Condition::Aborted };
    ctx.lifecycle.set_game_conclusion(game_id, &mut game, conclusion, Utc::now()).await;
    broadcast_update(&game.base_game, &game.info);
}

/// §4.8 `resign`. Only once the game is resignable (>=2 moves).
pub async fn resign(ctx: &RouterContext, game_id: i64, color: Color) {
    let Some(handle) = ctx.registry.get(game_id) else { return };
    let mut game = handle.lock().await;
    if game.base_game.is_game_over() || !game.base_game.is_resignable() {
        return;
    }

    let conclusion = Conclusion { victor: Some(Victor::from(color.invert())), condition: Condition::Resignation };
    ctx.lifecycle.set_game_conclusion(game_id, &mut game, conclusion, Utc::now()).await;
    broadcast_update(&game.base_game, &game.info);
}

/// §4.2 `offerdraw`.
pub async fn offer_draw(ctx: &RouterContext, game_id: i64, color: Color) {
    let Some(handle) = ctx.registry.get(game_id) else { return };
    let mut game = handle.lock().await;
    let ply_count = game.base_game.moves.len();
    let is_over = game.base_game.is_game_over();
    let is_resignable = game.base_game.is_resignable();

    match game.info.draw_offer.open(color, ply_count, is_over, is_resignable) {
        Ok(()) => transport::send_to_opponent(&game.info, color, &OutboundGameMessage::DrawOffer),
        Err(_) => {
            // Policy violation (§7.1): client-facing notify, no state
            // change, no hack log (this is a legitimate race, not tamper).
            if let Some(socket) = game.info.player(color).socket {
                transport::send_general(socket, &GeneralMessage::NotifyError { key: "draw.cannot_offer".into() });
            }
        }
    }
}

/// §4.8 `acceptdraw`. Only if open, not by self, game not over.
pub async fn accept_draw(ctx: &RouterContext, game_id: i64, color: Color) {
    let Some(handle) = ctx.registry.get(game_id) else { return };
    let mut game = handle.lock().await;
    if game.base_game.is_game_over() {
        return;
    }
    if !game.info.draw_offer.is_open() || game.info.draw_offer.has_open_by(color) {
        return;
    }

    game.info.draw_offer.close();
    let conclusion = Conclusion { victor: Some(Victor::Neutral), condition: Condition::Agreement };
    ctx.lifecycle.set_game_conclusion(game_id, &mut game, conclusion, Utc::now()).await;
    broadcast_update(&game.base_game, &game.info);
}

/// §4.8 `declinedraw`. Also invoked implicitly on move submission via
/// `DrawOffer::close` — this path is only the explicit client request.
pub async fn decline_draw(ctx: &RouterContext, game_id: i64, color: Color) {
    let Some(handle) = ctx.registry.get(game_id) else { return };
    let mut game = handle.lock().await;
    if !game.info.draw_offer.has_open_by(color.invert()) {
        return;
    }
    game.info.draw_offer.close();
    transport::send_to_opponent(&game.info, color, &OutboundGameMessage::DeclineDraw);
}

fn broadcast_update(base_game: &crate::domain::BaseGame, info: &crate::domain::MatchInfo) {
    let message = game_update_message(base_game, info, None);
    for color in [Color::White, Color::Black] {
        transport::send(info, color, &message);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::domain::mv::{Coords, Move};
    use crate::domain::Publicity;
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
    async fn abort_concludes_an_untouched_game() {
        let ctx = context();
        let game_id = ctx.lifecycle.create_game(request(Publicity::Private, false), Utc::now()).await;

        abort(&ctx, game_id, Color::White).await;

        let game = ctx.registry.get(game_id).unwrap();
        let game = game.lock().await;
        assert!(game.base_game.is_game_over());
        assert_eq!(game.base_game.conclusion.as_ref().unwrap().condition, crate::domain::base_game::Condition::Aborted);
    }

    #[tokio::test(start_paused = true)]
    async fn resign_is_refused_before_the_game_is_resignable() {
        let ctx = context();
        let game_id = ctx.lifecycle.create_game(request(Publicity::Private, false), Utc::now()).await;

        resign(&ctx, game_id, Color::White).await;

        let game = ctx.registry.get(game_id).unwrap();
        assert!(!game.lock().await.base_game.is_game_over());
    }

    #[tokio::test(start_paused = true)]
    async fn resign_after_two_moves_credits_the_opponent() {
        let ctx = context();
        let game_id = ctx.lifecycle.create_game(request(Publicity::Private, false), Utc::now()).await;
        {
            let handle = ctx.registry.get(game_id).unwrap();
            let mut game = handle.lock().await;
            game.base_game.apply_move(mv(), Utc::now());
            game.base_game.apply_move(mv(), Utc::now());
        }

        resign(&ctx, game_id, Color::Black).await;

        let game = ctx.registry.get(game_id).unwrap();
        let game = game.lock().await;
        let conclusion = game.base_game.conclusion.as_ref().unwrap();
        assert_eq!(conclusion.victor, Some(Victor::White));
        assert_eq!(conclusion.condition, crate::domain::base_game::Condition::Resignation);
    }

    #[tokio::test(start_paused = true)]
    async fn accepting_a_draw_closes_the_offer_and_concludes_neutral() {
        let ctx = context();
        let game_id = ctx.lifecycle.create_game(request(Publicity::Private, false), Utc::now()).await;
        {
            let handle = ctx.registry.get(game_id).unwrap();
            let mut game = handle.lock().await;
            game.base_game.apply_move(mv(), Utc::now());
            game.base_game.apply_move(mv(), Utc::now());
        }

        offer_draw(&ctx, game_id, Color::White).await;
        accept_draw(&ctx, game_id, Color::Black).await;

        let game = ctx.registry.get(game_id).unwrap();
        let game = game.lock().await;
        let conclusion = game.base_game.conclusion.as_ref().unwrap();
        assert_eq!(conclusion.victor, Some(Victor::Neutral));
        assert!(!game.info.draw_offer.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn declining_a_draw_closes_it_without_concluding() {
        let ctx = context();
        let game_id = ctx.lifecycle.create_game(request(Publicity::Private, false), Utc::now()).await;
        {
            let handle = ctx.registry.get(game_id).unwrap();
            let mut game = handle.lock().await;
            game.base_game.apply_move(mv(), Utc::now());
            game.base_game.apply_move(mv(), Utc::now());
        }

        offer_draw(&ctx, game_id, Color::White).await;
        decline_draw(&ctx, game_id, Color::Black).await;

        let game = ctx.registry.get(game_id).unwrap();
        let game = game.lock().await;
        assert!(!game.info.draw_offer.is_open());
        assert!(!game.base_game.is_game_over());
    }
}
