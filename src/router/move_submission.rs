//! §4.7 `submitmove`. New logic; grounded on the teacher's
//! `SynchronizedMatch::do_action`'s overall shape (project, validate,
//! append, update timer, check victory) for the *order of operations*,
//! not the paco chess rules it applies (those are out of scope here).

use super::RouterContext;
use crate::domain::base_game::{Condition, Conclusion};
use crate::domain::mv;
use crate::domain::{Color, Victor};
use crate::lifecycle::game_update_message;
use crate::transport::messages::{ClaimedConclusion, GeneralMessage, MoveEnvelope, OutboundGameMessage};
use crate::transport::socket::SocketId;
use crate::{hack_log, transport};
use chrono::Utc;

pub async fn handle(
    ctx: &RouterContext,
    sender: SocketId,
    game_id: i64,
    color: Color,
    move_text: String,
    move_number: usize,
    claimed_conclusion: Option<ClaimedConclusion>,
) {
    // Step 2: game existence.
    let Some(handle) = ctx.registry.get(game_id) else {
        return print_error(sender, "that game no longer exists");
    };
    let mut game = handle.lock().await;

    // Step 3: game-over short-circuit — silent, the client already has
    // the authoritative conclusion queued.
    if game.base_game.is_game_over() {
        return;
    }

    // Step 4: move-number check.
    let expected = game.base_game.expected_move_number();
    if move_number != expected {
        let message = game_update_message(&game.base_game, &game.info, None);
        return transport::send(&game.info, color, &message);
    }

    // Step 5: turn check.
    if game.base_game.whos_turn != Some(color) {
        return print_error(sender, "it is not your turn");
    }

    // Step 6: format check.
    let parsed = match mv::parse_compact(&move_text) {
        Ok(parsed) => parsed,
        Err(err) => {
            hack_log!("game {game_id} color {color:?} sent an unparsable move {move_text:?}: {err}");
            return print_error(sender, "malformed move");
        }
    };

    // Step 7: distance cap — a soft anti-abuse cap, not the rules engine.
    // Only the destination coordinate is bounded: a piece that legitimately
    // travelled far earlier in the game must still be able to move back
    // toward the origin without tripping the cap.
    let elapsed_seconds = (Utc::now() - game.info.time_created).num_milliseconds() as f64 / 1000.0;
    let cap = crate::domain::base_game::BaseGame::distance_cap(elapsed_seconds.max(0.0));
    if parsed.end.max_digits() > cap {
        hack_log!("game {game_id} color {color:?} exceeded the distance cap ({cap}): {move_text:?}");
        return transport::send_general(
            sender,
            &GeneralMessage::NotifyError { key: "move.distance_cap_exceeded".into() },
        );
    }

    // Step 8: conclusion plausibility.
    let conclusion = match claimed_conclusion {
        Some(claim) => match validate_claim(claim, color) {
            Ok(conclusion) => Some(conclusion),
            Err(reason) => {
                hack_log!("game {game_id} color {color:?} claimed an invalid conclusion: {reason}");
                return print_error(sender, "invalid claimed conclusion");
            }
        },
        None => None,
    };

    // Step 9: apply.
    let now = Utc::now();
    game.info.draw_offer.close();
    let clock_stamp = game.base_game.apply_move(parsed, now);
    let is_timed = !game.base_game.untimed;
    let is_resignable = game.base_game.is_resignable();
    let is_over_after_conclusion = conclusion.is_some();

    if let Some(conclusion) = conclusion {
        ctx.lifecycle.set_game_conclusion(game_id, &mut game, conclusion, now).await;
    } else if is_timed && is_resignable {
        if let Some(remaining) = game.base_game.clocks.as_ref().and_then(|c| c.time_remain_at_turn_start()) {
            let lifecycle = ctx.lifecycle.clone();
            ctx.lifecycle.timers.schedule_time_loss(&mut game.info, remaining, now, move || {
                lifecycle.spawn_time_loss(game_id);
            });
        }
    }

    // Step 10: notify.
    let move_envelope = MoveEnvelope { compact: game.base_game.moves.last().unwrap().compact.clone(), clock_stamp };
    let opponent_message = OutboundGameMessage::Move {
        move_envelope,
        game_conclusion: game.base_game.conclusion.clone(),
        move_number,
        clock_values: game.base_game.clock_snapshot(now),
    };
    transport::send_to_opponent(&game.info, color, &opponent_message);

    if is_over_after_conclusion {
        let message = game_update_message(&game.base_game, &game.info, None);
        transport::send(&game.info, color, &message);
    } else if let Some(clock) = game.base_game.clock_snapshot(now) {
        transport::send(
            &game.info,
            color,
            &OutboundGameMessage::Clock { clocks: clock.clocks, color_ticking: clock.color_ticking },
        );
    }
}

fn validate_claim(claim: ClaimedConclusion, mover: Color) -> Result<Conclusion, &'static str> {
    if !claim.condition.is_client_claimable() {
        return Err("condition is not one the client may assert");
    }
    if let Some(victor) = claim.victor {
        if victor == Victor::from(mover.invert()) {
            return Err("claimed victor cannot be the opponent");
        }
    }
    Ok(Conclusion { victor: claim.victor, condition: claim.condition })
}

fn print_error(sender: SocketId, text: &str) {
    transport::send_general(sender, &GeneralMessage::PrintError { text: text.to_string() });
}

impl crate::lifecycle::Lifecycle {
    /// Resign-on-time continuation: re-enters the per-game critical
    /// section when a scheduled time-loss timer fires (§5 "timers fire
    /// asynchronously and must re-enter the per-game critical section on
    /// wake").
    pub(crate) fn spawn_time_loss(self: &std::sync::Arc<Self>, game_id: i64) {
        let lifecycle = self.clone();
        tokio::spawn(async move {
            let Some(handle) = lifecycle.registry.get(game_id) else { return };
            let mut game = handle.lock().await;
            if game.base_game.is_game_over() {
                return;
            }
            let Some(whos_turn) = game.base_game.whos_turn else { return };
            let conclusion = Conclusion { victor: Some(Victor::from(whos_turn.invert())), condition: Condition::Time };
            let now = Utc::now();
            lifecycle.set_game_conclusion(game_id, &mut game, conclusion, now).await;
            let message = game_update_message(&game.base_game, &game.info, None);
            for color in [Color::White, Color::Black] {
                transport::send(&game.info, color, &message);
            }
        });
    }
}
