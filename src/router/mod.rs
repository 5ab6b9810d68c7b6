//! Validates inbound message shape and dispatches to handlers. Grounded
//! on the teacher's `websocket.rs::on_client_message` match dispatch —
//! kept as the dispatch *shape* (one arm per action, each delegating to a
//! handler function) — and on `instance_manager.rs`'s `Context<T>` (a
//! reply/broadcast queue handed to handlers instead of handlers writing
//! to sockets directly): this crate's handlers send directly through
//! `transport::send` since each socket already owns its own outbound
//! channel (§9 "Cyclic references") — there is no shared broadcast queue
//! to buffer through.

pub mod disconnect;
pub mod lifecycle_actions;
pub mod move_submission;
pub mod presence;
pub mod report;

use crate::lifecycle::Lifecycle;
use crate::registry::match_registry::MatchRegistry;
use crate::transport::messages::{GeneralMessage, InboundGameMessage};
use crate::transport::socket::SocketId;
use chrono::Utc;
use std::sync::Arc;

/// The context every handler needs: the two top-level service objects a
/// handler might touch. Handlers read the sender's subscription
/// themselves via `SocketId::subscription`.
pub struct RouterContext {
    pub lifecycle: Arc<Lifecycle>,
    pub registry: Arc<MatchRegistry>,
}

/// Entry point called from the transport layer for every inbound text
/// frame under route `"game"`. Resolves the sender's current
/// subscription and dispatches by message variant.
pub async fn dispatch(ctx: &RouterContext, sender: SocketId, message: InboundGameMessage) {
    let subscription = sender.subscription();

    match message {
        InboundGameMessage::SubmitMove { move_text, move_number, game_conclusion } => {
            let Some(sub) = subscription else { return not_subscribed(sender) };
            move_submission::handle(ctx, sender, sub.game_id, sub.color, move_text, move_number, game_conclusion)
                .await;
        }
        InboundGameMessage::Abort => {
            let Some(sub) = subscription else { return not_subscribed(sender) };
            lifecycle_actions::abort(ctx, sub.game_id, sub.color).await;
        }
        InboundGameMessage::Resign => {
            let Some(sub) = subscription else { return not_subscribed(sender) };
            lifecycle_actions::resign(ctx, sub.game_id, sub.color).await;
        }
        InboundGameMessage::OfferDraw => {
            let Some(sub) = subscription else { return not_subscribed(sender) };
            lifecycle_actions::offer_draw(ctx, sub.game_id, sub.color).await;
        }
        InboundGameMessage::AcceptDraw => {
            let Some(sub) = subscription else { return not_subscribed(sender) };
            lifecycle_actions::accept_draw(ctx, sub.game_id, sub.color).await;
        }
        InboundGameMessage::DeclineDraw => {
            let Some(sub) = subscription else { return not_subscribed(sender) };
            lifecycle_actions::decline_draw(ctx, sub.game_id, sub.color).await;
        }
        InboundGameMessage::Afk => {
            let Some(sub) = subscription else { return not_subscribed(sender) };
            presence::on_afk(ctx, sub.game_id, sub.color).await;
        }
        InboundGameMessage::AfkReturn => {
            let Some(sub) = subscription else { return not_subscribed(sender) };
            presence::on_afk_return(ctx, sub.game_id, sub.color).await;
        }
        InboundGameMessage::Report { reason, opponents_move_number } => {
            let Some(sub) = subscription else { return not_subscribed(sender) };
            report::handle(ctx, sub.game_id, sub.color, reason, opponents_move_number).await;
        }
        InboundGameMessage::Paste => {
            let Some(sub) = subscription else { return not_subscribed(sender) };
            report::paste(ctx, sub.game_id, sub.color).await;
        }
        InboundGameMessage::Resync { game_id } => {
            presence::resync(ctx, sender, game_id).await;
        }
        InboundGameMessage::JoinGame => {
            presence::join_game(ctx, sender).await;
        }
        InboundGameMessage::RemoveFromPlayersInActiveGames => {
            if let Some(sub) = subscription {
                ctx.lifecycle
                    .on_request_removal_from_players_in_active_games(sub.game_id, sub.color)
                    .await;
            }
        }
    }
}

fn not_subscribed(sender: SocketId) {
    crate::transport::send_general(sender, &GeneralMessage::PrintError { text: "not subscribed to a game".into() });
}

pub(crate) fn now() -> chrono::DateTime<Utc> {
    Utc::now()
}
