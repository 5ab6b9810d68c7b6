//! Game creation, conclusion and deletion — §4.6. Grounded on the
//! teacher's `instance_manager.rs::SyncManager::new_instance` (unique key
//! generation, `remember_creation`, logging a summary) for `create_game`,
//! and on `actors/room.rs`'s `disconnect` entry-API idiom ("remove from
//! registry first, then clean up") for `delete_game`.

use crate::domain::base_game::{BaseGame, Condition, Conclusion};
use crate::domain::match_info::{Disconnect, PlayerData};
use crate::domain::{Color, MatchInfo, PlayerIdentity, Publicity, ServerGame, Victor};
use crate::registry::active_players_index::ActivePlayersIndex;
use crate::registry::game_count::GameCount;
use crate::registry::match_registry::MatchRegistry;
use crate::repositories::{FinishedGame, GameRepository, RatingAbuseMonitor, UnloggedGameSink};
use crate::timer_engine::TimerEngine;
use crate::transport::messages::{GeneralMessage, OutboundGameMessage};
use crate::transport::socket::SocketId;
use crate::{transport, unlogged_game};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// Everything needed to mint a fresh `ServerGame`, handed in by the
/// invite-matchmaking adapter once an invite is accepted (§1: invite
/// matchmaking itself is out of scope; this is the narrow shape the core
/// actually consumes).
pub struct GameCreationRequest {
    pub variant: String,
    pub publicity: Publicity,
    pub rated: bool,
    pub time_control: Option<TimeControl>,
    /// One identity per color, plus the socket already connected for that
    /// color (if any — §4.6 step 4 "if the socket is absent at creation").
    pub players: HashMap<Color, (PlayerIdentity, Option<SocketId>)>,
    pub metadata: HashMap<String, String>,
}

#[derive(Clone, Copy)]
pub struct TimeControl {
    pub start_time_millis: i64,
    pub increment_millis: i64,
}

pub struct Lifecycle {
    pub registry: Arc<MatchRegistry>,
    pub active_players: Arc<ActivePlayersIndex>,
    pub game_count: Arc<GameCount>,
    pub timers: Arc<TimerEngine>,
    pub repository: Arc<dyn GameRepository>,
    pub unlogged_sink: Arc<dyn UnloggedGameSink>,
    pub abuse_monitor: Arc<dyn RatingAbuseMonitor>,
    pub delete_cushion: Duration,
}

impl Lifecycle {
    /// §4.6 `createGame`.
    pub async fn create_game(self: &Arc<Self>, request: GameCreationRequest, now: DateTime<Utc>) -> i64 {
        let game_id = match self.repository.generate_unique_game_id().await {
            Ok(id) => id,
            Err(err) => {
                log::error!("could not mint a unique game id: {err}");
                return -1;
            }
        };

        let turn_order = vec![Color::White, Color::Black];
        let base_game = match request.time_control {
            Some(tc) => BaseGame::new_timed(
                request.variant,
                request.metadata,
                turn_order,
                tc.start_time_millis,
                tc.increment_millis,
                now,
            ),
            None => BaseGame::new_untimed(request.variant, request.metadata, turn_order),
        };

        let mut player_data = HashMap::new();
        for (&color, (identity, _)) in &request.players {
            player_data.insert(color, PlayerData::new(identity.clone()));
        }

        let mut info = MatchInfo {
            id: game_id,
            time_created: now,
            time_ended: None,
            publicity: request.publicity,
            rated: request.rated,
            player_data,
            auto_time_loss_timeout_id: None,
            auto_afk_resign_timeout_id: None,
            auto_afk_resign_time: None,
            draw_offer: Default::default(),
            delete_timeout_id: None,
            position_pasted: false,
        };

        for (&color, (identity, socket)) in &request.players {
            self.active_players.add(identity, game_id);
            match socket {
                Some(socket_id) => {
                    transport::subscribe(&mut info, color, *socket_id);
                    let message = join_game_message(&base_game, &info, color, None);
                    transport::send(&info, color, &message);
                }
                None => {
                    self.timers.start_disconnect_timer(&mut info, color, false, false, None, now, {
                        let lifecycle = self.clone();
                        move || lifecycle.spawn_auto_loss(game_id, color.invert(), Condition::Disconnect)
                    });
                }
            }
        }

        log::info!(
            "created game {game_id} (variant={}, rated={})",
            base_game.variant,
            info.rated
        );

        self.registry.insert(game_id, ServerGame { base_game, info });
        self.game_count.increment();

        game_id
    }

    pub(crate) fn spawn_auto_loss(self: &Arc<Self>, game_id: i64, victor: Color, condition: Condition) {
        let lifecycle = self.clone();
        tokio::spawn(async move {
            let Some(handle) = lifecycle.registry.get(game_id) else { return };
            let mut game = handle.lock().await;
            if game.base_game.is_game_over() {
                return; // spurious late fire, §5 cancellation guarantee
            }
            let conclusion = Conclusion { victor: Some(Victor::from(victor)), condition };
            lifecycle.set_game_conclusion(game_id, &mut game, conclusion, Utc::now()).await;
            let message = game_update_message(&game.base_game, &game.info, None);
            for color in [Color::White, Color::Black] {
                transport::send(&game.info, color, &message);
            }
        });
    }

    /// §4.6 `setGameConclusion`. Idempotent per the monotone-idempotence
    /// property (§8): a second call with the conclusion already set does
    /// not re-decrement `activeGames`.
    pub async fn set_game_conclusion(
        self: &Arc<Self>,
        game_id: i64,
        game: &mut ServerGame,
        conclusion: Conclusion,
        now: DateTime<Utc>,
    ) {
        if game.base_game.is_game_over() {
            return;
        }

        game.base_game.metadata.insert(
            "Result".to_string(),
            result_string(conclusion.victor).to_string(),
        );
        game.base_game.metadata.insert("Termination".to_string(), format!("{:?}", conclusion.condition));
        game.base_game.conclude(conclusion, now);

        self.on_game_conclusion(game_id, game, now).await;
    }

    /// §4.6 `onGameConclusion`.
    async fn on_game_conclusion(self: &Arc<Self>, game_id: i64, game: &mut ServerGame, now: DateTime<Utc>) {
        self.game_count.decrement();

        self.timers.cancel_time_loss_timer(&mut game.info);
        self.timers.cancel_auto_afk_resign_timer(&mut game.info, false, Color::White);
        self.timers.cancel_disconnect_timers(&mut game.info);
        game.info.draw_offer.close();

        if game.info.time_ended.is_none() {
            game.info.time_ended = Some(now);
        }

        let lifecycle = self.clone();
        let handle = self.timers.schedule_delete(self.delete_cushion, now, move || {
            lifecycle.spawn_delete(game_id);
        });
        game.info.delete_timeout_id = Some(handle);
    }

    fn spawn_delete(self: &Arc<Self>, game_id: i64) {
        let lifecycle = self.clone();
        tokio::spawn(async move {
            lifecycle.delete_game(game_id).await;
        });
    }

    /// §4.6 `onRequestRemovalFromPlayersInActiveGames`.
    pub async fn on_request_removal_from_players_in_active_games(self: &Arc<Self>, game_id: i64, color: Color) {
        let Some(handle) = self.registry.get(game_id) else { return };
        let mut game = handle.lock().await;
        if !game.base_game.is_game_over() {
            return;
        }

        let identity = game.info.player(color).identifier.clone();
        self.active_players.remove(&identity, game_id);

        let opponent = color.invert();
        let opponent_identity = game.info.player(opponent).identifier.clone();
        if self.active_players.has_seen_conclusion(&opponent_identity, game_id) {
            self.timers.cancel_delete_timer(&mut game.info);
            drop(game);
            self.delete_game(game_id).await;
        }
    }

    /// §4.6 `deleteGame`. Removes from the registry first (§9: "remove
    /// from registry first, then await the transaction") so no later
    /// async step can be re-entered for this id.
    pub async fn delete_game(self: &Arc<Self>, game_id: i64) {
        let Some(handle) = self.registry.remove(game_id) else { return };
        let mut game = handle.lock().await;

        let mut rating_changes = None;
        if !game.info.position_pasted {
            let finished = FinishedGame { game_id, base_game: &game.base_game, info: &game.info };
            match self.repository.log_game_atomically(finished).await {
                Ok(changes) => rating_changes = changes,
                Err(err) => {
                    let text = serde_json::to_string(&game.base_game.moves).unwrap_or_default();
                    unlogged_game!("game {game_id} rolled back ({err}): moves={text}");
                    self.unlogged_sink.record(game_id, &err.to_string(), &text);
                }
            }
        }

        if let Some(changes) = rating_changes {
            for (&color, change) in &changes {
                transport::send(
                    &game.info,
                    color,
                    &OutboundGameMessage::GameRatingChange {
                        per_color: [(
                            color,
                            crate::transport::messages::RatingChangeEntry {
                                new_rating: crate::transport::messages::NewRating {
                                    value: change.new_rating.value,
                                    confident: change.new_rating.is_confident(),
                                },
                                change: change.change,
                            },
                        )]
                        .into_iter()
                        .collect(),
                    },
                );
            }
        }

        for color in [Color::White, Color::Black] {
            let identity = game.info.player(color).identifier.clone();
            self.active_players.remove(&identity, game_id);
            transport::send(&game.info, color, &OutboundGameMessage::Unsub);
            transport::unsubscribe(&mut game.info, color);
        }

        self.abuse_monitor.observe(game_id, &game.info).await;

        log::info!("deleted game {game_id}");
    }

    /// Shutdown path: concludes every still-running game as `aborted`,
    /// then runs its delete transaction. Per §9's Open Question
    /// resolution, each game's delete is awaited serially before moving
    /// to the next — matching "the source awaits them serially."
    pub async fn log_all_games(self: &Arc<Self>) {
        for game_id in self.registry.all_ids() {
            let Some(handle) = self.registry.get(game_id) else { continue };
            {
                let mut game = handle.lock().await;
                if !game.base_game.is_game_over() {
                    let conclusion = Conclusion { victor: None, condition: Condition::Aborted };
                    self.set_game_conclusion(game_id, &mut game, conclusion, Utc::now()).await;
                    let message = game_update_message(&game.base_game, &game.info, None);
                    for color in [Color::White, Color::Black] {
                        transport::send(&game.info, color, &message);
                    }
                    self.timers.cancel_delete_timer(&mut game.info);
                }
            }
            self.delete_game(game_id).await;
        }
    }

    /// Emits `"serverrestart"{timeToRestart}` to every connected socket in
    /// every active game.
    pub fn broadcast_game_restarting(&self, time_to_restart_millis: i64) {
        for game_id in self.registry.all_ids() {
            let Some(handle) = self.registry.get(game_id) else { continue };
            let Ok(game) = handle.try_lock() else { continue };
            for color in [Color::White, Color::Black] {
                transport::send(
                    &game.info,
                    color,
                    &OutboundGameMessage::ServerRestart { ts: time_to_restart_millis },
                );
            }
        }
    }
}

fn result_string(victor: Option<Victor>) -> &'static str {
    match victor {
        Some(Victor::White) => "1-0",
        Some(Victor::Black) => "0-1",
        Some(Victor::Neutral) => "1/2-1/2",
        None => "*",
    }
}

/// Builds the `joingame` payload §6 names, including the full game state
/// a freshly-subscribed socket needs to render the board.
pub fn join_game_message(
    base_game: &BaseGame,
    info: &MatchInfo,
    you_are_color: Color,
    server_restarting_at: Option<i64>,
) -> OutboundGameMessage {
    let now = Utc::now();
    OutboundGameMessage::JoinGame {
        game_id: info.id,
        you_are_color,
        game_conclusion: base_game.conclusion.clone(),
        moves: move_envelopes(base_game),
        participant_state: participant_state(info),
        clock_values: base_game.clock_snapshot(now),
        server_restarting_at,
    }
}

pub fn game_update_message(
    base_game: &BaseGame,
    info: &MatchInfo,
    server_restarting_at: Option<i64>,
) -> OutboundGameMessage {
    let now = Utc::now();
    OutboundGameMessage::GameUpdate {
        game_conclusion: base_game.conclusion.clone(),
        moves: move_envelopes(base_game),
        participant_state: participant_state(info),
        clock_values: base_game.clock_snapshot(now),
        server_restarting_at,
    }
}

pub fn move_envelopes(base_game: &BaseGame) -> Vec<crate::transport::messages::MoveEnvelope> {
    base_game
        .moves
        .iter()
        .map(|m| crate::transport::messages::MoveEnvelope { compact: m.compact.clone(), clock_stamp: m.clock_stamp })
        .collect()
}

fn participant_state(info: &MatchInfo) -> crate::transport::messages::ParticipantState {
    let mut afk = HashMap::new();
    let mut disconnected = HashMap::new();
    for color in [Color::White, Color::Black] {
        afk.insert(color, info.auto_afk_resign_timeout_id.is_some());
        disconnected.insert(color, disconnect_of(info, color).is_armed());
    }
    crate::transport::messages::ParticipantState { afk, disconnected }
}

fn disconnect_of(info: &MatchInfo, color: Color) -> &Disconnect {
    &info.player(color).disconnect
}

#[allow(dead_code)]
fn general_error(socket: SocketId, text: &str) {
    transport::send_general(socket, &GeneralMessage::PrintError { text: text.to_string() });
}
