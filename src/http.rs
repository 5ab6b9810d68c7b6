//! Narrow HTTP surface — §B.8. Two routes: mint a game once an invite is
//! accepted, and fetch a terminal game's record. Grounded on the
//! teacher's `game.rs` (`create_game`/`get_game`): thin handlers that
//! deserialize, call into `lifecycle`/`repositories`, and serialize the
//! result, with no business logic of their own.

use crate::domain::base_game::Conclusion;
use crate::domain::{Color, PlayerIdentity, Publicity};
use crate::error::ServerError;
use crate::lifecycle::{GameCreationRequest, TimeControl};
use crate::transport::messages::MoveEnvelope;
use crate::transport::socket::SocketId;
use crate::AppState;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub fn add_to_router(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/games", post(create_game))
        .route("/games/:id", get(get_finished_game))
}

#[derive(Deserialize)]
pub struct CreateGameRequest {
    pub variant: String,
    pub publicity: Publicity,
    pub rated: bool,
    pub time_control: Option<TimeControlRequest>,
    pub players: HashMap<Color, PlayerIdentity>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Deserialize)]
pub struct TimeControlRequest {
    pub start_time_millis: i64,
    pub increment_millis: i64,
}

#[derive(Serialize)]
pub struct CreateGameResponse {
    pub game_id: i64,
}

/// §4.6 `createGame`, invoked by the external invite-matchmaking adapter
/// once an invite is accepted (§1: invite matchmaking itself is out of
/// scope). Neither player has a socket attached at this point — the
/// underlying `create_game` arms each side's disconnect timer right away,
/// exactly as §4.6 step 4 describes for "socket absent at creation."
async fn create_game(
    State(state): State<AppState>,
    Json(request): Json<CreateGameRequest>,
) -> Result<Json<CreateGameResponse>, ServerError> {
    let players: HashMap<Color, (PlayerIdentity, Option<SocketId>)> = request
        .players
        .into_iter()
        .map(|(color, identity)| (color, (identity, None)))
        .collect();

    if !players.contains_key(&Color::White) || !players.contains_key(&Color::Black) {
        return Err(ServerError::BadRequest("both colors must be assigned a player".into()));
    }

    let creation = GameCreationRequest {
        variant: request.variant,
        publicity: request.publicity,
        rated: request.rated,
        time_control: request.time_control.map(|tc| TimeControl {
            start_time_millis: tc.start_time_millis,
            increment_millis: tc.increment_millis,
        }),
        players,
        metadata: request.metadata,
    };

    let game_id = state.lifecycle.create_game(creation, Utc::now()).await;
    if game_id < 0 {
        return Err(ServerError::Internal("could not mint a unique game id".into()));
    }
    Ok(Json(CreateGameResponse { game_id }))
}

#[derive(Serialize)]
pub struct FinishedGameResponse {
    pub game_id: i64,
    pub moves: Vec<MoveEnvelope>,
    pub conclusion: Option<Conclusion>,
}

/// Backs `resync`'s persistent-store fallback (§4.8) and a hypothetical
/// replay page — the same data `router::presence::resync_from_store`
/// sends over the socket, here as a plain JSON GET.
async fn get_finished_game(
    State(state): State<AppState>,
    Path(game_id): Path<i64>,
) -> Result<Json<FinishedGameResponse>, ServerError> {
    let stored = state
        .lifecycle
        .repository
        .get_finished_game(game_id)
        .await?
        .ok_or(ServerError::NotFound)?;

    Ok(Json(FinishedGameResponse {
        game_id: stored.game_id,
        moves: stored
            .moves
            .iter()
            .map(|m| MoveEnvelope { compact: m.compact.clone(), clock_stamp: m.clock_stamp })
            .collect(),
        conclusion: stored.conclusion,
    }))
}
