use crate::domain::base_game::{Condition, Conclusion};
use crate::domain::clock::ClockValues;
use crate::domain::Color;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Inbound message shape under route `"game"` (§6). A discriminated union
/// validated once at the boundary, replacing the switch-over-strings the
/// distilled spec's source used (§9 "Dynamic dispatch in the router") —
/// each arm below carries exactly the payload its handler needs.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum InboundGameMessage {
    SubmitMove {
        #[serde(rename = "move")]
        move_text: String,
        move_number: usize,
        game_conclusion: Option<ClaimedConclusion>,
    },
    JoinGame,
    RemoveFromPlayersInActiveGames,
    Resync {
        game_id: i64,
    },
    Abort,
    Resign,
    OfferDraw,
    AcceptDraw,
    DeclineDraw,
    #[serde(rename = "AFK")]
    Afk,
    #[serde(rename = "AFK-Return")]
    AfkReturn,
    Report {
        reason: String,
        opponents_move_number: usize,
    },
    Paste,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClaimedConclusion {
    pub condition: Condition,
    pub victor: Option<crate::domain::Victor>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MoveEnvelope {
    pub compact: String,
    pub clock_stamp: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParticipantState {
    pub afk: HashMap<Color, bool>,
    pub disconnected: HashMap<Color, bool>,
}

/// Outbound message shape under route `"game"` (§6). One variant per
/// message name; each field set matches the wire contract exactly so the
/// router never has to hand-assemble a `serde_json::Value`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum OutboundGameMessage {
    JoinGame {
        game_id: i64,
        you_are_color: Color,
        game_conclusion: Option<Conclusion>,
        moves: Vec<MoveEnvelope>,
        participant_state: ParticipantState,
        clock_values: Option<ClockValues>,
        server_restarting_at: Option<i64>,
    },
    GameUpdate {
        game_conclusion: Option<Conclusion>,
        moves: Vec<MoveEnvelope>,
        participant_state: ParticipantState,
        clock_values: Option<ClockValues>,
        server_restarting_at: Option<i64>,
    },
    Move {
        #[serde(rename = "move")]
        move_envelope: MoveEnvelope,
        game_conclusion: Option<Conclusion>,
        move_number: usize,
        clock_values: Option<ClockValues>,
    },
    Clock {
        clocks: HashMap<Color, i64>,
        color_ticking: Option<Color>,
    },
    OpponentAfk {
        millis_until_auto_afk_resign: i64,
    },
    OpponentAfkReturn,
    OpponentDisconnect {
        millis_until_auto_disconnect_resign: i64,
        was_by_choice: bool,
    },
    OpponentDisconnectReturn,
    DrawOffer,
    DeclineDraw,
    GameRatingChange {
        per_color: HashMap<Color, RatingChangeEntry>,
    },
    Unsub,
    LeaveGame,
    ServerRestart {
        ts: i64,
    },
    NoGame,
    Login,
    LoggedGameInfo {
        game_conclusion: Option<Conclusion>,
        moves: Vec<MoveEnvelope>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct RatingChangeEntry {
    pub new_rating: NewRating,
    pub change: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewRating {
    pub value: f64,
    pub confident: bool,
}

/// Outbound messages under route `"general"` (§6).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum GeneralMessage {
    Notify { key: String },
    NotifyError { key: String },
    PrintError { text: String },
}
