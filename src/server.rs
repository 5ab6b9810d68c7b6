//! Axum application wiring: the websocket upgrade handler plus the narrow
//! HTTP surface. Grounded on the teacher's `server.rs` (`Router<AppState>`
//! built up with `.route`/`.nest`, served via `axum::serve` over a
//! `TcpListener`) and `actors/websocket.rs::websocket_handler` (a `Query`
//! extractor plus `WebSocketUpgrade::on_upgrade`).

use crate::domain::PlayerIdentity;
use crate::http;
use crate::router::{self, RouterContext};
use crate::transport::messages::InboundGameMessage;
use crate::transport::socket::register_socket;
use crate::AppState;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use std::sync::Arc;

pub async fn run(bind: &str, state: AppState) {
    let app = http::add_to_router(Router::new())
        .route("/websocket", get(websocket_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .unwrap_or_else(|err| panic!("could not bind to {bind}: {err}"));
    log::info!("listening on {bind}");
    axum::serve(listener, app.into_make_service())
        .await
        .expect("server loop exited unexpectedly");
}

#[derive(Deserialize)]
struct WsQuery {
    browser_id: Option<String>,
    session_token: Option<String>,
}

/// Resolves the connection's identity through the external auth adapter
/// before upgrading, the same order the teacher's handler resolves
/// `SessionData` before calling `ws.on_upgrade`.
async fn websocket_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let identity = state
        .identity_provider
        .identify(query.browser_id.as_deref(), query.session_token.as_deref())
        .await;

    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

async fn handle_socket(socket: WebSocket, state: AppState, identity: Option<PlayerIdentity>) {
    let ctx = Arc::new(RouterContext { lifecycle: state.lifecycle, registry: state.registry });

    let on_message_ctx = ctx.clone();
    let on_close_ctx = ctx;

    let id = register_socket(
        socket,
        move |sender, text| {
            let ctx = on_message_ctx.clone();
            tokio::spawn(async move {
                match serde_json::from_str::<InboundGameMessage>(&text) {
                    Ok(message) => router::dispatch(&ctx, sender, message).await,
                    Err(err) => crate::hack_log!("malformed inbound frame from socket {sender:?}: {err}"),
                }
            });
        },
        move |sender| {
            let ctx = on_close_ctx;
            tokio::spawn(async move {
                router::disconnect::on_socket_closed(&ctx, sender).await;
            });
        },
    );

    id.set_identity(identity);
}
