//! The seam between this crate and whatever session/login system sits in
//! front of it (§1 Non-goals: authentication is "treated as an adapter").
//! Grounded on the teacher's `ws/socket_auth.rs` (`SocketAuth` — a browser
//! uuid plus an optional session id — resolved to a `SocketIdentity`
//! against the database): generalized here to the spec's `PlayerIdentity`
//! tagged union and handed in as a trait object, so a real deployment can
//! swap in its own session/OAuth backend without touching the websocket
//! handler.

use crate::domain::PlayerIdentity;
use async_trait::async_trait;

/// Resolves the browser id and (if present) session token a websocket
/// upgrade request carries into a `PlayerIdentity`. Called exactly once
/// per connection, right after `register_socket` and before any inbound
/// message is dispatched.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn identify(&self, browser_id: Option<&str>, session_token: Option<&str>) -> Option<PlayerIdentity>;
}

/// Ships standalone: every connection becomes a fresh browser-id guest,
/// session tokens are ignored. A real deployment replaces this with one
/// backed by its own login/session store.
pub struct GuestIdentityProvider;

#[async_trait]
impl IdentityProvider for GuestIdentityProvider {
    async fn identify(&self, browser_id: Option<&str>, _session_token: Option<&str>) -> Option<PlayerIdentity> {
        browser_id.map(|id| PlayerIdentity::Guest { browser_id: id.to_string() })
    }
}
