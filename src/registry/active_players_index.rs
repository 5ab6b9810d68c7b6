use crate::domain::PlayerIdentity;
use dashmap::DashMap;

/// Bidirectional-enough mapping from player identity to the game they're
/// currently in. Two maps because identity trumps browser (§4.3): a
/// signed-in member is only ever gated through `member_in_game`, even if
/// their browser id also appears somewhere.
#[derive(Default)]
pub struct ActivePlayersIndex {
    member_in_game: DashMap<i64, i64>,
    browser_in_game: DashMap<String, i64>,
}

impl ActivePlayersIndex {
    pub fn new() -> ActivePlayersIndex {
        ActivePlayersIndex::default()
    }

    pub fn add(&self, identity: &PlayerIdentity, game_id: i64) {
        match identity {
            PlayerIdentity::Member { user_id, .. } => {
                self.member_in_game.insert(*user_id, game_id);
            }
            PlayerIdentity::Guest { browser_id } => {
                self.browser_in_game.insert(browser_id.clone(), game_id);
            }
        }
    }

    /// Deletes only if the current value equals `game_id` — a racing
    /// "speedy rejoin" into a different game must not be clobbered by a
    /// stale removal for the old one.
    pub fn remove(&self, identity: &PlayerIdentity, game_id: i64) {
        match identity {
            PlayerIdentity::Member { user_id, .. } => {
                self.member_in_game.remove_if(user_id, |_, v| *v == game_id);
            }
            PlayerIdentity::Guest { browser_id } => {
                self.browser_in_game.remove_if(browser_id, |_, v| *v == game_id);
            }
        }
    }

    pub fn is_busy(&self, identity: &PlayerIdentity) -> bool {
        self.game_id_of(identity).is_some()
    }

    pub fn game_id_of(&self, identity: &PlayerIdentity) -> Option<i64> {
        match identity {
            PlayerIdentity::Member { user_id, .. } => self.member_in_game.get(user_id).map(|v| *v),
            PlayerIdentity::Guest { browser_id } => self.browser_in_game.get(browser_id).map(|v| *v),
        }
    }

    /// True iff the identity has been removed from the index for this
    /// match's game id — i.e. they've already acknowledged the
    /// conclusion. Name matches §4.3's `hasSeenConclusion`.
    pub fn has_seen_conclusion(&self, identity: &PlayerIdentity, match_game_id: i64) -> bool {
        self.game_id_of(identity) != Some(match_game_id)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn member(id: i64) -> PlayerIdentity {
        PlayerIdentity::Member { user_id: id, username: format!("user{id}") }
    }

    #[test]
    fn racing_rejoin_is_not_clobbered_by_stale_removal() {
        let index = ActivePlayersIndex::new();
        let alice = member(1);
        index.add(&alice, 10);
        index.add(&alice, 20); // rejoined a different game before the old removal ran
        index.remove(&alice, 10); // stale removal for the old game id
        assert_eq!(index.game_id_of(&alice), Some(20));
    }

    #[test]
    fn has_seen_conclusion_tracks_removal() {
        let index = ActivePlayersIndex::new();
        let alice = member(1);
        index.add(&alice, 10);
        assert!(!index.has_seen_conclusion(&alice, 10));
        index.remove(&alice, 10);
        assert!(index.has_seen_conclusion(&alice, 10));
    }
}
