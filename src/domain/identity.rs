use serde::{Deserialize, Serialize};

/// Who is sitting behind a socket. A member is tied to a durable account;
/// a guest is only as durable as its browser id. Equality requires the
/// same tag and the same identifier value — a member and a guest never
/// compare equal even if their ids happened to collide as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlayerIdentity {
    Member { user_id: i64, username: String },
    Guest { browser_id: String },
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn member_and_guest_never_equal_even_with_same_string() {
        let member = PlayerIdentity::Member {
            user_id: 7,
            username: "7".into(),
        };
        let guest = PlayerIdentity::Guest {
            browser_id: "7".into(),
        };
        assert_ne!(member, guest);
    }
}
