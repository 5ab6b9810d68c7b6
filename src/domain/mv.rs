use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A single half-move as stored in a game's move list. `compact` is the
/// canonical wire serialization; `start`/`end`/`promotion` are the parsed
/// fields the core actually reasons about (turn order, distance cap).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub compact: String,
    pub start: Coords,
    pub end: Coords,
    pub promotion: Option<char>,
    /// Set to the mover's updated remaining time by `Clock::push`, or left
    /// `None` for untimed games.
    pub clock_stamp: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coords {
    pub x: u32,
    pub y: u32,
}

impl Coords {
    /// Number of decimal digits in the larger of the two coordinates —
    /// the quantity the distance cap (§4.7 step 7) bounds.
    pub fn max_digits(&self) -> u32 {
        digit_count(self.x.max(self.y))
    }
}

fn digit_count(mut n: u32) -> u32 {
    if n == 0 {
        return 1;
    }
    let mut digits = 0;
    while n > 0 {
        digits += 1;
        n /= 10;
    }
    digits
}

static COMPACT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+),(\d+)>(\d+),(\d+)(?:=([A-Za-z]))?$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MoveParseError {
    #[error("move text does not match the compact notation grammar")]
    Malformed,
    #[error("a coordinate overflowed while parsing as an integer")]
    CoordinateOverflow,
    #[error("promotion code is not a recognized piece letter")]
    InvalidPromotion,
}

const VALID_PROMOTIONS: &[char] = &['Q', 'R', 'B', 'N'];

/// Parses the compact `"x,y>x,y[=P]"` move grammar. Every failure mode
/// named in §4.7 step 6 — malformed shape, integer overflow, unrecognized
/// promotion code — is a distinct, loggable error rather than a panic.
pub fn parse_compact(text: &str) -> Result<Move, MoveParseError> {
    let caps = COMPACT_RE.captures(text).ok_or(MoveParseError::Malformed)?;

    let parse_coord = |s: &str| s.parse::<u32>().map_err(|_| MoveParseError::CoordinateOverflow);
    let start = Coords {
        x: parse_coord(&caps[1])?,
        y: parse_coord(&caps[2])?,
    };
    let end = Coords {
        x: parse_coord(&caps[3])?,
        y: parse_coord(&caps[4])?,
    };

    let promotion = match caps.get(5) {
        Some(m) => {
            let c = m.as_str().chars().next().unwrap().to_ascii_uppercase();
            if VALID_PROMOTIONS.contains(&c) {
                Some(c)
            } else {
                return Err(MoveParseError::InvalidPromotion);
            }
        }
        None => None,
    };

    Ok(Move {
        compact: text.to_string(),
        start,
        end,
        promotion,
        clock_stamp: None,
    })
}
