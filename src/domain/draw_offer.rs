use super::color::Color;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const MIN_PLIES_BETWEEN_OFFERS: usize = 2;

/// Per-match draw-offer state and throttle. Embedded in `MatchInfo`; kept
/// as its own small struct so the precondition logic in §4.2 stays in one
/// place instead of being inlined into the router handlers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DrawOffer {
    open_by: Option<Color>,
    last_offer_ply: HashMap<Color, usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferRejection {
    AlreadyOpen,
    GameOver,
    NotResignable,
    TooFast,
}

impl DrawOffer {
    pub fn is_open(&self) -> bool {
        self.open_by.is_some()
    }

    pub fn has_open_by(&self, color: Color) -> bool {
        self.open_by == Some(color)
    }

    pub fn too_fast(&self, color: Color, ply_count: usize) -> bool {
        match self.last_offer_ply.get(&color) {
            Some(&last) => ply_count.saturating_sub(last) < MIN_PLIES_BETWEEN_OFFERS,
            None => false,
        }
    }

    /// Opens an offer from `color`, or reports which precondition failed.
    pub fn open(
        &mut self,
        color: Color,
        ply_count: usize,
        is_game_over: bool,
        is_resignable: bool,
    ) -> Result<(), OfferRejection> {
        if self.is_open() {
            return Err(OfferRejection::AlreadyOpen);
        }
        if is_game_over {
            return Err(OfferRejection::GameOver);
        }
        if !is_resignable {
            return Err(OfferRejection::NotResignable);
        }
        if self.too_fast(color, ply_count) {
            return Err(OfferRejection::TooFast);
        }

        self.last_offer_ply.insert(color, ply_count);
        self.open_by = Some(color);
        Ok(())
    }

    pub fn close(&mut self) {
        self.open_by = None;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn throttle_requires_two_plies_between_offers() {
        let mut offer = DrawOffer::default();
        offer.open(Color::White, 4, false, true).unwrap();
        offer.close();
        // Only one ply has passed — too fast.
        assert!(offer.too_fast(Color::White, 5));
        assert_eq!(
            offer.open(Color::White, 5, false, true),
            Err(OfferRejection::TooFast)
        );
        // Two plies have passed — allowed.
        assert!(!offer.too_fast(Color::White, 6));
        assert!(offer.open(Color::White, 6, false, true).is_ok());
    }

    #[test]
    fn cannot_open_a_second_offer_while_one_is_open() {
        let mut offer = DrawOffer::default();
        offer.open(Color::White, 4, false, true).unwrap();
        assert_eq!(
            offer.open(Color::Black, 4, false, true),
            Err(OfferRejection::AlreadyOpen)
        );
    }
}
