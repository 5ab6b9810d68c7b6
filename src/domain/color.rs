use serde::{Deserialize, Serialize};

/// The two seats at the board. Turn order inverts total over this type;
/// draws and other non-partisan outcomes are expressed by [`Victor`]
/// instead of widening this enum with a third, often-unreachable arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn invert(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

/// The outcome of a concluded game: one of the two colors, or no one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Victor {
    White,
    Black,
    Neutral,
}

impl From<Color> for Victor {
    fn from(c: Color) -> Self {
        match c {
            Color::White => Victor::White,
            Color::Black => Victor::Black,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn invert_is_total_and_self_inverse() {
        assert_eq!(Color::White.invert(), Color::Black);
        assert_eq!(Color::Black.invert(), Color::White);
        assert_eq!(Color::White.invert().invert(), Color::White);
    }

    #[test]
    fn victor_from_color() {
        assert_eq!(Victor::from(Color::White), Victor::White);
        assert_eq!(Victor::from(Color::Black), Victor::Black);
    }
}
