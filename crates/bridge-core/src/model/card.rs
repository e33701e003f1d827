use crate::model::rank::Rank;
use crate::model::suit::Suit;
use core::fmt;
use serde::{Deserialize, Serialize};

/// Number of distinct cards in the game.
pub const CARDS_COUNT: usize = 52;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub const fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }

    /// One-byte code stored in shared memory: `suit * 13 + rank index`.
    pub const fn code(self) -> u8 {
        (self.suit.index() * Rank::COUNT + self.rank.index()) as u8
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        let code = code as usize;
        let Some(suit) = Suit::from_index(code / Rank::COUNT) else {
            return None;
        };
        match Rank::from_index(code % Rank::COUNT) {
            Some(rank) => Some(Self::new(rank, suit)),
            None => None,
        }
    }

    /// True if `self` takes a trick that `reference` currently holds.
    pub fn beats(self, reference: Card) -> bool {
        strength_order(reference, self)
    }
}

/// Follow-suit strength: a card of another suit never beats the reference,
/// within the suit the higher rank wins.
pub fn strength_order(reference: Card, candidate: Card) -> bool {
    candidate.suit == reference.suit && candidate.rank > reference.rank
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}
