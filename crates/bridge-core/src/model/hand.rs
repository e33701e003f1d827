use crate::model::card::Card;
use crate::model::suit::Suit;

/// Cards held by one seat, kept in deck-code order (suit, then rank).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hand {
    cards: Vec<Card>,
}

impl Hand {
    pub fn new() -> Self {
        Self { cards: Vec::new() }
    }

    pub fn with_cards(cards: Vec<Card>) -> Self {
        let mut hand = Self { cards };
        hand.sort();
        hand
    }

    pub fn remove(&mut self, card: Card) -> bool {
        if let Some(index) = self.cards.iter().position(|&c| c == card) {
            self.cards.remove(index);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, card: Card) -> bool {
        self.cards.contains(&card)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn highest_in_suit(&self, suit: Suit) -> Option<Card> {
        self.cards
            .iter()
            .copied()
            .filter(|card| card.suit == suit)
            .max_by_key(|card| card.rank)
    }

    pub fn lowest_in_suit(&self, suit: Suit) -> Option<Card> {
        self.cards
            .iter()
            .copied()
            .filter(|card| card.suit == suit)
            .min_by_key(|card| card.rank)
    }

    /// Highest raw rank regardless of suit; ties go to the lower suit.
    pub fn highest_by_rank(&self) -> Option<Card> {
        self.cards.iter().copied().reduce(|best, card| {
            if card.rank > best.rank { card } else { best }
        })
    }

    /// Lowest raw rank regardless of suit; ties go to the lower suit.
    pub fn lowest_by_rank(&self) -> Option<Card> {
        self.cards.iter().copied().reduce(|best, card| {
            if card.rank < best.rank { card } else { best }
        })
    }

    fn sort(&mut self) {
        self.cards.sort_by_key(|card| card.code());
    }
}
