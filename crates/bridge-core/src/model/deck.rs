use crate::model::card::{CARDS_COUNT, Card};
use crate::model::hand::Hand;
use crate::model::rank::Rank;
use crate::model::seat::{SEATS_COUNT, Seat};
use crate::model::suit::Suit;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Cards dealt to every seat.
pub const HAND_SIZE: usize = CARDS_COUNT / SEATS_COUNT;

#[derive(Debug, Clone)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    pub fn standard() -> Self {
        let mut cards = Vec::with_capacity(CARDS_COUNT);
        for suit in Suit::ALL.iter().copied() {
            for rank in Rank::ORDERED.iter().copied() {
                cards.push(Card::new(rank, suit));
            }
        }
        Self { cards }
    }

    /// Standard deck shuffled `passes` times (at least once).
    pub fn shuffled<R: rand::Rng + ?Sized>(rng: &mut R, passes: usize) -> Self {
        let mut deck = Self::standard();
        for _ in 0..passes.max(1) {
            deck.shuffle_in_place(rng);
        }
        deck
    }

    pub fn shuffled_with_seed(seed: u64, passes: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::shuffled(&mut rng, passes)
    }

    pub fn shuffle_in_place<R: rand::Rng + ?Sized>(&mut self, rng: &mut R) {
        self.cards.shuffle(rng);
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// Shared-memory codes in deck order.
    pub fn codes(&self) -> [u8; CARDS_COUNT] {
        let mut codes = [0u8; CARDS_COUNT];
        for (slot, card) in codes.iter_mut().zip(self.cards.iter()) {
            *slot = card.code();
        }
        codes
    }

    /// The seat's fixed 13-card slice of the deck.
    pub fn hand_for(&self, seat: Seat) -> Hand {
        let start = seat.index() * HAND_SIZE;
        Hand::with_cards(self.cards[start..start + HAND_SIZE].to_vec())
    }

    pub fn deal(&self) -> [Hand; SEATS_COUNT] {
        Seat::LOOP.map(|seat| self.hand_for(seat))
    }
}
