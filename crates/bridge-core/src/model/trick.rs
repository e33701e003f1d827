use crate::model::card::{Card, strength_order};
use crate::model::seat::{SEATS_COUNT, Seat};
use crate::model::suit::Suit;
use std::fmt;

/// Winner of a complete trick given the four cards indexed by seat.
///
/// Pure and total: every participant evaluating the same snapshot gets the
/// same seat back.
pub fn trick_winner(leader: Seat, cards: &[Card; SEATS_COUNT]) -> Seat {
    let mut winner = leader;
    for seat in leader.rotation() {
        if strength_order(cards[winner.index()], cards[seat.index()]) {
            winner = seat;
        }
    }
    winner
}

#[derive(Debug, Clone)]
pub struct Trick {
    leader: Seat,
    plays: Vec<Play>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Play {
    pub seat: Seat,
    pub card: Card,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrickError {
    TrickComplete,
    OutOfTurn { expected: Seat, actual: Seat },
    AlreadyPlayed(Seat),
    DuplicateCard(Card),
}

impl fmt::Display for TrickError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrickError::TrickComplete => write!(f, "trick already complete"),
            TrickError::OutOfTurn { expected, actual } => {
                write!(f, "expected {expected} to play next but got {actual}")
            }
            TrickError::AlreadyPlayed(seat) => {
                write!(f, "{seat} has already played this trick")
            }
            TrickError::DuplicateCard(card) => {
                write!(f, "{card} is already on the table")
            }
        }
    }
}

impl std::error::Error for TrickError {}

impl Trick {
    pub fn new(leader: Seat) -> Self {
        Self {
            leader,
            plays: Vec::with_capacity(SEATS_COUNT),
        }
    }

    pub fn leader(&self) -> Seat {
        self.leader
    }

    pub fn plays(&self) -> &[Play] {
        &self.plays
    }

    pub fn is_complete(&self) -> bool {
        self.plays.len() == SEATS_COUNT
    }

    pub fn lead_suit(&self) -> Option<Suit> {
        self.plays.first().map(|play| play.card.suit)
    }

    pub fn expected_seat(&self) -> Option<Seat> {
        if self.is_complete() {
            return None;
        }
        Some(
            self.plays
                .last()
                .map(|play| play.seat.next())
                .unwrap_or(self.leader),
        )
    }

    pub fn play(&mut self, seat: Seat, card: Card) -> Result<(), TrickError> {
        let Some(expected) = self.expected_seat() else {
            return Err(TrickError::TrickComplete);
        };

        if self.plays.iter().any(|play| play.seat == seat) {
            return Err(TrickError::AlreadyPlayed(seat));
        }

        if expected != seat {
            return Err(TrickError::OutOfTurn {
                expected,
                actual: seat,
            });
        }

        if self.plays.iter().any(|play| play.card == card) {
            return Err(TrickError::DuplicateCard(card));
        }

        self.plays.push(Play { seat, card });
        Ok(())
    }

    /// Table view indexed by seat, `None` for seats that have not played.
    pub fn slots(&self) -> [Option<Card>; SEATS_COUNT] {
        let mut slots = [None; SEATS_COUNT];
        for play in &self.plays {
            slots[play.seat.index()] = Some(play.card);
        }
        slots
    }

    pub fn cards_by_seat(&self) -> Option<[Card; SEATS_COUNT]> {
        let slots = self.slots();
        let mut cards = [self.plays.first()?.card; SEATS_COUNT];
        for (card, slot) in cards.iter_mut().zip(slots) {
            *card = slot?;
        }
        Some(cards)
    }

    pub fn winner(&self) -> Option<Seat> {
        self.cards_by_seat()
            .map(|cards| trick_winner(self.leader, &cards))
    }
}
