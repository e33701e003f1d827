use crate::model::card::Card;
use crate::model::deck::HAND_SIZE;
use crate::model::hand::Hand;
use crate::model::seat::{SEATS_COUNT, Seat};
use crate::model::trick::trick_winner;
use serde::Serialize;
use std::fmt;

/// A resolved trick as seen on the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompletedTrick {
    pub number: usize,
    pub leader: Seat,
    pub cards: [Card; SEATS_COUNT],
    pub winner: Seat,
}

/// A resolved trick from one seat's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrickOutcome {
    pub trick: CompletedTrick,
    pub card: Card,
    pub won: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayError {
    CardNotInHand(Card),
    AlreadyPlayed { pending: Card },
    NothingPending,
    SlotMismatch { expected: Card, found: Card },
}

impl fmt::Display for PlayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayError::CardNotInHand(card) => write!(f, "{card} is not in hand"),
            PlayError::AlreadyPlayed { pending } => {
                write!(f, "already played {pending} this trick")
            }
            PlayError::NothingPending => write!(f, "no card played this trick"),
            PlayError::SlotMismatch { expected, found } => {
                write!(f, "table shows {found} for this seat but {expected} was played")
            }
        }
    }
}

impl std::error::Error for PlayError {}

/// Private per-process state of one seat.
///
/// Every seat keeps its own copy of the current leader and advances it with
/// the same [`trick_winner`] evaluation, so all copies stay in lockstep.
#[derive(Debug, Clone)]
pub struct PlayerHand {
    seat: Seat,
    leader: Seat,
    cards: Hand,
    played: Vec<Card>,
    results: Vec<bool>,
    pending: Option<Card>,
}

impl PlayerHand {
    pub fn new(seat: Seat, cards: Hand) -> Self {
        Self {
            seat,
            leader: Seat::North,
            cards,
            played: Vec::with_capacity(HAND_SIZE),
            results: Vec::with_capacity(HAND_SIZE),
            pending: None,
        }
    }

    pub fn seat(&self) -> Seat {
        self.seat
    }

    pub fn leader(&self) -> Seat {
        self.leader
    }

    pub fn is_leading(&self) -> bool {
        self.leader == self.seat
    }

    pub fn hand(&self) -> &Hand {
        &self.cards
    }

    pub fn played(&self) -> &[Card] {
        &self.played
    }

    pub fn trick_results(&self) -> &[bool] {
        &self.results
    }

    pub fn tricks_played(&self) -> usize {
        self.results.len()
    }

    pub fn tricks_won(&self) -> usize {
        self.results.iter().filter(|won| **won).count()
    }

    pub fn pending(&self) -> Option<Card> {
        self.pending
    }

    pub fn is_exhausted(&self) -> bool {
        self.cards.is_empty() && self.pending.is_none()
    }

    /// Remove `card` from the hand; at most one card per trick.
    pub fn play(&mut self, card: Card) -> Result<(), PlayError> {
        if let Some(pending) = self.pending {
            return Err(PlayError::AlreadyPlayed { pending });
        }
        if !self.cards.remove(card) {
            return Err(PlayError::CardNotInHand(card));
        }
        self.played.push(card);
        self.pending = Some(card);
        Ok(())
    }

    /// Resolve the trick from the full table snapshot and advance the leader.
    pub fn record_trick(
        &mut self,
        cards: [Card; SEATS_COUNT],
    ) -> Result<TrickOutcome, PlayError> {
        let Some(card) = self.pending else {
            return Err(PlayError::NothingPending);
        };
        let found = cards[self.seat.index()];
        if found != card {
            return Err(PlayError::SlotMismatch {
                expected: card,
                found,
            });
        }

        let winner = trick_winner(self.leader, &cards);
        let won = winner.is_partner_of(self.seat);
        let trick = CompletedTrick {
            number: self.results.len() + 1,
            leader: self.leader,
            cards,
            winner,
        };

        self.results.push(won);
        self.leader = winner;
        self.pending = None;
        Ok(TrickOutcome { trick, card, won })
    }
}
