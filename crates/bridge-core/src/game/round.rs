use crate::game::player_hand::{CompletedTrick, PlayError, PlayerHand};
use crate::game::policy::{PlayContext, Policy};
use crate::model::deck::{Deck, HAND_SIZE};
use crate::model::seat::{SEATS_COUNT, Seat};
use crate::model::trick::{Trick, TrickError};
use std::fmt;

/// All four seats played in one process, without shared memory.
///
/// Runs the same per-seat state machines as the shared table so a deal can
/// be rehearsed or checked deterministically.
#[derive(Debug, Clone)]
pub struct LocalRound {
    players: [PlayerHand; SEATS_COUNT],
    history: Vec<CompletedTrick>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundError {
    NoCardAvailable(Seat),
    Trick(TrickError),
    Play(Seat, PlayError),
    LeaderDisagreement,
}

impl fmt::Display for RoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundError::NoCardAvailable(seat) => write!(f, "{seat} has no card to play"),
            RoundError::Trick(err) => write!(f, "illegal trick: {err}"),
            RoundError::Play(seat, err) => write!(f, "{seat}: {err}"),
            RoundError::LeaderDisagreement => write!(f, "seats disagree on the trick leader"),
        }
    }
}

impl std::error::Error for RoundError {}

impl From<TrickError> for RoundError {
    fn from(err: TrickError) -> Self {
        RoundError::Trick(err)
    }
}

impl LocalRound {
    pub fn deal(deck: &Deck) -> Self {
        Self {
            players: Seat::LOOP.map(|seat| PlayerHand::new(seat, deck.hand_for(seat))),
            history: Vec::with_capacity(HAND_SIZE),
        }
    }

    pub fn player(&self, seat: Seat) -> &PlayerHand {
        &self.players[seat.index()]
    }

    pub fn history(&self) -> &[CompletedTrick] {
        &self.history
    }

    pub fn is_finished(&self) -> bool {
        self.players.iter().all(PlayerHand::is_exhausted)
    }

    pub fn play_trick(&mut self, policy: &mut dyn Policy) -> Result<CompletedTrick, RoundError> {
        let leader = self.players[0].leader();
        if self.players.iter().any(|p| p.leader() != leader) {
            return Err(RoundError::LeaderDisagreement);
        }

        let mut trick = Trick::new(leader);
        for seat in leader.rotation() {
            let player = &mut self.players[seat.index()];
            let table = trick.slots();
            let ctx = PlayContext {
                seat,
                leader,
                hand: player.hand(),
                table: &table,
            };
            let card = policy
                .choose_play(&ctx)
                .ok_or(RoundError::NoCardAvailable(seat))?;
            player.play(card).map_err(|err| RoundError::Play(seat, err))?;
            trick.play(seat, card)?;
        }

        let cards = trick
            .cards_by_seat()
            .ok_or(RoundError::Trick(TrickError::TrickComplete))?;
        let mut completed = None;
        for player in &mut self.players {
            let seat = player.seat();
            let outcome = player
                .record_trick(cards)
                .map_err(|err| RoundError::Play(seat, err))?;
            completed = Some(outcome.trick);
        }
        let completed = completed.ok_or(RoundError::LeaderDisagreement)?;
        self.history.push(completed);
        Ok(completed)
    }

    pub fn play_out(&mut self, policy: &mut dyn Policy) -> Result<&[CompletedTrick], RoundError> {
        while !self.is_finished() {
            self.play_trick(policy)?;
        }
        Ok(&self.history)
    }

    /// Tricks taken by each partnership, North/South first.
    pub fn partnership_tricks(&self) -> [usize; 2] {
        let mut totals = [0; 2];
        for trick in &self.history {
            totals[trick.winner.partnership()] += 1;
        }
        totals
    }
}
