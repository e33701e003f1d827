use bridge_core::game::{PlayerHand, Policy, TrickOutcome};
use bridge_core::model::card::Card;
use bridge_core::model::deck::HAND_SIZE;
use bridge_core::model::seat::Seat;
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::names::TableNames;
use crate::table::{DealOptions, Departure, Role, Table};

/// Everything one participant saw during a full deal.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub seat: Seat,
    pub role: Role,
    pub initial_hand: Vec<Card>,
    pub tricks: Vec<TrickOutcome>,
    pub departure: Departure,
}

impl SessionReport {
    pub fn tricks_won(&self) -> usize {
        self.tricks.iter().filter(|outcome| outcome.won).count()
    }

    pub fn cards_played(&self) -> impl Iterator<Item = Card> + '_ {
        self.tricks.iter().map(|outcome| outcome.card)
    }
}

/// Hooks fired while a session is in progress, so a front end can show each
/// trick as it resolves rather than after the table is gone.
pub trait SessionObserver {
    fn seated(&mut self, _seat: Seat, _role: Role) {}
    fn hand_dealt(&mut self, _seat: Seat, _hand: &[Card]) {}
    fn trick_resolved(&mut self, _seat: Seat, _outcome: &TrickOutcome) {}
}

impl SessionObserver for () {}

/// Join the table, play all thirteen tricks for the assigned seat, and leave.
pub fn play_session(
    names: &TableNames,
    deal: &DealOptions,
    policy: &mut dyn Policy,
) -> Result<SessionReport> {
    play_session_observed(names, deal, policy, &mut ())
}

/// [`play_session`], reporting progress to `observer` as it happens.
pub fn play_session_observed(
    names: &TableNames,
    deal: &DealOptions,
    policy: &mut dyn Policy,
    observer: &mut dyn SessionObserver,
) -> Result<SessionReport> {
    let table = Table::join(names, deal)?;
    let seat = table.seat();
    let role = table.role();
    observer.seated(seat, role);

    let hand = table.deal_hand()?;
    let initial_hand = hand.cards().to_vec();
    info!(%seat, ?role, cards = initial_hand.len(), "hand dealt");
    observer.hand_dealt(seat, &initial_hand);

    let mut player = PlayerHand::new(seat, hand);
    let mut tricks = Vec::with_capacity(HAND_SIZE);
    for _ in 0..HAND_SIZE {
        table.play_turn(&mut player, policy)?;
        let outcome = table.resolve_trick(&mut player)?;
        observer.trick_resolved(seat, &outcome);
        tricks.push(outcome);
    }

    let departure = table.leave()?;
    info!(%seat, won = player.tricks_won(), ?departure, "session finished");
    Ok(SessionReport {
        seat,
        role,
        initial_hand,
        tricks,
        departure,
    })
}
