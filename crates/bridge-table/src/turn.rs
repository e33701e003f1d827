use std::ptr;

use bridge_core::game::{PlayContext, PlayerHand, Policy, TrickOutcome};
use bridge_core::model::card::Card;
use bridge_core::model::seat::{SEATS_COUNT, Seat};
use tracing::{debug, info};

use crate::error::{Result, TableError};
use crate::table::{EMPTY_SLOT, Table, settle};

impl Table {
    /// Play this seat's card for the current trick.
    ///
    /// The leader publishes immediately; everyone else waits on the trick
    /// condition until the seat before them has published. Returns after the
    /// publish barrier, when all four slots are filled.
    pub fn play_turn(&self, hand: &mut PlayerHand, policy: &mut dyn Policy) -> Result<Card> {
        let seat = self.seat;
        let leader = hand.leader();
        let shared = &*self.shared;

        let mut guard = settle(shared.trick_lock.lock()?, "trick")?;
        if seat != leader {
            let previous = seat.previous();
            // SAFETY: slots are only written while trick_lock is held.
            while unsafe { *shared.trick_slot(previous) } == EMPTY_SLOT {
                guard = settle(shared.trick_cond.wait(guard)?, "trick")?;
            }
        }

        let table = self.snapshot()?;
        let ctx = PlayContext {
            seat,
            leader,
            hand: hand.hand(),
            table: &table,
        };
        let card = policy
            .choose_play(&ctx)
            .ok_or(TableError::NoCardAvailable { seat })?;
        hand.play(card)
            .map_err(|source| TableError::Play { seat, source })?;
        // SAFETY: trick_lock is held.
        unsafe { *shared.trick_slot(seat) = card.code() };
        drop(guard);
        shared.trick_cond.broadcast()?;
        debug!(%seat, %card, "published card");

        shared.phase.wait()?;
        Ok(card)
    }

    /// Resolve the full trick locally, then clear this seat's slot.
    ///
    /// Two barriers separate the phases: nobody clears before everyone has
    /// read, and nobody plays the next trick before everyone has cleared.
    pub fn resolve_trick(&self, hand: &mut PlayerHand) -> Result<TrickOutcome> {
        let seat = self.seat;
        let shared = &*self.shared;

        let cards = self.complete_trick()?;
        let outcome = hand
            .record_trick(cards)
            .map_err(|source| TableError::Play { seat, source })?;
        info!(
            %seat,
            trick = outcome.trick.number,
            card = %outcome.card,
            winner = %outcome.trick.winner,
            taken = outcome.won,
            "trick resolved"
        );
        shared.phase.wait()?;

        {
            let _guard = settle(shared.trick_lock.lock()?, "trick")?;
            // SAFETY: trick_lock is held.
            unsafe { *shared.trick_slot(seat) = EMPTY_SLOT };
        }
        shared.phase.wait()?;
        Ok(outcome)
    }

    /// Current trick slots, `None` where a seat has not played yet.
    ///
    /// Callers either hold `trick_lock` or are between the publish and
    /// resolve barriers, when no seat writes.
    pub(crate) fn snapshot(&self) -> Result<[Option<Card>; SEATS_COUNT]> {
        let mut slots = [None; SEATS_COUNT];
        for seat in Seat::LOOP {
            // SAFETY: see above; the slot pointer is in bounds.
            let code = unsafe { ptr::read(self.shared.trick_slot(seat)) };
            if code != EMPTY_SLOT {
                let card = Card::from_code(code).ok_or(TableError::CorruptSlot { seat, code })?;
                slots[seat.index()] = Some(card);
            }
        }
        Ok(slots)
    }

    pub(crate) fn complete_trick(&self) -> Result<[Card; SEATS_COUNT]> {
        match self.snapshot()? {
            [Some(north), Some(east), Some(south), Some(west)] => Ok([north, east, south, west]),
            slots => {
                let seat = Seat::LOOP
                    .into_iter()
                    .find(|seat| slots[seat.index()].is_none())
                    .unwrap_or(Seat::North);
                Err(TableError::EmptySlot { seat })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use bridge_core::game::{GreedyPolicy, LocalRound, PlayerHand};
    use bridge_core::model::seat::Seat;

    use crate::error::TableError;
    use crate::segment;
    use crate::sync::Locked;
    use crate::table::tests::{attach, standalone};
    use crate::table::{DealOptions, EMPTY_SLOT};

    #[test]
    fn one_trick_matches_local_rehearsal() {
        let deal = DealOptions::seeded(404);
        let Some(north) = standalone("one-trick", &deal) else {
            return;
        };
        let tables: Vec<_> = Seat::LOOP
            .into_iter()
            .map(|seat| if seat == Seat::North { None } else { Some(attach(&north, seat)) })
            .collect();

        let outcomes: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = Seat::LOOP
                .into_iter()
                .map(|seat| {
                    let table = tables[seat.index()].as_ref().unwrap_or(&north);
                    scope.spawn(move || {
                        let mut hand = PlayerHand::new(seat, table.deal_hand().unwrap());
                        let card = table.play_turn(&mut hand, &mut GreedyPolicy).unwrap();
                        let outcome = table.resolve_trick(&mut hand).unwrap();
                        assert_eq!(outcome.card, card);
                        outcome
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut round = LocalRound::deal(&deal.deck());
        let expected = round.play_trick(&mut GreedyPolicy).unwrap();
        for outcome in &outcomes {
            assert_eq!(outcome.trick, expected);
        }
        for seat in Seat::LOOP {
            assert_eq!(unsafe { *north.shared.trick_slot(seat) }, EMPTY_SLOT);
        }
        let _ = segment::unlink(&north.names().segment);
    }

    #[test]
    fn leader_recovers_trick_lock_after_owner_death() {
        let Some(north) = standalone("owner-death", &DealOptions::seeded(9)) else {
            return;
        };
        std::thread::scope(|scope| {
            scope.spawn(|| match north.shared.trick_lock.lock().unwrap() {
                Locked::Acquired(guard) => std::mem::forget(guard),
                Locked::OwnerDied(_) => panic!("fresh lock reported owner death"),
            });
        });

        let hand = DealOptions::seeded(9).deck().hand_for(Seat::North);
        let (tx, rx) = mpsc::channel();
        std::thread::scope(|scope| {
            scope.spawn(|| {
                let mut hand = PlayerHand::new(Seat::North, hand);
                let played = north.play_turn(&mut hand, &mut GreedyPolicy);
                tx.send(played).unwrap();
            });

            // Published, but held at the publish barrier until all four arrive.
            assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
            let slots = north.snapshot().unwrap();
            assert!(slots[Seat::North.index()].is_some());
            assert!(slots[Seat::East.index()].is_none());

            for _ in 0..3 {
                scope.spawn(|| north.shared.phase.wait().unwrap());
            }
            let card = rx.recv().unwrap().unwrap();
            assert_eq!(slots[Seat::North.index()], Some(card));
        });
        let _ = segment::unlink(&north.names().segment);
    }

    #[test]
    fn corrupt_slot_is_reported() {
        let Some(north) = standalone("corrupt", &DealOptions::seeded(1)) else {
            return;
        };
        unsafe { *north.shared.trick_slot(Seat::South) = 0x40 };
        assert!(matches!(
            north.snapshot(),
            Err(TableError::CorruptSlot { seat: Seat::South, code: 0x40 })
        ));
        let _ = segment::unlink(&north.names().segment);
    }

    #[test]
    fn incomplete_trick_is_reported() {
        let Some(north) = standalone("incomplete", &DealOptions::seeded(1)) else {
            return;
        };
        assert!(matches!(
            north.complete_trick(),
            Err(TableError::EmptySlot { seat: Seat::North })
        ));
        let _ = segment::unlink(&north.names().segment);
    }
}
