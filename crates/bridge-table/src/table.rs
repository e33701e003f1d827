use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::{AtomicU32, Ordering};

use bridge_core::model::card::{CARDS_COUNT, Card};
use bridge_core::model::deck::{Deck, HAND_SIZE};
use bridge_core::model::hand::Hand;
use bridge_core::model::seat::{SEATS_COUNT, Seat};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Result, TableError};
use crate::names::TableNames;
use crate::segment::{self, Exclusive, Mapping};
use crate::semaphore::NamedSemaphore;
use crate::sync::{BarrierRole, Locked, MutexGuard, SharedBarrier, SharedCondvar, SharedMutex};

/// Stamp of the [`SharedTable`] layout, bumped whenever the struct changes.
pub const LAYOUT_VERSION: u32 = 0x5342_0001;

/// Marker for a trick slot (or dealt deck slot) holding no card.
pub const EMPTY_SLOT: u8 = 0xff;

pub const DEFAULT_SHUFFLE_PASSES: usize = 10;

/// The segment contents. Plain data plus in-place pthread objects; no
/// pointers, so every process can map it at any address.
#[repr(C)]
pub struct SharedTable {
    layout: AtomicU32,
    pub(crate) phase: SharedBarrier,
    seat_lock: SharedMutex,
    seat_count: UnsafeCell<u32>,
    pub(crate) trick_lock: SharedMutex,
    pub(crate) trick_cond: SharedCondvar,
    trick: UnsafeCell<[u8; SEATS_COUNT]>,
    deck: UnsafeCell<[u8; CARDS_COUNT]>,
}

// SAFETY: seat_count is only touched under seat_lock, trick slots are only
// written under trick_lock, and deck slices are written by their owning seat.
unsafe impl Send for SharedTable {}
unsafe impl Sync for SharedTable {}

impl SharedTable {
    pub(crate) fn trick_slot(&self, seat: Seat) -> *mut u8 {
        // SAFETY: seat.index() < SEATS_COUNT.
        unsafe { self.trick.get().cast::<u8>().add(seat.index()) }
    }

    fn deck_slot(&self, index: usize) -> *mut u8 {
        debug_assert!(index < CARDS_COUNT);
        // SAFETY: caller keeps index < CARDS_COUNT.
        unsafe { self.deck.get().cast::<u8>().add(index) }
    }
}

/// How the creator shuffles the deck.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DealOptions {
    pub seed: Option<u64>,
    pub shuffle_passes: usize,
}

impl Default for DealOptions {
    fn default() -> Self {
        Self {
            seed: None,
            shuffle_passes: DEFAULT_SHUFFLE_PASSES,
        }
    }
}

impl DealOptions {
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    pub fn deck(&self) -> Deck {
        match self.seed {
            Some(seed) => Deck::shuffled_with_seed(seed, self.shuffle_passes),
            None => {
                let mut rng = StdRng::from_entropy();
                Deck::shuffled(&mut rng, self.shuffle_passes)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Creator,
    Joiner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Departure {
    /// Passed the terminal barrier as the serial waiter and tore the table down.
    Destroyed,
    /// Unmapped only.
    Closed,
}

/// Outcome of the creation race.
enum Bootstrap {
    Created(Mapping<SharedTable>),
    Joined(Mapping<SharedTable>, Seat),
}

/// One participant's handle on the shared table.
pub struct Table {
    pub(crate) shared: Mapping<SharedTable>,
    names: TableNames,
    pub(crate) seat: Seat,
    role: Role,
}

/// Turn a lock outcome into a usable guard, recovering from owner death.
///
/// A dead owner could only have been between lock and unlock of a single
/// slot or counter update, which leaves the data structurally valid.
pub(crate) fn settle<'a>(locked: Locked<'a>, what: &'static str) -> Result<MutexGuard<'a>> {
    match locked {
        Locked::Acquired(guard) => Ok(guard),
        Locked::OwnerDied(inconsistent) => {
            warn!(lock = what, "previous owner died holding the lock; marking consistent");
            Ok(inconsistent.mark_consistent()?)
        }
    }
}

impl Table {
    /// Create or attach to the table and wait until all four seats are taken.
    pub fn join(names: &TableNames, deal: &DealOptions) -> Result<Self> {
        let semaphore = NamedSemaphore::open(&names.semaphore, 1)?;
        semaphore.wait()?;

        let bootstrap = match segment::create_exclusive::<SharedTable>(&names.segment) {
            Ok(Exclusive::Created(mapping)) => Bootstrap::Created(mapping),
            Ok(Exclusive::AlreadyExists) => {
                let mapping = segment::open_existing::<SharedTable>(&names.segment)?;
                let seat = claim_seat(&mapping)?;
                Bootstrap::Joined(mapping, seat)
            }
            Err(err) => {
                release(&semaphore);
                return Err(err);
            }
        };

        let table = match bootstrap {
            Bootstrap::Created(mapping) => {
                let opened = unsafe { initialise(mapping.as_mut_ptr(), deal) }.and_then(|()| {
                    for _ in 1..SEATS_COUNT {
                        semaphore.post()?;
                    }
                    Ok(())
                });
                if let Err(err) = opened {
                    abandon(mapping, names, &semaphore);
                    return Err(err);
                }
                info!(segment = %names.segment, "created table");
                Table {
                    shared: mapping,
                    names: names.clone(),
                    seat: Seat::North,
                    role: Role::Creator,
                }
            }
            Bootstrap::Joined(mapping, seat) => {
                info!(segment = %names.segment, %seat, "joined table");
                Table {
                    shared: mapping,
                    names: names.clone(),
                    seat,
                    role: Role::Joiner,
                }
            }
        };
        drop(semaphore);

        info!(seat = %table.seat, "waiting for players");
        table.shared.phase.wait()?;
        Ok(table)
    }

    pub fn seat(&self) -> Seat {
        self.seat
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn names(&self) -> &TableNames {
        &self.names
    }

    /// Take this seat's 13 cards out of the shared deck, then wait until
    /// every seat has done the same.
    pub fn deal_hand(&self) -> Result<Hand> {
        let start = self.seat.index() * HAND_SIZE;
        let mut cards = Vec::with_capacity(HAND_SIZE);
        for index in start..start + HAND_SIZE {
            // SAFETY: each seat only reads and clears its own slice.
            let code = unsafe { ptr::replace(self.shared.deck_slot(index), EMPTY_SLOT) };
            let card = Card::from_code(code).ok_or(TableError::CorruptSlot {
                seat: self.seat,
                code,
            })?;
            cards.push(card);
        }
        let hand = Hand::with_cards(cards);
        debug!(seat = %self.seat, cards = hand.len(), "took hand from deck");

        self.shared.phase.wait()?;
        Ok(hand)
    }

    /// Terminal barrier; the serial waiter destroys the table, the others
    /// close their mapping.
    pub fn leave(self) -> Result<Departure> {
        match self.shared.phase.wait()? {
            BarrierRole::Serial => {
                self.destroy()?;
                Ok(Departure::Destroyed)
            }
            BarrierRole::Member => {
                self.close();
                Ok(Departure::Closed)
            }
        }
    }

    /// Unmap without touching the names.
    pub fn close(self) {
        info!(seat = %self.seat, "leaving table");
        drop(self.shared);
    }

    /// Tear down the pthread objects, unmap, and unlink both names.
    ///
    /// Only one participant may call this, after every other participant has
    /// stopped using the primitives.
    pub fn destroy(self) -> Result<()> {
        info!(seat = %self.seat, "destroying table");
        let shared = &self.shared;
        // SAFETY: the terminal barrier has released everyone; nobody waits
        // on or holds these objects any more.
        let torn_down = unsafe {
            [
                shared.trick_cond.destroy(),
                shared.trick_lock.destroy(),
                shared.seat_lock.destroy(),
                shared.phase.destroy(),
            ]
        };
        for result in torn_down {
            if let Err(err) = result {
                warn!(error = %err, "failed to destroy shared primitive");
            }
        }

        let Table { shared, names, .. } = self;
        drop(shared);
        // Attempt both unlinks and report the first failure.
        let segment_gone = segment::unlink(&names.segment);
        let semaphore_gone = NamedSemaphore::unlink(&names.semaphore);
        segment_gone.and(semaphore_gone)
    }
}

/// Post one permit, logging instead of failing; used on error paths.
fn release(semaphore: &NamedSemaphore) {
    if let Err(err) = semaphore.post() {
        warn!(semaphore = semaphore.name(), error = %err, "could not release creation semaphore");
    }
}

/// Undo a creation that did not complete: unmap, unlink the segment, and let
/// the next waiter run the race again.
fn abandon(mapping: Mapping<SharedTable>, names: &TableNames, semaphore: &NamedSemaphore) {
    drop(mapping);
    if let Err(err) = segment::unlink(&names.segment) {
        warn!(segment = %names.segment, error = %err, "could not unlink half-built table");
    }
    release(semaphore);
}

/// Post-increment the shared seat counter under its lock.
fn claim_seat(shared: &Mapping<SharedTable>) -> Result<Seat> {
    let found = shared.layout.load(Ordering::Acquire);
    if found != LAYOUT_VERSION {
        return Err(TableError::LayoutMismatch {
            name: shared.name().to_string(),
            expected: LAYOUT_VERSION,
            found,
        });
    }

    let count = {
        let _guard = settle(shared.seat_lock.lock()?, "seat counter")?;
        let counter = shared.seat_count.get();
        // SAFETY: seat_count is only accessed while seat_lock is held.
        unsafe {
            let count = *counter;
            *counter = count.saturating_add(1);
            count
        }
    };

    Seat::from_index(count as usize).ok_or(TableError::SeatOverflow { count })
}

/// Build a fresh table in zero-filled memory.
///
/// # Safety
///
/// `table` must point to a zero-filled, writable, not yet shared
/// `SharedTable` that stays mapped at this address.
unsafe fn initialise(table: *mut SharedTable, deal: &DealOptions) -> Result<()> {
    // SAFETY: forwarded from the caller; each field is initialised exactly once.
    unsafe {
        SharedBarrier::init_in_place(&raw mut (*table).phase, SEATS_COUNT as u32)?;
        SharedMutex::init_in_place(&raw mut (*table).seat_lock)?;
        SharedMutex::init_in_place(&raw mut (*table).trick_lock)?;
        SharedCondvar::init_in_place(&raw mut (*table).trick_cond)?;

        let deck = deal.deck();
        ptr::write(UnsafeCell::raw_get(&raw const (*table).deck), deck.codes());
        ptr::write(
            UnsafeCell::raw_get(&raw const (*table).trick),
            [EMPTY_SLOT; SEATS_COUNT],
        );
        ptr::write(UnsafeCell::raw_get(&raw const (*table).seat_count), 1);
        (*table).layout.store(LAYOUT_VERSION, Ordering::Release);
    }
    debug!(passes = deal.shuffle_passes, seeded = deal.seed.is_some(), "dealt deck");
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A table initialised like the creator would, without the semaphore
    /// race or the join barrier. Returns `None` when shared memory is not
    /// available in this environment.
    pub(crate) fn standalone(tag: &str, deal: &DealOptions) -> Option<Table> {
        let names =
            TableNames::tagged(&format!("unit-{}-{tag}", std::process::id())).expect("valid names");
        let _ = segment::unlink(&names.segment);
        let mapping = match segment::create_exclusive::<SharedTable>(&names.segment) {
            Ok(Exclusive::Created(mapping)) => mapping,
            Ok(Exclusive::AlreadyExists) => panic!("stale segment {}", names.segment),
            Err(err) => {
                eprintln!("Skipping: {err}");
                return None;
            }
        };
        unsafe { initialise(mapping.as_mut_ptr(), deal) }.expect("initialise");
        Some(Table {
            shared: mapping,
            names,
            seat: Seat::North,
            role: Role::Creator,
        })
    }

    /// A second handle on the same segment for `seat`.
    pub(crate) fn attach(table: &Table, seat: Seat) -> Table {
        Table {
            shared: segment::open_existing(&table.names.segment).expect("attach"),
            names: table.names.clone(),
            seat,
            role: Role::Joiner,
        }
    }

    #[test]
    fn creator_initialises_deck_trick_and_counter() {
        let deal = DealOptions::seeded(11);
        let Some(table) = standalone("init", &deal) else {
            return;
        };
        let shared = &table.shared;
        assert_eq!(shared.layout.load(Ordering::SeqCst), LAYOUT_VERSION);
        for seat in Seat::LOOP {
            assert_eq!(unsafe { *shared.trick_slot(seat) }, EMPTY_SLOT);
        }
        let expected = deal.deck().codes();
        for (index, code) in expected.iter().enumerate() {
            assert_eq!(unsafe { *shared.deck_slot(index) }, *code);
        }
        let _ = segment::unlink(&table.names.segment);
    }

    #[test]
    fn joiners_get_consecutive_seats() {
        let Some(table) = standalone("seats", &DealOptions::seeded(3)) else {
            return;
        };
        assert_eq!(claim_seat(&table.shared).unwrap(), Seat::East);
        assert_eq!(claim_seat(&table.shared).unwrap(), Seat::South);
        assert_eq!(claim_seat(&table.shared).unwrap(), Seat::West);
        assert!(matches!(
            claim_seat(&table.shared),
            Err(TableError::SeatOverflow { count: 4 })
        ));
        let _ = segment::unlink(&table.names.segment);
    }

    #[test]
    fn foreign_layout_is_refused() {
        let Some(table) = standalone("layout", &DealOptions::seeded(3)) else {
            return;
        };
        table.shared.layout.store(0xdead_beef, Ordering::SeqCst);
        assert!(matches!(
            claim_seat(&table.shared),
            Err(TableError::LayoutMismatch { found: 0xdead_beef, .. })
        ));
        let _ = segment::unlink(&table.names.segment);
    }

    #[test]
    fn seat_counter_survives_owner_death() {
        let Some(table) = standalone("seat-owner", &DealOptions::seeded(3)) else {
            return;
        };
        std::thread::scope(|scope| {
            scope.spawn(|| match table.shared.seat_lock.lock().unwrap() {
                Locked::Acquired(guard) => std::mem::forget(guard),
                Locked::OwnerDied(_) => panic!("fresh lock reported owner death"),
            });
        });
        assert_eq!(claim_seat(&table.shared).unwrap(), Seat::East);
        assert_eq!(claim_seat(&table.shared).unwrap(), Seat::South);
        let _ = segment::unlink(&table.names.segment);
    }

    #[test]
    fn destroy_unlinks_segment() {
        let Some(table) = standalone("destroy", &DealOptions::seeded(5)) else {
            return;
        };
        let names = table.names.clone();
        let sem = NamedSemaphore::open(&names.semaphore, 1).unwrap();
        drop(sem);
        table.destroy().unwrap();
        assert!(segment::open_existing::<SharedTable>(&names.segment).is_err());
        assert!(NamedSemaphore::unlink(&names.semaphore).is_err());
    }

    #[test]
    fn destroy_unlinks_semaphore_when_segment_is_already_gone() {
        let Some(table) = standalone("destroy-leak", &DealOptions::seeded(5)) else {
            return;
        };
        let names = table.names.clone();
        drop(NamedSemaphore::open(&names.semaphore, 1).unwrap());
        segment::unlink(&names.segment).unwrap();

        let err = table.destroy().expect_err("segment was already unlinked");
        assert!(matches!(err, TableError::Posix { op: "shm_unlink", .. }));
        assert!(
            NamedSemaphore::unlink(&names.semaphore).is_err(),
            "semaphore must be unlinked even when the segment unlink fails"
        );
    }

    #[test]
    fn abandoned_creation_reopens_the_race() {
        let names = TableNames::tagged(&format!("unit-{}-abandon", std::process::id()))
            .expect("valid names");
        let _ = segment::unlink(&names.segment);
        let _ = NamedSemaphore::unlink(&names.semaphore);

        let semaphore = match NamedSemaphore::open(&names.semaphore, 1) {
            Ok(semaphore) => semaphore,
            Err(err) => {
                eprintln!("Skipping abandoned_creation_reopens_the_race: {err}");
                return;
            }
        };
        semaphore.wait().unwrap();
        let mapping = match segment::create_exclusive::<SharedTable>(&names.segment) {
            Ok(Exclusive::Created(mapping)) => mapping,
            Ok(Exclusive::AlreadyExists) => panic!("stale segment {}", names.segment),
            Err(err) => {
                eprintln!("Skipping abandoned_creation_reopens_the_race: {err}");
                let _ = NamedSemaphore::unlink(&names.semaphore);
                return;
            }
        };

        abandon(mapping, &names, &semaphore);

        let (tx, rx) = std::sync::mpsc::channel();
        let waiter_names = names.clone();
        std::thread::spawn(move || {
            let next = NamedSemaphore::open(&waiter_names.semaphore, 1).unwrap();
            next.wait().unwrap();
            tx.send(()).unwrap();
        });
        rx.recv_timeout(std::time::Duration::from_secs(5))
            .expect("next participant got past the creation semaphore");

        assert!(matches!(
            segment::create_exclusive::<SharedTable>(&names.segment),
            Ok(Exclusive::Created(_))
        ));
        segment::unlink(&names.segment).unwrap();
        NamedSemaphore::unlink(&names.semaphore).unwrap();
    }
}
