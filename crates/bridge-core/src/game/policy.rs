use crate::model::card::Card;
use crate::model::hand::Hand;
use crate::model::seat::{SEATS_COUNT, Seat};

/// What a seat can see when it is its turn to play.
pub struct PlayContext<'a> {
    pub seat: Seat,
    pub leader: Seat,
    pub hand: &'a Hand,
    /// Current trick indexed by seat, `None` for seats yet to play.
    pub table: &'a [Option<Card>; SEATS_COUNT],
}

impl PlayContext<'_> {
    pub fn is_leading(&self) -> bool {
        self.seat == self.leader
    }

    pub fn led_card(&self) -> Option<Card> {
        self.table[self.leader.index()]
    }
}

/// Card selection for one seat.
pub trait Policy: Send {
    /// Pick the card to play, `None` only when the hand is empty.
    fn choose_play(&mut self, ctx: &PlayContext<'_>) -> Option<Card>;
}

/// Lead the highest rank; when following, win with the top card of the led
/// suit if that beats the table, otherwise shed the cheapest card.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyPolicy;

impl Policy for GreedyPolicy {
    fn choose_play(&mut self, ctx: &PlayContext<'_>) -> Option<Card> {
        let led = match ctx.led_card() {
            Some(led) if !ctx.is_leading() => led,
            _ => return ctx.hand.highest_by_rank(),
        };

        let best_on_table = ctx
            .table
            .iter()
            .flatten()
            .filter(|card| card.suit == led.suit)
            .max_by_key(|card| card.rank)
            .copied()
            .unwrap_or(led);

        match ctx.hand.highest_in_suit(led.suit) {
            Some(top) if top.beats(best_on_table) => Some(top),
            _ => ctx
                .hand
                .lowest_in_suit(led.suit)
                .or_else(|| ctx.hand.lowest_by_rank()),
        }
    }
}
