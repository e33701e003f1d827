pub mod player_hand;
pub mod policy;
pub mod round;

pub use player_hand::{CompletedTrick, PlayError, PlayerHand, TrickOutcome};
pub use policy::{GreedyPolicy, PlayContext, Policy};
pub use round::{LocalRound, RoundError};
