use core::fmt;
use serde::{Deserialize, Serialize};

/// Number of seats around the table.
pub const SEATS_COUNT: usize = 4;

/// Seats in clockwise ring order. Partners share index parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Seat {
    North = 0,
    East = 1,
    South = 2,
    West = 3,
}

impl Seat {
    pub const LOOP: [Seat; 4] = [Seat::North, Seat::East, Seat::South, Seat::West];

    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Seat::North),
            1 => Some(Seat::East),
            2 => Some(Seat::South),
            3 => Some(Seat::West),
            _ => None,
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn next(self) -> Seat {
        match self {
            Seat::North => Seat::East,
            Seat::East => Seat::South,
            Seat::South => Seat::West,
            Seat::West => Seat::North,
        }
    }

    pub const fn previous(self) -> Seat {
        match self {
            Seat::North => Seat::West,
            Seat::East => Seat::North,
            Seat::South => Seat::East,
            Seat::West => Seat::South,
        }
    }

    /// `0` for North/South, `1` for East/West.
    pub const fn partnership(self) -> usize {
        self.index() % 2
    }

    pub const fn is_partner_of(self, other: Seat) -> bool {
        self.partnership() == other.partnership()
    }

    /// Seats in play order for a trick led by `self`.
    pub fn rotation(self) -> [Seat; 4] {
        let mut order = [self; 4];
        for i in 1..SEATS_COUNT {
            order[i] = order[i - 1].next();
        }
        order
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Seat::North => "North",
            Seat::East => "East",
            Seat::South => "South",
            Seat::West => "West",
        };
        f.write_str(label)
    }
}
