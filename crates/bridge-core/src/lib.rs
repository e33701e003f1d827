#![deny(warnings)]
//! Cards, hands, and trick resolution for a four-seat bridge table.
//!
//! Nothing here knows about shared memory; `bridge-table` drives these
//! types from the synchronised segment and `LocalRound` drives them in a
//! single process.

pub mod game;
pub mod model;
