//! Four-process bridge table over POSIX shared memory.
//!
//! Each process calls [`Table::join`] to either create the named segment or
//! attach to it, then plays its seat through [`Table::play_turn`] and
//! [`Table::resolve_trick`], and finally [`Table::leave`]s. The last process
//! through the terminal barrier tears the segment down.

pub mod error;
pub mod names;
pub mod segment;
pub mod semaphore;
pub mod session;
pub mod sync;
pub mod table;
mod turn;

pub use error::{Result, SyncError, TableError};
pub use names::TableNames;
pub use session::{SessionObserver, SessionReport, play_session, play_session_observed};
pub use table::{DealOptions, Departure, Role, Table};
