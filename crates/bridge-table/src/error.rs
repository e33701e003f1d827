use bridge_core::game::PlayError;
use bridge_core::model::seat::Seat;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TableError>;

/// Failure of a process-shared pthread primitive.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{op} failed: {source}")]
    Os {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },
    /// A previous owner died and nobody marked the lock consistent.
    #[error("{op} failed: lock state is not recoverable")]
    NotRecoverable { op: &'static str },
}

impl SyncError {
    pub(crate) fn from_code(op: &'static str, code: libc::c_int) -> Self {
        if code == libc::ENOTRECOVERABLE {
            SyncError::NotRecoverable { op }
        } else {
            SyncError::Os {
                op,
                source: std::io::Error::from_raw_os_error(code),
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("invalid shared name `{name}`: {reason}")]
    InvalidName { name: String, reason: &'static str },
    #[error("{op} failed for `{name}`: {source}")]
    Posix {
        op: &'static str,
        name: String,
        #[source]
        source: rustix::io::Errno,
    },
    #[error("{op} failed for semaphore `{name}`: {source}")]
    Semaphore {
        op: &'static str,
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("shared table `{name}` size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        name: String,
        expected: usize,
        actual: i64,
    },
    #[error("shared table `{name}` has layout {found:#010x}, expected {expected:#010x}")]
    LayoutMismatch {
        name: String,
        expected: u32,
        found: u32,
    },
    #[error("seat counter reached {count} but the table only has four seats")]
    SeatOverflow { count: u32 },
    #[error("slot for {seat} holds invalid card code {code:#04x}")]
    CorruptSlot { seat: Seat, code: u8 },
    #[error("{seat} has not published a card")]
    EmptySlot { seat: Seat },
    #[error("{seat} has no card left to play")]
    NoCardAvailable { seat: Seat },
    #[error("{seat}: {source}")]
    Play {
        seat: Seat,
        #[source]
        source: PlayError,
    },
}

impl TableError {
    pub(crate) fn posix(op: &'static str, name: &str, source: rustix::io::Errno) -> Self {
        TableError::Posix {
            op,
            name: name.to_string(),
            source,
        }
    }
}
