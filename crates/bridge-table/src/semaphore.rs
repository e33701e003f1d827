use std::ffi::CString;
use std::io;

use tracing::trace;

use crate::error::{Result, TableError};
use crate::names::validate_name;

/// Named POSIX semaphore (`sem_open`). Closed on drop, never unlinked
/// implicitly.
pub struct NamedSemaphore {
    raw: *mut libc::sem_t,
    name: String,
}

impl NamedSemaphore {
    /// Open the semaphore, creating it with `initial` permits if absent.
    pub fn open(name: &str, initial: u32) -> Result<Self> {
        let c_name = c_name(name)?;
        // SAFETY: c_name is a valid NUL-terminated string; the variadic mode
        // and value arguments are the types sem_open reads for O_CREAT.
        let raw = unsafe {
            libc::sem_open(
                c_name.as_ptr(),
                libc::O_CREAT,
                0o666 as libc::mode_t,
                initial as libc::c_uint,
            )
        };
        if raw == libc::SEM_FAILED {
            return Err(semaphore_error("sem_open", name));
        }
        Ok(Self {
            raw,
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Take one permit, blocking; interrupted waits are retried.
    pub fn wait(&self) -> Result<()> {
        loop {
            // SAFETY: raw came from a successful sem_open and is open until drop.
            if unsafe { libc::sem_wait(self.raw) } == 0 {
                trace!(semaphore = %self.name, "acquired");
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(TableError::Semaphore {
                    op: "sem_wait",
                    name: self.name.clone(),
                    source: err,
                });
            }
        }
    }

    pub fn post(&self) -> Result<()> {
        // SAFETY: raw came from a successful sem_open and is open until drop.
        if unsafe { libc::sem_post(self.raw) } != 0 {
            return Err(semaphore_error("sem_post", &self.name));
        }
        Ok(())
    }

    /// Remove `name` from the system namespace.
    pub fn unlink(name: &str) -> Result<()> {
        let c_name = c_name(name)?;
        // SAFETY: c_name is a valid NUL-terminated string.
        if unsafe { libc::sem_unlink(c_name.as_ptr()) } != 0 {
            return Err(semaphore_error("sem_unlink", name));
        }
        Ok(())
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        // SAFETY: raw is still open; it is not used after this point.
        unsafe {
            libc::sem_close(self.raw);
        }
    }
}

fn c_name(name: &str) -> Result<CString> {
    validate_name(name)?;
    CString::new(name).map_err(|_| TableError::InvalidName {
        name: name.to_string(),
        reason: "name must not contain NUL bytes",
    })
}

fn semaphore_error(op: &'static str, name: &str) -> TableError {
    TableError::Semaphore {
        op,
        name: name.to_string(),
        source: io::Error::last_os_error(),
    }
}
