//! Named POSIX shared-memory mapping of one fixed-size `#[repr(C)]` value.
//!
//! Unlike a create-or-open helper, [`create_exclusive`] reports whether this
//! process won the creation race, so callers can branch on
//! [`Exclusive::Created`] / [`Exclusive::AlreadyExists`] explicitly.

use std::marker::PhantomData;
use std::mem::size_of;
use std::ops::Deref;
use std::ptr::{NonNull, null_mut};

use rustix::fd::OwnedFd;
use rustix::fs::{Mode, fstat, ftruncate};
use rustix::io::Errno;
use rustix::mm::{MapFlags, ProtFlags, mmap, munmap};
use rustix::shm;
use tracing::{debug, warn};

use crate::error::{Result, TableError};
use crate::names::validate_name;

/// A mapping of `T` backed by a named shared-memory object.
///
/// Dropping the mapping unmaps it; the name is only removed by [`unlink`].
pub struct Mapping<T> {
    ptr: NonNull<T>,
    name: String,
    _marker: PhantomData<T>,
}

// SAFETY: T is Sync (required for Deref below) and the mapping itself is a
// plain address range that any thread may unmap.
unsafe impl<T: Send + Sync> Send for Mapping<T> {}
unsafe impl<T: Send + Sync> Sync for Mapping<T> {}

/// Result of an exclusive create attempt.
pub enum Exclusive<T> {
    /// This process created the object; its contents are zero-filled.
    Created(Mapping<T>),
    /// Somebody else created it first.
    AlreadyExists,
}

fn share_mode() -> Mode {
    Mode::RUSR | Mode::WUSR | Mode::RGRP | Mode::WGRP | Mode::ROTH | Mode::WOTH
}

/// `shm_open(O_CREAT | O_EXCL | O_RDWR)`, size to `T`, and map.
///
/// Any failure after the object was created unlinks it again so that later
/// participants do not attach to a half-built segment.
pub fn create_exclusive<T: Sync>(name: &str) -> Result<Exclusive<T>> {
    validate_name(name)?;

    let fd = match shm::open(
        name,
        shm::OFlags::CREATE | shm::OFlags::EXCL | shm::OFlags::RDWR,
        share_mode(),
    ) {
        Ok(fd) => fd,
        Err(err) if err == Errno::EXIST => return Ok(Exclusive::AlreadyExists),
        Err(err) => return Err(TableError::posix("shm_open", name, err)),
    };

    if let Err(err) = ftruncate(&fd, size_of::<T>() as u64) {
        drop(fd);
        discard(name);
        return Err(TableError::posix("ftruncate", name, err));
    }

    match map::<T>(&fd, name) {
        Ok(mapping) => {
            debug!(segment = name, bytes = size_of::<T>(), "created shared segment");
            Ok(Exclusive::Created(mapping))
        }
        Err(err) => {
            drop(fd);
            discard(name);
            Err(err)
        }
    }
}

/// Map an object created by another process, checking its size first.
pub fn open_existing<T: Sync>(name: &str) -> Result<Mapping<T>> {
    validate_name(name)?;

    let fd = shm::open(name, shm::OFlags::RDWR, Mode::empty())
        .map_err(|err| TableError::posix("shm_open", name, err))?;

    let stat = fstat(&fd).map_err(|err| TableError::posix("fstat", name, err))?;
    let actual = stat.st_size as i64;
    if actual != size_of::<T>() as i64 {
        return Err(TableError::SizeMismatch {
            name: name.to_string(),
            expected: size_of::<T>(),
            actual,
        });
    }

    let mapping = map::<T>(&fd, name)?;
    debug!(segment = name, "attached to shared segment");
    Ok(mapping)
}

/// Remove `name` from the shared-memory namespace.
pub fn unlink(name: &str) -> Result<()> {
    shm::unlink(name).map_err(|err| TableError::posix("shm_unlink", name, err))
}

fn discard(name: &str) {
    if let Err(err) = shm::unlink(name) {
        warn!(segment = name, error = %err, "could not unlink partially built segment");
    }
}

fn map<T>(fd: &OwnedFd, name: &str) -> Result<Mapping<T>> {
    // SAFETY: a fresh shared mapping of an object that is at least
    // size_of::<T>() bytes long. mmap returns page-aligned addresses, which
    // satisfies the alignment of any T stored here.
    let ptr = unsafe {
        mmap(
            null_mut(),
            size_of::<T>(),
            ProtFlags::READ | ProtFlags::WRITE,
            MapFlags::SHARED,
            fd,
            0,
        )
    }
    .map_err(|err| TableError::posix("mmap", name, err))?;

    let ptr = NonNull::new(ptr.cast::<T>())
        .ok_or_else(|| TableError::posix("mmap", name, Errno::FAULT))?;
    Ok(Mapping {
        ptr,
        name: name.to_string(),
        _marker: PhantomData,
    })
}

impl<T> Mapping<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw pointer for in-place initialisation by the creator.
    pub fn as_mut_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }
}

impl<T> Drop for Mapping<T> {
    fn drop(&mut self) {
        // SAFETY: ptr/len describe the mapping created in `map`, and no
        // reference derived from it outlives `self`.
        if let Err(err) = unsafe { munmap(self.ptr.as_ptr().cast(), size_of::<T>()) } {
            warn!(segment = %self.name, error = %err, "munmap failed");
        }
    }
}

impl<T: Sync> Deref for Mapping<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the memory stays mapped for the lifetime of `self`; T: Sync
        // because other processes access it concurrently.
        unsafe { self.ptr.as_ref() }
    }
}
