//! Process-shared pthread primitives placed inside a shared mapping.
//!
//! All three types are `#[repr(C)]` wrappers that are initialised in place
//! with [`init_in_place`](SharedMutex::init_in_place) and must never move
//! afterwards. They are valid between processes (and between threads that
//! each hold their own mapping of the same segment).
//!
//! Lock acquisition returns a tagged [`Locked`] outcome instead of hiding
//! owner death: when the previous holder died with the lock held, the caller
//! gets an [`Inconsistent`] guard and has to call
//! [`Inconsistent::mark_consistent`] before touching the protected data.

use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::mem::MaybeUninit;

use crate::error::SyncError;

/// `PTHREAD_BARRIER_SERIAL_THREAD` as defined by glibc and musl.
const BARRIER_SERIAL_THREAD: libc::c_int = -1;

fn check(op: &'static str, code: libc::c_int) -> Result<(), SyncError> {
    if code == 0 {
        Ok(())
    } else {
        Err(SyncError::from_code(op, code))
    }
}

/// Robust, process-shared mutex.
#[repr(C)]
pub struct SharedMutex {
    raw: UnsafeCell<libc::pthread_mutex_t>,
}

// SAFETY: the pthread mutex is PTHREAD_PROCESS_SHARED and does its own
// synchronisation; the wrapper only hands out its address.
unsafe impl Send for SharedMutex {}
unsafe impl Sync for SharedMutex {}

impl SharedMutex {
    /// # Safety
    ///
    /// `this` must point to writable memory that is not an initialised mutex
    /// and stays at the same address until [`destroy`](Self::destroy).
    pub unsafe fn init_in_place(this: *mut Self) -> Result<(), SyncError> {
        let mut attr = MaybeUninit::<libc::pthread_mutexattr_t>::uninit();
        // SAFETY: attr is valid writable storage for the attribute object.
        check("pthread_mutexattr_init", unsafe {
            libc::pthread_mutexattr_init(attr.as_mut_ptr())
        })?;

        // SAFETY: attr was initialised above; `this` is valid per contract.
        let result = unsafe {
            check(
                "pthread_mutexattr_setpshared",
                libc::pthread_mutexattr_setpshared(attr.as_mut_ptr(), libc::PTHREAD_PROCESS_SHARED),
            )
            .and_then(|()| {
                check(
                    "pthread_mutexattr_setrobust",
                    libc::pthread_mutexattr_setrobust(attr.as_mut_ptr(), libc::PTHREAD_MUTEX_ROBUST),
                )
            })
            .and_then(|()| {
                check(
                    "pthread_mutex_init",
                    libc::pthread_mutex_init(UnsafeCell::raw_get(&raw const (*this).raw), attr.as_ptr()),
                )
            })
        };

        // SAFETY: attr is initialised and no longer needed.
        unsafe { libc::pthread_mutexattr_destroy(attr.as_mut_ptr()) };
        result
    }

    pub fn lock(&self) -> Result<Locked<'_>, SyncError> {
        // SAFETY: the mutex was initialised in place and has not moved.
        let code = unsafe { libc::pthread_mutex_lock(self.raw.get()) };
        Locked::from_code("pthread_mutex_lock", code, MutexGuard::new(self))
    }

    /// # Safety
    ///
    /// No process may hold or wait on the mutex, now or later.
    pub unsafe fn destroy(&self) -> Result<(), SyncError> {
        // SAFETY: forwarded from the caller.
        check("pthread_mutex_destroy", unsafe {
            libc::pthread_mutex_destroy(self.raw.get())
        })
    }

    fn raw(&self) -> *mut libc::pthread_mutex_t {
        self.raw.get()
    }
}

/// Outcome of acquiring a [`SharedMutex`]. The failure case is the `Err` arm
/// of the surrounding `Result`.
#[must_use]
pub enum Locked<'a> {
    Acquired(MutexGuard<'a>),
    /// The previous owner died holding the lock; data may be stale.
    OwnerDied(Inconsistent<'a>),
}

impl<'a> Locked<'a> {
    fn from_code(
        op: &'static str,
        code: libc::c_int,
        guard: MutexGuard<'a>,
    ) -> Result<Self, SyncError> {
        match code {
            0 => Ok(Locked::Acquired(guard)),
            libc::EOWNERDEAD => Ok(Locked::OwnerDied(Inconsistent { guard })),
            code => {
                // The lock was not taken, so the guard must not unlock it.
                std::mem::forget(guard);
                Err(SyncError::from_code(op, code))
            }
        }
    }
}

/// Holds a [`SharedMutex`]; unlocks on drop.
pub struct MutexGuard<'a> {
    mutex: &'a SharedMutex,
    _not_send: PhantomData<*const ()>,
}

impl<'a> MutexGuard<'a> {
    fn new(mutex: &'a SharedMutex) -> Self {
        Self {
            mutex,
            _not_send: PhantomData,
        }
    }
}

impl Drop for MutexGuard<'_> {
    fn drop(&mut self) {
        // SAFETY: the guard only exists while this thread holds the lock.
        unsafe {
            libc::pthread_mutex_unlock(self.mutex.raw());
        }
    }
}

/// Lock held after owner death. Dropping it without
/// [`mark_consistent`](Self::mark_consistent) leaves the mutex permanently
/// unrecoverable for every process.
#[must_use]
pub struct Inconsistent<'a> {
    guard: MutexGuard<'a>,
}

impl<'a> Inconsistent<'a> {
    pub fn mark_consistent(self) -> Result<MutexGuard<'a>, SyncError> {
        // SAFETY: this thread holds the mutex in the owner-died state.
        check("pthread_mutex_consistent", unsafe {
            libc::pthread_mutex_consistent(self.guard.mutex.raw())
        })?;
        Ok(self.guard)
    }
}

/// Process-shared condition variable.
#[repr(C)]
pub struct SharedCondvar {
    raw: UnsafeCell<libc::pthread_cond_t>,
}

// SAFETY: see SharedMutex.
unsafe impl Send for SharedCondvar {}
unsafe impl Sync for SharedCondvar {}

impl SharedCondvar {
    /// # Safety
    ///
    /// Same contract as [`SharedMutex::init_in_place`].
    pub unsafe fn init_in_place(this: *mut Self) -> Result<(), SyncError> {
        let mut attr = MaybeUninit::<libc::pthread_condattr_t>::uninit();
        // SAFETY: attr is valid writable storage for the attribute object.
        check("pthread_condattr_init", unsafe {
            libc::pthread_condattr_init(attr.as_mut_ptr())
        })?;

        // SAFETY: attr was initialised above; `this` is valid per contract.
        let result = unsafe {
            check(
                "pthread_condattr_setpshared",
                libc::pthread_condattr_setpshared(attr.as_mut_ptr(), libc::PTHREAD_PROCESS_SHARED),
            )
            .and_then(|()| {
                check(
                    "pthread_cond_init",
                    libc::pthread_cond_init(UnsafeCell::raw_get(&raw const (*this).raw), attr.as_ptr()),
                )
            })
        };

        // SAFETY: attr is initialised and no longer needed.
        unsafe { libc::pthread_condattr_destroy(attr.as_mut_ptr()) };
        result
    }

    /// Release the guard's mutex, sleep, and reacquire it.
    ///
    /// Wakeups may be spurious; callers re-check their predicate in a loop.
    pub fn wait<'a>(&self, guard: MutexGuard<'a>) -> Result<Locked<'a>, SyncError> {
        // SAFETY: both objects are initialised and the guard proves the
        // mutex is held by this thread.
        let code = unsafe { libc::pthread_cond_wait(self.raw.get(), guard.mutex.raw()) };
        match code {
            0 => Ok(Locked::Acquired(guard)),
            libc::EOWNERDEAD => Ok(Locked::OwnerDied(Inconsistent { guard })),
            code => Err(SyncError::from_code("pthread_cond_wait", code)),
        }
    }

    pub fn broadcast(&self) -> Result<(), SyncError> {
        // SAFETY: the condition variable was initialised in place.
        check("pthread_cond_broadcast", unsafe {
            libc::pthread_cond_broadcast(self.raw.get())
        })
    }

    /// # Safety
    ///
    /// No process may wait on the condition variable, now or later.
    pub unsafe fn destroy(&self) -> Result<(), SyncError> {
        // SAFETY: forwarded from the caller.
        check("pthread_cond_destroy", unsafe {
            libc::pthread_cond_destroy(self.raw.get())
        })
    }
}

/// Which waiter a barrier release picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierRole {
    /// Exactly one waiter per release gets this.
    Serial,
    Member,
}

/// Process-shared, reusable barrier.
#[repr(C)]
pub struct SharedBarrier {
    raw: UnsafeCell<libc::pthread_barrier_t>,
}

// SAFETY: see SharedMutex.
unsafe impl Send for SharedBarrier {}
unsafe impl Sync for SharedBarrier {}

impl SharedBarrier {
    /// # Safety
    ///
    /// Same contract as [`SharedMutex::init_in_place`].
    pub unsafe fn init_in_place(this: *mut Self, count: u32) -> Result<(), SyncError> {
        let mut attr = MaybeUninit::<libc::pthread_barrierattr_t>::uninit();
        // SAFETY: attr is valid writable storage for the attribute object.
        check("pthread_barrierattr_init", unsafe {
            libc::pthread_barrierattr_init(attr.as_mut_ptr())
        })?;

        // SAFETY: attr was initialised above; `this` is valid per contract.
        let result = unsafe {
            check(
                "pthread_barrierattr_setpshared",
                libc::pthread_barrierattr_setpshared(attr.as_mut_ptr(), libc::PTHREAD_PROCESS_SHARED),
            )
            .and_then(|()| {
                check(
                    "pthread_barrier_init",
                    libc::pthread_barrier_init(
                        UnsafeCell::raw_get(&raw const (*this).raw),
                        attr.as_ptr(),
                        count,
                    ),
                )
            })
        };

        // SAFETY: attr is initialised and no longer needed.
        unsafe { libc::pthread_barrierattr_destroy(attr.as_mut_ptr()) };
        result
    }

    /// Block until `count` waiters have arrived.
    pub fn wait(&self) -> Result<BarrierRole, SyncError> {
        // SAFETY: the barrier was initialised in place and has not moved.
        match unsafe { libc::pthread_barrier_wait(self.raw.get()) } {
            0 => Ok(BarrierRole::Member),
            BARRIER_SERIAL_THREAD => Ok(BarrierRole::Serial),
            code => Err(SyncError::from_code("pthread_barrier_wait", code)),
        }
    }

    /// # Safety
    ///
    /// No process may wait on the barrier, now or later.
    pub unsafe fn destroy(&self) -> Result<(), SyncError> {
        // SAFETY: forwarded from the caller.
        check("pthread_barrier_destroy", unsafe {
            libc::pthread_barrier_destroy(self.raw.get())
        })
    }
}
