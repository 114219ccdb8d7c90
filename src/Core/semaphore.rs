use std::io;
use std::ptr::NonNull;

use crate::error::{IpcError, Result};

/// Counting semaphore shared between processes.
///
/// The `sem_t` lives inside shared memory (the queue header), this struct is
/// only a view on it. Waits and posts transparently restart when a signal
/// interrupts them.
pub struct Semaphore {
    sem: NonNull<libc::sem_t>,
}

unsafe impl Send for Semaphore {}
unsafe impl Sync for Semaphore {}

impl Semaphore {
    /// Initialise a process-shared semaphore at `place` with `initial` tokens.
    ///
    /// # Safety
    /// `place` must point to writable memory for a `sem_t` that outlives every
    /// view on it and is not initialised yet.
    pub unsafe fn create(place: *mut libc::sem_t, initial: u32) -> Result<Self> {
        let sem = NonNull::new(place).ok_or_else(|| IpcError::Os {
            op: "sem_init",
            source: io::Error::from(io::ErrorKind::InvalidInput),
        })?;
        if libc::sem_init(sem.as_ptr(), 1, initial) != 0 {
            return Err(IpcError::os("sem_init"));
        }
        Ok(Self { sem })
    }

    /// View on a semaphore another party created.
    ///
    /// # Safety
    /// `place` must point to an initialised semaphore that outlives the view.
    pub unsafe fn from_raw(place: *mut libc::sem_t) -> Self {
        Self {
            sem: NonNull::new_unchecked(place),
        }
    }

    /// # Safety
    /// Nobody may wait on or post to the semaphore afterwards.
    pub unsafe fn destroy(self) -> Result<()> {
        if libc::sem_destroy(self.sem.as_ptr()) != 0 {
            return Err(IpcError::os("sem_destroy"));
        }
        Ok(())
    }

    /// Take one token, blocking while there is none.
    pub fn wait(&self) -> Result<()> {
        loop {
            if unsafe { libc::sem_wait(self.sem.as_ptr()) } == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::EINTR) {
                return Err(IpcError::Os { op: "sem_wait", source: err });
            }
        }
    }

    /// Take one token if available. Returns `false` instead of blocking.
    pub fn try_wait(&self) -> Result<bool> {
        loop {
            if unsafe { libc::sem_trywait(self.sem.as_ptr()) } == 0 {
                return Ok(true);
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EINTR) => continue,
                Some(libc::EAGAIN) => return Ok(false),
                _ => return Err(IpcError::Os { op: "sem_trywait", source: err }),
            }
        }
    }

    pub fn post(&self) -> Result<()> {
        loop {
            if unsafe { libc::sem_post(self.sem.as_ptr()) } == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::EINTR) {
                return Err(IpcError::Os { op: "sem_post", source: err });
            }
        }
    }

    /// Current number of tokens.
    pub fn value(&self) -> Result<i32> {
        let mut value = 0;
        if unsafe { libc::sem_getvalue(self.sem.as_ptr(), &mut value) } != 0 {
            return Err(IpcError::os("sem_getvalue"));
        }
        Ok(value)
    }
}
