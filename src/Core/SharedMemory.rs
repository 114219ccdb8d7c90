// Shared memory segments for the message queue and its payloads
// Uses System V shmget/shmat so both processes can find a segment by its id

use std::fmt::{self, Debug};
use std::io;
use std::ptr::{self, NonNull};
use std::thread;
use std::time::Duration;

use crate::error::{IpcError, Result};

/// Tag written at the start of every segment we create. Segments carrying it
/// can be recognised and removed after a crash.
pub const SEGMENT_MAGIC: [u8; 4] = *b"fsc2";

/// Bytes reserved in front of the usable area of a segment. Only the first
/// four hold the magic, the rest keeps the usable area cache-line aligned.
pub const TAG_AREA: usize = 128;

/// Pause between attempts when the system is temporarily out of segments.
pub const RETRY_DELAY: Duration = Duration::from_millis(10);

/// Handle of a shared memory segment (the System V shm id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct SegmentId(pub i32);

impl SegmentId {
    /// Marks a free queue slot or a handle that has been released.
    pub const EMPTY: SegmentId = SegmentId(-1);

    pub fn is_empty(self) -> bool {
        self.0 < 0
    }

    pub fn raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The usable part of an attached segment, i.e. everything after the tag area.
#[derive(Debug, Clone, Copy)]
pub struct Mapping {
    ptr: NonNull<u8>,
    len: usize,
}

unsafe impl Send for Mapping {}

impl Mapping {
    pub(crate) fn new(ptr: NonNull<u8>, len: usize) -> Self {
        Self { ptr, len }
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Start of the whole segment including the tag area.
    pub(crate) fn base(&self) -> *mut u8 {
        // SAFETY: every mapping handed out points TAG_AREA bytes into its segment
        unsafe { self.ptr.as_ptr().sub(TAG_AREA) }
    }

    /// # Safety
    /// The segment must still be attached for the whole lifetime `'a`.
    pub unsafe fn as_slice<'a>(&self) -> &'a [u8] {
        std::slice::from_raw_parts(self.ptr.as_ptr(), self.len)
    }

    /// # Safety
    /// The segment must be attached writable, still attached for `'a`, and
    /// nobody else may access it meanwhile.
    pub unsafe fn as_mut_slice<'a>(&self) -> &'a mut [u8] {
        std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len)
    }
}

/// Source of shared memory segments.
///
/// The producer acquires a segment per message, the consumer attaches to it
/// read-only and destroys it after use. The queue header itself lives in a
/// segment attached writable by both sides.
pub trait SegmentBackend: Send + Sync + Debug {
    /// Create a segment with `size` usable bytes, tag it and attach it writable.
    /// Transient exhaustion is retried, anything else is an error.
    fn acquire(&self, size: usize) -> Result<(SegmentId, Mapping)>;

    /// Attach read-only. On failure the segment is marked for destruction.
    fn attach(&self, id: SegmentId) -> Result<Mapping>;

    /// Attach writable. On failure the segment is marked for destruction.
    fn attach_mut(&self, id: SegmentId) -> Result<Mapping>;

    /// Detach from a segment. With a handle the segment is also marked for
    /// destruction and the handle is set to [`SegmentId::EMPTY`].
    fn release(&self, mapping: Mapping, id: Option<&mut SegmentId>) -> Result<()>;

    /// Mark a segment for destruction. It disappears once nobody is attached.
    fn destroy(&self, id: SegmentId) -> Result<()>;
}

/// Outcome of [`SysVSegments::sweep_stale`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: Vec<SegmentId>,
    pub busy: Vec<SegmentId>,
}

/// System V shared memory, the deployment backend for two processes.
#[derive(Default)]
pub struct SysVSegments {
    _private: (),
}

impl Debug for SysVSegments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SysVSegments").finish()
    }
}

impl SysVSegments {
    pub fn new() -> Self {
        Self::default()
    }

    fn stat(id: SegmentId) -> io::Result<libc::shmid_ds> {
        let mut ds: libc::shmid_ds = unsafe { std::mem::zeroed() };
        if unsafe { libc::shmctl(id.0, libc::IPC_STAT, &mut ds) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(ds)
    }

    fn map(&self, id: SegmentId, read_only: bool) -> Result<Mapping> {
        let attached = Self::stat(id).and_then(|ds| {
            let flags = if read_only { libc::SHM_RDONLY } else { 0 };
            let base = unsafe { libc::shmat(id.0, ptr::null(), flags) };
            if base as isize == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok((base as *mut u8, ds.shm_segsz as usize))
        });

        match attached {
            Ok((base, size)) if size >= TAG_AREA => {
                // SAFETY: shmat succeeded and the segment is at least TAG_AREA long
                let ptr = unsafe { NonNull::new_unchecked(base.add(TAG_AREA)) };
                Ok(Mapping::new(ptr, size - TAG_AREA))
            }
            Ok((base, size)) => {
                unsafe { libc::shmdt(base as *const libc::c_void) };
                let _ = self.destroy(id);
                Err(IpcError::Attach {
                    id,
                    source: io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("segment holds only {size} bytes"),
                    ),
                })
            }
            Err(source) => {
                let _ = self.destroy(id);
                Err(IpcError::Attach { id, source })
            }
        }
    }

    /// Remove segments left behind by a crashed run.
    ///
    /// Walks all segments owned by our effective uid, and destroys those that
    /// carry [`SEGMENT_MAGIC`] and have no process attached. Tagged segments
    /// that are still attached somewhere are only reported. Payloads queued
    /// but not yet consumed look stale too, so run this before a queue exists.
    #[cfg(target_os = "linux")]
    pub fn sweep_stale(&self) -> Result<SweepReport> {
        let table = std::fs::read_to_string("/proc/sysvipc/shm").map_err(|source| IpcError::Os {
            op: "read /proc/sysvipc/shm",
            source,
        })?;
        let uid = unsafe { libc::geteuid() };
        let mut report = SweepReport::default();

        for line in table.lines().skip(1) {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 8 {
                continue;
            }
            let (Ok(raw), Ok(owner)) = (cols[1].parse::<i32>(), cols[7].parse::<u32>()) else {
                continue;
            };
            if owner != uid {
                continue;
            }

            let id = SegmentId(raw);
            if !Self::is_tagged(id) {
                continue;
            }

            match Self::stat(id) {
                Ok(ds) if ds.shm_nattch == 0 => {
                    match self.destroy(id) {
                        Ok(()) | Err(IpcError::UnknownSegment(_)) => {}
                        Err(err) => return Err(err),
                    }
                    tracing::debug!(segment = %id, "removed stale segment");
                    report.removed.push(id);
                }
                Ok(ds) => {
                    let attached = ds.shm_nattch as u64;
                    tracing::warn!(segment = %id, attached, "stale segment still in use");
                    report.busy.push(id);
                }
                Err(_) => continue,
            }
        }

        Ok(report)
    }

    #[cfg(not(target_os = "linux"))]
    pub fn sweep_stale(&self) -> Result<SweepReport> {
        Err(IpcError::Os {
            op: "sweep_stale",
            source: io::Error::new(io::ErrorKind::Unsupported, "segment enumeration needs /proc"),
        })
    }

    #[cfg(target_os = "linux")]
    fn is_tagged(id: SegmentId) -> bool {
        let Ok(ds) = Self::stat(id) else {
            return false;
        };
        if (ds.shm_segsz as usize) < SEGMENT_MAGIC.len() {
            return false;
        }
        let base = unsafe { libc::shmat(id.0, ptr::null(), libc::SHM_RDONLY) };
        if base as isize == -1 {
            return false;
        }
        let mut tag = [0u8; 4];
        unsafe {
            ptr::copy_nonoverlapping(base as *const u8, tag.as_mut_ptr(), tag.len());
            libc::shmdt(base);
        }
        tag == SEGMENT_MAGIC
    }
}

impl SegmentBackend for SysVSegments {
    fn acquire(&self, size: usize) -> Result<(SegmentId, Mapping)> {
        let total = size + TAG_AREA;

        let raw = loop {
            let raw = unsafe {
                libc::shmget(libc::IPC_PRIVATE, total, libc::IPC_CREAT | libc::IPC_EXCL | 0o600)
            };
            if raw >= 0 {
                break raw;
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::ENOSPC) | Some(libc::ENOMEM) => {
                    tracing::debug!(size = total, "no shared memory available, retrying");
                    thread::sleep(RETRY_DELAY);
                }
                _ => return Err(IpcError::Os { op: "shmget", source: err }),
            }
        };

        let base = unsafe { libc::shmat(raw, ptr::null(), 0) };
        if base as isize == -1 {
            let err = io::Error::last_os_error();
            unsafe { libc::shmctl(raw, libc::IPC_RMID, ptr::null_mut()) };
            return Err(IpcError::Os { op: "shmat", source: err });
        }

        let base = base as *mut u8;
        unsafe { ptr::copy_nonoverlapping(SEGMENT_MAGIC.as_ptr(), base, SEGMENT_MAGIC.len()) };

        let id = SegmentId(raw);
        tracing::debug!(segment = %id, size, "acquired segment");
        // SAFETY: shmat succeeded, base is non-null and the segment spans TAG_AREA + size
        let ptr = unsafe { NonNull::new_unchecked(base.add(TAG_AREA)) };
        Ok((id, Mapping::new(ptr, size)))
    }

    fn attach(&self, id: SegmentId) -> Result<Mapping> {
        self.map(id, true)
    }

    fn attach_mut(&self, id: SegmentId) -> Result<Mapping> {
        self.map(id, false)
    }

    fn release(&self, mapping: Mapping, id: Option<&mut SegmentId>) -> Result<()> {
        let detached = if unsafe { libc::shmdt(mapping.base() as *const libc::c_void) } == 0 {
            Ok(())
        } else {
            Err(IpcError::os("shmdt"))
        };

        if let Some(id) = id {
            if !id.is_empty() {
                self.destroy(*id)?;
            }
            *id = SegmentId::EMPTY;
        }
        detached
    }

    fn destroy(&self, id: SegmentId) -> Result<()> {
        if unsafe { libc::shmctl(id.0, libc::IPC_RMID, ptr::null_mut()) } != 0 {
            let err = io::Error::last_os_error();
            return match err.raw_os_error() {
                Some(libc::EINVAL) | Some(libc::EIDRM) => Err(IpcError::UnknownSegment(id)),
                _ => Err(IpcError::Os { op: "shmctl(IPC_RMID)", source: err }),
            };
        }
        Ok(())
    }
}
