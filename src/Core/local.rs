use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::ptr::{self, NonNull};

use parking_lot::Mutex;

use super::SharedMemory::{Mapping, SegmentBackend, SegmentId, SEGMENT_MAGIC, TAG_AREA};
use crate::error::{IpcError, Result};

struct Entry {
    base: NonNull<u8>,
    layout: Layout,
    attached: usize,
    removed: bool,
}

// The table only hands the pointers out, it never dereferences them concurrently.
unsafe impl Send for Entry {}

impl Entry {
    fn mapping(&self) -> Mapping {
        // SAFETY: the allocation is TAG_AREA + usable bytes long
        let ptr = unsafe { NonNull::new_unchecked(self.base.as_ptr().add(TAG_AREA)) };
        Mapping::new(ptr, self.layout.size() - TAG_AREA)
    }

    fn free(self) {
        unsafe { dealloc(self.base.as_ptr(), self.layout) };
    }
}

#[derive(Default)]
struct Table {
    next_id: i32,
    entries: HashMap<i32, Entry>,
}

/// Heap-backed segments for running producer and consumer inside one process.
///
/// Mirrors the System V rules: a destroyed segment stays valid until the last
/// mapping is released, and attaching to a destroyed segment fails.
#[derive(Default)]
pub struct LocalSegments {
    table: Mutex<Table>,
}

impl LocalSegments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of segments that still hold memory.
    pub fn live_segments(&self) -> usize {
        self.table.lock().entries.len()
    }

    fn attach_entry(&self, id: SegmentId) -> Result<Mapping> {
        let mut table = self.table.lock();
        match table.entries.get_mut(&id.0) {
            Some(entry) if !entry.removed => {
                entry.attached += 1;
                Ok(entry.mapping())
            }
            _ => Err(IpcError::Attach {
                id,
                source: io::Error::from(io::ErrorKind::NotFound),
            }),
        }
    }
}

impl fmt::Debug for LocalSegments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSegments")
            .field("live", &self.live_segments())
            .finish()
    }
}

impl SegmentBackend for LocalSegments {
    fn acquire(&self, size: usize) -> Result<(SegmentId, Mapping)> {
        let layout = Layout::from_size_align(size + TAG_AREA, TAG_AREA)
            .map_err(|_| IpcError::Allocation(size))?;
        let base = NonNull::new(unsafe { alloc_zeroed(layout) }).ok_or(IpcError::Allocation(size))?;
        unsafe { ptr::copy_nonoverlapping(SEGMENT_MAGIC.as_ptr(), base.as_ptr(), SEGMENT_MAGIC.len()) };

        let entry = Entry {
            base,
            layout,
            attached: 1,
            removed: false,
        };
        let mapping = entry.mapping();

        let mut table = self.table.lock();
        let id = SegmentId(table.next_id);
        table.next_id += 1;
        table.entries.insert(id.0, entry);
        Ok((id, mapping))
    }

    fn attach(&self, id: SegmentId) -> Result<Mapping> {
        self.attach_entry(id)
    }

    fn attach_mut(&self, id: SegmentId) -> Result<Mapping> {
        self.attach_entry(id)
    }

    fn release(&self, mapping: Mapping, id: Option<&mut SegmentId>) -> Result<()> {
        let mut table = self.table.lock();
        let base = mapping.base();
        let key = table
            .entries
            .iter()
            .find(|(_, entry)| entry.base.as_ptr() == base)
            .map(|(key, _)| *key);

        let Some((key, entry)) = key.and_then(|key| table.entries.get_mut(&key).map(|e| (key, e)))
        else {
            return Err(IpcError::UnknownSegment(id.map_or(SegmentId::EMPTY, |id| *id)));
        };

        entry.attached = entry.attached.saturating_sub(1);
        if let Some(id) = id {
            entry.removed = true;
            *id = SegmentId::EMPTY;
        }
        if entry.removed && entry.attached == 0 {
            if let Some(entry) = table.entries.remove(&key) {
                entry.free();
            }
        }
        Ok(())
    }

    fn destroy(&self, id: SegmentId) -> Result<()> {
        let mut table = self.table.lock();
        let entry = table
            .entries
            .get_mut(&id.0)
            .ok_or(IpcError::UnknownSegment(id))?;
        entry.removed = true;
        if entry.attached == 0 {
            if let Some(entry) = table.entries.remove(&id.0) {
                entry.free();
            }
        }
        Ok(())
    }
}

impl Drop for LocalSegments {
    fn drop(&mut self) {
        for (_, entry) in self.table.get_mut().entries.drain() {
            entry.free();
        }
    }
}
