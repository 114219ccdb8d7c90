use std::ptr::{self, NonNull};
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};

use super::layout::{QueueHeader, QueueSlot, QUEUE_MAGIC, QUEUE_SIZE};
use super::Buffer::{DataKind, MessageQueue, FRAME_HEADER};
use crate::error::{IpcError, Result};
use crate::Core::{Mapping, SegmentId, Semaphore};
use crate::Protocol::{WireReader, WireWriter};

impl MessageQueue {
    /// Set up a fresh queue at `place`. Only the creating side calls this.
    ///
    /// # Safety
    /// `place` must be valid, writable, suitably aligned memory for a
    /// `QueueHeader` that outlives every view on it.
    pub unsafe fn init(place: *mut QueueHeader) -> Result<Self> {
        let header = NonNull::new(place).ok_or(IpcError::BadQueueMagic(SegmentId::EMPTY))?;
        debug_assert_eq!(place.align_offset(std::mem::align_of::<QueueHeader>()), 0);
        let h = header.as_ptr();

        ptr::addr_of_mut!((*h).capacity).write(QUEUE_SIZE as u32);
        ptr::addr_of_mut!((*h).reserved).write(0);
        (*h).low.store(0, Relaxed);
        (*h).high.store(0, Relaxed);
        for slot in (*h).slots.iter() {
            slot.shm_id.store(SegmentId::EMPTY.raw(), Relaxed);
            slot.kind.store(0, Relaxed);
        }
        Semaphore::create((*h).free_slots.get(), QUEUE_SIZE as u32 - 1)?;
        ptr::addr_of_mut!((*h).magic).write(QUEUE_MAGIC);

        Ok(Self { header })
    }

    /// View on a queue somebody else initialised.
    ///
    /// # Safety
    /// `place` must point to memory holding a `QueueHeader` for as long as the
    /// view lives.
    pub unsafe fn open(place: *mut QueueHeader) -> Option<Self> {
        let header = NonNull::new(place)?;
        if (*header.as_ptr()).magic != QUEUE_MAGIC {
            return None;
        }
        Some(Self { header })
    }

    #[inline]
    fn header(&self) -> &QueueHeader {
        // SAFETY: guaranteed valid by init/open
        unsafe { self.header.as_ref() }
    }

    fn free_slots(&self) -> Semaphore {
        // SAFETY: the semaphore was initialised together with the header
        unsafe { Semaphore::from_raw(self.header().free_slots.get()) }
    }

    fn slot(&self, index: usize) -> &QueueSlot {
        &self.header().slots[index]
    }

    pub fn capacity(&self) -> usize {
        self.header().capacity as usize
    }

    pub fn low(&self) -> usize {
        self.header().low.load(Acquire) as usize
    }

    pub fn high(&self) -> usize {
        self.header().high.load(Acquire) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.low() == self.high()
    }

    /// Entries written but not consumed yet.
    pub fn in_flight(&self) -> usize {
        (self.high() + self.capacity() - self.low()) % self.capacity()
    }

    /// Tokens the producer may still take without blocking.
    pub fn available_slots(&self) -> Result<i32> {
        self.free_slots().value()
    }

    /// Producer side: append an entry, blocking while the ring is full.
    /// Returns the slot index used.
    pub fn publish(&self, id: SegmentId, kind: DataKind) -> Result<usize> {
        self.free_slots().wait()?;

        let h = self.header();
        let high = h.high.load(Relaxed) as usize;
        let slot = self.slot(high);
        slot.kind.store(kind.raw(), Relaxed);
        slot.shm_id.store(id.raw(), Relaxed);
        h.high.store(((high + 1) % self.capacity()) as u32, Release);
        Ok(high)
    }

    /// Consumer side: the oldest entry as (segment, raw kind), if any.
    pub fn front(&self) -> Option<(SegmentId, i32)> {
        let h = self.header();
        let low = h.low.load(Relaxed) as usize;
        if low == h.high.load(Acquire) as usize {
            return None;
        }
        let slot = self.slot(low);
        Some((SegmentId(slot.shm_id.load(Relaxed)), slot.kind.load(Relaxed)))
    }

    /// Consumer side: mark the oldest entry consumed and free its slot.
    pub fn consume_front(&self) -> Result<()> {
        let h = self.header();
        let low = h.low.load(Relaxed) as usize;
        if low == h.high.load(Acquire) as usize {
            return Ok(());
        }
        self.slot(low).shm_id.store(SegmentId::EMPTY.raw(), Relaxed);
        h.low.store(((low + 1) % self.capacity()) as u32, Release);
        self.free_slots().post()
    }

    /// # Safety
    /// Neither side may use the queue afterwards.
    pub unsafe fn destroy_semaphore(&self) -> Result<()> {
        self.free_slots().destroy()
    }
}

/// Write a message frame into a freshly acquired segment.
pub(crate) fn write_frame(mapping: &Mapping, kind: DataKind, payload: &[u8]) {
    let mut w = WireWriter::with_capacity(FRAME_HEADER);
    w.put_i64(payload.len() as i64).put_i32(kind.raw());
    let head = w.into_inner();

    // SAFETY: the segment was acquired writable with FRAME_HEADER + payload bytes
    let bytes = unsafe { mapping.as_mut_slice() };
    bytes[..FRAME_HEADER].copy_from_slice(&head);
    bytes[FRAME_HEADER..FRAME_HEADER + payload.len()].copy_from_slice(payload);
}

/// Check the frame of an attached segment against its slot and return the payload.
pub(crate) fn read_frame<'a>(id: SegmentId, kind: DataKind, bytes: &'a [u8]) -> Result<&'a [u8]> {
    let mut r = WireReader::new(bytes);
    let short = |_| IpcError::FrameOverrun {
        id,
        claimed: FRAME_HEADER as i64,
        available: bytes.len(),
    };
    let length = r.read_i64().map_err(short)?;
    let frame_kind = r.read_i32().map_err(short)?;

    if frame_kind != kind.raw() {
        return Err(IpcError::KindMismatch {
            slot: kind.raw(),
            frame: frame_kind,
        });
    }

    let available = r.remaining();
    match usize::try_from(length) {
        Ok(len) if len <= available => r.read_bytes(len),
        _ => Err(IpcError::FrameOverrun {
            id,
            claimed: length,
            available,
        }),
    }
}
