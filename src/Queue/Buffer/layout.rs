use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicI32, AtomicU32};

/// Number of slots in the ring. One slot always stays unused so that a full
/// ring can be told apart from an empty one.
pub const QUEUE_SIZE: usize = 128;

/// "fsc2_mq\0" - identifies an initialised queue header.
pub const QUEUE_MAGIC: u64 = u64::from_ne_bytes(*b"fsc2_mq\0");

/// One entry of the ring: the segment holding the message and what it is.
///
/// `shm_id` is -1 while the slot is free or after it has been consumed.
#[repr(C)]
pub struct QueueSlot {
    pub shm_id: AtomicI32,
    pub kind: AtomicI32,
}

/// The queue as it sits in shared memory, seen identically by both processes.
///
/// `high` is only ever written by the producer and `low` only by the
/// consumer; each sits on its own cache line.
#[repr(C, align(128))]
pub struct QueueHeader {
    pub magic: u64,

    pub capacity: u32,

    pub reserved: u32,

    /// Consumer cursor, the oldest unconsumed slot.
    pub low: CachePadded<AtomicU32>,

    /// Producer cursor, the next slot to be written.
    pub high: CachePadded<AtomicU32>,

    /// Counts the slots the producer may still fill.
    pub free_slots: UnsafeCell<libc::sem_t>,

    pub slots: [QueueSlot; QUEUE_SIZE],
}
