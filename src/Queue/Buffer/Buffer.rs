// The shared ring of queue slots, viewed from either process

use std::ptr::NonNull;

use super::layout::QueueHeader;
use crate::error::{IpcError, Result};

/// Bytes in front of every message inside its segment: `[length: i64][kind: i32]`.
pub const FRAME_HEADER: usize = 12;

/// What a queue entry carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum DataKind {
    Data1d = 1,
    Data2d = 2,
    /// The producer waits for a reply to this entry.
    Request = 3,
}

impl DataKind {
    pub fn from_raw(raw: i32) -> Result<Self> {
        match raw {
            1 => Ok(DataKind::Data1d),
            2 => Ok(DataKind::Data2d),
            3 => Ok(DataKind::Request),
            _ => Err(IpcError::UnknownKind(raw)),
        }
    }

    pub fn raw(self) -> i32 {
        self as i32
    }
}

/// A view of the message queue living in shared memory.
///
/// This struct is NOT stored in shared memory. Both the producer and the
/// consumer hold one pointing at the same [`QueueHeader`].
///
/// ### Ownership of the cursors:
/// - **Producer**: takes a token from `free_slots`, writes the slot at `high`,
///   then publishes it by advancing `high` with release ordering.
/// - **Consumer**: reads the slot at `low` once `high` (acquire) shows it,
///   invalidates it, advances `low` and gives the token back.
pub struct MessageQueue {
    pub(crate) header: NonNull<QueueHeader>,
}

unsafe impl Send for MessageQueue {}
unsafe impl Sync for MessageQueue {}
