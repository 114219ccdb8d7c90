use std::io;

use thiserror::Error;

use crate::Core::SegmentId;

/// Errors raised by the queue, the record decoder and the point stores.
///
/// Every variant is fatal for the drain cycle it occurs in. Transient
/// shared-memory exhaustion never shows up here, it is retried inside
/// the segment backend.
#[derive(Debug, Error)]
pub enum IpcError {
    #[error("{op} failed: {source}")]
    Os {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("cannot attach to segment {id}: {source}")]
    Attach {
        id: SegmentId,
        #[source]
        source: io::Error,
    },

    #[error("segment {0} is not known to this backend")]
    UnknownSegment(SegmentId),

    #[error("segment {0} does not hold an initialised message queue")]
    BadQueueMagic(SegmentId),

    #[error("frame in segment {id} claims {claimed} bytes but only {available} are mapped")]
    FrameOverrun {
        id: SegmentId,
        claimed: i64,
        available: usize,
    },

    #[error("queue slot announces kind {slot} but its frame says {frame}")]
    KindMismatch { slot: i32, frame: i32 },

    #[error("unknown queue entry kind {0}")]
    UnknownKind(i32),

    #[error("record truncated: need {needed} bytes at offset {offset}, {available} left")]
    Truncated {
        needed: usize,
        offset: usize,
        available: usize,
    },

    #[error("unknown value type tag {0}")]
    UnknownType(i32),

    #[error("matrix payload in a 1D record")]
    MatrixIn1d,

    #[error("unknown {dim} command opcode {opcode}")]
    UnknownOpcode { dim: &'static str, opcode: i32 },

    #[error("negative {what} ({value}) in record")]
    NegativeField { what: &'static str, value: i64 },

    #[error("curve {curve} out of range, display has {count} curves")]
    CurveOutOfRange { curve: i64, count: usize },

    #[error("data for a {0} display arrived but none is configured")]
    NoDisplay(&'static str),

    #[error("cannot allocate room for {0} points")]
    Allocation(usize),

    #[error("display session is unusable after an earlier fatal error")]
    SessionFailed,

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, IpcError>;

impl IpcError {
    pub(crate) fn os(op: &'static str) -> Self {
        IpcError::Os {
            op,
            source: io::Error::last_os_error(),
        }
    }
}
