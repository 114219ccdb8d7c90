pub mod SharedMemory;
pub mod local;
pub mod semaphore;

pub use local::LocalSegments;
pub use semaphore::Semaphore;
pub use SharedMemory::{
    Mapping, SegmentBackend, SegmentId, SweepReport, SysVSegments, SEGMENT_MAGIC, TAG_AREA,
};
