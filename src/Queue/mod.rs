mod builder;
mod consumer;
mod debug;
mod producer;

pub use builder::QueueBuilder;
pub use consumer::{Consumer, DrainReport, StopReason, DEFAULT_DRAIN_BUDGET};
pub use producer::Producer;

pub mod Buffer {
    pub mod Buffer;
    pub mod Buffer_impl;
    pub mod layout;
    pub use layout::{QueueHeader, QueueSlot, QUEUE_SIZE};
    pub use Buffer::{DataKind, MessageQueue, FRAME_HEADER}; // re-export for stable path
}
