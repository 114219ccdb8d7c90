use std::mem::size_of;
use std::sync::Arc;

use crate::error::{IpcError, Result};
use crate::Core::{Mapping, SegmentBackend, SegmentId};
use crate::Protocol::{Batch, Command1d, Command2d, Record1d, Record2d};
use crate::Queue::Buffer::layout::QueueHeader;
use crate::Queue::Buffer::Buffer_impl::write_frame;
use crate::Queue::Buffer::{DataKind, MessageQueue, FRAME_HEADER};

/// The experiment side of the queue.
///
/// Every message gets its own segment. The producer writes it once, detaches
/// and hands the segment id over through the ring; from then on the segment
/// belongs to the consumer.
pub struct Producer {
    pub(crate) backend: Arc<dyn SegmentBackend>,
    pub(crate) queue: MessageQueue,
    header: Option<Mapping>,
    pub(crate) queue_id: SegmentId,
}

impl Producer {
    pub(crate) fn attach(backend: Arc<dyn SegmentBackend>, queue_id: SegmentId) -> Result<Self> {
        let header = backend.attach_mut(queue_id)?;
        if header.len() < size_of::<QueueHeader>() {
            backend.release(header, None)?;
            return Err(IpcError::BadQueueMagic(queue_id));
        }

        // SAFETY: the mapping is large enough and stays attached until drop
        let queue = match unsafe { MessageQueue::open(header.as_ptr() as *mut QueueHeader) } {
            Some(queue) => queue,
            None => {
                backend.release(header, None)?;
                return Err(IpcError::BadQueueMagic(queue_id));
            }
        };

        Ok(Self {
            backend,
            queue,
            header: Some(header),
            queue_id,
        })
    }

    /// Copy `payload` into a fresh segment and append it to the queue.
    ///
    /// Blocks while the ring is full. Returns the slot index the entry went to.
    pub fn enqueue(&self, kind: DataKind, payload: &[u8]) -> Result<usize> {
        let (id, mapping) = self.backend.acquire(FRAME_HEADER + payload.len())?;
        write_frame(&mapping, kind, payload);

        let published = self
            .backend
            .release(mapping, None)
            .and_then(|()| self.queue.publish(id, kind));

        match published {
            Ok(slot) => {
                tracing::trace!(segment = %id, ?kind, slot, bytes = payload.len(), "enqueued");
                Ok(slot)
            }
            Err(err) => {
                // nobody else knows the segment yet
                if let Err(cleanup) = self.backend.destroy(id) {
                    tracing::error!(segment = %id, err = %cleanup, "failed to remove unsent segment");
                }
                Err(err)
            }
        }
    }

    pub fn send_1d(&self, records: Vec<Record1d>) -> Result<usize> {
        self.send(&Batch::Data1d(records))
    }

    pub fn send_2d(&self, records: Vec<Record2d>) -> Result<usize> {
        self.send(&Batch::Data2d(records))
    }

    pub fn send_command_1d(&self, command: Command1d) -> Result<usize> {
        self.send(&Batch::Command1d(command))
    }

    pub fn send_command_2d(&self, command: Command2d) -> Result<usize> {
        self.send(&Batch::Command2d(command))
    }

    pub fn send(&self, batch: &Batch) -> Result<usize> {
        self.enqueue(batch.kind(), &batch.encode())
    }

    /// Queue a request the consumer has to answer before the experiment goes on.
    pub fn request(&self, payload: &[u8]) -> Result<usize> {
        self.enqueue(DataKind::Request, payload)
    }

    pub fn queue_id(&self) -> SegmentId {
        self.queue_id
    }

    pub fn queue(&self) -> &MessageQueue {
        &self.queue
    }
}

impl Drop for Producer {
    fn drop(&mut self) {
        if let Some(header) = self.header.take() {
            if let Err(err) = self.backend.release(header, None) {
                tracing::error!(queue = %self.queue_id, %err, "failed to detach queue header");
            }
        }
    }
}
