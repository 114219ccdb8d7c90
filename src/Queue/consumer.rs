use std::io;
use std::mem::size_of;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{IpcError, Result};
use crate::Core::{Mapping, SegmentBackend, SegmentId};
use crate::Queue::Buffer::layout::QueueHeader;
use crate::Queue::Buffer::Buffer_impl::read_frame;
use crate::Queue::Buffer::{DataKind, MessageQueue};

/// Wall-clock time a drain cycle may take while the producer is running.
pub const DEFAULT_DRAIN_BUDGET: Duration = Duration::from_millis(200);

/// Why a drain cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Empty,
    /// The oldest entry is a request; the producer waits for its reply.
    Request,
    Budget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub processed: usize,
    pub stop: StopReason,
}

/// The display side of the queue. Owns the queue header segment.
pub struct Consumer {
    pub(crate) backend: Arc<dyn SegmentBackend>,
    pub(crate) queue: MessageQueue,
    header: Option<Mapping>,
    pub(crate) queue_id: SegmentId,
    pub(crate) budget: Duration,
}

impl Consumer {
    pub(crate) fn create(backend: Arc<dyn SegmentBackend>, budget: Duration) -> Result<Self> {
        let (mut queue_id, header) = backend.acquire(size_of::<QueueHeader>())?;

        let initialised = if header.len() < size_of::<QueueHeader>() {
            Err(IpcError::Attach {
                id: queue_id,
                source: io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("segment holds only {} bytes for the queue header", header.len()),
                ),
            })
        } else {
            // SAFETY: freshly acquired, large enough and exclusively ours
            unsafe { MessageQueue::init(header.as_ptr() as *mut QueueHeader) }
        };

        let queue = match initialised {
            Ok(queue) => queue,
            Err(err) => {
                if let Err(cleanup) = backend.release(header, Some(&mut queue_id)) {
                    tracing::error!(err = %cleanup, "failed to remove half-initialised queue header");
                }
                return Err(err);
            }
        };
        tracing::debug!(queue = %queue_id, "message queue created");

        Ok(Self {
            backend,
            queue,
            header: Some(header),
            queue_id,
            budget,
        })
    }

    /// Id the producer needs to attach to the queue.
    pub fn queue_id(&self) -> SegmentId {
        self.queue_id
    }

    pub fn queue(&self) -> &MessageQueue {
        &self.queue
    }

    pub fn drain_budget(&self) -> Duration {
        self.budget
    }

    /// Kind of the oldest entry, if there is one.
    pub fn peek_kind(&self) -> Result<Option<DataKind>> {
        self.queue
            .front()
            .map(|(_, raw)| DataKind::from_raw(raw))
            .transpose()
    }

    /// Process entries from the front of the queue.
    ///
    /// Stops when the queue is empty, when the next entry is a request, or,
    /// unless `drain_all` is set, once the drain budget is used up. The budget
    /// is only checked between entries, an entry is always handled completely.
    ///
    /// Each entry is attached, its frame validated and the payload passed to
    /// `handler`. Afterwards the segment is detached and destroyed and the slot
    /// freed, also when the handler fails.
    pub fn dequeue_batch<F>(&self, drain_all: bool, mut handler: F) -> Result<DrainReport>
    where
        F: FnMut(DataKind, &[u8]) -> Result<()>,
    {
        let start = Instant::now();
        let mut processed = 0;

        let stop = loop {
            let Some((id, raw_kind)) = self.queue.front() else {
                break StopReason::Empty;
            };

            let kind = match DataKind::from_raw(raw_kind) {
                Ok(DataKind::Request) => break StopReason::Request,
                Ok(kind) => kind,
                Err(err) => {
                    EntryGuard::new(&*self.backend, &self.queue, id).finish()?;
                    return Err(err);
                }
            };

            self.handle_front(id, kind, &mut handler)?;
            processed += 1;

            if !drain_all && start.elapsed() > self.budget {
                break StopReason::Budget;
            }
        };

        tracing::trace!(processed, ?stop, elapsed = ?start.elapsed(), "drain cycle done");
        Ok(DrainReport { processed, stop })
    }

    /// Consume the request at the front of the queue and return its payload.
    ///
    /// Returns `None` when the queue is empty or the oldest entry is data.
    pub fn take_request(&self) -> Result<Option<Vec<u8>>> {
        let Some((id, raw_kind)) = self.queue.front() else {
            return Ok(None);
        };
        if DataKind::from_raw(raw_kind)? != DataKind::Request {
            return Ok(None);
        }

        let mut payload = Vec::new();
        self.handle_front(id, DataKind::Request, &mut |_, bytes: &[u8]| {
            payload.extend_from_slice(bytes);
            Ok(())
        })?;
        Ok(Some(payload))
    }

    fn handle_front<F>(&self, id: SegmentId, kind: DataKind, handler: &mut F) -> Result<()>
    where
        F: FnMut(DataKind, &[u8]) -> Result<()>,
    {
        let mut entry = EntryGuard::new(&*self.backend, &self.queue, id);
        let bytes = entry.attach()?;
        let payload = read_frame(id, kind, bytes)?;
        handler(kind, payload)?;
        entry.finish()
    }

    /// Destroy the segments of all entries still queued.
    fn discard_pending(&self) {
        while let Some((id, _)) = self.queue.front() {
            if let Err(err) = EntryGuard::new(&*self.backend, &self.queue, id).finish() {
                tracing::error!(segment = %id, %err, "failed to discard queued entry");
                break;
            }
        }
    }
}

/// Releases the segment of the front entry and frees its slot on every exit path.
struct EntryGuard<'a> {
    backend: &'a dyn SegmentBackend,
    queue: &'a MessageQueue,
    id: SegmentId,
    mapping: Option<Mapping>,
    done: bool,
}

impl<'a> EntryGuard<'a> {
    fn new(backend: &'a dyn SegmentBackend, queue: &'a MessageQueue, id: SegmentId) -> Self {
        Self {
            backend,
            queue,
            id,
            mapping: None,
            done: false,
        }
    }

    fn attach(&mut self) -> Result<&[u8]> {
        let mapping = self.backend.attach(self.id)?;
        self.mapping = Some(mapping);
        // SAFETY: stays attached until the guard cleans up
        Ok(unsafe { mapping.as_slice() })
    }

    fn finish(mut self) -> Result<()> {
        self.done = true;
        self.cleanup()
    }

    fn cleanup(&mut self) -> Result<()> {
        let released = match self.mapping.take() {
            Some(mapping) => self.backend.release(mapping, Some(&mut self.id)),
            None => match self.backend.destroy(self.id) {
                Ok(()) | Err(IpcError::UnknownSegment(_)) => Ok(()),
                Err(err) => Err(err),
            },
        };
        let consumed = self.queue.consume_front();
        released.and(consumed)
    }
}

impl Drop for EntryGuard<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if let Err(err) = self.cleanup() {
            tracing::error!(segment = %self.id, %err, "cleanup of queue entry failed");
        }
    }
}

impl Drop for Consumer {
    fn drop(&mut self) {
        self.discard_pending();

        // SAFETY: the producer must not touch the queue once the consumer is gone
        if let Err(err) = unsafe { self.queue.destroy_semaphore() } {
            tracing::error!(%err, "failed to destroy queue semaphore");
        }
        if let Some(header) = self.header.take() {
            if let Err(err) = self.backend.release(header, Some(&mut self.queue_id)) {
                tracing::error!(%err, "failed to remove queue header segment");
            }
        }
    }
}
