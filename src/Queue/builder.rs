use std::sync::Arc;
use std::time::Duration;

use super::consumer::DEFAULT_DRAIN_BUDGET;
use super::{Consumer, Producer};
use crate::error::{IpcError, Result};
use crate::Core::{SegmentBackend, SegmentId, SysVSegments};

pub struct QueueBuilder {
    backend: Option<Arc<dyn SegmentBackend>>,
    drain_budget: Duration,
}

impl Default for QueueBuilder {
    fn default() -> Self {
        Self {
            backend: None,                      // System V segments
            drain_budget: DEFAULT_DRAIN_BUDGET, // 200ms
        }
    }
}

impl QueueBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, backend: Arc<dyn SegmentBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_drain_budget(mut self, budget: Duration) -> Self {
        self.drain_budget = budget;
        self
    }

    fn backend(&mut self) -> Arc<dyn SegmentBackend> {
        self.backend
            .take()
            .unwrap_or_else(|| Arc::new(SysVSegments::new()))
    }

    /// Create the queue. The consumer owns it and removes it on drop.
    pub fn build_consumer(mut self) -> Result<Consumer> {
        if self.drain_budget.is_zero() {
            return Err(IpcError::Config("drain budget must be positive".into()));
        }
        let backend = self.backend();
        Consumer::create(backend, self.drain_budget)
    }

    /// Attach to the queue a consumer created under `queue_id`.
    pub fn build_producer(mut self, queue_id: SegmentId) -> Result<Producer> {
        if queue_id.is_empty() {
            return Err(IpcError::Config(format!("invalid queue id {queue_id}")));
        }
        let backend = self.backend();
        Producer::attach(backend, queue_id)
    }
}
