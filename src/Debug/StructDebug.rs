use std::fmt;

use crate::Queue::Buffer::MessageQueue;
use crate::Queue::{Consumer, Producer};

/// Debug function for MessageQueue
///
/// Shows the header location and the cursors. Slot contents are left out,
/// they belong to whichever side currently owns them.
pub fn debug_message_queue(queue: &MessageQueue, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MessageQueue")
        .field("header", &format_args!("{:p}", queue.header.as_ptr()))
        .field("capacity", &queue.capacity())
        .field("low", &queue.low())
        .field("high", &queue.high())
        .field("in_flight", &queue.in_flight())
        .finish()
}

/// Debug function for Producer
pub fn debug_producer(producer: &Producer, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Producer")
        .field("queue_id", &producer.queue_id)
        .field("backend", &producer.backend)
        .field("queue", &producer.queue)
        .finish()
}

/// Debug function for Consumer
///
/// The drain budget is shown since it decides when a cycle gives up.
pub fn debug_consumer(consumer: &Consumer, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Consumer")
        .field("queue_id", &consumer.queue_id)
        .field("backend", &consumer.backend)
        .field("queue", &consumer.queue)
        .field("drain_budget", &consumer.budget)
        .finish()
}
