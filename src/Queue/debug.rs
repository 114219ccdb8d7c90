use std::fmt;

use super::Buffer::MessageQueue;
use super::{Consumer, Producer};
use crate::Debug::StructDebug;

impl fmt::Debug for MessageQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        StructDebug::debug_message_queue(self, f)
    }
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        StructDebug::debug_producer(self, f)
    }
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        StructDebug::debug_consumer(self, f)
    }
}
