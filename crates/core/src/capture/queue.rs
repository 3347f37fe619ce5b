use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::RawMessage;

#[derive(Debug)]
struct Inner {
    messages: VecDeque<RawMessage>,
    capacity: usize,
    dropped: u64,
}

/// Bounded FIFO shared between the driver callback and the main loop.
///
/// A push into a full queue evicts the oldest unread message. The lock is
/// held for a single push or a single drain, never while decoding.
#[derive(Debug, Clone)]
pub struct MessageQueue {
    inner: Arc<Mutex<Inner>>,
}

impl MessageQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                messages: VecDeque::with_capacity(capacity),
                capacity,
                dropped: 0,
            })),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    /// Producer side. Never allocates once the queue reached capacity.
    pub fn push(&self, message: RawMessage) {
        let mut inner = self.inner.lock();
        if inner.messages.len() == inner.capacity {
            inner.messages.pop_front();
            inner.dropped += 1;
        }
        inner.messages.push_back(message);
    }

    /// Convenience for driver callbacks handing over a byte slice.
    pub fn push_bytes(&self, bytes: &[u8], timestamp: f64) {
        if let Some(message) = RawMessage::from_bytes(bytes, timestamp) {
            self.push(message);
        }
    }

    /// Swaps everything queued so far into `out`, which is cleared first.
    pub fn drain_into(&self, out: &mut VecDeque<RawMessage>) {
        out.clear();
        let mut inner = self.inner.lock();
        std::mem::swap(&mut inner.messages, out);
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.messages.clear();
        inner.dropped = 0;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Messages evicted by overflow since the last [`clear`](Self::clear).
    pub fn dropped(&self) -> u64 {
        self.inner.lock().dropped
    }
}
