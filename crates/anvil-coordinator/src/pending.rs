//! The queue of action requests waiting for a capable worker (§4.4).

use crate::message::ActionRequest;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// FIFO queue of dispatch requests not yet assigned to a worker, with
/// head-of-queue reinsertion for requests that must be retried ahead of
/// everything else (a worker died mid-assignment, or a steal lost its
/// race).
#[derive(Default)]
pub struct PendingQueue {
    queue: Mutex<VecDeque<ActionRequest>>,
}

impl PendingQueue {
    /// An empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a fresh request at the back.
    pub fn push_back(&self, request: ActionRequest) {
        self.queue.lock().push_back(request);
    }

    /// Reinsert a previously-dequeued request at the front, so it is the
    /// next one offered.
    pub fn push_front(&self, request: ActionRequest) {
        self.queue.lock().push_front(request);
    }

    /// Pop the next request, if any.
    pub fn pop_front(&self) -> Option<ActionRequest> {
        self.queue.lock().pop_front()
    }

    /// Number of requests currently waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether the queue holds no requests.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}
