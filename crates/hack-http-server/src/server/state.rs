//! Process-wide queue of canned responses and log of received requests.

use crate::types::{QueuedResponse, RecordedRequest};
use parking_lot::Mutex;
use std::collections::VecDeque;

#[derive(Debug, Default)]
struct Queues {
    responses: VecDeque<QueuedResponse>,
    requests: Vec<RecordedRequest>,
}

/// Shared mutable state of the server.
///
/// Both collections live behind one lock so that popping a response and
/// appending the matching request happen as a single step.
#[derive(Debug, Default)]
pub struct ServerState {
    queues: Mutex<Queues>,
}

impl ServerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the pending queue wholesale; unconsumed entries are dropped
    pub fn replace_responses(&self, responses: Vec<QueuedResponse>) {
        self.queues.lock().responses = responses.into();
    }

    /// Record a request and take the head of the queue.
    ///
    /// Returns `None` without recording anything when the queue is empty.
    pub fn dispatch(
        &self,
        record: impl FnOnce() -> RecordedRequest,
    ) -> Option<QueuedResponse> {
        let mut queues = self.queues.lock();
        let response = queues.responses.pop_front()?;
        queues.requests.push(record());
        Some(response)
    }

    /// Copy of the request log in arrival order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.queues.lock().requests.clone()
    }

    pub fn flush_requests(&self) {
        self.queues.lock().requests.clear();
    }

    pub fn pending_responses(&self) -> usize {
        self.queues.lock().responses.len()
    }

    pub fn request_count(&self) -> usize {
        self.queues.lock().requests.len()
    }
}
