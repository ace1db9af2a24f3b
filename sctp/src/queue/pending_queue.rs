use std::collections::VecDeque;

use crate::chunk::chunk_payload_data::ChunkPayloadData;

// PendingQueue buffers application data accepted from streams until the
// congestion and receiver windows allow it onto the wire. Fragments of a
// message are pushed back to back and therefore popped contiguously.
#[derive(Default)]
pub struct PendingQueue {
    queue: VecDeque<ChunkPayloadData>,
    n_bytes: usize,
}

impl PendingQueue {
    pub fn new() -> Self {
        PendingQueue::default()
    }

    pub fn push(&mut self, chunk: ChunkPayloadData) {
        self.n_bytes += chunk.user_data.len();
        self.queue.push_back(chunk);
    }

    pub fn peek(&self) -> Option<&ChunkPayloadData> {
        self.queue.front()
    }

    pub fn pop(&mut self) -> Option<ChunkPayloadData> {
        let chunk = self.queue.pop_front()?;
        self.n_bytes -= chunk.user_data.len();
        Some(chunk)
    }

    pub fn get_num_bytes(&self) -> usize {
        self.n_bytes
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
