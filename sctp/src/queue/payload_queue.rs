#[cfg(test)]
mod payload_queue_test;

use std::collections::{HashMap, VecDeque};

use crate::chunk::chunk_payload_data::ChunkPayloadData;
use crate::chunk::chunk_selective_ack::GapAckBlock;
use crate::util::{sna32lt, sna32lte};

// PayloadQueue holds DATA chunks keyed and ordered by TSN. The sender
// uses it as the in-flight queue; the receiver uses it to build SACK gap
// blocks. Chunks arrive in near-TSN order, so the deque stays sorted
// with amortized O(1) work and the cumulative-ack prefix drop costs
// O(#removed).
#[derive(Default)]
pub struct PayloadQueue {
    pub(crate) chunk_map: HashMap<u32, ChunkPayloadData>,
    pub(crate) sorted: VecDeque<u32>,
    pub(crate) n_bytes: usize,
    pub(crate) dup_tsn: Vec<u32>,
}

impl PayloadQueue {
    pub fn new() -> Self {
        PayloadQueue::default()
    }

    fn insert_sorted(&mut self, tsn: u32) {
        // Fast path: append at the tail.
        match self.sorted.back() {
            Some(&last) if sna32lt(last, tsn) => self.sorted.push_back(tsn),
            None => self.sorted.push_back(tsn),
            _ => {
                // Out-of-order arrival, binary insert.
                let pos = self
                    .sorted
                    .binary_search_by(|&probe| {
                        if probe == tsn {
                            std::cmp::Ordering::Equal
                        } else if sna32lt(probe, tsn) {
                            std::cmp::Ordering::Less
                        } else {
                            std::cmp::Ordering::Greater
                        }
                    })
                    .unwrap_or_else(|e| e);
                self.sorted.insert(pos, tsn);
            }
        }
    }

    // push adds a chunk unless it is at or below the cumulative TSN or a
    // duplicate, which is recorded for the next SACK.
    pub fn push(&mut self, chunk: ChunkPayloadData, cumulative_tsn: u32) -> bool {
        if self.chunk_map.contains_key(&chunk.tsn) || sna32lte(chunk.tsn, cumulative_tsn) {
            self.dup_tsn.push(chunk.tsn);
            return false;
        }

        self.n_bytes += chunk.user_data.len();
        self.insert_sorted(chunk.tsn);
        self.chunk_map.insert(chunk.tsn, chunk);
        true
    }

    // push_no_check appends an in-order chunk from the sender path.
    pub fn push_no_check(&mut self, chunk: ChunkPayloadData) {
        self.n_bytes += chunk.user_data.len();
        self.insert_sorted(chunk.tsn);
        self.chunk_map.insert(chunk.tsn, chunk);
    }

    // pop removes and returns the chunk with the given TSN only if it is
    // the queue head, keeping removal an O(1) prefix operation.
    pub fn pop(&mut self, tsn: u32) -> Option<ChunkPayloadData> {
        if self.sorted.front() == Some(&tsn) {
            self.sorted.pop_front();
            if let Some(chunk) = self.chunk_map.remove(&tsn) {
                self.n_bytes -= chunk.user_data.len();
                return Some(chunk);
            }
        }
        None
    }

    pub fn get(&self, tsn: u32) -> Option<&ChunkPayloadData> {
        self.chunk_map.get(&tsn)
    }

    pub fn get_mut(&mut self, tsn: u32) -> Option<&mut ChunkPayloadData> {
        self.chunk_map.get_mut(&tsn)
    }

    pub fn has(&self, tsn: u32) -> bool {
        self.chunk_map.contains_key(&tsn)
    }

    pub fn len(&self) -> usize {
        self.chunk_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunk_map.is_empty()
    }

    pub fn get_num_bytes(&self) -> usize {
        self.n_bytes
    }

    pub fn head_tsn(&self) -> Option<u32> {
        self.sorted.front().copied()
    }

    // pop_duplicates drains the duplicate TSNs recorded since the last
    // SACK.
    pub fn pop_duplicates(&mut self) -> Vec<u32> {
        std::mem::take(&mut self.dup_tsn)
    }

    // get_gap_ack_blocks describes everything above the cumulative TSN as
    // SACK gap blocks with offsets relative to it.
    pub fn get_gap_ack_blocks(&self, cumulative_tsn: u32) -> Vec<GapAckBlock> {
        if self.chunk_map.is_empty() {
            return vec![];
        }

        let mut blocks = vec![];
        let mut b = GapAckBlock::default();
        for (i, &tsn) in self.sorted.iter().enumerate() {
            let diff = tsn.wrapping_sub(cumulative_tsn) as u16;
            if i == 0 {
                b.start = diff;
                b.end = diff;
            } else if b.end.wrapping_add(1) == diff {
                b.end = diff;
            } else {
                blocks.push(b);
                b.start = diff;
                b.end = diff;
            }
        }
        blocks.push(b);
        blocks
    }

    // mark_as_acked marks the chunk acked by a gap-ack and returns the
    // number of bytes it held; the data is dropped immediately.
    pub fn mark_as_acked(&mut self, tsn: u32) -> usize {
        if let Some(chunk) = self.chunk_map.get_mut(&tsn) {
            chunk.acked = true;
            chunk.retransmit = false;
            let n = chunk.user_data.len();
            self.n_bytes -= n;
            chunk.user_data = bytes::Bytes::new();
            n
        } else {
            0
        }
    }

    // mark_all_to_retransmit flags every remaining chunk for
    // retransmission after a T3-RTX expiry.
    pub fn mark_all_to_retransmit(&mut self) {
        for chunk in self.chunk_map.values_mut() {
            if chunk.acked || chunk.abandoned {
                continue;
            }
            chunk.retransmit = true;
        }
    }
}
