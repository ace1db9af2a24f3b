#[cfg(test)]
mod reassembly_queue_test;

use bytes::{Bytes, BytesMut};

use crate::chunk::chunk_payload_data::{ChunkPayloadData, PayloadProtocolIdentifier};
use crate::util::{sna16lt, sna32lt};

// A chunk_set is one user message: fragments sharing an SSN (ordered) or
// a begin fragment TSN (unordered), sorted by TSN.
#[derive(Debug, Default, Clone)]
pub(crate) struct ChunkSet {
    pub(crate) ssn: u16,
    pub(crate) ppi: PayloadProtocolIdentifier,
    pub(crate) chunks: Vec<ChunkPayloadData>,
}

impl ChunkSet {
    pub(crate) fn new(ssn: u16, ppi: PayloadProtocolIdentifier) -> Self {
        ChunkSet {
            ssn,
            ppi,
            chunks: vec![],
        }
    }

    pub(crate) fn push(&mut self, chunk: ChunkPayloadData) -> bool {
        // Fragments must share the PPID.
        if chunk.payload_type != self.ppi {
            return false;
        }

        // Sorted insert by TSN, rejecting duplicates.
        let mut pos = self.chunks.len();
        for (i, c) in self.chunks.iter().enumerate() {
            if c.tsn == chunk.tsn {
                return false;
            }
            if sna32lt(chunk.tsn, c.tsn) {
                pos = i;
                break;
            }
        }
        self.chunks.insert(pos, chunk);
        true
    }

    // is_complete checks B, E and TSN contiguity.
    pub(crate) fn is_complete(&self) -> bool {
        let n = self.chunks.len();
        if n == 0 {
            return false;
        }
        if !self.chunks[0].beginning_fragment || !self.chunks[n - 1].ending_fragment {
            return false;
        }
        for i in 1..n {
            if self.chunks[i].tsn != self.chunks[i - 1].tsn.wrapping_add(1) {
                return false;
            }
        }
        true
    }

    pub(crate) fn n_bytes(&self) -> usize {
        self.chunks.iter().map(|c| c.user_data.len()).sum()
    }

    pub(crate) fn assemble(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(self.n_bytes());
        for c in &self.chunks {
            out.extend_from_slice(&c.user_data);
        }
        out.freeze()
    }
}

// ReassemblyQueue rebuilds user messages for one stream: ordered
// messages wait for their SSN turn, unordered messages deliver as soon
// as their fragments complete (RFC 4960 §6.5, RFC 8831 §6.6).
#[derive(Default)]
pub struct ReassemblyQueue {
    pub(crate) si: u16,
    pub(crate) next_ssn: u16,
    pub(crate) ordered: Vec<ChunkSet>,
    pub(crate) unordered: Vec<ChunkSet>,
    pub(crate) unordered_chunks: Vec<ChunkPayloadData>,
    pub(crate) n_bytes: usize,
}

impl ReassemblyQueue {
    pub fn new(si: u16) -> Self {
        ReassemblyQueue {
            si,
            ..Default::default()
        }
    }

    pub fn push(&mut self, chunk: ChunkPayloadData) -> bool {
        if chunk.stream_identifier != self.si {
            return false;
        }

        if chunk.unordered {
            self.n_bytes += chunk.user_data.len();
            self.unordered_chunks.push(chunk);
            self.assemble_unordered_chunks();
            return true;
        }

        // Stale messages below the stream cursor are dropped.
        if sna16lt(chunk.stream_sequence_number, self.next_ssn) {
            return false;
        }

        self.n_bytes += chunk.user_data.len();
        let ssn = chunk.stream_sequence_number;
        let ppi = chunk.payload_type;

        if let Some(set) = self.ordered.iter_mut().find(|s| s.ssn == ssn) {
            return set.push(chunk);
        }

        let mut set = ChunkSet::new(ssn, ppi);
        set.push(chunk);
        // Keep sets sorted by SSN for in-order delivery.
        let pos = self
            .ordered
            .iter()
            .position(|s| sna16lt(ssn, s.ssn))
            .unwrap_or(self.ordered.len());
        self.ordered.insert(pos, set);
        true
    }

    fn assemble_unordered_chunks(&mut self) {
        // Group unordered fragments into complete sets keyed by their
        // begin fragment.
        self.unordered_chunks
            .sort_by(|a, b| {
                if a.tsn == b.tsn {
                    std::cmp::Ordering::Equal
                } else if sna32lt(a.tsn, b.tsn) {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Greater
                }
            });

        let mut start = None;
        let mut i = 0;
        while i < self.unordered_chunks.len() {
            let c = &self.unordered_chunks[i];
            if c.beginning_fragment {
                start = Some(i);
            }
            if c.ending_fragment {
                if let Some(s) = start {
                    // Verify contiguity before extracting.
                    let contiguous = self.unordered_chunks[s..=i]
                        .windows(2)
                        .all(|w| w[1].tsn == w[0].tsn.wrapping_add(1));
                    if contiguous {
                        let ppi = self.unordered_chunks[s].payload_type;
                        let mut set = ChunkSet::new(0, ppi);
                        set.chunks = self.unordered_chunks.drain(s..=i).collect();
                        self.unordered.push(set);
                        i = s;
                        start = None;
                        continue;
                    }
                }
            }
            i += 1;
        }
    }

    // read returns the next deliverable message: complete unordered sets
    // first, then the ordered set matching next_ssn.
    pub fn read(&mut self) -> Option<(Bytes, PayloadProtocolIdentifier)> {
        if !self.unordered.is_empty() {
            let set = self.unordered.remove(0);
            self.n_bytes -= set.n_bytes();
            return Some((set.assemble(), set.ppi));
        }

        if let Some(first) = self.ordered.first() {
            if first.is_complete() && first.ssn == self.next_ssn {
                let set = self.ordered.remove(0);
                self.n_bytes -= set.n_bytes();
                self.next_ssn = self.next_ssn.wrapping_add(1);
                return Some((set.assemble(), set.ppi));
            }
        }
        None
    }

    // forward_tsn_for_ordered drops ordered sets whose SSN the peer
    // abandoned and advances the stream cursor.
    pub fn forward_tsn_for_ordered(&mut self, last_ssn: u16) {
        use crate::util::sna16lte;
        let mut removed = 0;
        self.ordered.retain(|set| {
            if sna16lte(set.ssn, last_ssn) {
                removed += set.n_bytes();
                false
            } else {
                true
            }
        });
        self.n_bytes -= removed;
        if sna16lt(self.next_ssn, last_ssn.wrapping_add(1)) {
            self.next_ssn = last_ssn.wrapping_add(1);
        }
    }

    // forward_tsn_for_unordered drops unordered fragments at or below the
    // new cumulative TSN.
    pub fn forward_tsn_for_unordered(&mut self, new_cumulative_tsn: u32) {
        use crate::util::sna32lte;
        let mut removed = 0;
        self.unordered_chunks.retain(|c| {
            if sna32lte(c.tsn, new_cumulative_tsn) {
                removed += c.user_data.len();
                false
            } else {
                true
            }
        });
        self.n_bytes -= removed;
    }

    pub fn get_num_bytes(&self) -> usize {
        self.n_bytes
    }

    pub fn is_readable(&self) -> bool {
        if !self.unordered.is_empty() {
            return true;
        }
        if let Some(first) = self.ordered.first() {
            return first.is_complete() && first.ssn == self.next_ssn;
        }
        false
    }
}
