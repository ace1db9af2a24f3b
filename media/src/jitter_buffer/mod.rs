#[cfg(test)]
mod jitter_buffer_test;

use std::collections::BTreeMap;

use rtp::packet::Packet;

// Event emitted while draining the buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum JitterBufferEvent {
    // An in-order packet, ready for depacketization.
    Packet(Packet),
    // Sequence numbers from..=to were declared lost: the gap persisted
    // longer than the configured latency.
    PacketLost { from: u16, to: u16 },
    // End of the stream; everything held was flushed before this.
    Eol,
}

const DEFAULT_MAX_PACKETS: usize = 512;

// JitterBuffer reorders RTP packets and converts persistent gaps into
// explicit loss events. Time is measured in RTP timestamp units at the
// stream's clock rate, so the buffer needs no wall clock.
pub struct JitterBuffer {
    // Gap tolerance in timestamp units (latency_ms * clock_rate / 1000).
    latency_ts: u32,
    clock_rate: u32,

    // Buffered packets keyed by extended sequence number.
    buffer: BTreeMap<u64, Packet>,
    // Next expected extended sequence number.
    next_seq: Option<u64>,
    // Highest extended sequence number observed, drives wrap tracking.
    max_seq: Option<u64>,
    // Timestamp of the newest packet pushed, the reference "now".
    newest_ts: u32,

    max_packets: usize,
    pub duplicates_dropped: u64,
    pub packets_dropped_on_overflow: u64,
}

impl JitterBuffer {
    pub fn new(latency_ms: u32, clock_rate: u32) -> Self {
        JitterBuffer {
            latency_ts: (latency_ms as u64 * clock_rate as u64 / 1000) as u32,
            clock_rate,
            buffer: BTreeMap::new(),
            next_seq: None,
            max_seq: None,
            newest_ts: 0,
            max_packets: DEFAULT_MAX_PACKETS,
            duplicates_dropped: 0,
            packets_dropped_on_overflow: 0,
        }
    }

    // extend maps a 16-bit sequence number near the current maximum into
    // the unwrapped 64-bit space.
    fn extend(&self, seq: u16) -> u64 {
        match self.max_seq {
            None => seq as u64,
            Some(max) => {
                let max_low = (max & 0xFFFF) as u16;
                let cycles = max >> 16;
                let diff = seq.wrapping_sub(max_low);
                if diff < 0x8000 {
                    // At or ahead of max, possibly wrapping.
                    let ext = (cycles << 16) + max_low as u64 + diff as u64;
                    ext
                } else {
                    // Behind max.
                    let back = max_low.wrapping_sub(seq);
                    max - back as u64
                }
            }
        }
    }

    // push inserts a packet and returns every event that became ready.
    pub fn push(&mut self, packet: Packet) -> Vec<JitterBufferEvent> {
        let ext = self.extend(packet.header.sequence_number);

        if self.max_seq.map(|m| ext > m).unwrap_or(true) {
            self.max_seq = Some(ext);
            self.newest_ts = packet.header.timestamp;
        }

        if let Some(next) = self.next_seq {
            if ext < next {
                // Already delivered or declared lost.
                self.duplicates_dropped += 1;
                return vec![];
            }
        }
        if self.buffer.contains_key(&ext) {
            self.duplicates_dropped += 1;
            return vec![];
        }

        self.buffer.insert(ext, packet);
        if self.next_seq.is_none() {
            // First packet fixes the delivery origin.
            self.next_seq = Some(ext);
        }

        // Overflow drops the oldest held packets, moving the origin up.
        while self.buffer.len() > self.max_packets {
            if let Some((&oldest, _)) = self.buffer.iter().next() {
                self.buffer.remove(&oldest);
                self.packets_dropped_on_overflow += 1;
                if self.next_seq == Some(oldest) {
                    self.next_seq = Some(oldest + 1);
                }
            }
        }

        self.drain(false)
    }

    // flush drains everything held (declaring intermediate gaps lost)
    // and terminates with Eol.
    pub fn flush(&mut self) -> Vec<JitterBufferEvent> {
        let mut events = self.drain(true);
        events.push(JitterBufferEvent::Eol);
        events
    }

    fn drain(&mut self, force: bool) -> Vec<JitterBufferEvent> {
        let mut events = vec![];

        loop {
            let Some(next) = self.next_seq else { break };
            let Some((&head, head_packet)) = self.buffer.iter().next() else {
                break;
            };

            if head == next {
                let packet = self.buffer.remove(&head).unwrap();
                events.push(JitterBufferEvent::Packet(packet));
                self.next_seq = Some(next + 1);
                continue;
            }

            // Head is ahead of the expected sequence: a gap. Declare it
            // lost once the head has waited longer than the latency,
            // measured against the newest timestamp seen.
            let head_ts = head_packet.header.timestamp;
            let age = self.newest_ts.wrapping_sub(head_ts);
            if force || (age < 1 << 31 && age >= self.latency_ts) {
                events.push(JitterBufferEvent::PacketLost {
                    from: next as u16,
                    to: (head - 1) as u16,
                });
                self.next_seq = Some(head);
                continue;
            }
            break;
        }

        events
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
