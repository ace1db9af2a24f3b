#[cfg(test)]
mod recorder_test;

use std::collections::BTreeMap;

use rtcp::transport_feedbacks::transport_layer_cc::{
    PacketStatusChunk, RecvDelta, RunLengthChunk, StatusVectorChunk, SymbolSizeTypeTcc,
    SymbolTypeTcc, TransportLayerCc, TYPE_TCC_DELTA_SCALE_FACTOR,
};

// One reference-time tick is 64 ms.
const REF_TIME_UNIT_US: i64 = 64_000;
// Run-length encoding pays off past this run size.
const MIN_RUN_LENGTH: usize = 14;

// Recorder accumulates transport-wide arrival times and renders them
// into TWCC feedback packets
// (draft-holmer-rmcat-transport-wide-cc-extensions-01).
pub struct Recorder {
    sender_ssrc: u32,
    media_ssrc: u32,
    fb_pkt_count: u8,
    // Extended transport-wide sequence -> arrival in microseconds.
    arrivals: BTreeMap<u64, i64>,
    cycles: u64,
    last_seq: u16,
    started: bool,
    // First sequence the next feedback will report on.
    next_report_seq: Option<u64>,
}

impl Recorder {
    pub fn new(sender_ssrc: u32) -> Self {
        Recorder {
            sender_ssrc,
            media_ssrc: 0,
            fb_pkt_count: 0,
            arrivals: BTreeMap::new(),
            cycles: 0,
            last_seq: 0,
            started: false,
            next_report_seq: None,
        }
    }

    pub fn set_media_ssrc(&mut self, media_ssrc: u32) {
        self.media_ssrc = media_ssrc;
    }

    // record one packet arrival. The sequence number is the transport-wide
    // counter from the header extension; arrival is in microseconds.
    pub fn record(&mut self, media_ssrc: u32, seq: u16, arrival_time_us: i64) {
        self.media_ssrc = media_ssrc;
        if !self.started {
            self.started = true;
            self.last_seq = seq;
        } else {
            let diff = seq.wrapping_sub(self.last_seq);
            if diff < 0x8000 {
                if seq < self.last_seq {
                    self.cycles += 1 << 16;
                }
                self.last_seq = seq;
            }
        }
        let ext = self.cycles | seq as u64;
        self.arrivals.entry(ext).or_insert(arrival_time_us);
        if self.next_report_seq.is_none() {
            self.next_report_seq = Some(ext);
        }
    }

    // build_feedback drains everything recorded since the previous call
    // into zero or one feedback packets.
    pub fn build_feedback(&mut self) -> Option<TransportLayerCc> {
        let base_seq = self.next_report_seq?;
        let max_seq = *self.arrivals.keys().next_back()?;
        if self.arrivals.is_empty() || max_seq < base_seq {
            return None;
        }

        let count = (max_seq - base_seq + 1).min(0xFFFF) as u16;

        // Reference time: 64 ms ticks at or below the first arrival.
        let first_arrival = self
            .arrivals
            .range(base_seq..)
            .map(|(_, &t)| t)
            .next()
            .unwrap_or(0);
        let reference_time = ((first_arrival / REF_TIME_UNIT_US) & 0xFFFFFF) as u32;

        let mut symbols: Vec<SymbolTypeTcc> = Vec::with_capacity(count as usize);
        let mut recv_deltas: Vec<RecvDelta> = vec![];
        let mut last_arrival = (reference_time as i64) * REF_TIME_UNIT_US;

        for offset in 0..count as u64 {
            let seq = base_seq + offset;
            match self.arrivals.get(&seq) {
                Some(&arrival) => {
                    let delta_us = arrival - last_arrival;
                    let delta_ticks = delta_us / TYPE_TCC_DELTA_SCALE_FACTOR;
                    // Advance by the quantized amount so the feedback
                    // consumer's reconstruction does not drift.
                    last_arrival += delta_ticks * TYPE_TCC_DELTA_SCALE_FACTOR;
                    let symbol = if (0..=u8::MAX as i64).contains(&delta_ticks) {
                        SymbolTypeTcc::PacketReceivedSmallDelta
                    } else {
                        SymbolTypeTcc::PacketReceivedLargeDelta
                    };
                    symbols.push(symbol);
                    recv_deltas.push(RecvDelta {
                        type_tcc_packet: symbol,
                        // Deltas are quantized to 250 us on the wire; keep
                        // the arrival cursor aligned with what the
                        // receiver of the feedback will reconstruct.
                        delta: delta_ticks * TYPE_TCC_DELTA_SCALE_FACTOR,
                    });
                }
                None => symbols.push(SymbolTypeTcc::PacketNotReceived),
            }
        }

        let packet_chunks = encode_chunks(&symbols);

        let cc = TransportLayerCc {
            sender_ssrc: self.sender_ssrc,
            media_ssrc: self.media_ssrc,
            base_sequence_number: (base_seq & 0xFFFF) as u16,
            packet_status_count: count,
            reference_time,
            fb_pkt_count: self.fb_pkt_count,
            packet_chunks,
            recv_deltas,
        };
        self.fb_pkt_count = self.fb_pkt_count.wrapping_add(1);

        // Everything up to max_seq is reported; drop it.
        self.arrivals = self.arrivals.split_off(&(max_seq + 1));
        self.next_report_seq = Some(max_seq + 1);

        Some(cc)
    }
}

// encode_chunks packs status symbols into run-length and status-vector
// chunks covering exactly symbols.len() statuses.
fn encode_chunks(symbols: &[SymbolTypeTcc]) -> Vec<PacketStatusChunk> {
    let mut chunks = vec![];
    let mut i = 0;

    while i < symbols.len() {
        // Measure the run at i.
        let run_symbol = symbols[i];
        let mut run_len = 1;
        while i + run_len < symbols.len() && symbols[i + run_len] == run_symbol {
            run_len += 1;
        }

        if run_len >= MIN_RUN_LENGTH {
            let run_len = run_len.min(0x1FFF);
            chunks.push(PacketStatusChunk::RunLengthChunk(RunLengthChunk {
                packet_status_symbol: run_symbol,
                run_length: run_len as u16,
            }));
            i += run_len;
        } else {
            // Two-bit status vector of up to 7 symbols, padded with
            // not-received beyond the end.
            let take = (symbols.len() - i).min(7);
            let mut list = symbols[i..i + take].to_vec();
            while list.len() < 7 {
                list.push(SymbolTypeTcc::PacketNotReceived);
            }
            chunks.push(PacketStatusChunk::StatusVectorChunk(StatusVectorChunk {
                symbol_size: SymbolSizeTypeTcc::TwoBit,
                symbol_list: list,
            }));
            i += take;
        }
    }

    chunks
}
