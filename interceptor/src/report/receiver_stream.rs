#[cfg(test)]
mod receiver_stream_test {
    use super::*;

    #[test]
    fn test_sequence_cycles_on_wrap() {
        let mut s = ReceiverStreamStats::new(1, 90000);
        s.record(65535, 0, 0);
        s.record(0, 3000, 11);
        assert_eq!(s.cycles, 1);
        assert_eq!(s.extended_highest_seq(), (1 << 16));
        // A second wrap does not occur for in-window reordering.
        s.record(1, 6000, 22);
        assert_eq!(s.cycles, 1);
    }

    #[test]
    fn test_fraction_lost_over_interval() {
        let mut s = ReceiverStreamStats::new(1, 90000);
        // Receive 100..=104, then skip to 110: 5 packets lost.
        for (i, seq) in (100u16..=104).enumerate() {
            s.record(seq, i as u32 * 100, i as u64);
        }
        s.record(110, 1000, 10);

        let report = s.build_report(0, 0);
        assert_eq!(report.total_lost, 5);
        // expected 11, received 6 in this interval.
        assert_eq!(report.fraction_lost, (5u32 * 256 / 11) as u8);

        // The next interval with no loss reports fraction 0.
        s.record(111, 1100, 11);
        let report = s.build_report(0, 0);
        assert_eq!(report.fraction_lost, 0);
    }

    #[test]
    fn test_jitter_converges() {
        let mut s = ReceiverStreamStats::new(1, 8000);
        // Constant transit time: jitter decays towards zero.
        let mut arrival = 0u64;
        let mut ts = 0u32;
        for seq in 0..50u16 {
            s.record(seq, ts, arrival);
            ts += 160;
            arrival += 160;
        }
        assert_eq!(s.jitter_q4 >> 4, 0);

        // A 10-tick arrival wobble produces non-zero jitter.
        for seq in 50..100u16 {
            s.record(seq, ts, arrival + u64::from(seq % 2) * 10);
            ts += 160;
            arrival += 160;
        }
        assert!(s.jitter_q4 >> 4 > 0);
    }
}

use rtcp::reception_report::ReceptionReport;

// ReceiverStreamStats tracks one inbound SSRC per RFC 3550 appendix A:
// extended sequence tracking, interarrival jitter in Q4 fixed point, and
// interval-based fraction lost.
pub struct ReceiverStreamStats {
    pub ssrc: u32,
    pub clock_rate: u32,

    started: bool,
    pub base_seq: u16,
    pub max_seq: u16,
    pub cycles: u16,
    pub packets_received: u64,

    // Interval snapshot for fraction-lost.
    expected_prior: u32,
    received_prior: u32,

    // Q4 fixed-point interarrival jitter.
    pub jitter_q4: u32,
    last_transit: Option<i64>,

    // Last SR info for LSR/DLSR.
    pub last_sr_ntp_middle: u32,
    pub last_sr_arrival_secs: f64,
}

impl ReceiverStreamStats {
    pub fn new(ssrc: u32, clock_rate: u32) -> Self {
        ReceiverStreamStats {
            ssrc,
            clock_rate,
            started: false,
            base_seq: 0,
            max_seq: 0,
            cycles: 0,
            packets_received: 0,
            expected_prior: 0,
            received_prior: 0,
            jitter_q4: 0,
            last_transit: None,
            last_sr_ntp_middle: 0,
            last_sr_arrival_secs: 0.0,
        }
    }

    // record one packet: seq, its RTP timestamp and the arrival time in
    // clock-rate units.
    pub fn record(&mut self, seq: u16, rtp_ts: u32, arrival_ts: u64) {
        if !self.started {
            self.started = true;
            self.base_seq = seq;
            self.max_seq = seq;
        } else {
            let diff = seq.wrapping_sub(self.max_seq);
            if diff != 0 && diff < 0x8000 {
                if seq < self.max_seq {
                    self.cycles += 1;
                }
                self.max_seq = seq;
            }
        }
        self.packets_received += 1;

        // Interarrival jitter per RFC 3550 §6.4.1 / appendix A.8:
        // D = (arrival_i - arrival_j) - (ts_i - ts_j), J += (|D| - J) / 16.
        let transit = arrival_ts as i64 - rtp_ts as i64;
        if let Some(last) = self.last_transit {
            let d = (transit - last).unsigned_abs();
            let j = self.jitter_q4 as i64 + d as i64 - ((self.jitter_q4 as i64 + 8) >> 4);
            self.jitter_q4 = j.max(0) as u32;
        }
        self.last_transit = Some(transit);
    }

    pub fn extended_highest_seq(&self) -> u32 {
        ((self.cycles as u32) << 16) | self.max_seq as u32
    }

    fn expected(&self) -> u32 {
        self.extended_highest_seq()
            .wrapping_sub(self.base_seq as u32)
            .wrapping_add(1)
    }

    // record_sender_report notes the SR needed for the peer's RTT math.
    pub fn record_sender_report(&mut self, ntp_time: u64, arrival_secs: f64) {
        self.last_sr_ntp_middle = ((ntp_time >> 16) & 0xFFFFFFFF) as u32;
        self.last_sr_arrival_secs = arrival_secs;
    }

    // build_report produces a reception report block and rolls the
    // interval counters forward.
    pub fn build_report(&mut self, now_secs_int: u32, now_secs_frac: u32) -> ReceptionReport {
        let expected = self.expected();
        let received = self.packets_received as u32;

        let expected_interval = expected.wrapping_sub(self.expected_prior);
        let received_interval = received.wrapping_sub(self.received_prior);
        self.expected_prior = expected;
        self.received_prior = received;

        let lost_interval = expected_interval.saturating_sub(received_interval);
        let fraction_lost = if expected_interval == 0 || lost_interval == 0 {
            0
        } else {
            ((lost_interval * 256) / expected_interval) as u8
        };

        let total_lost = expected.saturating_sub(received).min(0xFFFFFF);

        // DLSR in 1/65536 seconds since the last SR arrived.
        let delay = if self.last_sr_arrival_secs > 0.0 {
            let now = now_secs_int as f64 + now_secs_frac as f64 / 65536.0;
            ((now - self.last_sr_arrival_secs) * 65536.0).max(0.0) as u32
        } else {
            0
        };

        ReceptionReport {
            ssrc: self.ssrc,
            fraction_lost,
            total_lost,
            last_sequence_number: self.extended_highest_seq(),
            jitter: self.jitter_q4 >> 4,
            last_sender_report: self.last_sr_ntp_middle,
            delay,
        }
    }
}
