use std::time::SystemTime;

use super::ntp_time;

// SenderStreamStats tracks what an outbound stream needs for its SRs.
pub struct SenderStreamStats {
    pub ssrc: u32,
    pub clock_rate: u32,

    pub packet_count: u32,
    pub octet_count: u32,

    // RTP timestamp of the most recent packet and the wall clock at
    // which it left, so the SR's rtp_time can be projected to "now".
    last_rtp_ts: u32,
    last_sent: Option<SystemTime>,
}

impl SenderStreamStats {
    pub fn new(ssrc: u32, clock_rate: u32) -> Self {
        SenderStreamStats {
            ssrc,
            clock_rate,
            packet_count: 0,
            octet_count: 0,
            last_rtp_ts: 0,
            last_sent: None,
        }
    }

    pub fn record(&mut self, rtp_ts: u32, payload_len: usize, now: SystemTime) {
        self.packet_count = self.packet_count.wrapping_add(1);
        self.octet_count = self.octet_count.wrapping_add(payload_len as u32);
        self.last_rtp_ts = rtp_ts;
        self.last_sent = Some(now);
    }

    pub fn build_report(&self, now: SystemTime) -> rtcp::sender_report::SenderReport {
        let rtp_time = match self.last_sent {
            Some(last) => {
                let elapsed = now
                    .duration_since(last)
                    .map(|d| (d.as_nanos() as u128 * self.clock_rate as u128 / 1_000_000_000) as u32)
                    .unwrap_or(0);
                self.last_rtp_ts.wrapping_add(elapsed)
            }
            None => self.last_rtp_ts,
        };

        rtcp::sender_report::SenderReport {
            ssrc: self.ssrc,
            ntp_time: ntp_time(now),
            rtp_time,
            packet_count: self.packet_count,
            octet_count: self.octet_count,
            reports: vec![],
            profile_extensions: vec![],
        }
    }
}
