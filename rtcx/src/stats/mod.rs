use std::collections::HashMap;

// Stats snapshots, obtained through the connection's loop so readers
// never observe torn state.

#[derive(Debug, Clone, Default)]
pub struct RTCInboundRtpStreamStats {
    pub ssrc: u32,
    pub packets_received: u64,
    pub bytes_received: u64,
    pub packets_lost_events: u64,
}

#[derive(Debug, Clone, Default)]
pub struct RTCOutboundRtpStreamStats {
    pub ssrc: u32,
    pub packets_sent: u64,
    pub bytes_sent: u64,
}

#[derive(Debug, Clone, Default)]
pub struct RTCDataChannelStats {
    pub label: String,
    pub messages_sent: usize,
    pub messages_received: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RTCIceCandidatePairStats {
    pub local: String,
    pub remote: String,
    pub nominated: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RTCStatsReport {
    pub inbound_rtp: HashMap<u32, RTCInboundRtpStreamStats>,
    pub outbound_rtp: HashMap<u32, RTCOutboundRtpStreamStats>,
    pub data_channels: Vec<RTCDataChannelStats>,
    pub selected_candidate_pair: Option<RTCIceCandidatePairStats>,
}
