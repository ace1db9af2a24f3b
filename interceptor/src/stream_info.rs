// RTPHeaderExtension is one negotiated header extension mapping.
#[derive(Default, Debug, Clone)]
pub struct RTPHeaderExtension {
    pub uri: String,
    pub id: isize,
}

// RTCPFeedback signals a negotiated feedback mechanism (a=rtcp-fb).
#[derive(Default, Debug, Clone)]
pub struct RTCPFeedback {
    pub typ: String,
    pub parameter: String,
}

// StreamInfo describes one bound RTP stream to the interceptors.
#[derive(Default, Debug, Clone)]
pub struct StreamInfo {
    pub id: String,
    pub ssrc: u32,
    pub payload_type: u8,
    pub rtp_header_extensions: Vec<RTPHeaderExtension>,
    pub mime_type: String,
    pub clock_rate: u32,
    pub channels: u16,
    pub sdp_fmtp_line: String,
    pub rtcp_feedback: Vec<RTCPFeedback>,
    // RTX pairing (ssrc-group:FID): the repair stream's SSRC and PT.
    pub associated_ssrc: u32,
    pub rtx_payload_type: u8,
}

impl StreamInfo {
    pub fn has_feedback(&self, typ: &str) -> bool {
        self.rtcp_feedback.iter().any(|fb| fb.typ == typ)
    }

    pub fn header_extension_id(&self, uri: &str) -> Option<isize> {
        self.rtp_header_extensions
            .iter()
            .find(|e| e.uri == uri)
            .map(|e| e.id)
    }
}

pub const TRANSPORT_CC_URI: &str =
    "http://www.ietf.org/id/draft-holmer-rmcat-transport-wide-cc-extensions-01";
pub const ABS_SEND_TIME_URI: &str = "http://www.webrtc.org/experiments/rtp-hdrext/abs-send-time";
pub const SDES_MID_URI: &str = "urn:ietf:params:rtp-hdrext:sdes:mid";
pub const AUDIO_LEVEL_URI: &str = "urn:ietf:params:rtp-hdrext:ssrc-audio-level";
