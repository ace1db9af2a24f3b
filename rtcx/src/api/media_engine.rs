#[cfg(test)]
mod media_engine_test {
    use super::*;

    #[test]
    fn test_default_codecs_registered() {
        let mut m = MediaEngine::default();
        m.register_default_codecs().unwrap();
        assert!(m
            .codecs(RTPCodecType::Audio)
            .iter()
            .any(|c| c.capability.mime_type == MIME_TYPE_OPUS));
        assert!(m
            .codecs(RTPCodecType::Video)
            .iter()
            .any(|c| c.capability.mime_type == MIME_TYPE_VP8));
        // Every video codec has an RTX pairing.
        let vp8 = m
            .codecs(RTPCodecType::Video)
            .iter()
            .find(|c| c.capability.mime_type == MIME_TYPE_VP8)
            .cloned()
            .unwrap();
        assert!(m.rtx_payload_type_for(vp8.payload_type).is_some());
    }

    #[test]
    fn test_codec_match_from_sdp_codec() {
        let mut m = MediaEngine::default();
        m.register_default_codecs().unwrap();
        let sdp_codec = sdp::description::media::Codec {
            payload_type: 104,
            name: "VP8".to_owned(),
            clock_rate: 90000,
            ..Default::default()
        };
        let matched = m.match_remote_codec(&sdp_codec, RTPCodecType::Video).unwrap();
        assert_eq!(matched.capability.mime_type, MIME_TYPE_VP8);
    }
}

use std::fmt;

use crate::error::{Error, Result};

pub const MIME_TYPE_OPUS: &str = "audio/opus";
pub const MIME_TYPE_VP8: &str = "video/VP8";
pub const MIME_TYPE_VP9: &str = "video/VP9";
pub const MIME_TYPE_H264: &str = "video/H264";
pub const MIME_TYPE_AV1: &str = "video/AV1";
pub const MIME_TYPE_RTX: &str = "video/rtx";

// Negotiated header extension uris and the ids this stack assigns.
pub const EXT_TRANSPORT_CC: (&str, isize) = (
    "http://www.ietf.org/id/draft-holmer-rmcat-transport-wide-cc-extensions-01",
    5,
);
pub const EXT_ABS_SEND_TIME: (&str, isize) = (
    "http://www.webrtc.org/experiments/rtp-hdrext/abs-send-time",
    2,
);
pub const EXT_AUDIO_LEVEL: (&str, isize) = ("urn:ietf:params:rtp-hdrext:ssrc-audio-level", 1);
pub const EXT_SDES_MID: (&str, isize) = ("urn:ietf:params:rtp-hdrext:sdes:mid", 4);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RTPCodecType {
    #[default]
    Unspecified,
    Audio,
    Video,
}

impl fmt::Display for RTPCodecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RTPCodecType::Audio => "audio",
            RTPCodecType::Video => "video",
            RTPCodecType::Unspecified => "unspecified",
        };
        write!(f, "{s}")
    }
}

// RTCRtpCodecCapability mirrors the W3C shape: mime, clock rate,
// channels, fmtp and rtcp-fb.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RTCRtpCodecCapability {
    pub mime_type: String,
    pub clock_rate: u32,
    pub channels: u16,
    pub sdp_fmtp_line: String,
    pub rtcp_feedback: Vec<RTCPFeedback>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RTCPFeedback {
    pub typ: String,
    pub parameter: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RTCRtpCodecParameters {
    pub capability: RTCRtpCodecCapability,
    pub payload_type: u8,
}

impl RTCRtpCodecParameters {
    // codec_name is the rtpmap name, e.g. "opus" from "audio/opus".
    pub fn codec_name(&self) -> &str {
        self.capability
            .mime_type
            .split('/')
            .nth(1)
            .unwrap_or(&self.capability.mime_type)
    }
}

fn video_feedback() -> Vec<RTCPFeedback> {
    vec![
        RTCPFeedback {
            typ: "nack".to_owned(),
            parameter: String::new(),
        },
        RTCPFeedback {
            typ: "nack".to_owned(),
            parameter: "pli".to_owned(),
        },
        RTCPFeedback {
            typ: "ccm".to_owned(),
            parameter: "fir".to_owned(),
        },
        RTCPFeedback {
            typ: "transport-cc".to_owned(),
            parameter: String::new(),
        },
    ]
}

// MediaEngine holds the codec and header extension registry consulted
// during negotiation.
#[derive(Default)]
pub struct MediaEngine {
    audio_codecs: Vec<RTCRtpCodecParameters>,
    video_codecs: Vec<RTCRtpCodecParameters>,
    // media payload type -> rtx payload type
    rtx_map: Vec<(u8, u8)>,
    pub(crate) header_extensions: Vec<(String, isize)>,
}

impl MediaEngine {
    // register_default_codecs mirrors the browser default set.
    pub fn register_default_codecs(&mut self) -> Result<()> {
        self.register_codec(
            RTCRtpCodecParameters {
                capability: RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_OPUS.to_owned(),
                    clock_rate: 48000,
                    channels: 2,
                    sdp_fmtp_line: "minptime=10;useinbandfec=1".to_owned(),
                    rtcp_feedback: vec![RTCPFeedback {
                        typ: "transport-cc".to_owned(),
                        parameter: String::new(),
                    }],
                },
                payload_type: 111,
            },
            RTPCodecType::Audio,
        )?;

        for (mime, pt, rtx_pt, fmtp) in [
            (MIME_TYPE_VP8, 96u8, 97u8, ""),
            (MIME_TYPE_VP9, 98, 99, "profile-id=0"),
            (
                MIME_TYPE_H264,
                102,
                103,
                "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42001f",
            ),
            (MIME_TYPE_AV1, 45, 46, ""),
        ] {
            self.register_codec(
                RTCRtpCodecParameters {
                    capability: RTCRtpCodecCapability {
                        mime_type: mime.to_owned(),
                        clock_rate: 90000,
                        channels: 0,
                        sdp_fmtp_line: fmtp.to_owned(),
                        rtcp_feedback: video_feedback(),
                    },
                    payload_type: pt,
                },
                RTPCodecType::Video,
            )?;
            self.register_codec(
                RTCRtpCodecParameters {
                    capability: RTCRtpCodecCapability {
                        mime_type: MIME_TYPE_RTX.to_owned(),
                        clock_rate: 90000,
                        channels: 0,
                        sdp_fmtp_line: format!("apt={pt}"),
                        rtcp_feedback: vec![],
                    },
                    payload_type: rtx_pt,
                },
                RTPCodecType::Video,
            )?;
            self.rtx_map.push((pt, rtx_pt));
        }

        self.register_default_header_extensions();
        Ok(())
    }

    pub fn register_default_header_extensions(&mut self) {
        for (uri, id) in [EXT_SDES_MID, EXT_TRANSPORT_CC, EXT_ABS_SEND_TIME, EXT_AUDIO_LEVEL] {
            if !self.header_extensions.iter().any(|(u, _)| u == uri) {
                self.header_extensions.push((uri.to_owned(), id));
            }
        }
    }

    pub fn register_codec(
        &mut self,
        codec: RTCRtpCodecParameters,
        typ: RTPCodecType,
    ) -> Result<()> {
        match typ {
            RTPCodecType::Audio => self.audio_codecs.push(codec),
            RTPCodecType::Video => self.video_codecs.push(codec),
            RTPCodecType::Unspecified => return Err(Error::ErrCodecNotFound),
        }
        Ok(())
    }

    pub fn codecs(&self, typ: RTPCodecType) -> &[RTCRtpCodecParameters] {
        match typ {
            RTPCodecType::Audio => &self.audio_codecs,
            _ => &self.video_codecs,
        }
    }

    // media_codecs excludes RTX from an m-section's primary codec list.
    pub fn media_codecs(&self, typ: RTPCodecType) -> Vec<RTCRtpCodecParameters> {
        self.codecs(typ)
            .iter()
            .filter(|c| c.capability.mime_type != MIME_TYPE_RTX)
            .cloned()
            .collect()
    }

    pub fn rtx_payload_type_for(&self, payload_type: u8) -> Option<u8> {
        self.rtx_map
            .iter()
            .find(|(pt, _)| *pt == payload_type)
            .map(|(_, rtx)| *rtx)
    }

    pub fn codec_for_payload_type(&self, payload_type: u8) -> Option<RTCRtpCodecParameters> {
        self.audio_codecs
            .iter()
            .chain(self.video_codecs.iter())
            .find(|c| c.payload_type == payload_type)
            .cloned()
    }

    // match_remote_codec finds our registered codec matching a remote
    // rtpmap entry, ignoring the remote payload type number.
    pub fn match_remote_codec(
        &self,
        remote: &sdp::description::media::Codec,
        typ: RTPCodecType,
    ) -> Result<RTCRtpCodecParameters> {
        self.codecs(typ)
            .iter()
            .find(|c| {
                c.codec_name().eq_ignore_ascii_case(&remote.name)
                    && c.capability.clock_rate == remote.clock_rate
            })
            .cloned()
            .ok_or(Error::ErrCodecNotFound)
    }
}
