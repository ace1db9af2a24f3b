#[cfg(test)]
mod sdp_test;

use sdp::description::common::{Attribute, ConnectionInformation};
use sdp::description::media::{MediaDescription, MediaName};
use sdp::description::session::SessionDescription;

use crate::api::media_engine::{MediaEngine, RTCRtpCodecParameters, RTPCodecType};
use crate::error::{Error, Result};
use crate::peer_connection::certificate::RTCDtlsFingerprint;
use crate::rtp_transceiver::RTCRtpTransceiverDirection;

pub(crate) const MEDIA_SECTION_APPLICATION: &str = "application";
const SDES_CNAME_LEN: usize = 16;

// LocalMediaSection is everything the SDP builder needs for one
// m-section.
pub(crate) struct LocalMediaSection {
    pub(crate) kind: RTPCodecType,
    pub(crate) mid: String,
    pub(crate) direction: RTCRtpTransceiverDirection,
    pub(crate) codecs: Vec<RTCRtpCodecParameters>,
    pub(crate) ssrc: u32,
    pub(crate) rtx_ssrc: Option<u32>,
    pub(crate) cname: String,
}

pub(crate) struct SessionParams<'a> {
    pub(crate) ice_ufrag: String,
    pub(crate) ice_pwd: String,
    pub(crate) fingerprint: RTCDtlsFingerprint,
    pub(crate) setup: &'a str,
    pub(crate) media: Vec<LocalMediaSection>,
    pub(crate) include_application: bool,
    // The application m-section's mid; defaults to the next index.
    pub(crate) application_mid: Option<String>,
    pub(crate) sctp_port: u16,
    pub(crate) max_message_size: u32,
    pub(crate) header_extensions: Vec<(String, isize)>,
    pub(crate) bundle: bool,
}

// build_session_description renders the offer or answer; the semantic
// fields only, in the shape browsers produce.
pub(crate) fn build_session_description(params: &SessionParams<'_>) -> SessionDescription {
    let mut sd = SessionDescription::new_jsep_session_description();

    let application_mid = params
        .application_mid
        .clone()
        .unwrap_or_else(|| params.media.len().to_string());
    let mut mids: Vec<String> = params.media.iter().map(|m| m.mid.clone()).collect();
    if params.include_application {
        mids.push(application_mid.clone());
    }

    if params.bundle && !mids.is_empty() {
        sd = sd.with_value_attribute("group", format!("BUNDLE {}", mids.join(" ")));
    }
    sd = sd.with_value_attribute("msid-semantic", " WMS");

    for section in &params.media {
        let mut md = MediaDescription {
            media_name: MediaName {
                media: section.kind.to_string(),
                port: 9,
                port_count: 1,
                protos: vec![
                    "UDP".to_owned(),
                    "TLS".to_owned(),
                    "RTP".to_owned(),
                    "SAVPF".to_owned(),
                ],
                formats: vec![],
            },
            media_title: None,
            connection_information: Some(ConnectionInformation {
                network_type: "IN".to_owned(),
                address_type: "IP4".to_owned(),
                address: "0.0.0.0".to_owned(),
            }),
            attributes: vec![],
        };

        md = md
            .with_value_attribute("ice-ufrag", params.ice_ufrag.clone())
            .with_value_attribute("ice-pwd", params.ice_pwd.clone())
            .with_value_attribute("ice-options", "trickle")
            .with_value_attribute(
                "fingerprint",
                format!(
                    "{} {}",
                    params.fingerprint.algorithm, params.fingerprint.value
                ),
            )
            .with_value_attribute("setup", params.setup)
            .with_value_attribute("mid", section.mid.clone());

        for (uri, id) in &params.header_extensions {
            md = md.with_value_attribute("extmap", format!("{id} {uri}"));
        }

        md = md.with_property_attribute(section.direction.to_string());
        md = md.with_property_attribute("rtcp-mux");

        for codec in &section.codecs {
            md = md.with_codec(
                codec.payload_type,
                codec.codec_name(),
                codec.capability.clock_rate,
                codec.capability.channels,
                &codec.capability.sdp_fmtp_line,
            );
            for fb in &codec.capability.rtcp_feedback {
                let value = if fb.parameter.is_empty() {
                    format!("{} {}", codec.payload_type, fb.typ)
                } else {
                    format!("{} {} {}", codec.payload_type, fb.typ, fb.parameter)
                };
                md = md.with_value_attribute("rtcp-fb", value);
            }
        }

        if section.direction != RTCRtpTransceiverDirection::Recvonly {
            if let Some(rtx_ssrc) = section.rtx_ssrc {
                md = md.with_value_attribute(
                    "ssrc-group",
                    format!("FID {} {}", section.ssrc, rtx_ssrc),
                );
                md = md.with_value_attribute(
                    "ssrc",
                    format!("{} cname:{}", rtx_ssrc, section.cname),
                );
            }
            md = md.with_value_attribute(
                "ssrc",
                format!("{} cname:{}", section.ssrc, section.cname),
            );
        }

        sd = sd.with_media(md);
    }

    if params.include_application {
        let mid = application_mid;
        let md = MediaDescription {
            media_name: MediaName {
                media: MEDIA_SECTION_APPLICATION.to_owned(),
                port: 9,
                port_count: 1,
                protos: vec!["UDP".to_owned(), "DTLS".to_owned(), "SCTP".to_owned()],
                formats: vec!["webrtc-datachannel".to_owned()],
            },
            media_title: None,
            connection_information: Some(ConnectionInformation {
                network_type: "IN".to_owned(),
                address_type: "IP4".to_owned(),
                address: "0.0.0.0".to_owned(),
            }),
            attributes: vec![],
        }
        .with_value_attribute("ice-ufrag", params.ice_ufrag.clone())
        .with_value_attribute("ice-pwd", params.ice_pwd.clone())
        .with_value_attribute("ice-options", "trickle")
        .with_value_attribute(
            "fingerprint",
            format!(
                "{} {}",
                params.fingerprint.algorithm, params.fingerprint.value
            ),
        )
        .with_value_attribute("setup", params.setup)
        .with_value_attribute("mid", mid)
        .with_value_attribute("sctp-port", params.sctp_port.to_string())
        .with_value_attribute("max-message-size", params.max_message_size.to_string());

        sd = sd.with_media(md);
    }

    sd
}

// RemoteMediaSection is the parsed view of one remote m-section.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RemoteMediaSection {
    pub(crate) kind: String,
    pub(crate) mid: String,
    pub(crate) direction: RTCRtpTransceiverDirection,
    pub(crate) codecs: Vec<sdp::description::media::Codec>,
    pub(crate) ssrcs: Vec<u32>,
    pub(crate) fid_pair: Option<(u32, u32)>,
    pub(crate) is_application: bool,
    pub(crate) sctp_port: Option<u16>,
    pub(crate) max_message_size: Option<u32>,
    pub(crate) extmaps: Vec<(String, isize)>,
    pub(crate) candidates: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RemoteDescription {
    pub(crate) ice_ufrag: String,
    pub(crate) ice_pwd: String,
    pub(crate) fingerprints: Vec<RTCDtlsFingerprint>,
    pub(crate) setup: Option<String>,
    pub(crate) media: Vec<RemoteMediaSection>,
    pub(crate) bundle_mids: Vec<String>,
}

// parse_remote_description extracts the semantic fields the transports
// consume.
pub(crate) fn parse_remote_description(raw: &str) -> Result<RemoteDescription> {
    let sd = SessionDescription::unmarshal(raw)?;

    let mut ice_ufrag = String::new();
    let mut ice_pwd = String::new();
    let mut fingerprints = vec![];
    let mut setup = None;
    let mut bundle_mids = vec![];

    if let Some(Some(group)) = sd.attribute("group") {
        if let Some(list) = group.strip_prefix("BUNDLE") {
            bundle_mids = list.split_whitespace().map(|s| s.to_owned()).collect();
        }
    }

    let mut parse_common = |attributes: &[Attribute]| {
        for a in attributes {
            match (a.key.as_str(), a.value.as_deref()) {
                ("ice-ufrag", Some(v)) if ice_ufrag.is_empty() => ice_ufrag = v.to_owned(),
                ("ice-pwd", Some(v)) if ice_pwd.is_empty() => ice_pwd = v.to_owned(),
                ("fingerprint", Some(v)) => {
                    if let Some((algorithm, value)) = v.split_once(' ') {
                        let fp = RTCDtlsFingerprint {
                            algorithm: algorithm.to_owned(),
                            value: value.to_owned(),
                        };
                        if !fingerprints.contains(&fp) {
                            fingerprints.push(fp);
                        }
                    }
                }
                ("setup", Some(v)) => setup = Some(v.to_owned()),
                _ => {}
            }
        }
    };

    parse_common(&sd.attributes);

    let mut media = vec![];
    for md in &sd.media_descriptions {
        parse_common(&md.attributes);

        let direction = ["sendrecv", "sendonly", "recvonly", "inactive"]
            .iter()
            .find(|d| md.attribute(d).is_some())
            .map(|d| RTCRtpTransceiverDirection::from_str(d))
            .unwrap_or_default();

        let extmaps = md
            .attributes_with_key("extmap")
            .filter_map(|v| {
                let (id, uri) = v.split_once(' ')?;
                // ids may carry a direction suffix like "5/recvonly".
                let id = id.split('/').next()?.parse::<isize>().ok()?;
                Some((uri.to_owned(), id))
            })
            .collect();

        let candidates = md
            .attributes_with_key("candidate")
            .map(|v| v.to_owned())
            .collect();

        media.push(RemoteMediaSection {
            kind: md.media_name.media.clone(),
            mid: md.mid().unwrap_or_default().to_owned(),
            direction,
            codecs: md.codecs(),
            ssrcs: md.ssrcs(),
            fid_pair: md.ssrc_group_fid(),
            is_application: md.media_name.media == MEDIA_SECTION_APPLICATION,
            sctp_port: md
                .attribute("sctp-port")
                .flatten()
                .and_then(|v| v.parse().ok()),
            max_message_size: md
                .attribute("max-message-size")
                .flatten()
                .and_then(|v| v.parse().ok()),
            extmaps,
            candidates,
        });
    }

    if ice_ufrag.is_empty() || ice_pwd.is_empty() {
        return Err(Error::ErrMissingIceCredentials);
    }

    Ok(RemoteDescription {
        ice_ufrag,
        ice_pwd,
        fingerprints,
        setup,
        media,
        bundle_mids,
    })
}

// answer_codecs intersects a remote media section's codecs with the
// engine registry, keeping the remote payload type numbers.
pub(crate) fn answer_codecs(
    remote: &RemoteMediaSection,
    media_engine: &MediaEngine,
) -> Vec<RTCRtpCodecParameters> {
    let kind = if remote.kind == "audio" {
        RTPCodecType::Audio
    } else {
        RTPCodecType::Video
    };

    let mut out = vec![];
    for remote_codec in &remote.codecs {
        if remote_codec.name.eq_ignore_ascii_case("rtx") {
            continue;
        }
        if let Ok(local) = media_engine.match_remote_codec(remote_codec, kind) {
            // Answer with the remote's payload type so both sides agree.
            out.push(RTCRtpCodecParameters {
                capability: local.capability,
                payload_type: remote_codec.payload_type,
            });
        }
    }
    out
}

pub(crate) fn random_cname() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..SDES_CNAME_LEN)
        .map(|_| {
            let chars = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
            chars[rng.gen_range(0..chars.len())] as char
        })
        .collect()
}
