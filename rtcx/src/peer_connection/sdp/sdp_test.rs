use super::*;
use crate::api::media_engine::MediaEngine;

fn engine() -> MediaEngine {
    let mut m = MediaEngine::default();
    m.register_default_codecs().unwrap();
    m
}

fn offer_params(media: Vec<LocalMediaSection>, include_application: bool) -> String {
    let params = SessionParams {
        ice_ufrag: "ufragufragufragu".to_owned(),
        ice_pwd: "pwdpwdpwdpwdpwdpwdpwdpwdpwdpwdpw".to_owned(),
        fingerprint: RTCDtlsFingerprint {
            algorithm: "sha-256".to_owned(),
            value: "AA:BB".to_owned(),
        },
        setup: "actpass",
        media,
        include_application,
        application_mid: None,
        sctp_port: 5000,
        max_message_size: 262144,
        header_extensions: vec![(
            "http://www.ietf.org/id/draft-holmer-rmcat-transport-wide-cc-extensions-01"
                .to_owned(),
            5,
        )],
        bundle: true,
    };
    build_session_description(&params).marshal()
}

fn video_section(engine: &MediaEngine) -> LocalMediaSection {
    LocalMediaSection {
        kind: crate::api::media_engine::RTPCodecType::Video,
        mid: "0".to_owned(),
        direction: RTCRtpTransceiverDirection::Sendrecv,
        codecs: engine.media_codecs(crate::api::media_engine::RTPCodecType::Video),
        ssrc: 1111,
        rtx_ssrc: Some(2222),
        cname: "cnamecname".to_owned(),
    }
}

#[test]
fn test_offer_contains_required_semantics() {
    let engine = engine();
    let raw = offer_params(vec![video_section(&engine)], true);

    assert!(raw.contains("a=group:BUNDLE 0 1"));
    assert!(raw.contains("a=ice-ufrag:ufragufragufragu"));
    assert!(raw.contains("a=fingerprint:sha-256 AA:BB"));
    assert!(raw.contains("a=setup:actpass"));
    assert!(raw.contains("a=mid:0"));
    assert!(raw.contains("a=rtcp-mux"));
    assert!(raw.contains("a=ssrc-group:FID 1111 2222"));
    assert!(raw.contains("m=application 9 UDP/DTLS/SCTP webrtc-datachannel"));
    assert!(raw.contains("a=sctp-port:5000"));
    assert!(raw.contains("a=max-message-size:262144"));
    assert!(raw.contains("a=extmap:5 http://www.ietf.org/id/draft-holmer"));
}

#[test]
fn test_offer_parses_back_symmetrically() {
    // Everything the builder produces must parse through the remote
    // description path.
    let engine = engine();
    let raw = offer_params(vec![video_section(&engine)], true);
    let parsed = parse_remote_description(&raw).unwrap();

    assert_eq!(parsed.ice_ufrag, "ufragufragufragu");
    assert_eq!(parsed.fingerprints.len(), 1);
    assert_eq!(parsed.setup.as_deref(), Some("actpass"));
    assert_eq!(parsed.bundle_mids, vec!["0", "1"]);
    assert_eq!(parsed.media.len(), 2);

    let video = &parsed.media[0];
    assert_eq!(video.kind, "video");
    assert_eq!(video.mid, "0");
    assert_eq!(video.direction, RTCRtpTransceiverDirection::Sendrecv);
    assert_eq!(video.fid_pair, Some((1111, 2222)));
    assert!(!video.codecs.is_empty());
    assert_eq!(video.extmaps.len(), 1);

    let app = &parsed.media[1];
    assert!(app.is_application);
    assert_eq!(app.sctp_port, Some(5000));
    assert_eq!(app.max_message_size, Some(262144));
}

#[test]
fn test_answer_codecs_keep_remote_payload_types() {
    let engine = engine();
    let remote = RemoteMediaSection {
        kind: "video".to_owned(),
        mid: "0".to_owned(),
        direction: RTCRtpTransceiverDirection::Sendrecv,
        codecs: vec![sdp::description::media::Codec {
            payload_type: 124,
            name: "VP8".to_owned(),
            clock_rate: 90000,
            ..Default::default()
        }],
        ssrcs: vec![],
        fid_pair: None,
        is_application: false,
        sctp_port: None,
        max_message_size: None,
        extmaps: vec![],
        candidates: vec![],
    };
    let codecs = answer_codecs(&remote, &engine);
    assert_eq!(codecs.len(), 1);
    assert_eq!(codecs[0].payload_type, 124, "remote numbering wins");
    assert_eq!(codecs[0].capability.mime_type, "video/VP8");
}

#[test]
fn test_parse_rejects_missing_credentials() {
    let raw = "v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\ns=-\r\nt=0 0\r\n\
m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\na=mid:0\r\n";
    assert_eq!(
        parse_remote_description(raw),
        Err(Error::ErrMissingIceCredentials)
    );
}
