use super::*;

const CHROME_OFFER: &str = "v=0\r\n\
o=- 4596489990601351948 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
a=group:BUNDLE 0 1\r\n\
a=msid-semantic: WMS\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
c=IN IP4 0.0.0.0\r\n\
a=ice-ufrag:4ZcD\r\n\
a=ice-pwd:2/1muCWoOi3uLifh0NuRHlKH\r\n\
a=ice-options:trickle\r\n\
a=fingerprint:sha-256 39:61:5C:38:40:D8:F5:1B:84:71:D5:34:06:1C:E1:22:82:45:98:FD:A1:1A:43:77:74:B4:E4:F9:29:EE:C2:74\r\n\
a=setup:actpass\r\n\
a=mid:0\r\n\
a=extmap:3 http://www.ietf.org/id/draft-holmer-rmcat-transport-wide-cc-extensions-01\r\n\
a=sendrecv\r\n\
a=rtcp-mux\r\n\
a=rtpmap:111 opus/48000/2\r\n\
a=rtcp-fb:111 transport-cc\r\n\
a=fmtp:111 minptime=10;useinbandfec=1\r\n\
a=ssrc:3735928559 cname:rtcx\r\n\
m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n\
c=IN IP4 0.0.0.0\r\n\
a=ice-ufrag:4ZcD\r\n\
a=ice-pwd:2/1muCWoOi3uLifh0NuRHlKH\r\n\
a=fingerprint:sha-256 39:61:5C:38:40:D8:F5:1B:84:71:D5:34:06:1C:E1:22:82:45:98:FD:A1:1A:43:77:74:B4:E4:F9:29:EE:C2:74\r\n\
a=setup:actpass\r\n\
a=mid:1\r\n\
a=sctp-port:5000\r\n\
a=max-message-size:262144\r\n";

#[test]
fn test_unmarshal_browser_offer() {
    let sd = SessionDescription::unmarshal(CHROME_OFFER).unwrap();
    assert_eq!(sd.media_descriptions.len(), 2);
    assert_eq!(sd.attribute("group"), Some(Some("BUNDLE 0 1")));

    let audio = &sd.media_descriptions[0];
    assert_eq!(audio.media_name.media, "audio");
    assert_eq!(audio.media_name.protos, vec!["UDP", "TLS", "RTP", "SAVPF"]);
    assert_eq!(audio.mid(), Some("0"));
    assert_eq!(audio.attribute("ice-ufrag"), Some(Some("4ZcD")));

    let codecs = audio.codecs();
    assert_eq!(codecs.len(), 1);
    assert_eq!(codecs[0].payload_type, 111);
    assert_eq!(codecs[0].name, "opus");
    assert_eq!(codecs[0].clock_rate, 48000);
    assert_eq!(codecs[0].encoding_parameters, "2");
    assert_eq!(codecs[0].fmtp, "minptime=10;useinbandfec=1");
    assert_eq!(codecs[0].rtcp_feedback, vec!["transport-cc"]);

    assert_eq!(audio.ssrcs(), vec![3735928559]);

    let app = &sd.media_descriptions[1];
    assert_eq!(app.media_name.media, "application");
    assert_eq!(app.attribute("sctp-port"), Some(Some("5000")));
    assert_eq!(app.attribute("max-message-size"), Some(Some("262144")));
}

#[test]
fn test_marshal_unmarshal_symmetry() {
    let sd = SessionDescription::unmarshal(CHROME_OFFER).unwrap();
    let remarshaled = sd.marshal();
    let reparsed = SessionDescription::unmarshal(&remarshaled).unwrap();
    assert_eq!(reparsed, sd);
}

#[test]
fn test_unmarshal_rejects_garbage() {
    assert!(SessionDescription::unmarshal("").is_err());
    assert!(SessionDescription::unmarshal("nonsense").is_err());
}

#[test]
fn test_media_name_display() {
    let sd = SessionDescription::unmarshal(CHROME_OFFER).unwrap();
    assert_eq!(
        sd.media_descriptions[0].media_name.to_string(),
        "audio 9 UDP/TLS/RTP/SAVPF 111"
    );
}

#[test]
fn test_ssrc_group_fid() {
    let raw = "v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\ns=-\r\nt=0 0\r\n\
m=video 9 UDP/TLS/RTP/SAVPF 96 97\r\n\
a=ssrc-group:FID 1111 2222\r\n\
a=ssrc:1111 cname:x\r\na=ssrc:2222 cname:x\r\n";
    let sd = SessionDescription::unmarshal(raw).unwrap();
    assert_eq!(sd.media_descriptions[0].ssrc_group_fid(), Some((1111, 2222)));
}
