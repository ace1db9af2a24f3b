use super::*;

#[test]
fn test_parse_uri() {
    let tests = vec![
        (
            "stun:example.org",
            Uri {
                scheme: SchemeType::Stun,
                host: "example.org".to_owned(),
                port: 3478,
                proto: ProtoType::Udp,
                ..Default::default()
            },
        ),
        (
            "stuns:example.org",
            Uri {
                scheme: SchemeType::Stuns,
                host: "example.org".to_owned(),
                port: 5349,
                proto: ProtoType::Tcp,
                ..Default::default()
            },
        ),
        (
            "turn:example.org:3479?transport=tcp",
            Uri {
                scheme: SchemeType::Turn,
                host: "example.org".to_owned(),
                port: 3479,
                proto: ProtoType::Tcp,
                ..Default::default()
            },
        ),
        (
            "turn:[2001:db8::1]:3478",
            Uri {
                scheme: SchemeType::Turn,
                host: "2001:db8::1".to_owned(),
                port: 3478,
                proto: ProtoType::Udp,
                ..Default::default()
            },
        ),
    ];

    for (raw, expected) in tests {
        let got = Uri::parse_uri(raw).unwrap();
        assert_eq!(got, expected, "{raw}");
    }
}

#[test]
fn test_parse_uri_errors() {
    assert_eq!(Uri::parse_uri("http://example.org"), Err(Error::ErrSchemeType));
    assert_eq!(
        Uri::parse_uri("stun:example.org?transport=udp"),
        Err(Error::ErrStunQuery)
    );
    assert_eq!(
        Uri::parse_uri("turn:example.org?transport=ipx"),
        Err(Error::ErrProtoType)
    );
    assert_eq!(Uri::parse_uri("turn:example.org:notaport"), Err(Error::ErrPort));
}
