use super::candidate_pair::*;
use super::*;

#[test]
fn test_candidate_priority_formula() {
    let host = Candidate::new(
        CandidateType::Host,
        NetworkType::Udp4,
        "192.168.1.2".to_owned(),
        5000,
        COMPONENT_RTP,
        None,
    );
    assert_eq!(
        host.priority,
        (1 << 24) * 126 + (1 << 8) * 65535 + 255
    );

    let relay = Candidate::new(
        CandidateType::Relay,
        NetworkType::Udp4,
        "198.51.100.1".to_owned(),
        3478,
        COMPONENT_RTP,
        Some(("192.0.2.1".to_owned(), 44444)),
    );
    assert!(relay.priority < host.priority);
}

#[test]
fn test_candidate_marshal_roundtrip() {
    let c = Candidate::new(
        CandidateType::ServerReflexive,
        NetworkType::Udp4,
        "203.0.113.5".to_owned(),
        61000,
        COMPONENT_RTP,
        Some(("192.168.1.2".to_owned(), 5000)),
    );
    let raw = c.marshal();
    let parsed = Candidate::unmarshal(&raw).unwrap();
    assert_eq!(parsed.candidate_type, c.candidate_type);
    assert_eq!(parsed.address, c.address);
    assert_eq!(parsed.port, c.port);
    assert_eq!(parsed.priority, c.priority);
    assert_eq!(parsed.foundation, c.foundation);
    assert_eq!(
        parsed.related_address,
        Some(("192.168.1.2".to_owned(), 5000))
    );
}

#[test]
fn test_candidate_unmarshal_browser_line() {
    let raw = "848545101 1 udp 1677729535 203.0.113.86 61665 typ srflx raddr 192.168.86.24 rport 61665";
    let c = Candidate::unmarshal(raw).unwrap();
    assert_eq!(c.candidate_type, CandidateType::ServerReflexive);
    assert_eq!(c.priority, 1677729535);
    assert_eq!(c.port, 61665);
    assert_eq!(c.related_address, Some(("192.168.86.24".to_owned(), 61665)));
}

#[test]
fn test_candidate_unmarshal_rejects_malformed() {
    assert!(Candidate::unmarshal("too short").is_err());
    assert!(Candidate::unmarshal("1 1 udp nope 1.2.3.4 5 typ host").is_err());
    assert!(Candidate::unmarshal("1 1 udp 1 1.2.3.4 5 typ alien").is_err());
}

#[test]
fn test_same_foundation_for_same_base() {
    let a = Candidate::new(
        CandidateType::Host,
        NetworkType::Udp4,
        "192.168.1.2".to_owned(),
        5000,
        COMPONENT_RTP,
        None,
    );
    let b = Candidate::new(
        CandidateType::Host,
        NetworkType::Udp4,
        "192.168.1.2".to_owned(),
        6000,
        COMPONENT_RTP,
        None,
    );
    assert_eq!(a.foundation, b.foundation, "ports do not affect foundation");

    let other_type = Candidate::new(
        CandidateType::Relay,
        NetworkType::Udp4,
        "192.168.1.2".to_owned(),
        5000,
        COMPONENT_RTP,
        None,
    );
    assert_ne!(a.foundation, other_type.foundation);
}

#[test]
fn test_pair_priority_symmetry() {
    let local = Candidate::new(
        CandidateType::Host,
        NetworkType::Udp4,
        "192.168.1.2".to_owned(),
        5000,
        COMPONENT_RTP,
        None,
    );
    let remote = Candidate::new(
        CandidateType::ServerReflexive,
        NetworkType::Udp4,
        "203.0.113.5".to_owned(),
        61000,
        COMPONENT_RTP,
        Some(("10.0.0.1".to_owned(), 4000)),
    );
    let pair = CandidatePair::new(local.clone(), remote.clone());
    let mirrored = CandidatePair::new(remote, local);

    // Both sides agree on the pair priority regardless of role.
    assert_eq!(pair.priority(true), mirrored.priority(false));
    assert_eq!(pair.priority(false), mirrored.priority(true));
}
