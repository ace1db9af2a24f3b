use super::*;

#[test]
fn test_red_primary_only_roundtrip() {
    let primary = RedBlock {
        payload_type: 111,
        timestamp_offset: 0,
        payload: Bytes::from_static(&[0x01, 0x02, 0x03]),
    };
    let encoded = encode(&[], &primary).unwrap();
    assert_eq!(encoded[0], 111, "single primary header byte, F clear");

    let blocks = decode(&encoded).unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0], primary);
}

#[test]
fn test_red_with_redundancy_roundtrip() {
    let redundant = vec![
        RedBlock {
            payload_type: 111,
            timestamp_offset: 1920,
            payload: Bytes::from_static(&[0xAA, 0xBB]),
        },
        RedBlock {
            payload_type: 111,
            timestamp_offset: 960,
            payload: Bytes::from_static(&[0xCC]),
        },
    ];
    let primary = RedBlock {
        payload_type: 111,
        timestamp_offset: 0,
        payload: Bytes::from_static(&[0xDD, 0xEE]),
    };
    let encoded = encode(&redundant, &primary).unwrap();
    let blocks = decode(&encoded).unwrap();
    assert_eq!(blocks.len(), 3);
    assert_eq!(blocks[0], redundant[0]);
    assert_eq!(blocks[1], redundant[1]);
    assert_eq!(blocks[2], primary);
}

#[test]
fn test_red_decode_truncated() {
    // F bit promises 4 header bytes that are not there.
    assert_eq!(
        decode(&Bytes::from_static(&[0x80, 0x00])),
        Err(Error::ErrRedHeaderTruncated)
    );
    // Block length overruns the payload.
    assert_eq!(
        decode(&Bytes::from_static(&[0xEF, 0x00, 0x00, 0x09, 0x6F, 0xAA])),
        Err(Error::ErrRedBlockOverrun)
    );
}

#[test]
fn test_red_encoder_distance() {
    let mut enc = RedEncoder::new(2);
    enc.push(111, 0, Bytes::from_static(&[0x01])).unwrap();
    enc.push(111, 960, Bytes::from_static(&[0x02])).unwrap();
    let third = enc.push(111, 1920, Bytes::from_static(&[0x03])).unwrap();

    let blocks = decode(&third).unwrap();
    // Two redundant generations plus the primary.
    assert_eq!(blocks.len(), 3);
    assert_eq!(blocks[0].timestamp_offset, 1920);
    assert_eq!(blocks[1].timestamp_offset, 960);
    assert_eq!(blocks[2].payload, Bytes::from_static(&[0x03]));

    // Distance cap: the oldest generation ages out.
    let fourth = enc.push(111, 2880, Bytes::from_static(&[0x04])).unwrap();
    let blocks = decode(&fourth).unwrap();
    assert_eq!(blocks.len(), 3);
    assert_eq!(blocks[0].payload, Bytes::from_static(&[0x02]));
}
