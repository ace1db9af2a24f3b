use super::*;

#[test]
fn test_fingerprint_check() {
    let mut m = Message::new();
    m.set_type(BINDING_REQUEST);
    m.new_transaction_id();
    m.add(ATTR_SOFTWARE, b"software");
    FINGERPRINT.add_to(&mut m).unwrap();

    let mut decoded = Message::new();
    decoded.write(&m.raw).unwrap();
    FINGERPRINT.check(&decoded).unwrap();
}

#[test]
fn test_fingerprint_check_bad() {
    let mut m = Message::new();
    m.set_type(BINDING_REQUEST);
    m.new_transaction_id();
    m.add(ATTR_SOFTWARE, b"software");
    FINGERPRINT.add_to(&mut m).unwrap();

    let mut raw = m.raw.clone();
    raw[MESSAGE_HEADER_SIZE + 2] ^= 0x01;
    let mut tampered = Message::new();
    tampered.write(&raw).unwrap();
    assert_eq!(
        FINGERPRINT.check(&tampered),
        Err(Error::ErrFingerprintMismatch)
    );
}

#[test]
fn test_fingerprint_absent() {
    let mut m = Message::new();
    m.set_type(BINDING_REQUEST);
    m.new_transaction_id();
    assert_eq!(FINGERPRINT.check(&m), Err(Error::ErrAttributeNotFound));
}
