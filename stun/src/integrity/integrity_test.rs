use super::*;

#[test]
fn test_long_term_key_derivation() {
    // MD5("user:realm:pass") per RFC 5389 §15.4.
    let i = MessageIntegrity::new_long_term_integrity(
        "user".to_owned(),
        "realm".to_owned(),
        "pass".to_owned(),
    );
    assert_eq!(i.0.len(), 16);

    let again = MessageIntegrity::new_long_term_integrity(
        "user".to_owned(),
        "realm".to_owned(),
        "pass".to_owned(),
    );
    assert_eq!(i.0, again.0);

    let other = MessageIntegrity::new_long_term_integrity(
        "user".to_owned(),
        "realm".to_owned(),
        "word".to_owned(),
    );
    assert_ne!(i.0, other.0);
}

#[test]
fn test_integrity_rejects_tamper() {
    let key = MessageIntegrity::new_short_term_integrity("secret".to_owned());
    let mut m = Message::new();
    m.set_type(BINDING_REQUEST);
    m.new_transaction_id();
    m.add(ATTR_SOFTWARE, b"tamper-me");
    key.add_to(&mut m).unwrap();

    let mut decoded = Message::new();
    decoded.write(&m.raw).unwrap();
    key.check(&mut decoded).unwrap();

    // Flip a byte inside the SOFTWARE value.
    let mut raw = m.raw.clone();
    raw[MESSAGE_HEADER_SIZE + ATTRIBUTE_HEADER_SIZE] ^= 0xff;
    let mut tampered = Message::new();
    tampered.write(&raw).unwrap();
    assert_eq!(
        key.check(&mut tampered),
        Err(Error::ErrIntegrityMismatch)
    );
}

#[test]
fn test_fingerprint_must_not_precede_integrity() {
    let key = MessageIntegrity::new_short_term_integrity("secret".to_owned());
    let mut m = Message::new();
    m.set_type(BINDING_REQUEST);
    m.new_transaction_id();
    crate::fingerprint::FINGERPRINT.add_to(&mut m).unwrap();
    assert_eq!(
        key.add_to(&mut m),
        Err(Error::ErrFingerprintBeforeIntegrity)
    );
}
