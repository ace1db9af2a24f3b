use bytes::{Bytes, BytesMut};
use util::marshal::{Marshal, Unmarshal};

use super::*;
use crate::option::{srtcp_replay_protection, srtp_replay_protection};

const MASTER_KEY: [u8; 16] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
    0x0f,
];
const MASTER_SALT_CM: [u8; 14] = [
    0xa0, 0xa1, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7, 0xa8, 0xa9, 0xaa, 0xab, 0xac, 0xad,
];
const MASTER_SALT_GCM: [u8; 12] = [
    0xa0, 0xa1, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7, 0xa8, 0xa9, 0xaa, 0xab,
];

fn rtp_packet(ssrc: u32, seq: u16, with_extension: bool) -> Bytes {
    let mut header = rtp::header::Header {
        version: 2,
        payload_type: 96,
        sequence_number: seq,
        timestamp: 3000,
        ssrc,
        ..Default::default()
    };
    if with_extension {
        header.set_extension(5, &[0xde, 0xad]).unwrap();
    }
    let packet = rtp::packet::Packet {
        header,
        payload: Bytes::from_static(&[0x11, 0x22, 0x33, 0x44, 0x55]),
        padding_size: 0,
    };
    packet.marshal().unwrap()
}

fn pair(profile: ProtectionProfile, salt: &[u8]) -> (Context, Context) {
    let send = Context::new(&MASTER_KEY, salt, profile, None, None).unwrap();
    let recv = Context::new(
        &MASTER_KEY,
        salt,
        profile,
        Some(srtp_replay_protection(64)),
        Some(srtcp_replay_protection(64)),
    )
    .unwrap();
    (send, recv)
}

#[test]
fn test_rtp_roundtrip_aes_cm() {
    let (mut send, mut recv) = pair(ProtectionProfile::Aes128CmHmacSha1_80, &MASTER_SALT_CM);
    let plaintext = rtp_packet(0xCAFEBABE, 5000, false);
    let encrypted = send.encrypt_rtp(&plaintext).unwrap();
    assert_ne!(encrypted, plaintext);
    assert_eq!(encrypted.len(), plaintext.len() + 10);

    let decrypted = recv.decrypt_rtp(&encrypted).unwrap();
    assert_eq!(decrypted, plaintext);
}

#[test]
fn test_rtp_roundtrip_aes_gcm_with_extension() {
    // The extension header is part of the AAD; the round-trip fails if it
    // is not included.
    let (mut send, mut recv) = pair(ProtectionProfile::AeadAes128Gcm, &MASTER_SALT_GCM);
    let plaintext = rtp_packet(0xCAFEBABE, 5000, true);
    let encrypted = send.encrypt_rtp(&plaintext).unwrap();
    assert_eq!(encrypted.len(), plaintext.len() + 16);

    let decrypted = recv.decrypt_rtp(&encrypted).unwrap();
    assert_eq!(decrypted, plaintext);
}

#[test]
fn test_rtp_gcm_tamper_detected() {
    let (mut send, mut recv) = pair(ProtectionProfile::AeadAes128Gcm, &MASTER_SALT_GCM);
    let plaintext = rtp_packet(1, 1, true);
    let encrypted = send.encrypt_rtp(&plaintext).unwrap();

    let mut tampered = BytesMut::from(&encrypted[..]);
    let n = tampered.len();
    tampered[n - 1] ^= 0xFF;
    assert_eq!(
        recv.decrypt_rtp(&tampered),
        Err(Error::FailedToVerifyAuthTag)
    );
}

#[test]
fn test_rtp_replay_rejected_and_no_state_commit_on_failure() {
    let (mut send, mut recv) = pair(ProtectionProfile::Aes128CmHmacSha1_80, &MASTER_SALT_CM);
    let plaintext = rtp_packet(7, 100, false);
    let encrypted = send.encrypt_rtp(&plaintext).unwrap();

    recv.decrypt_rtp(&encrypted).unwrap();
    // Identical packet is a replay.
    assert_eq!(recv.decrypt_rtp(&encrypted), Err(Error::DuplicatedPacket));

    // A packet that fails auth must not pollute the replay window.
    let p2 = send.encrypt_rtp(&rtp_packet(7, 101, false)).unwrap();
    let mut corrupted = BytesMut::from(&p2[..]);
    let n = corrupted.len();
    corrupted[n - 1] ^= 0x01;
    assert_eq!(
        recv.decrypt_rtp(&corrupted),
        Err(Error::FailedToVerifyAuthTag)
    );
    // The pristine packet still decrypts.
    recv.decrypt_rtp(&p2).unwrap();
}

#[test]
fn test_rtp_seq_wrap_increments_roc() {
    let (mut send, mut recv) = pair(ProtectionProfile::Aes128CmHmacSha1_80, &MASTER_SALT_CM);

    let p1 = send.encrypt_rtp(&rtp_packet(9, 65535, false)).unwrap();
    let p2 = send.encrypt_rtp(&rtp_packet(9, 0, false)).unwrap();
    assert_eq!(send.get_roc(9), Some(1), "ROC increments exactly once on wrap");

    recv.decrypt_rtp(&p1).unwrap();
    recv.decrypt_rtp(&p2).unwrap();
    assert_eq!(recv.get_roc(9), Some(1));
}

#[test]
fn test_rtcp_roundtrip_and_replay() {
    let (mut send, mut recv) = pair(ProtectionProfile::Aes128CmHmacSha1_80, &MASTER_SALT_CM);

    let pli = rtcp::payload_feedbacks::picture_loss_indication::PictureLossIndication {
        sender_ssrc: 0x11223344,
        media_ssrc: 0x55667788,
    };
    let plaintext = pli.marshal().unwrap();

    let encrypted = send.encrypt_rtcp(&plaintext).unwrap();
    let decrypted = recv.decrypt_rtcp(&encrypted).unwrap();
    assert_eq!(&decrypted[..], &plaintext[..]);

    let mut buf = &decrypted[..];
    let decoded =
        rtcp::payload_feedbacks::picture_loss_indication::PictureLossIndication::unmarshal(
            &mut buf,
        )
        .unwrap();
    assert_eq!(decoded, pli);

    assert_eq!(recv.decrypt_rtcp(&encrypted), Err(Error::DuplicatedPacket));
}

#[test]
fn test_rtcp_roundtrip_gcm() {
    let (mut send, mut recv) = pair(ProtectionProfile::AeadAes128Gcm, &MASTER_SALT_GCM);
    let pli = rtcp::payload_feedbacks::picture_loss_indication::PictureLossIndication {
        sender_ssrc: 1,
        media_ssrc: 2,
    };
    let plaintext = pli.marshal().unwrap();
    let encrypted = send.encrypt_rtcp(&plaintext).unwrap();
    let decrypted = recv.decrypt_rtcp(&encrypted).unwrap();
    assert_eq!(&decrypted[..], &plaintext[..]);
}

#[test]
fn test_key_length_validation() {
    assert!(Context::new(
        &MASTER_KEY[..15],
        &MASTER_SALT_CM,
        ProtectionProfile::Aes128CmHmacSha1_80,
        None,
        None
    )
    .is_err());
    assert!(Context::new(
        &MASTER_KEY,
        &MASTER_SALT_CM[..13],
        ProtectionProfile::Aes128CmHmacSha1_80,
        None,
        None
    )
    .is_err());
}
