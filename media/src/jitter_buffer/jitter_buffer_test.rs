use rtp::header::Header;
use rtp::packet::Packet;

use super::*;

fn pkt(seq: u16, ts: u32) -> Packet {
    Packet {
        header: Header {
            version: 2,
            sequence_number: seq,
            timestamp: ts,
            ssrc: 1,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn seqs(events: &[JitterBufferEvent]) -> Vec<u16> {
    events
        .iter()
        .filter_map(|e| match e {
            JitterBufferEvent::Packet(p) => Some(p.header.sequence_number),
            _ => None,
        })
        .collect()
}

// 100 ms at 90 kHz.
fn buffer() -> JitterBuffer {
    JitterBuffer::new(100, 90000)
}

#[test]
fn test_in_order_passthrough() {
    let mut jb = buffer();
    let mut delivered = vec![];
    for i in 0..10u16 {
        delivered.extend(jb.push(pkt(i, i as u32 * 3000)));
    }
    assert_eq!(seqs(&delivered), (0..10).collect::<Vec<u16>>());
    assert!(jb.is_empty());
}

#[test]
fn test_reorder_within_latency() {
    let mut jb = buffer();
    let mut delivered = vec![];
    delivered.extend(jb.push(pkt(0, 0)));
    // 2 arrives before 1, gap is shorter than the latency.
    delivered.extend(jb.push(pkt(2, 6000)));
    delivered.extend(jb.push(pkt(1, 3000)));
    assert_eq!(seqs(&delivered), vec![0, 1, 2]);
    // No losses were declared.
    assert!(delivered
        .iter()
        .all(|e| !matches!(e, JitterBufferEvent::PacketLost { .. })));
}

#[test]
fn test_gap_becomes_packet_lost_after_latency() {
    let mut jb = buffer();
    let mut events = vec![];
    events.extend(jb.push(pkt(0, 0)));
    // Packet 1 and 2 never arrive; 3 arrives, then time passes (newer
    // timestamps) until the gap exceeds 100 ms (9000 ts units).
    events.extend(jb.push(pkt(3, 3000)));
    events.extend(jb.push(pkt(4, 6000)));
    events.extend(jb.push(pkt(5, 13000)));

    let lost: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, JitterBufferEvent::PacketLost { .. }))
        .collect();
    assert_eq!(lost.len(), 1);
    assert_eq!(
        lost[0],
        &JitterBufferEvent::PacketLost { from: 1, to: 2 }
    );
    // The held successors followed the loss marker.
    assert_eq!(seqs(&events), vec![0, 3, 4, 5]);
}

#[test]
fn test_duplicates_dropped_and_counted() {
    let mut jb = buffer();
    jb.push(pkt(0, 0));
    jb.push(pkt(1, 3000));
    assert!(jb.push(pkt(1, 3000)).is_empty());
    assert!(jb.push(pkt(0, 0)).is_empty());
    assert_eq!(jb.duplicates_dropped, 2);
}

#[test]
fn test_seq_wraparound() {
    let mut jb = buffer();
    let mut delivered = vec![];
    delivered.extend(jb.push(pkt(65534, 0)));
    delivered.extend(jb.push(pkt(65535, 3000)));
    delivered.extend(jb.push(pkt(0, 6000)));
    delivered.extend(jb.push(pkt(1, 9000)));
    assert_eq!(seqs(&delivered), vec![65534, 65535, 0, 1]);
}

#[test]
fn test_flush_emits_losses_and_eol() {
    let mut jb = buffer();
    let mut events = vec![];
    events.extend(jb.push(pkt(0, 0)));
    events.extend(jb.push(pkt(2, 3000)));
    events.extend(jb.flush());

    assert_eq!(
        events.last(),
        Some(&JitterBufferEvent::Eol)
    );
    assert!(events
        .iter()
        .any(|e| *e == JitterBufferEvent::PacketLost { from: 1, to: 1 }));
    assert_eq!(seqs(&events), vec![0, 2]);
    assert!(jb.is_empty());
}

#[test]
fn test_overflow_drops_oldest() {
    let mut jb = buffer();
    jb.push(pkt(0, 0));
    // Fill with a persistent gap at 1 so nothing drains.
    for i in 2..600u16 {
        jb.push(pkt(i, 100));
    }
    assert!(jb.packets_dropped_on_overflow > 0);
    assert!(jb.len() <= 512);
}
