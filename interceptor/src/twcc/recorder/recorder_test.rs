use super::*;

fn reconstruct(cc: &TransportLayerCc) -> Vec<(u16, Option<i64>)> {
    // Walk chunks and deltas the way a congestion controller would,
    // rebuilding per-packet arrival offsets from the reference time.
    let mut out = vec![];
    let mut deltas = cc.recv_deltas.iter();
    let mut arrival = cc.reference_time as i64 * 64_000;
    let mut seq = cc.base_sequence_number;
    let mut covered = 0u16;

    for chunk in &cc.packet_chunks {
        for symbol in chunk.symbols() {
            if covered >= cc.packet_status_count {
                break;
            }
            covered += 1;
            match symbol {
                SymbolTypeTcc::PacketReceivedSmallDelta
                | SymbolTypeTcc::PacketReceivedLargeDelta => {
                    let d = deltas.next().expect("delta for received symbol");
                    arrival += d.delta;
                    out.push((seq, Some(arrival)));
                }
                _ => out.push((seq, None)),
            }
            seq = seq.wrapping_add(1);
        }
    }
    out
}

#[test]
fn test_feedback_reports_all_received() {
    let mut r = Recorder::new(1);
    let base_us = 2 * 64_000;
    for i in 0..60i64 {
        // 20 ms cadence.
        r.record(0xCAFE, i as u16, base_us + i * 20_000);
    }
    let cc = r.build_feedback().unwrap();
    assert_eq!(cc.media_ssrc, 0xCAFE);
    assert_eq!(cc.base_sequence_number, 0);
    assert_eq!(cc.packet_status_count, 60);

    let rebuilt = reconstruct(&cc);
    assert_eq!(rebuilt.len(), 60);
    for (i, (seq, arrival)) in rebuilt.iter().enumerate() {
        assert_eq!(*seq as usize, i);
        let arrival = arrival.expect("received");
        let expected = base_us + i as i64 * 20_000;
        // Deltas are quantized to 250 us steps.
        assert!((arrival - expected).abs() <= 250, "packet {i}: {arrival} vs {expected}");
    }
}

#[test]
fn test_feedback_marks_losses() {
    let mut r = Recorder::new(1);
    for i in [0u16, 1, 2, 5, 6] {
        r.record(7, i, 64_000 + i as i64 * 1000);
    }
    let cc = r.build_feedback().unwrap();
    assert_eq!(cc.packet_status_count, 7);
    let rebuilt = reconstruct(&cc);
    assert!(rebuilt[3].1.is_none());
    assert!(rebuilt[4].1.is_none());
    assert!(rebuilt[5].1.is_some());
}

#[test]
fn test_feedback_packet_count_increments() {
    let mut r = Recorder::new(1);
    r.record(7, 0, 64_000);
    let first = r.build_feedback().unwrap();
    r.record(7, 1, 65_000);
    let second = r.build_feedback().unwrap();
    assert_eq!(first.fb_pkt_count, 0);
    assert_eq!(second.fb_pkt_count, 1);
    assert_eq!(second.base_sequence_number, 1);
}

#[test]
fn test_no_feedback_when_idle() {
    let mut r = Recorder::new(1);
    assert!(r.build_feedback().is_none());
    r.record(7, 0, 64_000);
    assert!(r.build_feedback().is_some());
    // Nothing new since the last feedback.
    assert!(r.build_feedback().is_none());
}

#[test]
fn test_run_length_used_for_long_runs() {
    let mut r = Recorder::new(1);
    for i in 0..40u16 {
        r.record(7, i, 64_000 + i as i64 * 250);
    }
    let cc = r.build_feedback().unwrap();
    assert!(cc
        .packet_chunks
        .iter()
        .any(|c| matches!(c, PacketStatusChunk::RunLengthChunk(_))));
}
