use bytes::Bytes;

use super::*;
use crate::chunk::chunk_payload_data::ChunkPayloadData;

fn make_chunk(tsn: u32, len: usize) -> ChunkPayloadData {
    ChunkPayloadData {
        tsn,
        beginning_fragment: true,
        ending_fragment: true,
        user_data: Bytes::from(vec![0u8; len]),
        ..Default::default()
    }
}

#[test]
fn test_push_and_duplicate_detection() {
    let mut q = PayloadQueue::new();
    assert!(q.push(make_chunk(10, 4), 9));
    assert!(!q.push(make_chunk(10, 4), 9), "duplicate TSN");
    assert!(!q.push(make_chunk(5, 4), 9), "at or below cumulative TSN");
    assert_eq!(q.pop_duplicates(), vec![10, 5]);
    assert_eq!(q.len(), 1);
    assert_eq!(q.get_num_bytes(), 4);
}

#[test]
fn test_cumulative_prefix_drop() {
    let mut q = PayloadQueue::new();
    for tsn in 1..=10u32 {
        q.push_no_check(make_chunk(tsn, 1));
    }
    // Pop only pops the head: dropping the prefix below a cumulative ack
    // is a sequence of O(1) head removals.
    for tsn in 1..=7u32 {
        assert!(q.pop(tsn).is_some());
    }
    assert!(q.pop(9).is_none(), "non-head TSN does not pop");
    assert_eq!(q.len(), 3);
    assert_eq!(q.head_tsn(), Some(8));
}

#[test]
fn test_gap_ack_blocks() {
    let mut q = PayloadQueue::new();
    // cumulative = 100; received 102,103,104 and 107.
    for tsn in [102u32, 103, 104, 107] {
        q.push(make_chunk(tsn, 1), 100);
    }
    let gaps = q.get_gap_ack_blocks(100);
    assert_eq!(gaps.len(), 2);
    assert_eq!((gaps[0].start, gaps[0].end), (2, 4));
    assert_eq!((gaps[1].start, gaps[1].end), (7, 7));
}

#[test]
fn test_gap_ack_blocks_out_of_order_arrival() {
    let mut q = PayloadQueue::new();
    for tsn in [107u32, 102, 104, 103] {
        q.push(make_chunk(tsn, 1), 100);
    }
    let gaps = q.get_gap_ack_blocks(100);
    assert_eq!(gaps.len(), 2);
    assert_eq!((gaps[0].start, gaps[0].end), (2, 4));
    assert_eq!((gaps[1].start, gaps[1].end), (7, 7));
}

#[test]
fn test_mark_as_acked_releases_bytes() {
    let mut q = PayloadQueue::new();
    q.push_no_check(make_chunk(1, 100));
    q.push_no_check(make_chunk(2, 50));
    assert_eq!(q.get_num_bytes(), 150);
    assert_eq!(q.mark_as_acked(2), 50);
    assert_eq!(q.get_num_bytes(), 100);
    assert!(q.get(2).unwrap().acked);
}

#[test]
fn test_tsn_wraparound_ordering() {
    let mut q = PayloadQueue::new();
    q.push(make_chunk(u32::MAX, 1), u32::MAX - 2);
    q.push(make_chunk(0, 1), u32::MAX - 2);
    assert_eq!(q.head_tsn(), Some(u32::MAX));
    let gaps = q.get_gap_ack_blocks(u32::MAX - 2);
    assert_eq!(gaps.len(), 1);
    assert_eq!((gaps[0].start, gaps[0].end), (1, 2));
}
