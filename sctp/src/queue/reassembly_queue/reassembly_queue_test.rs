use bytes::Bytes;

use super::*;

fn frag(
    tsn: u32,
    ssn: u16,
    b: bool,
    e: bool,
    unordered: bool,
    data: &'static [u8],
) -> ChunkPayloadData {
    ChunkPayloadData {
        tsn,
        stream_identifier: 0,
        stream_sequence_number: ssn,
        beginning_fragment: b,
        ending_fragment: e,
        unordered,
        payload_type: PayloadProtocolIdentifier::Binary,
        user_data: Bytes::from_static(data),
        ..Default::default()
    }
}

#[test]
fn test_ordered_single_fragment_delivery() {
    let mut q = ReassemblyQueue::new(0);
    assert!(q.push(frag(1, 0, true, true, false, b"hello")));
    let (data, ppi) = q.read().unwrap();
    assert_eq!(&data[..], b"hello");
    assert_eq!(ppi, PayloadProtocolIdentifier::Binary);
    assert!(q.read().is_none());
}

#[test]
fn test_ordered_fragmented_message() {
    let mut q = ReassemblyQueue::new(0);
    q.push(frag(1, 0, true, false, false, b"he"));
    assert!(q.read().is_none(), "incomplete message must not deliver");
    q.push(frag(2, 0, false, false, false, b"ll"));
    q.push(frag(3, 0, false, true, false, b"o"));
    let (data, _) = q.read().unwrap();
    assert_eq!(&data[..], b"hello");
}

#[test]
fn test_ordered_delivery_waits_for_ssn_turn() {
    let mut q = ReassemblyQueue::new(0);
    // SSN 1 arrives complete before SSN 0.
    q.push(frag(2, 1, true, true, false, b"second"));
    assert!(q.read().is_none(), "ssn 1 must wait for ssn 0");
    q.push(frag(1, 0, true, true, false, b"first"));
    assert_eq!(&q.read().unwrap().0[..], b"first");
    assert_eq!(&q.read().unwrap().0[..], b"second");
}

#[test]
fn test_unordered_delivers_on_completion() {
    let mut q = ReassemblyQueue::new(0);
    q.push(frag(10, 99, true, false, true, b"un"));
    assert!(q.read().is_none());
    q.push(frag(11, 99, false, true, true, b"ordered"));
    assert_eq!(&q.read().unwrap().0[..], b"unordered");
}

#[test]
fn test_unordered_out_of_order_fragments() {
    let mut q = ReassemblyQueue::new(0);
    q.push(frag(11, 0, false, true, true, b"b"));
    q.push(frag(10, 0, true, false, true, b"a"));
    assert_eq!(&q.read().unwrap().0[..], b"ab");
}

#[test]
fn test_forward_tsn_skips_abandoned_ordered() {
    let mut q = ReassemblyQueue::new(0);
    // SSN 0 was abandoned by the sender; SSN 1 is complete.
    q.push(frag(5, 1, true, true, false, b"kept"));
    assert!(q.read().is_none());
    q.forward_tsn_for_ordered(0);
    assert_eq!(&q.read().unwrap().0[..], b"kept");
}

#[test]
fn test_byte_accounting() {
    let mut q = ReassemblyQueue::new(0);
    q.push(frag(1, 0, true, true, false, b"12345"));
    assert_eq!(q.get_num_bytes(), 5);
    q.read().unwrap();
    assert_eq!(q.get_num_bytes(), 0);
}
