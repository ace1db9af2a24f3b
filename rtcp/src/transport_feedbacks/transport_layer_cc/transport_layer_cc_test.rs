use util::marshal::{Marshal, Unmarshal};

use super::*;

#[test]
fn test_run_length_chunk_roundtrip() {
    let chunk = PacketStatusChunk::RunLengthChunk(RunLengthChunk {
        packet_status_symbol: SymbolTypeTcc::PacketReceivedSmallDelta,
        run_length: 200,
    });
    let raw = chunk.marshal().unwrap();
    let mut buf = &raw[..];
    assert_eq!(PacketStatusChunk::unmarshal(&mut buf).unwrap(), chunk);
}

#[test]
fn test_status_vector_chunk_one_bit_roundtrip() {
    let mut symbols = vec![SymbolTypeTcc::PacketNotReceived; 14];
    symbols[0] = SymbolTypeTcc::PacketReceivedSmallDelta;
    symbols[5] = SymbolTypeTcc::PacketReceivedSmallDelta;
    let chunk = PacketStatusChunk::StatusVectorChunk(StatusVectorChunk {
        symbol_size: SymbolSizeTypeTcc::OneBit,
        symbol_list: symbols,
    });
    let raw = chunk.marshal().unwrap();
    let mut buf = &raw[..];
    assert_eq!(PacketStatusChunk::unmarshal(&mut buf).unwrap(), chunk);
}

#[test]
fn test_status_vector_chunk_two_bit_roundtrip() {
    let chunk = PacketStatusChunk::StatusVectorChunk(StatusVectorChunk {
        symbol_size: SymbolSizeTypeTcc::TwoBit,
        symbol_list: vec![
            SymbolTypeTcc::PacketReceivedSmallDelta,
            SymbolTypeTcc::PacketNotReceived,
            SymbolTypeTcc::PacketReceivedLargeDelta,
            SymbolTypeTcc::PacketNotReceived,
            SymbolTypeTcc::PacketReceivedSmallDelta,
            SymbolTypeTcc::PacketNotReceived,
            SymbolTypeTcc::PacketNotReceived,
        ],
    });
    let raw = chunk.marshal().unwrap();
    let mut buf = &raw[..];
    assert_eq!(PacketStatusChunk::unmarshal(&mut buf).unwrap(), chunk);
}

#[test]
fn test_recv_delta_limits() {
    let small = RecvDelta {
        type_tcc_packet: SymbolTypeTcc::PacketReceivedSmallDelta,
        delta: 63750, // 63.75 ms, the upper bound
    };
    let raw = small.marshal().unwrap();
    assert_eq!(raw.len(), 1);

    let too_big = RecvDelta {
        type_tcc_packet: SymbolTypeTcc::PacketReceivedSmallDelta,
        delta: 63750 + 250,
    };
    assert!(too_big.marshal().is_err());

    let large = RecvDelta {
        type_tcc_packet: SymbolTypeTcc::PacketReceivedLargeDelta,
        delta: -8_192_000,
    };
    let raw = large.marshal().unwrap();
    assert_eq!(raw.len(), 2);
}

#[test]
fn test_transport_layer_cc_roundtrip_run_length() {
    let cc = TransportLayerCc {
        sender_ssrc: 4195875351,
        media_ssrc: 1124282272,
        base_sequence_number: 153,
        packet_status_count: 1,
        reference_time: 4057090,
        fb_pkt_count: 23,
        packet_chunks: vec![PacketStatusChunk::RunLengthChunk(RunLengthChunk {
            packet_status_symbol: SymbolTypeTcc::PacketReceivedSmallDelta,
            run_length: 1,
        })],
        recv_deltas: vec![RecvDelta {
            type_tcc_packet: SymbolTypeTcc::PacketReceivedSmallDelta,
            delta: 250,
        }],
    };
    let raw = cc.marshal().unwrap();
    assert_eq!(raw.len() % 4, 0, "padded to a word boundary");
    let mut buf = &raw[..];
    let decoded = TransportLayerCc::unmarshal(&mut buf).unwrap();
    assert_eq!(decoded, cc);
}

#[test]
fn test_transport_layer_cc_roundtrip_mixed_chunks() {
    let mut one_bit = vec![SymbolTypeTcc::PacketNotReceived; 14];
    for (i, s) in one_bit.iter_mut().enumerate() {
        if i % 2 == 0 {
            *s = SymbolTypeTcc::PacketReceivedSmallDelta;
        }
    }
    let n_received_vector = one_bit
        .iter()
        .filter(|s| **s == SymbolTypeTcc::PacketReceivedSmallDelta)
        .count();

    let cc = TransportLayerCc {
        sender_ssrc: 1,
        media_ssrc: 2,
        base_sequence_number: 1000,
        packet_status_count: 14 + 3,
        reference_time: 64,
        fb_pkt_count: 0,
        packet_chunks: vec![
            PacketStatusChunk::StatusVectorChunk(StatusVectorChunk {
                symbol_size: SymbolSizeTypeTcc::OneBit,
                symbol_list: one_bit,
            }),
            PacketStatusChunk::RunLengthChunk(RunLengthChunk {
                packet_status_symbol: SymbolTypeTcc::PacketReceivedLargeDelta,
                run_length: 3,
            }),
        ],
        recv_deltas: {
            let mut deltas = vec![
                RecvDelta {
                    type_tcc_packet: SymbolTypeTcc::PacketReceivedSmallDelta,
                    delta: 500,
                };
                n_received_vector
            ];
            for _ in 0..3 {
                deltas.push(RecvDelta {
                    type_tcc_packet: SymbolTypeTcc::PacketReceivedLargeDelta,
                    delta: -1000,
                });
            }
            deltas
        },
    };
    let raw = cc.marshal().unwrap();
    let mut buf = &raw[..];
    let decoded = TransportLayerCc::unmarshal(&mut buf).unwrap();
    assert_eq!(decoded, cc);
}
