// DataChannelAck is the DATA_CHANNEL_ACK message (RFC 8832 §5.2): a bare
// type byte confirming channel establishment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataChannelAck {}
