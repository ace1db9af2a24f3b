#[cfg(test)]
mod abs_send_time_extension_test {
    use std::time::Duration;

    use util::marshal::{Marshal, Unmarshal};

    use super::*;

    #[test]
    fn test_abs_send_time_roundtrip() {
        let ext = AbsSendTimeExtension { timestamp: 0x123456 };
        let raw = ext.marshal().unwrap();
        let mut buf = &raw[..];
        assert_eq!(AbsSendTimeExtension::unmarshal(&mut buf).unwrap(), ext);
    }

    #[test]
    fn test_abs_send_time_estimate() {
        // A send time must be recoverable from the 6.18 fixed point
        // representation to within one tick (~3.8 us).
        let send = Duration::from_nanos(984292342342322468);
        let ext = AbsSendTimeExtension::new(send);
        let estimated = ext.estimate(send + Duration::from_millis(10));
        let diff = if estimated > send {
            estimated - send
        } else {
            send - estimated
        };
        assert!(diff < Duration::from_micros(4), "diff {diff:?}");
    }
}

use std::time::Duration;

use bytes::{Buf, BufMut};
use util::marshal::{Marshal, MarshalSize, Unmarshal};

use crate::error::Error;

pub const ABS_SEND_TIME_EXTENSION_SIZE: usize = 3;

// AbsSendTimeExtension is the 24-bit 6.18 fixed point NTP send time
// (http://www.webrtc.org/experiments/rtp-hdrext/abs-send-time).
#[derive(PartialEq, Eq, Debug, Default, Copy, Clone)]
pub struct AbsSendTimeExtension {
    pub timestamp: u64,
}

impl MarshalSize for AbsSendTimeExtension {
    fn marshal_size(&self) -> usize {
        ABS_SEND_TIME_EXTENSION_SIZE
    }
}

impl Marshal for AbsSendTimeExtension {
    fn marshal_to(&self, mut buf: &mut [u8]) -> std::result::Result<usize, util::Error> {
        if buf.remaining_mut() < ABS_SEND_TIME_EXTENSION_SIZE {
            return Err(Error::ErrBufferTooSmall.into());
        }
        buf.put_u8(((self.timestamp & 0xFF0000) >> 16) as u8);
        buf.put_u8(((self.timestamp & 0xFF00) >> 8) as u8);
        buf.put_u8((self.timestamp & 0xFF) as u8);
        Ok(ABS_SEND_TIME_EXTENSION_SIZE)
    }
}

impl Unmarshal for AbsSendTimeExtension {
    fn unmarshal<B>(raw_packet: &mut B) -> std::result::Result<Self, util::Error>
    where
        B: Buf,
    {
        if raw_packet.remaining() < ABS_SEND_TIME_EXTENSION_SIZE {
            return Err(Error::ErrTooSmall.into());
        }
        let b0 = raw_packet.get_u8() as u64;
        let b1 = raw_packet.get_u8() as u64;
        let b2 = raw_packet.get_u8() as u64;
        Ok(AbsSendTimeExtension {
            timestamp: b0 << 16 | b1 << 8 | b2,
        })
    }
}

impl AbsSendTimeExtension {
    // new creates the extension from a wall-clock duration since the unix
    // epoch, truncated to the 6-bit seconds / 18-bit fraction format.
    pub fn new(send_time: Duration) -> Self {
        let seconds = send_time.as_secs();
        let fraction =
            (send_time.subsec_nanos() as u64) * (1u64 << 18) / 1_000_000_000;
        AbsSendTimeExtension {
            timestamp: ((seconds & 0x3F) << 18) | fraction,
        }
    }

    // estimate reconstructs the send time near the given receive time,
    // resolving the 64 s ambiguity of the 6-bit seconds field.
    pub fn estimate(&self, receive: Duration) -> Duration {
        let recv_seconds = receive.as_secs();
        let send_seconds_low = self.timestamp >> 18;
        let mut seconds = (recv_seconds & !0x3F) | send_seconds_low;
        // Pick the 64 s window closest to the receive time.
        if seconds > recv_seconds + 32 {
            seconds = seconds.saturating_sub(64);
        } else if seconds + 32 < recv_seconds {
            seconds += 64;
        }
        let nanos = (self.timestamp & 0x3FFFF) * 1_000_000_000 / (1 << 18);
        Duration::new(seconds, nanos as u32)
    }
}
