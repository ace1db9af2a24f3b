#[cfg(test)]
mod transport_cc_extension_test {
    use bytes::Bytes;
    use util::marshal::{Marshal, Unmarshal};

    use super::*;

    #[test]
    fn test_transport_cc_extension_roundtrip() {
        let ext = TransportCcExtension {
            transport_sequence: 0xBEEF,
        };
        let raw = ext.marshal().unwrap();
        assert_eq!(raw, Bytes::from_static(&[0xBE, 0xEF]));
        let mut buf = &raw[..];
        assert_eq!(TransportCcExtension::unmarshal(&mut buf).unwrap(), ext);
    }
}

use bytes::{Buf, BufMut};
use util::marshal::{Marshal, MarshalSize, Unmarshal};

use crate::error::Error;

pub const TRANSPORT_CC_EXTENSION_SIZE: usize = 2;

// TransportCcExtension is the transport-wide sequence number header
// extension payload:
//
//  0                   1
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |       transport-wide seq      |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(PartialEq, Eq, Debug, Default, Copy, Clone)]
pub struct TransportCcExtension {
    pub transport_sequence: u16,
}

impl MarshalSize for TransportCcExtension {
    fn marshal_size(&self) -> usize {
        TRANSPORT_CC_EXTENSION_SIZE
    }
}

impl Marshal for TransportCcExtension {
    fn marshal_to(&self, mut buf: &mut [u8]) -> std::result::Result<usize, util::Error> {
        if buf.remaining_mut() < TRANSPORT_CC_EXTENSION_SIZE {
            return Err(Error::ErrBufferTooSmall.into());
        }
        buf.put_u16(self.transport_sequence);
        Ok(TRANSPORT_CC_EXTENSION_SIZE)
    }
}

impl Unmarshal for TransportCcExtension {
    fn unmarshal<B>(raw_packet: &mut B) -> std::result::Result<Self, util::Error>
    where
        B: Buf,
    {
        if raw_packet.remaining() < TRANSPORT_CC_EXTENSION_SIZE {
            return Err(Error::ErrTooSmall.into());
        }
        Ok(TransportCcExtension {
            transport_sequence: raw_packet.get_u16(),
        })
    }
}
