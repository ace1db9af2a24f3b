use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{write_chunk_header, ChunkType};
use crate::error::{Error, Result};
use crate::param::{get_padding_size, Param};

pub(crate) const INIT_CHUNK_MIN_LENGTH: usize = 16;

// ChunkInit carries both INIT and INIT-ACK (RFC 4960 §3.3.2/§3.3.3);
// the two differ only in type byte and the ACK's mandatory state cookie.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChunkInit {
    pub is_ack: bool,
    pub initiate_tag: u32,
    pub advertised_receiver_window_credit: u32,
    pub num_outbound_streams: u16,
    pub num_inbound_streams: u16,
    pub initial_tsn: u32,
    pub params: Vec<Param>,
}

impl ChunkInit {
    pub(crate) fn unmarshal(is_ack: bool, value: &Bytes) -> Result<Self> {
        if value.len() < INIT_CHUNK_MIN_LENGTH {
            return Err(Error::ErrChunkValueNotLongEnough);
        }
        let mut buf = &value[..];
        let initiate_tag = buf.get_u32();
        let advertised_receiver_window_credit = buf.get_u32();
        let num_outbound_streams = buf.get_u16();
        let num_inbound_streams = buf.get_u16();
        let initial_tsn = buf.get_u32();

        let mut params = vec![];
        let mut offset = INIT_CHUNK_MIN_LENGTH;
        while offset + 4 <= value.len() {
            let remaining = value.slice(offset..);
            let (param, consumed) = Param::unmarshal(&remaining)?;
            params.push(param);
            if consumed == 0 {
                break;
            }
            offset += consumed;
        }

        Ok(ChunkInit {
            is_ack,
            initiate_tag,
            advertised_receiver_window_credit,
            num_outbound_streams,
            num_inbound_streams,
            initial_tsn,
            params,
        })
    }

    pub(crate) fn marshal_to(&self, buf: &mut BytesMut) {
        let mut value_len = INIT_CHUNK_MIN_LENGTH;
        for p in &self.params {
            let l = p.marshal_size();
            value_len += l + get_padding_size(l);
        }
        // The final parameter carries no trailing padding in the length
        // field, but emitting it padded keeps the packet aligned anyway.
        write_chunk_header(
            buf,
            if self.is_ack {
                ChunkType::InitAck
            } else {
                ChunkType::Init
            },
            0,
            value_len,
        );
        buf.put_u32(self.initiate_tag);
        buf.put_u32(self.advertised_receiver_window_credit);
        buf.put_u16(self.num_outbound_streams);
        buf.put_u16(self.num_inbound_streams);
        buf.put_u32(self.initial_tsn);
        for p in &self.params {
            let start = buf.len();
            p.marshal_to(buf);
            let written = buf.len() - start;
            for _ in 0..get_padding_size(written) {
                buf.put_u8(0);
            }
        }
    }

    // state_cookie returns the STATE COOKIE parameter of an INIT-ACK.
    pub fn state_cookie(&self) -> Option<Bytes> {
        self.params.iter().find_map(|p| match p {
            Param::StateCookie(c) => Some(c.clone()),
            _ => None,
        })
    }

    pub fn supports_forward_tsn(&self) -> bool {
        self.params
            .iter()
            .any(|p| matches!(p, Param::ForwardTsnSupported))
    }
}
