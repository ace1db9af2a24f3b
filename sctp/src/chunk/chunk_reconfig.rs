use bytes::{Bytes, BytesMut};

use super::{write_chunk_header, ChunkType};
use crate::error::{Error, Result};
use crate::param::{get_padding_size, Param};

// ChunkReconfig carries up to two RE-CONFIG parameters (RFC 6525 §3.1),
// used here for outgoing SSN reset requests and their responses.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChunkReconfig {
    pub param_a: Option<Param>,
    pub param_b: Option<Param>,
}

impl ChunkReconfig {
    pub(crate) fn unmarshal(value: &Bytes) -> Result<Self> {
        let (param_a, consumed) = Param::unmarshal(value)?;
        let param_b = if consumed < value.len() {
            let remaining = value.slice(consumed..);
            if remaining.len() >= 4 {
                Some(Param::unmarshal(&remaining)?.0)
            } else {
                None
            }
        } else {
            None
        };
        if !matches!(
            param_a,
            Param::OutgoingResetRequest(_) | Param::ReconfigResponse(_)
        ) {
            return Err(Error::ErrChunkTypeNotReconfig);
        }
        Ok(ChunkReconfig {
            param_a: Some(param_a),
            param_b,
        })
    }

    pub(crate) fn marshal_to(&self, buf: &mut BytesMut) {
        let mut value_len = 0;
        if let Some(a) = &self.param_a {
            let l = a.marshal_size();
            value_len += l + get_padding_size(l);
        }
        if let Some(b) = &self.param_b {
            value_len += b.marshal_size();
        }
        write_chunk_header(buf, ChunkType::Reconfig, 0, value_len);
        if let Some(a) = &self.param_a {
            let start = buf.len();
            a.marshal_to(buf);
            let written = buf.len() - start;
            for _ in 0..get_padding_size(written) {
                buf.extend_from_slice(&[0]);
            }
        }
        if let Some(b) = &self.param_b {
            b.marshal_to(buf);
        }
    }
}
