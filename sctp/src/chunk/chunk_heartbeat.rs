use bytes::{Bytes, BytesMut};

use super::{write_chunk_header, ChunkType};
use crate::error::{Error, Result};
use crate::param::{Param, PARAM_HEADER_LENGTH};

// ChunkHeartbeat (RFC 4960 §3.3.5) carries opaque heartbeat info the
// peer must echo in its HEARTBEAT-ACK.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChunkHeartbeat {
    pub heartbeat_info: Bytes,
}

impl ChunkHeartbeat {
    pub(crate) fn unmarshal(value: &Bytes) -> Result<Self> {
        let (param, _) = Param::unmarshal(value).map_err(|_| Error::ErrHeartbeatNotLongEnoughInfo)?;
        match param {
            Param::HeartbeatInfo(info) => Ok(ChunkHeartbeat {
                heartbeat_info: info,
            }),
            _ => Err(Error::ErrHeartbeatNotLongEnoughInfo),
        }
    }

    pub(crate) fn marshal_to(&self, buf: &mut BytesMut) {
        let value_len = PARAM_HEADER_LENGTH + self.heartbeat_info.len();
        write_chunk_header(buf, ChunkType::Heartbeat, 0, value_len);
        Param::HeartbeatInfo(self.heartbeat_info.clone()).marshal_to(buf);
    }
}

// ChunkHeartbeatAck echoes the heartbeat info back (RFC 4960 §3.3.6).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChunkHeartbeatAck {
    pub heartbeat_info: Bytes,
}

impl ChunkHeartbeatAck {
    pub(crate) fn unmarshal(value: &Bytes) -> Result<Self> {
        let (param, _) = Param::unmarshal(value).map_err(|_| Error::ErrHeartbeatNotLongEnoughInfo)?;
        match param {
            Param::HeartbeatInfo(info) => Ok(ChunkHeartbeatAck {
                heartbeat_info: info,
            }),
            _ => Err(Error::ErrHeartbeatNotLongEnoughInfo),
        }
    }

    pub(crate) fn marshal_to(&self, buf: &mut BytesMut) {
        let value_len = PARAM_HEADER_LENGTH + self.heartbeat_info.len();
        write_chunk_header(buf, ChunkType::HeartbeatAck, 0, value_len);
        Param::HeartbeatInfo(self.heartbeat_info.clone()).marshal_to(buf);
    }
}
