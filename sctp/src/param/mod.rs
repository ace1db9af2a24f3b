#[cfg(test)]
mod param_test;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

pub const PARAM_HEADER_LENGTH: usize = 4;

// ParamType is a SCTP parameter TLV type.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u16)]
pub enum ParamType {
    HeartbeatInfo = 1,
    StateCookie = 7,
    OutSsnResetReq = 13,
    ReconfigResp = 16,
    ForwardTsnSupp = 49152,
    Unknown = 0,
}

impl From<u16> for ParamType {
    fn from(v: u16) -> Self {
        match v {
            1 => ParamType::HeartbeatInfo,
            7 => ParamType::StateCookie,
            13 => ParamType::OutSsnResetReq,
            16 => ParamType::ReconfigResp,
            49152 => ParamType::ForwardTsnSupp,
            _ => ParamType::Unknown,
        }
    }
}

// Param is one decoded parameter TLV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    // HEARTBEAT INFO (RFC 4960 §3.3.5): opaque sender data echoed back.
    HeartbeatInfo(Bytes),
    // STATE COOKIE (RFC 4960 §3.3.3.1): opaque to the peer, MAC'd locally.
    StateCookie(Bytes),
    // OUTGOING SSN RESET REQUEST (RFC 6525 §4.1).
    OutgoingResetRequest(ParamOutgoingResetRequest),
    // RE-CONFIG RESPONSE (RFC 6525 §4.4).
    ReconfigResponse(ParamReconfigResponse),
    // FORWARD-TSN-SUPPORTED (RFC 3758 §3.1).
    ForwardTsnSupported,
    // Anything unrecognized, carried opaquely.
    Unknown { typ: u16, value: Bytes },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParamOutgoingResetRequest {
    pub reconfig_request_sequence_number: u32,
    pub reconfig_response_sequence_number: u32,
    pub sender_last_tsn: u32,
    pub stream_identifiers: Vec<u16>,
}

// Reconfiguration response results (RFC 6525 §4.4).
pub const RECONFIG_RESULT_SUCCESS_PERFORMED: u32 = 1;
pub const RECONFIG_RESULT_DENIED: u32 = 2;
pub const RECONFIG_RESULT_IN_PROGRESS: u32 = 6;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParamReconfigResponse {
    pub reconfig_response_sequence_number: u32,
    pub result: u32,
}

impl Param {
    pub fn param_type(&self) -> u16 {
        match self {
            Param::HeartbeatInfo(_) => ParamType::HeartbeatInfo as u16,
            Param::StateCookie(_) => ParamType::StateCookie as u16,
            Param::OutgoingResetRequest(_) => ParamType::OutSsnResetReq as u16,
            Param::ReconfigResponse(_) => ParamType::ReconfigResp as u16,
            Param::ForwardTsnSupported => ParamType::ForwardTsnSupp as u16,
            Param::Unknown { typ, .. } => *typ,
        }
    }

    fn value_length(&self) -> usize {
        match self {
            Param::HeartbeatInfo(b) | Param::StateCookie(b) => b.len(),
            Param::OutgoingResetRequest(r) => 12 + r.stream_identifiers.len() * 2,
            Param::ReconfigResponse(_) => 8,
            Param::ForwardTsnSupported => 0,
            Param::Unknown { value, .. } => value.len(),
        }
    }

    // marshal_size includes the TLV header but not the trailing padding.
    pub fn marshal_size(&self) -> usize {
        PARAM_HEADER_LENGTH + self.value_length()
    }

    pub fn marshal_to(&self, buf: &mut BytesMut) {
        buf.put_u16(self.param_type());
        buf.put_u16(self.marshal_size() as u16);
        match self {
            Param::HeartbeatInfo(b) | Param::StateCookie(b) => buf.put_slice(b),
            Param::OutgoingResetRequest(r) => {
                buf.put_u32(r.reconfig_request_sequence_number);
                buf.put_u32(r.reconfig_response_sequence_number);
                buf.put_u32(r.sender_last_tsn);
                for sid in &r.stream_identifiers {
                    buf.put_u16(*sid);
                }
            }
            Param::ReconfigResponse(r) => {
                buf.put_u32(r.reconfig_response_sequence_number);
                buf.put_u32(r.result);
            }
            Param::ForwardTsnSupported => {}
            Param::Unknown { value, .. } => buf.put_slice(value),
        }
    }

    // unmarshal reads one TLV, returning the parameter and the bytes
    // consumed including padding.
    pub fn unmarshal(raw: &Bytes) -> Result<(Param, usize)> {
        if raw.len() < PARAM_HEADER_LENGTH {
            return Err(Error::ErrParamHeaderTooShort);
        }
        let mut buf = &raw[..];
        let typ = buf.get_u16();
        let length = buf.get_u16() as usize;
        if length < PARAM_HEADER_LENGTH {
            return Err(Error::ErrParamHeaderSelfReportedLengthShorter);
        }
        if length > raw.len() {
            return Err(Error::ErrParamHeaderSelfReportedLengthLonger);
        }

        let value = raw.slice(PARAM_HEADER_LENGTH..length);
        let param = match ParamType::from(typ) {
            ParamType::HeartbeatInfo => Param::HeartbeatInfo(value),
            ParamType::StateCookie => Param::StateCookie(value),
            ParamType::OutSsnResetReq => {
                if value.len() < 12 {
                    return Err(Error::ErrParamHeaderTooShort);
                }
                let mut v = &value[..];
                let reconfig_request_sequence_number = v.get_u32();
                let reconfig_response_sequence_number = v.get_u32();
                let sender_last_tsn = v.get_u32();
                let mut stream_identifiers = vec![];
                while v.remaining() >= 2 {
                    stream_identifiers.push(v.get_u16());
                }
                Param::OutgoingResetRequest(ParamOutgoingResetRequest {
                    reconfig_request_sequence_number,
                    reconfig_response_sequence_number,
                    sender_last_tsn,
                    stream_identifiers,
                })
            }
            ParamType::ReconfigResp => {
                if value.len() < 8 {
                    return Err(Error::ErrParamHeaderTooShort);
                }
                let mut v = &value[..];
                Param::ReconfigResponse(ParamReconfigResponse {
                    reconfig_response_sequence_number: v.get_u32(),
                    result: v.get_u32(),
                })
            }
            ParamType::ForwardTsnSupp => Param::ForwardTsnSupported,
            ParamType::Unknown => Param::Unknown { typ, value },
        };

        // TLVs are padded to 4-byte boundaries.
        let padded = (length + 3) & !3;
        Ok((param, padded.min(raw.len())))
    }
}

// get_padding_size returns the pad bytes needed after len.
pub(crate) fn get_padding_size(len: usize) -> usize {
    (4 - (len % 4)) % 4
}
