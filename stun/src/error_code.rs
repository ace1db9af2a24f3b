use crate::attributes::*;
use crate::error::{Error, Result};
use crate::message::*;

// ErrorCodeAttribute is the ERROR-CODE attribute (RFC 5389 §15.6): a
// numeric code in the 300-699 range and an associated reason phrase.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ErrorCodeAttribute {
    pub code: ErrorCode,
    pub reason: Vec<u8>,
}

const ERROR_CODE_CLASS_BYTE: usize = 2;
const ERROR_CODE_NUMBER_BYTE: usize = 3;
const ERROR_CODE_REASON_START: usize = 4;
const ERROR_CODE_REASON_MAX_B: usize = 763;
const ERROR_CODE_MODULO: u16 = 100;

impl Setter for ErrorCodeAttribute {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        check_overflow(
            ATTR_ERROR_CODE,
            self.reason.len() + ERROR_CODE_REASON_START,
            ERROR_CODE_REASON_MAX_B + ERROR_CODE_REASON_START,
        )?;

        let number = (self.code.0 % ERROR_CODE_MODULO) as u8;
        let class = (self.code.0 / ERROR_CODE_MODULO) as u8;

        let mut value = Vec::with_capacity(ERROR_CODE_REASON_START + self.reason.len());
        value.extend_from_slice(&[0, 0, class, number]);
        value.extend_from_slice(&self.reason);
        m.add(ATTR_ERROR_CODE, &value);
        Ok(())
    }
}

impl Getter for ErrorCodeAttribute {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        let v = m.get(ATTR_ERROR_CODE)?;
        if v.len() < ERROR_CODE_REASON_START {
            return Err(Error::ErrUnexpectedEof);
        }
        let class = v[ERROR_CODE_CLASS_BYTE] as u16;
        let number = v[ERROR_CODE_NUMBER_BYTE] as u16;
        self.code = ErrorCode(class * ERROR_CODE_MODULO + number);
        self.reason = v[ERROR_CODE_REASON_START..].to_vec();
        Ok(())
    }
}

// ErrorCode is a code in the ERROR-CODE attribute.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ErrorCode(pub u16);

impl Setter for ErrorCode {
    // add_to adds the error code with its default reason phrase.
    fn add_to(&self, m: &mut Message) -> Result<()> {
        let reason = self.default_reason();
        ErrorCodeAttribute {
            code: *self,
            reason: reason.as_bytes().to_vec(),
        }
        .add_to(m)
    }
}

impl ErrorCode {
    fn default_reason(&self) -> &'static str {
        match *self {
            CODE_TRY_ALTERNATE => "Try Alternate",
            CODE_BAD_REQUEST => "Bad Request",
            CODE_UNAUTHORIZED => "Unauthorized",
            CODE_UNKNOWN_ATTRIBUTE => "Unknown Attribute",
            CODE_STALE_NONCE => "Stale Nonce",
            CODE_ROLE_CONFLICT => "Role Conflict",
            CODE_SERVER_ERROR => "Server Error",
            CODE_FORBIDDEN => "Forbidden",
            CODE_ALLOC_MISMATCH => "Allocation Mismatch",
            CODE_WRONG_CREDENTIALS => "Wrong Credentials",
            CODE_UNSUPPORTED_TRANS_PROTO => "Unsupported Transport Protocol",
            CODE_ALLOC_QUOTA_REACHED => "Allocation Quota Reached",
            CODE_INSUFFICIENT_CAPACITY => "Insufficient Capacity",
            _ => "Unknown Error",
        }
    }
}

// Error codes from RFC 5389 §15.6.
pub const CODE_TRY_ALTERNATE: ErrorCode = ErrorCode(300);
pub const CODE_BAD_REQUEST: ErrorCode = ErrorCode(400);
pub const CODE_UNAUTHORIZED: ErrorCode = ErrorCode(401);
pub const CODE_UNKNOWN_ATTRIBUTE: ErrorCode = ErrorCode(420);
pub const CODE_STALE_NONCE: ErrorCode = ErrorCode(438);
pub const CODE_ROLE_CONFLICT: ErrorCode = ErrorCode(487);
pub const CODE_SERVER_ERROR: ErrorCode = ErrorCode(500);

// Error codes from RFC 5766 §15.
pub const CODE_FORBIDDEN: ErrorCode = ErrorCode(403);
pub const CODE_ALLOC_MISMATCH: ErrorCode = ErrorCode(437);
pub const CODE_WRONG_CREDENTIALS: ErrorCode = ErrorCode(441);
pub const CODE_UNSUPPORTED_TRANS_PROTO: ErrorCode = ErrorCode(442);
pub const CODE_ALLOC_QUOTA_REACHED: ErrorCode = ErrorCode(486);
pub const CODE_INSUFFICIENT_CAPACITY: ErrorCode = ErrorCode(508);
