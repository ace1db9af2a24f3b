use std::fmt;

use crate::attributes::*;
use crate::error::{Error, Result};
use crate::message::*;

// UnknownAttributes is the UNKNOWN-ATTRIBUTES attribute (RFC 5389 §15.9),
// carried in 420 error responses.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UnknownAttributes(pub Vec<AttrType>);

impl fmt::Display for UnknownAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "<nil>")
        } else {
            let mut s = vec![];
            for t in &self.0 {
                s.push(t.to_string());
            }
            write!(f, "{}", s.join(", "))
        }
    }
}

// Each attribute type occupies 2 bytes in the value.
const ATTR_TYPE_SIZE: usize = 2;

impl Setter for UnknownAttributes {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        let mut v = Vec::with_capacity(ATTR_TYPE_SIZE * 20);
        for t in &self.0 {
            v.extend_from_slice(&t.value().to_be_bytes());
        }
        m.add(ATTR_UNKNOWN_ATTRIBUTES, &v);
        Ok(())
    }
}

impl Getter for UnknownAttributes {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        let v = m.get(ATTR_UNKNOWN_ATTRIBUTES)?;
        if v.len() % ATTR_TYPE_SIZE != 0 {
            return Err(Error::ErrAttributeSizeInvalid);
        }
        self.0.clear();
        for chunk in v.chunks_exact(ATTR_TYPE_SIZE) {
            self.0.push(AttrType(u16::from_be_bytes([chunk[0], chunk[1]])));
        }
        Ok(())
    }
}
