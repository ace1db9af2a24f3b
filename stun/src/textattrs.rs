use std::fmt;

use crate::attributes::*;
use crate::error::Result;
use crate::message::*;

const MAX_USERNAME_B: usize = 513;
const MAX_REALM_B: usize = 763;
const MAX_SOFTWARE_B: usize = 763;
const MAX_NONCE_B: usize = 763;

// TextAttribute is a STUN attribute whose value is a qvalue-free string,
// shared by USERNAME, REALM, SOFTWARE and NONCE.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TextAttribute {
    pub attr: AttrType,
    pub text: String,
}

// Username is the USERNAME attribute (RFC 5389 §15.3).
pub type Username = TextAttribute;
// Realm is the REALM attribute (RFC 5389 §15.7).
pub type Realm = TextAttribute;
// Nonce is the NONCE attribute (RFC 5389 §15.8).
pub type Nonce = TextAttribute;
// Software is the SOFTWARE attribute (RFC 5389 §15.10).
pub type Software = TextAttribute;

impl fmt::Display for TextAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl Setter for TextAttribute {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        let max_len = match self.attr {
            ATTR_USERNAME => MAX_USERNAME_B,
            ATTR_REALM => MAX_REALM_B,
            ATTR_SOFTWARE => MAX_SOFTWARE_B,
            ATTR_NONCE => MAX_NONCE_B,
            _ => usize::MAX,
        };
        check_overflow(self.attr, self.text.len(), max_len)?;
        m.add(self.attr, self.text.as_bytes());
        Ok(())
    }
}

impl Getter for TextAttribute {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        let attr = self.attr;
        *self = TextAttribute::get_from_as(m, attr)?;
        Ok(())
    }
}

impl TextAttribute {
    pub fn new(attr: AttrType, text: String) -> Self {
        TextAttribute { attr, text }
    }

    // get_from_as gets t attribute from m as a text attribute.
    pub fn get_from_as(m: &Message, attr: AttrType) -> Result<Self> {
        let v = m.get(attr)?;
        let text = String::from_utf8_lossy(&v).to_string();
        Ok(TextAttribute { attr, text })
    }
}
