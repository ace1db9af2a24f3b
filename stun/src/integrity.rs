#[cfg(test)]
mod integrity_test;

use std::fmt;

use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use sha1::Sha1;
use subtle::ConstantTimeEq;

use crate::attributes::*;
use crate::error::{Error, Result};
use crate::message::*;

type HmacSha1 = Hmac<Sha1>;

pub(crate) const CREDENTIALS_SEP: &str = ":";
pub(crate) const MESSAGE_INTEGRITY_SIZE: usize = 20;

// MessageIntegrity is the MESSAGE-INTEGRITY attribute (RFC 5389 §15.4):
// an HMAC-SHA1 keyed either by the short-term password or by the
// long-term MD5(username ":" realm ":" password) credential.
#[derive(Default, Clone)]
pub struct MessageIntegrity(pub Vec<u8>);

impl fmt::Debug for MessageIntegrity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The key is sensitive, only its length is printed.
        write!(f, "MessageIntegrity(len={})", self.0.len())
    }
}

fn new_hmac(key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha1::new_from_slice(key).expect("hmac accepts any key length");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

impl Setter for MessageIntegrity {
    // add_to computes the HMAC over the message as encoded so far, with
    // the length field adjusted to cover the integrity TLV itself.
    fn add_to(&self, m: &mut Message) -> Result<()> {
        for a in &m.attributes.0 {
            if a.typ == ATTR_FINGERPRINT {
                return Err(Error::ErrFingerprintBeforeIntegrity);
            }
        }
        let length = m.length;
        m.length += (MESSAGE_INTEGRITY_SIZE + ATTRIBUTE_HEADER_SIZE) as u32;
        m.write_length();
        let v = new_hmac(&self.0, &m.raw);
        m.length = length;
        m.add(ATTR_MESSAGE_INTEGRITY, &v);
        Ok(())
    }
}

impl MessageIntegrity {
    // new_long_term_integrity returns a key for long-term credentials.
    // Username, realm and password must be SASL-prepared.
    pub fn new_long_term_integrity(username: String, realm: String, password: String) -> Self {
        let s = [username, realm, password].join(CREDENTIALS_SEP);
        let mut h = Md5::new();
        h.update(s.as_bytes());
        MessageIntegrity(h.finalize().as_slice().to_vec())
    }

    // new_short_term_integrity returns a key for short-term credentials.
    pub fn new_short_term_integrity(password: String) -> Self {
        MessageIntegrity(password.as_bytes().to_vec())
    }

    // check verifies the MESSAGE-INTEGRITY attribute, tolerating
    // attributes that follow it (FINGERPRINT) by shrinking the length
    // field the way the sender computed it.
    pub fn check(&self, m: &mut Message) -> Result<()> {
        let v = m.get(ATTR_MESSAGE_INTEGRITY)?;

        let length = m.length;
        let mut after_integrity = false;
        let mut size_reduced = 0u32;

        for a in &m.attributes.0 {
            if after_integrity {
                size_reduced += nearest_padded_value_length(a.length as usize) as u32;
                size_reduced += ATTRIBUTE_HEADER_SIZE as u32;
            }
            if a.typ == ATTR_MESSAGE_INTEGRITY {
                after_integrity = true;
            }
        }
        m.length -= size_reduced;
        m.write_length();
        let start_of_hmac = MESSAGE_HEADER_SIZE + m.length as usize
            - (ATTRIBUTE_HEADER_SIZE + MESSAGE_INTEGRITY_SIZE);
        let expected = new_hmac(&self.0, &m.raw[..start_of_hmac]);
        m.length = length;
        m.write_length();

        if v.ct_eq(&expected).into() {
            Ok(())
        } else {
            Err(Error::ErrIntegrityMismatch)
        }
    }
}
