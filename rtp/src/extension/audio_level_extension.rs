#[cfg(test)]
mod audio_level_extension_test {
    use util::marshal::{Marshal, Unmarshal};

    use super::*;

    #[test]
    fn test_audio_level_roundtrip() {
        let ext = AudioLevelExtension {
            level: 88,
            voice: true,
        };
        let raw = ext.marshal().unwrap();
        let mut buf = &raw[..];
        assert_eq!(AudioLevelExtension::unmarshal(&mut buf).unwrap(), ext);
    }

    #[test]
    fn test_audio_level_too_large() {
        let ext = AudioLevelExtension {
            level: 128,
            voice: false,
        };
        assert!(ext.marshal().is_err());
    }
}

use bytes::{Buf, BufMut};
use util::marshal::{Marshal, MarshalSize, Unmarshal};

use crate::error::Error;

pub const AUDIO_LEVEL_EXTENSION_SIZE: usize = 1;

// AudioLevelExtension is the RFC 6464 audio level indication: a V bit for
// voice activity and the level in -dBov (0..127).
#[derive(PartialEq, Eq, Debug, Default, Copy, Clone)]
pub struct AudioLevelExtension {
    pub level: u8,
    pub voice: bool,
}

impl MarshalSize for AudioLevelExtension {
    fn marshal_size(&self) -> usize {
        AUDIO_LEVEL_EXTENSION_SIZE
    }
}

impl Marshal for AudioLevelExtension {
    fn marshal_to(&self, mut buf: &mut [u8]) -> std::result::Result<usize, util::Error> {
        if buf.remaining_mut() < AUDIO_LEVEL_EXTENSION_SIZE {
            return Err(Error::ErrBufferTooSmall.into());
        }
        if self.level > 127 {
            return Err(Error::Other("audio level overflow".to_owned()).into());
        }
        let voice = if self.voice { 0x80u8 } else { 0 };
        buf.put_u8(voice | self.level);
        Ok(AUDIO_LEVEL_EXTENSION_SIZE)
    }
}

impl Unmarshal for AudioLevelExtension {
    fn unmarshal<B>(raw_packet: &mut B) -> std::result::Result<Self, util::Error>
    where
        B: Buf,
    {
        if raw_packet.remaining() < AUDIO_LEVEL_EXTENSION_SIZE {
            return Err(Error::ErrTooSmall.into());
        }
        let b = raw_packet.get_u8();
        Ok(AudioLevelExtension {
            level: b & 0x7F,
            voice: b & 0x80 != 0,
        })
    }
}
