#[cfg(test)]
mod util_test {
    use super::*;
    use crate::description::media::Codec;

    #[test]
    fn test_codecs_match_ignores_case_and_pt() {
        let a = Codec {
            payload_type: 96,
            name: "VP8".to_owned(),
            clock_rate: 90000,
            ..Default::default()
        };
        let b = Codec {
            payload_type: 101,
            name: "vp8".to_owned(),
            clock_rate: 90000,
            ..Default::default()
        };
        assert!(codecs_match(&a, &b));
    }

    #[test]
    fn test_codecs_match_checks_clockrate_and_channels() {
        let opus = Codec {
            name: "opus".to_owned(),
            clock_rate: 48000,
            encoding_parameters: "2".to_owned(),
            ..Default::default()
        };
        let mono = Codec {
            name: "opus".to_owned(),
            clock_rate: 48000,
            encoding_parameters: "1".to_owned(),
            ..Default::default()
        };
        assert!(!codecs_match(&opus, &mono));
    }
}

use crate::description::media::Codec;

// codecs_match decides whether two rtpmap entries describe the same
// codec, ignoring the (locally chosen) payload type number.
pub fn codecs_match(a: &Codec, b: &Codec) -> bool {
    a.name.eq_ignore_ascii_case(&b.name)
        && a.clock_rate == b.clock_rate
        && a.encoding_parameters == b.encoding_parameters
}
