#[cfg(test)]
mod certificate_test {
    use super::*;

    #[test]
    fn test_generated_certificate_has_fingerprint() {
        let cert = RTCCertificate::generate().unwrap();
        let fp = cert.fingerprint();
        assert_eq!(fp.algorithm, "sha-256");
        // 32 bytes, colon separated uppercase hex.
        assert_eq!(fp.value.split(':').count(), 32);
        assert!(fp
            .value
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase() || c == ':'));
    }

    #[test]
    fn test_fingerprint_matches_der() {
        let cert = RTCCertificate::generate().unwrap();
        let der = &cert.dtls_certificate.certificate[0];
        assert!(cert.fingerprint().matches(der));
        assert!(!cert.fingerprint().matches(b"other der"));
    }
}

use sha2::{Digest, Sha256};

use crate::error::Result;

// RTCDtlsFingerprint is the a=fingerprint value of a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RTCDtlsFingerprint {
    pub algorithm: String,
    pub value: String,
}

impl RTCDtlsFingerprint {
    // from_der hashes a DER certificate the way SDP advertises it.
    pub fn from_der(der: &[u8]) -> Self {
        let digest = Sha256::digest(der);
        let value = digest
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(":");
        RTCDtlsFingerprint {
            algorithm: "sha-256".to_owned(),
            value,
        }
    }

    pub fn matches(&self, der: &[u8]) -> bool {
        if !self.algorithm.eq_ignore_ascii_case("sha-256") {
            return false;
        }
        RTCDtlsFingerprint::from_der(der)
            .value
            .eq_ignore_ascii_case(&self.value)
    }
}

// RTCCertificate is the self-signed ECDSA P-256 certificate a connection
// presents, valid for about a day.
#[derive(Debug, Clone)]
pub struct RTCCertificate {
    pub dtls_certificate: dtls::config::Certificate,
}

impl RTCCertificate {
    pub fn generate() -> Result<Self> {
        let dtls_certificate = dtls::config::Certificate::generate_self_signed("rtcx")?;
        Ok(RTCCertificate { dtls_certificate })
    }

    pub fn fingerprint(&self) -> RTCDtlsFingerprint {
        RTCDtlsFingerprint::from_der(&self.dtls_certificate.certificate[0])
    }
}
