#[cfg(test)]
mod configuration_test {
    use super::*;

    #[test]
    fn test_parse_ice_servers() {
        let servers = vec![RTCIceServer {
            urls: vec![
                "stun:stun.l.google.com:19302".to_owned(),
                "turn:turn.example.org?transport=udp".to_owned(),
            ],
            username: "user".to_owned(),
            credential: "pass".to_owned(),
        }];
        let parsed = parse_ice_servers(&servers).unwrap();
        assert_eq!(parsed.stun_hosts.len(), 1);
        assert_eq!(parsed.turn_hosts.len(), 1);
        assert_eq!(parsed.stun_hosts[0], ("stun.l.google.com".to_owned(), 19302));
        assert_eq!(parsed.turn_hosts[0].0, "turn.example.org");
        assert_eq!(parsed.turn_hosts[0].1, 3478);
    }

    #[test]
    fn test_parse_rejects_bad_scheme() {
        let servers = vec![RTCIceServer {
            urls: vec!["http://example.org".to_owned()],
            ..Default::default()
        }];
        assert!(parse_ice_servers(&servers).is_err());
    }
}

use crate::error::{Error, Result};
use crate::peer_connection::certificate::RTCCertificate;

// RTCIceServer mirrors the W3C dictionary.
#[derive(Debug, Default, Clone)]
pub struct RTCIceServer {
    pub urls: Vec<String>,
    pub username: String,
    pub credential: String,
}

// RTCIceTransportPolicy: all gathers every type, relay drops non-relay
// pairs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RTCIceTransportPolicy {
    #[default]
    All,
    Relay,
}

// RTCBundlePolicy. max-bundle is the only mode that changes behavior
// here: every m-section shares the first transport. With `disable`, each
// m-section owns an independent transport triple.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RTCBundlePolicy {
    #[default]
    MaxBundle,
    Balanced,
    MaxCompat,
    Disable,
}

// DtlsRolePreference follows RFC 5763 unless pinned.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum DtlsRolePreference {
    #[default]
    Auto,
    Client,
    Server,
}

#[derive(Default)]
pub struct RTCConfiguration {
    pub ice_servers: Vec<RTCIceServer>,
    pub ice_transport_policy: RTCIceTransportPolicy,
    pub bundle_policy: RTCBundlePolicy,
    pub dtls_role_preference: DtlsRolePreference,
    // Supplied certificate; generated at construction when empty.
    pub certificates: Vec<RTCCertificate>,
}

pub(crate) struct ParsedIceServers {
    pub(crate) stun_hosts: Vec<(String, u16)>,
    // host, port, username, credential
    pub(crate) turn_hosts: Vec<(String, u16, String, String)>,
}

// parse_ice_servers validates and splits the configured URLs.
pub(crate) fn parse_ice_servers(servers: &[RTCIceServer]) -> Result<ParsedIceServers> {
    let mut stun_hosts = vec![];
    let mut turn_hosts = vec![];

    for server in servers {
        for url in &server.urls {
            let parsed = stun::uri::Uri::parse_uri(url)
                .map_err(|e| Error::ErrInvalidIceServer(format!("{url}: {e}")))?;
            match parsed.scheme {
                stun::uri::SchemeType::Stun | stun::uri::SchemeType::Stuns => {
                    stun_hosts.push((parsed.host, parsed.port));
                }
                stun::uri::SchemeType::Turn | stun::uri::SchemeType::Turns => {
                    turn_hosts.push((
                        parsed.host,
                        parsed.port,
                        server.username.clone(),
                        server.credential.clone(),
                    ));
                }
                stun::uri::SchemeType::Unknown => {
                    return Err(Error::ErrInvalidIceServer(url.clone()));
                }
            }
        }
    }

    Ok(ParsedIceServers {
        stun_hosts,
        turn_hosts,
    })
}
