#[cfg(test)]
mod state_test {
    use super::*;

    #[test]
    fn test_signaling_transitions() {
        use RTCSdpType::*;
        use RTCSignalingState::*;

        // Offerer path.
        assert_eq!(
            check_next_signaling_state(Stable, Offer, true).unwrap(),
            HaveLocalOffer
        );
        assert_eq!(
            check_next_signaling_state(HaveLocalOffer, Answer, false).unwrap(),
            Stable
        );

        // Answerer path.
        assert_eq!(
            check_next_signaling_state(Stable, Offer, false).unwrap(),
            HaveRemoteOffer
        );
        assert_eq!(
            check_next_signaling_state(HaveRemoteOffer, Answer, true).unwrap(),
            Stable
        );

        // Rollback.
        assert_eq!(
            check_next_signaling_state(HaveLocalOffer, Rollback, true).unwrap(),
            Stable
        );
        assert!(check_next_signaling_state(Stable, Rollback, true).is_err());

        // Invalid: answering without an offer.
        assert!(check_next_signaling_state(Stable, Answer, true).is_err());
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RTCSdpType {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

impl fmt::Display for RTCSdpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RTCSdpType::Offer => "offer",
            RTCSdpType::Answer => "answer",
            RTCSdpType::Pranswer => "pranswer",
            RTCSdpType::Rollback => "rollback",
        };
        write!(f, "{s}")
    }
}

// RTCSignalingState per the W3C state machine.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RTCSignalingState {
    #[default]
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    HaveLocalPranswer,
    HaveRemotePranswer,
    Closed,
}

impl fmt::Display for RTCSignalingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RTCSignalingState::Stable => "stable",
            RTCSignalingState::HaveLocalOffer => "have-local-offer",
            RTCSignalingState::HaveRemoteOffer => "have-remote-offer",
            RTCSignalingState::HaveLocalPranswer => "have-local-pranswer",
            RTCSignalingState::HaveRemotePranswer => "have-remote-pranswer",
            RTCSignalingState::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

// check_next_signaling_state validates a set_local/set_remote transition
// including rollback, returning the state that results.
pub(crate) fn check_next_signaling_state(
    current: RTCSignalingState,
    sdp_type: RTCSdpType,
    is_local: bool,
) -> Result<RTCSignalingState> {
    use RTCSdpType::*;
    use RTCSignalingState::*;

    let next = match (current, sdp_type, is_local) {
        (Stable, Offer, true) => HaveLocalOffer,
        (Stable, Offer, false) => HaveRemoteOffer,
        (HaveLocalOffer, Answer, false) => Stable,
        (HaveLocalOffer, Pranswer, false) => HaveRemotePranswer,
        (HaveRemotePranswer, Answer, false) => Stable,
        (HaveRemoteOffer, Answer, true) => Stable,
        (HaveRemoteOffer, Pranswer, true) => HaveLocalPranswer,
        (HaveLocalPranswer, Answer, true) => Stable,
        (HaveLocalOffer, Rollback, _) | (HaveRemoteOffer, Rollback, _) => Stable,
        (state, typ, local) => {
            return Err(Error::ErrInvalidStateTransition(format!(
                "{state} -> {typ} (local={local})"
            )))
        }
    };
    Ok(next)
}

// RTCPeerConnectionState aggregates ICE and DTLS transport states.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RTCPeerConnectionState {
    #[default]
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl fmt::Display for RTCPeerConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RTCPeerConnectionState::New => "new",
            RTCPeerConnectionState::Connecting => "connecting",
            RTCPeerConnectionState::Connected => "connected",
            RTCPeerConnectionState::Disconnected => "disconnected",
            RTCPeerConnectionState::Failed => "failed",
            RTCPeerConnectionState::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

// RTCIceGatheringState mirrors the gatherer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RTCIceGatheringState {
    #[default]
    New,
    Gathering,
    Complete,
}

// RTCSessionDescription pairs an SDP blob with its type; serializable
// for signalling transports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RTCSessionDescription {
    pub sdp_type: RTCSdpType,
    pub sdp: String,
}
